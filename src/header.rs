//! Container header (spec section 3.1): fixed 24 bytes at the start of every
//! QS/QDATA file, magic-byte table, and framed-block size limits (spec
//! section 3.2).
//!
//! Grounded on `qs_qd_file_headers.h`'s `write_qs2_header`/`read_qs2_header`,
//! adjusted to spec's QDATA magic byte (`0B 0E 0A CD`), which differs from
//! the original source's `0xC2` — spec.md is authoritative where the two
//! disagree. The legacy-magic rejection idiom is grounded on the teacher's
//! `LEGACY_MAGICNUMBER` handling in `io/compress_legacy.rs`.

use crate::error::{BadMagicKind, Endian, Qs2Error, Result};
use crate::io::{ByteSink, ByteSource};

/// Fixed header size in bytes.
pub const HEADER_SIZE: usize = 24;

/// Uncompressed block size ceiling (spec section 3.2).
pub const MAX_BLOCKSIZE: usize = 1024 * 1024;
/// Flush threshold: writers flush before emitting a block that would split a
/// fixed-size element across the boundary.
pub const MIN_BLOCKSIZE: usize = MAX_BLOCKSIZE - 64;

/// Current format version. Readers reject anything greater.
pub const CURRENT_FORMAT_VERSION: u8 = 1;
/// The only recognized compression-algorithm byte (zstd).
pub const COMPRESSION_ZSTD: u8 = 1;

const QS_MAGIC: [u8; 4] = [0x0B, 0x0E, 0x0A, 0xC1];
const QDATA_MAGIC: [u8; 4] = [0x0B, 0x0E, 0x0A, 0xCD];
const LEGACY_MAGIC: [u8; 4] = [0x0B, 0x0E, 0x0A, 0x0C];

/// Which container format a header/magic belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Qs,
    Qdata,
}

impl Format {
    fn magic(self) -> [u8; 4] {
        match self {
            Format::Qs => QS_MAGIC,
            Format::Qdata => QDATA_MAGIC,
        }
    }
}

/// Parsed 24-byte container header.
#[derive(Debug, Clone)]
pub struct ContainerHeader {
    pub format: Format,
    pub format_version: u8,
    pub compression: u8,
    pub endian: Endian,
    pub shuffle: bool,
    /// 64-bit little-endian trailer digest. Zero means "not finalized".
    pub content_hash: u64,
}

impl ContainerHeader {
    pub fn new(format: Format, shuffle: bool) -> Self {
        ContainerHeader {
            format,
            format_version: CURRENT_FORMAT_VERSION,
            compression: COMPRESSION_ZSTD,
            endian: Endian::host(),
            shuffle,
            content_hash: 0,
        }
    }

    /// Serialize to the fixed 24-byte on-disk layout (spec section 3.1).
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut bits = [0u8; HEADER_SIZE];
        bits[0..4].copy_from_slice(&self.format.magic());
        bits[4] = self.format_version;
        bits[5] = self.compression;
        bits[6] = self.endian.to_byte();
        bits[7] = self.shuffle as u8;
        // bytes 8..16 reserved, left zeroed
        bits[16..24].copy_from_slice(&self.content_hash.to_le_bytes());
        bits
    }

    /// Parse and validate a 24-byte header, expecting `expected` format.
    pub fn from_bytes(bits: &[u8; HEADER_SIZE], expected: Format) -> Result<Self> {
        let header = Self::from_bytes_any(bits)?;
        if header.format != expected {
            let kind = match expected {
                Format::Qs => BadMagicKind::ExpectedQsGotQdata,
                Format::Qdata => BadMagicKind::ExpectedQdataGotQs,
            };
            return Err(Qs2Error::BadMagic(kind));
        }
        Ok(header)
    }

    /// Parse and validate a 24-byte header without requiring a particular
    /// format in advance — used by format-agnostic inspection entry points
    /// (spec section 4.11's `read_hash`/`verify_trailer_hash`) that accept
    /// either a QS or a QDATA container.
    pub fn from_bytes_any(bits: &[u8; HEADER_SIZE]) -> Result<Self> {
        let magic = [bits[0], bits[1], bits[2], bits[3]];
        let format = if magic == QS_MAGIC {
            Format::Qs
        } else if magic == QDATA_MAGIC {
            Format::Qdata
        } else if magic == LEGACY_MAGIC {
            return Err(Qs2Error::BadMagic(BadMagicKind::Legacy));
        } else {
            return Err(Qs2Error::BadMagic(BadMagicKind::Unrecognized));
        };

        let format_version = bits[4];
        if format_version > CURRENT_FORMAT_VERSION {
            return Err(Qs2Error::UnsupportedVersion {
                found: format_version,
                max: CURRENT_FORMAT_VERSION,
            });
        }

        let compression = bits[5];
        if compression != COMPRESSION_ZSTD {
            return Err(Qs2Error::UnsupportedCompression(compression));
        }

        let file_endian =
            Endian::from_byte(bits[6]).ok_or(Qs2Error::CorruptBlock("invalid endian byte"))?;
        let host_endian = Endian::host();
        if file_endian != host_endian {
            return Err(Qs2Error::EndianMismatch {
                file: file_endian,
                host: host_endian,
            });
        }

        let shuffle = bits[7] != 0;

        let mut hash_bytes = [0u8; 8];
        hash_bytes.copy_from_slice(&bits[16..24]);
        let content_hash = u64::from_le_bytes(hash_bytes);

        Ok(ContainerHeader {
            format,
            format_version,
            compression,
            endian: file_endian,
            shuffle,
            content_hash,
        })
    }

    /// Write the header to `sink`.
    pub fn write<W: ByteSink>(&self, sink: &mut W) -> Result<()> {
        sink.write(&self.to_bytes())?;
        Ok(())
    }

    /// Read and validate a header from `source`.
    pub fn read<R: ByteSource>(source: &mut R, expected: Format) -> Result<Self> {
        let bits = Self::read_bits(source)?;
        Self::from_bytes(&bits, expected)
    }

    /// Read and validate a header from `source` without requiring a
    /// particular format in advance.
    pub fn read_any<R: ByteSource>(source: &mut R) -> Result<Self> {
        let bits = Self::read_bits(source)?;
        Self::from_bytes_any(&bits)
    }

    fn read_bits<R: ByteSource>(source: &mut R) -> Result<[u8; HEADER_SIZE]> {
        let mut bits = [0u8; HEADER_SIZE];
        let got = source.read(&mut bits)?;
        if got != HEADER_SIZE {
            return Err(Qs2Error::TruncatedInput("container header"));
        }
        Ok(bits)
    }

    /// Rewrite just the content-hash field (offset 16) at close time, without
    /// disturbing the rest of the header. `sink` must support `seek`.
    pub fn rewrite_hash<W: ByteSink>(sink: &mut W, hash: u64) -> Result<()> {
        let saved = sink.tell()?;
        sink.seek(16)?;
        sink.write(&hash.to_le_bytes())?;
        sink.seek(saved)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::MemWriter;
    use crate::io::MemReader;

    #[test]
    fn roundtrip_qdata_header() {
        let mut h = ContainerHeader::new(Format::Qdata, true);
        h.content_hash = 0xDEAD_BEEF_CAFE_0001;
        let mut w = MemWriter::new();
        h.write(&mut w).unwrap();
        let bytes = w.into_inner();
        assert_eq!(bytes.len(), HEADER_SIZE);

        let mut r = MemReader::new(bytes);
        let parsed = ContainerHeader::read(&mut r, Format::Qdata).unwrap();
        assert_eq!(parsed.content_hash, h.content_hash);
        assert!(parsed.shuffle);
    }

    #[test]
    fn rejects_legacy_magic() {
        let mut bits = [0u8; HEADER_SIZE];
        bits[0..4].copy_from_slice(&LEGACY_MAGIC);
        let err = ContainerHeader::from_bytes(&bits, Format::Qs).unwrap_err();
        assert!(matches!(err, Qs2Error::BadMagic(BadMagicKind::Legacy)));
    }

    #[test]
    fn rejects_wrong_format() {
        let h = ContainerHeader::new(Format::Qs, false);
        let bits = h.to_bytes();
        let err = ContainerHeader::from_bytes(&bits, Format::Qdata).unwrap_err();
        assert!(matches!(
            err,
            Qs2Error::BadMagic(BadMagicKind::ExpectedQdataGotQs)
        ));
    }

    #[test]
    fn rejects_newer_version() {
        let h = ContainerHeader::new(Format::Qs, false);
        let mut bits = h.to_bytes();
        bits[4] = CURRENT_FORMAT_VERSION + 1;
        let err = ContainerHeader::from_bytes(&bits, Format::Qs).unwrap_err();
        assert!(matches!(err, Qs2Error::UnsupportedVersion { .. }));
    }

    #[test]
    fn zero_hash_detectable_as_unfinalized() {
        let h = ContainerHeader::new(Format::Qs, false);
        assert_eq!(h.content_hash, 0);
    }
}
