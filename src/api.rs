//! Public entry points (spec section 1): save/load for both wire formats.
//!
//! Each function validates `options`, writes or reads the 24-byte container
//! header, then dispatches to the single-worker or pipelined multi-worker
//! block framer based on `Options::n_threads` — mirroring the teacher's own
//! top-level `compress_file`/`decompress_file` dispatch in `lib.rs`, which
//! picks between its single- and multi-threaded frame paths the same way.

use std::path::Path;

use crate::compressor::{self, SIZE_MASK};
use crate::error::{Qs2Error, Result};
use crate::hasher::TrailerHasher;
use crate::header::{ContainerHeader, Format, MAX_BLOCKSIZE};
use crate::io::{ByteSink, ByteSource, FileReader};
use crate::options::{Options, ShuffleMode};
use crate::qdata::{self, Tagged};
use crate::qs;

#[cfg(feature = "multithread")]
use crate::block_mt::{HashValidatedMtReader, MtBlockWriter, MtStreamReader};
#[cfg(feature = "multithread")]
use crate::framing::BufferedBlockReader;

/// Serialize `root` as a QDATA container onto `sink`, returning it with the
/// trailer hash already rewritten into the header.
pub fn save_qdata<W: ByteSink>(mut sink: W, root: &Tagged, options: &Options) -> Result<W> {
    options.validate()?;
    let header = ContainerHeader::new(Format::Qdata, options.shuffle != ShuffleMode::Off);
    header.write(&mut sink)?;

    let (mut sink, hash) = if options.n_threads <= 1 {
        let mut w = qs::new_block_writer(sink, options);
        qdata::serialize(&mut w, root, options)?;
        w.finish()?
    } else {
        save_qdata_mt(sink, root, options)?
    };

    ContainerHeader::rewrite_hash(&mut sink, hash)?;
    Ok(sink)
}

#[cfg(feature = "multithread")]
fn save_qdata_mt<W: ByteSink>(sink: W, root: &Tagged, options: &Options) -> Result<(W, u64)> {
    let mut w = MtBlockWriter::new(
        sink,
        options.n_threads,
        options.compress_level,
        options.shuffle,
        options.shuffle_heuristic,
    )?;
    qdata::serialize(&mut w, root, options)?;
    w.finish()
}

#[cfg(not(feature = "multithread"))]
fn save_qdata_mt<W: ByteSink>(_sink: W, _root: &Tagged, _options: &Options) -> Result<(W, u64)> {
    unreachable!("Options::validate rejects n_threads > 1 without the multithread feature")
}

/// Read a QDATA container back into a [`Tagged`] value tree.
pub fn load_qdata<R: ByteSource>(mut source: R, options: &Options) -> Result<Tagged> {
    options.validate()?;
    let header = ContainerHeader::read(&mut source, Format::Qdata)?;
    if header.content_hash == 0 {
        return Err(Qs2Error::HashMissing);
    }
    if options.n_threads <= 1 {
        let mut r = qs::new_block_reader(source);
        qdata::deserialize(&mut r, options)
    } else {
        load_qdata_mt(source, header.content_hash, options)
    }
}

#[cfg(feature = "multithread")]
fn load_qdata_mt<R: ByteSource>(source: R, stored_hash: u64, options: &Options) -> Result<Tagged> {
    if options.validate_hash {
        let inner = HashValidatedMtReader::new(source, stored_hash, options.n_threads)?;
        let mut r = BufferedBlockReader::new(inner);
        qdata::deserialize(&mut r, options)
    } else {
        let inner = MtStreamReader::new(source, options.n_threads)?;
        let mut r = BufferedBlockReader::new(inner);
        qdata::deserialize(&mut r, options)
    }
}

#[cfg(not(feature = "multithread"))]
fn load_qdata_mt<R: ByteSource>(_source: R, _stored_hash: u64, _options: &Options) -> Result<Tagged> {
    unreachable!("Options::validate rejects n_threads > 1 without the multithread feature")
}

/// Tunnel an opaque, already-serialized byte stream through a QS container.
pub fn save_qs<W: ByteSink>(mut sink: W, bytes: &[u8], options: &Options) -> Result<W> {
    options.validate()?;
    let header = ContainerHeader::new(Format::Qs, options.shuffle != ShuffleMode::Off);
    header.write(&mut sink)?;

    let (mut sink, hash) = if options.n_threads <= 1 {
        let mut w = qs::new_block_writer(sink, options);
        qs::save_qs(&mut w, bytes)?;
        w.finish()?
    } else {
        save_qs_mt(sink, bytes, options)?
    };

    ContainerHeader::rewrite_hash(&mut sink, hash)?;
    Ok(sink)
}

#[cfg(feature = "multithread")]
fn save_qs_mt<W: ByteSink>(sink: W, bytes: &[u8], options: &Options) -> Result<(W, u64)> {
    let mut w = MtBlockWriter::new(
        sink,
        options.n_threads,
        options.compress_level,
        options.shuffle,
        options.shuffle_heuristic,
    )?;
    qs::save_qs(&mut w, bytes)?;
    w.finish()
}

#[cfg(not(feature = "multithread"))]
fn save_qs_mt<W: ByteSink>(_sink: W, _bytes: &[u8], _options: &Options) -> Result<(W, u64)> {
    unreachable!("Options::validate rejects n_threads > 1 without the multithread feature")
}

/// Read `len` opaque bytes back out of a QS container. The caller must
/// already know the expected length (spec section 9: QS never inspects its
/// own payload, so nothing in the container records it — the host's own
/// deserializer determines how many bytes it needs, exactly as it determined
/// how many bytes to hand `save_qs`).
pub fn load_qs<R: ByteSource>(mut source: R, len: usize, options: &Options) -> Result<Vec<u8>> {
    options.validate()?;
    let header = ContainerHeader::read(&mut source, Format::Qs)?;
    if header.content_hash == 0 {
        return Err(Qs2Error::HashMissing);
    }
    if options.n_threads <= 1 {
        let mut r = qs::new_block_reader(source);
        qs::load_qs(&mut r, len)
    } else {
        load_qs_mt(source, header.content_hash, len, options)
    }
}

#[cfg(feature = "multithread")]
fn load_qs_mt<R: ByteSource>(
    source: R,
    stored_hash: u64,
    len: usize,
    options: &Options,
) -> Result<Vec<u8>> {
    if options.validate_hash {
        let inner = HashValidatedMtReader::new(source, stored_hash, options.n_threads)?;
        let mut r = BufferedBlockReader::new(inner);
        qs::load_qs(&mut r, len)
    } else {
        let inner = MtStreamReader::new(source, options.n_threads)?;
        let mut r = BufferedBlockReader::new(inner);
        qs::load_qs(&mut r, len)
    }
}

#[cfg(not(feature = "multithread"))]
fn load_qs_mt<R: ByteSource>(
    _source: R,
    _stored_hash: u64,
    _len: usize,
    _options: &Options,
) -> Result<Vec<u8>> {
    unreachable!("Options::validate rejects n_threads > 1 without the multithread feature")
}

/// Re-hash a container's framed-block stream and compare it against the
/// trailer digest stored in its header, without decompressing any payload
/// (spec section 4.11's `read_hash` streaming re-hash). Accepts either a QS
/// or a QDATA container. A standalone inspection entry point, the way the
/// teacher exposes `CompressedFileInfo`/`file_info.rs` on top of its core
/// compress/decompress paths.
pub fn verify_trailer_hash<P: AsRef<Path>>(path: P) -> Result<bool> {
    let mut source = FileReader::open(path)?;
    let header = ContainerHeader::read_any(&mut source)?;
    if header.content_hash == 0 {
        return Err(Qs2Error::HashMissing);
    }

    let mut hasher = TrailerHasher::new();
    loop {
        let mut word = [0u8; 4];
        let n = source.read(&mut word)?;
        if n == 0 {
            break;
        }
        if n != 4 {
            return Err(Qs2Error::TruncatedInput("block size word"));
        }
        let raw = u32::from_le_bytes(word);
        let zsize = (raw & SIZE_MASK) as usize;
        if zsize > compressor::compress_bound(MAX_BLOCKSIZE) {
            return Err(Qs2Error::CorruptBlock("compressed size exceeds bound"));
        }
        let mut zbuf = vec![0u8; zsize];
        source.read_exact(&mut zbuf)?;
        hasher.update(&word);
        hasher.update(&zbuf);
    }

    Ok(hasher.digest() == header.content_hash)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::{MemReader, MemWriter};
    use crate::qdata::{NullableVec, Value};

    fn sample_tree() -> Tagged {
        Tagged::plain(Value::List(vec![
            Tagged::plain(Value::Numeric(vec![1.0, 2.5, f64::NAN])),
            Tagged::plain(Value::Integer(NullableVec::from_vec(vec![Some(1), None]))),
            Tagged::plain(Value::Character(vec![Some("hi".to_string()), None])),
        ]))
    }

    #[test]
    fn qdata_roundtrip_single_worker() {
        let options = Options {
            n_threads: 1,
            ..Options::default()
        };
        let root = sample_tree();
        let sink = save_qdata(MemWriter::new(), &root, &options).unwrap();
        let out = load_qdata(MemReader::new(sink.into_inner()), &options).unwrap();
        assert_eq!(out.value, root.value);
    }

    #[cfg(feature = "multithread")]
    #[test]
    fn qdata_roundtrip_multi_worker_streaming() {
        let options = Options {
            n_threads: 4,
            ..Options::default()
        };
        let root = sample_tree();
        let sink = save_qdata(MemWriter::new(), &root, &options).unwrap();
        let out = load_qdata(MemReader::new(sink.into_inner()), &options).unwrap();
        assert_eq!(out.value, root.value);
    }

    #[cfg(feature = "multithread")]
    #[test]
    fn qdata_roundtrip_multi_worker_hash_validated() {
        let options = Options {
            n_threads: 4,
            validate_hash: true,
            ..Options::default()
        };
        let root = sample_tree();
        let sink = save_qdata(MemWriter::new(), &root, &options).unwrap();
        let out = load_qdata(MemReader::new(sink.into_inner()), &options).unwrap();
        assert_eq!(out.value, root.value);
    }

    #[test]
    fn load_qdata_rejects_unfinalized_hash() {
        let options = Options {
            n_threads: 1,
            ..Options::default()
        };
        let root = sample_tree();
        let sink = save_qdata(MemWriter::new(), &root, &options).unwrap();
        let mut bytes = sink.into_inner();
        bytes[16..24].copy_from_slice(&0u64.to_le_bytes());
        let err = load_qdata(MemReader::new(bytes), &options).unwrap_err();
        assert!(matches!(err, Qs2Error::HashMissing));
    }

    #[test]
    fn qs_roundtrip_single_worker() {
        let options = Options {
            n_threads: 1,
            ..Options::default()
        };
        let bytes = b"an opaque host-serialized byte stream".to_vec();
        let sink = save_qs(MemWriter::new(), &bytes, &options).unwrap();
        let out = load_qs(MemReader::new(sink.into_inner()), bytes.len(), &options).unwrap();
        assert_eq!(out, bytes);
    }

    #[test]
    fn load_qs_rejects_unfinalized_hash() {
        let options = Options {
            n_threads: 1,
            ..Options::default()
        };
        let bytes = b"an opaque host-serialized byte stream".to_vec();
        let sink = save_qs(MemWriter::new(), &bytes, &options).unwrap();
        let mut saved = sink.into_inner();
        saved[16..24].copy_from_slice(&0u64.to_le_bytes());
        let err = load_qs(MemReader::new(saved), bytes.len(), &options).unwrap_err();
        assert!(matches!(err, Qs2Error::HashMissing));
    }

    #[cfg(feature = "multithread")]
    #[test]
    fn qs_roundtrip_multi_worker() {
        let options = Options {
            n_threads: 3,
            ..Options::default()
        };
        let bytes: Vec<u8> = (0..500_000u32).map(|i| (i % 256) as u8).collect();
        let sink = save_qs(MemWriter::new(), &bytes, &options).unwrap();
        let out = load_qs(MemReader::new(sink.into_inner()), bytes.len(), &options).unwrap();
        assert_eq!(out, bytes);
    }

    #[test]
    fn verify_trailer_hash_accepts_intact_file() {
        use crate::io::FileWriter;

        let options = Options {
            n_threads: 1,
            ..Options::default()
        };
        let bytes = b"bytes a real host serializer would have produced".to_vec();
        let sink = save_qs(MemWriter::new(), &bytes, &options).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("container.qs2");
        let mut w = FileWriter::create(&path).unwrap();
        w.write(&sink.into_inner()).unwrap();
        drop(w);

        assert!(verify_trailer_hash(&path).unwrap());
    }

    #[test]
    fn verify_trailer_hash_rejects_tampered_file() {
        use crate::io::FileWriter;

        let options = Options {
            n_threads: 1,
            ..Options::default()
        };
        let bytes = b"bytes a real host serializer would have produced".to_vec();
        let sink = save_qs(MemWriter::new(), &bytes, &options).unwrap();
        let mut saved = sink.into_inner();
        *saved.last_mut().unwrap() ^= 0xFF;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("container.qs2");
        let mut w = FileWriter::create(&path).unwrap();
        w.write(&saved).unwrap();
        drop(w);

        assert!(!verify_trailer_hash(&path).unwrap());
    }

    #[test]
    fn rejects_n_threads_zero() {
        let options = Options {
            n_threads: 0,
            ..Options::default()
        };
        let err = save_qs(MemWriter::new(), b"x", &options).unwrap_err();
        assert!(matches!(err, crate::error::Qs2Error::InvalidArgument(_)));
    }
}
