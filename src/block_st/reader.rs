use crate::compressor::{self, SHUFFLE_FLAG, SIZE_MASK};
use crate::error::{Qs2Error, Result};
use crate::header::MAX_BLOCKSIZE;
use crate::io::ByteSource;

use super::writer::PodBytes;

/// Single-worker block reader (spec section 4.6).
pub struct BlockReader<R: ByteSource> {
    source: R,
    cur_block: Vec<u8>,
    cur_size: usize,
    data_offset: usize,
    zblock: Vec<u8>,
    /// Element size used to unshuffle blocks whose shuffle bit is set.
    /// Mirrors `BlockWriter::type_size` — set by QDATA before reading each
    /// typed worklist.
    type_size: usize,
    eof: bool,
}

impl<R: ByteSource> BlockReader<R> {
    pub fn new(source: R) -> Self {
        BlockReader {
            source,
            cur_block: Vec::new(),
            cur_size: 0,
            data_offset: 0,
            zblock: vec![0u8; compressor::compress_bound(MAX_BLOCKSIZE)],
            type_size: 1,
            eof: false,
        }
    }

    pub fn set_type_size(&mut self, type_size: usize) {
        self.type_size = type_size;
    }

    /// Fill `dst` with exactly `dst.len()` bytes, draining the current block
    /// first and decompressing further blocks as needed. When the remainder
    /// needed is at least `MAX_BLOCKSIZE`, decompresses directly into `dst`.
    pub fn get_data(&mut self, mut dst: &mut [u8]) -> Result<()> {
        while !dst.is_empty() {
            let available = self.cur_size - self.data_offset;
            if available > 0 {
                let n = available.min(dst.len());
                dst[..n]
                    .copy_from_slice(&self.cur_block[self.data_offset..self.data_offset + n]);
                self.data_offset += n;
                dst = &mut dst[n..];
                continue;
            }
            if dst.len() >= MAX_BLOCKSIZE {
                let n = self.decompress_next_block_into(dst)?;
                dst = &mut dst[n..];
            } else {
                self.refill()?;
                if self.cur_size == 0 {
                    return Err(Qs2Error::TruncatedInput("block payload"));
                }
            }
        }
        Ok(())
    }

    /// Zero-copy peek: returns a pointer (as a slice) into `cur_block` when
    /// `len` bytes remain in the current block, else `None` and the caller
    /// must fall back to [`Self::get_data`].
    pub fn get_ptr(&mut self, len: usize) -> Option<&[u8]> {
        if self.cur_size - self.data_offset >= len {
            Some(&self.cur_block[self.data_offset..self.data_offset + len])
        } else {
            None
        }
    }

    /// Advance the read cursor past `len` bytes previously returned by
    /// [`Self::get_ptr`].
    pub fn advance(&mut self, len: usize) {
        self.data_offset += len;
    }

    pub fn get_pod<T: PodBytes + Default>(&mut self) -> Result<T> {
        if self.data_offset == self.cur_size {
            self.refill()?;
        }
        self.get_pod_contiguous()
    }

    pub fn get_pod_contiguous<T: PodBytes + Default>(&mut self) -> Result<T> {
        let size = std::mem::size_of::<T>();
        if self.cur_size - self.data_offset < size {
            return Err(Qs2Error::CorruptBlock("POD read crosses block boundary"));
        }
        let mut v = T::default();
        // SAFETY: `v` is a POD of size `size`; we overwrite it byte-for-byte
        // from a validated in-bounds slice of the same length.
        unsafe {
            std::ptr::copy_nonoverlapping(
                self.cur_block[self.data_offset..].as_ptr(),
                (&mut v as *mut T) as *mut u8,
                size,
            );
        }
        self.data_offset += size;
        Ok(v)
    }

    /// Decompress the next framed block directly into `dst[..MAX_BLOCKSIZE]`
    /// (or less, for the final block), returning the number of bytes
    /// produced.
    fn decompress_next_block_into(&mut self, dst: &mut [u8]) -> Result<usize> {
        let (zsize, shuffled) = self.read_block_header()?;
        self.read_zblock_payload(zsize)?;
        let out_len = dst.len().min(MAX_BLOCKSIZE);
        let n = compressor::decompress_shuffle_aware(
            &mut dst[..out_len],
            &self.zblock[..zsize],
            shuffled,
            self.type_size.max(1),
        )?;
        Ok(n)
    }

    /// Refill `cur_block` from the next framed block on the stream.
    fn refill(&mut self) -> Result<()> {
        if self.eof {
            self.cur_size = 0;
            self.data_offset = 0;
            return Ok(());
        }
        let header = self.try_read_block_header()?;
        let Some((zsize, shuffled)) = header else {
            self.eof = true;
            self.cur_size = 0;
            self.data_offset = 0;
            return Ok(());
        };
        self.read_zblock_payload(zsize)?;
        if self.cur_block.len() < MAX_BLOCKSIZE {
            self.cur_block.resize(MAX_BLOCKSIZE, 0);
        }
        let n = compressor::decompress_shuffle_aware(
            &mut self.cur_block[..MAX_BLOCKSIZE],
            &self.zblock[..zsize],
            shuffled,
            self.type_size.max(1),
        )?;
        self.cur_size = n;
        self.data_offset = 0;
        Ok(())
    }

    fn read_block_header(&mut self) -> Result<(usize, bool)> {
        match self.try_read_block_header()? {
            Some(h) => Ok(h),
            None => Err(Qs2Error::TruncatedInput("block size word")),
        }
    }

    /// Reads the 4-byte size word, returning `None` at clean EOF (zero bytes
    /// read) and an error on a short (1-3 byte) read.
    fn try_read_block_header(&mut self) -> Result<Option<(usize, bool)>> {
        let mut word = [0u8; 4];
        let n = self.source.read(&mut word)?;
        if n == 0 {
            return Ok(None);
        }
        if n != 4 {
            return Err(Qs2Error::TruncatedInput("block size word"));
        }
        let raw = u32::from_le_bytes(word);
        let shuffled = raw & SHUFFLE_FLAG != 0;
        let zsize = (raw & SIZE_MASK) as usize;
        Ok(Some((zsize, shuffled)))
    }

    fn read_zblock_payload(&mut self, zsize: usize) -> Result<()> {
        if zsize > compressor::compress_bound(MAX_BLOCKSIZE) {
            return Err(Qs2Error::CorruptBlock("compressed size exceeds bound"));
        }
        if self.zblock.len() < zsize {
            self.zblock.resize(zsize, 0);
        }
        self.source.read_exact(&mut self.zblock[..zsize])?;
        Ok(())
    }

    /// Consume `self` and return the inner source (used by the hash-validated
    /// MT reader construction path and by tests).
    pub fn into_inner(self) -> R {
        self.source
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block_st::BlockWriter;
    use crate::io::{MemReader, MemWriter};
    use crate::options::ShuffleMode;
    use crate::heuristic::ShuffleHeuristic;

    #[test]
    fn write_then_read_pod_sequence() {
        let mut w = BlockWriter::new(MemWriter::new(), 3, ShuffleMode::Off, ShuffleHeuristic::Threshold);
        for i in 0u32..1000 {
            w.push_pod(i).unwrap();
        }
        let (sink, hash) = w.finish().unwrap();
        assert_ne!(hash, 0);

        let mut r = BlockReader::new(MemReader::new(sink.into_inner()));
        for i in 0u32..1000 {
            let v: u32 = r.get_pod().unwrap();
            assert_eq!(v, i);
        }
    }

    #[test]
    fn push_data_across_multiple_blocks() {
        let payload: Vec<u8> = (0..(MAX_BLOCKSIZE * 3 + 123))
            .map(|i| (i % 256) as u8)
            .collect();
        let mut w = BlockWriter::new(MemWriter::new(), 1, ShuffleMode::Off, ShuffleHeuristic::Threshold);
        w.push_data(&payload).unwrap();
        let (sink, _hash) = w.finish().unwrap();

        let mut r = BlockReader::new(MemReader::new(sink.into_inner()));
        let mut out = vec![0u8; payload.len()];
        r.get_data(&mut out).unwrap();
        assert_eq!(out, payload);
    }
}
