//! In-memory byte sink/source with a growable, doubling-capacity buffer.
//!
//! `MemWriter` supports `seek`/`tell` for the header-rewrite-at-close pattern
//! (spec section 4.11) and can release ownership of its buffer to the caller
//! (`into_inner`) for C-ABI-style interop, per spec section 4.1.

use crate::error::Result;
use crate::io::{ByteSink, ByteSource};

/// Growable in-memory byte sink.
#[derive(Debug, Default)]
pub struct MemWriter {
    buf: Vec<u8>,
    pos: usize,
}

impl MemWriter {
    pub fn new() -> Self {
        MemWriter {
            buf: Vec::new(),
            pos: 0,
        }
    }

    pub fn with_capacity(cap: usize) -> Self {
        MemWriter {
            buf: Vec::with_capacity(cap),
            pos: 0,
        }
    }

    /// Release the underlying buffer to the caller.
    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }
}

impl ByteSink for MemWriter {
    fn write(&mut self, data: &[u8]) -> Result<()> {
        let end = self.pos + data.len();
        if end > self.buf.len() {
            // Doubling growth, matching the teacher's "growable buffer with
            // doubling capacity" requirement (spec section 4.1).
            let mut new_cap = self.buf.capacity().max(64);
            while new_cap < end {
                new_cap *= 2;
            }
            if new_cap > self.buf.capacity() {
                self.buf.reserve(new_cap - self.buf.len());
            }
            self.buf.resize(end, 0);
        }
        self.buf[self.pos..end].copy_from_slice(data);
        self.pos = end;
        Ok(())
    }

    fn seek(&mut self, pos: u64) -> Result<()> {
        self.pos = pos as usize;
        Ok(())
    }

    fn tell(&mut self) -> Result<u64> {
        Ok(self.pos as u64)
    }

    fn is_valid(&self) -> bool {
        true
    }
}

/// In-memory byte source reading from a borrowed-by-value `Vec<u8>`.
#[derive(Debug)]
pub struct MemReader {
    buf: Vec<u8>,
    pos: usize,
}

impl MemReader {
    pub fn new(buf: Vec<u8>) -> Self {
        MemReader { buf, pos: 0 }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}

impl ByteSource for MemReader {
    fn read(&mut self, dst: &mut [u8]) -> Result<usize> {
        let remaining = self.buf.len() - self.pos;
        let n = remaining.min(dst.len());
        dst[..n].copy_from_slice(&self.buf[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }

    fn seek(&mut self, pos: u64) -> Result<()> {
        self.pos = pos as usize;
        Ok(())
    }

    fn tell(&mut self) -> Result<u64> {
        Ok(self.pos as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_read_roundtrip() {
        let mut w = MemWriter::new();
        w.write(b"hello").unwrap();
        w.write(b" world").unwrap();
        let bytes = w.into_inner();
        assert_eq!(&bytes, b"hello world");

        let mut r = MemReader::new(bytes);
        let mut buf = [0u8; 5];
        r.read(&mut buf).unwrap();
        assert_eq!(&buf, b"hello");
    }

    #[test]
    fn seek_then_overwrite() {
        let mut w = MemWriter::new();
        w.write(&[0u8; 16]).unwrap();
        w.seek(4).unwrap();
        w.write(&[0xFFu8; 4]).unwrap();
        let bytes = w.into_inner();
        assert_eq!(&bytes[4..8], &[0xFF; 4]);
        assert_eq!(bytes.len(), 16);
    }
}
