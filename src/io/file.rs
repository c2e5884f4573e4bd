//! File-backed byte sink/source.
//!
//! Grounded on the teacher's `io/file_io.rs` (`open_src_file`/`open_dst_file`)
//! but generalized to a plain seekable `std::fs::File` wrapper rather than
//! LZ4-specific path sentinels (`NUL_MARK`/`STDIN_MARK`), which belong to the
//! CLI layer this crate does not build (spec section 1, out of scope).
//!
//! A read at EOF clears any sticky EOF state before a seek, as required by
//! spec section 4.1 — this falls out naturally from using `Seek`/`Read`
//! directly rather than caching an EOF flag.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::error::{Qs2Error, Result};
use crate::io::{ByteSink, ByteSource};

pub struct FileReader {
    file: File,
}

impl FileReader {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| Qs2Error::OpenFailure {
            path: path.display().to_string(),
            source,
        })?;
        Ok(FileReader { file })
    }
}

impl ByteSource for FileReader {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut total = 0;
        while total < buf.len() {
            let n = self.file.read(&mut buf[total..])?;
            if n == 0 {
                break;
            }
            total += n;
        }
        Ok(total)
    }

    fn seek(&mut self, pos: u64) -> Result<()> {
        self.file.seek(SeekFrom::Start(pos))?;
        Ok(())
    }

    fn tell(&mut self) -> Result<u64> {
        Ok(self.file.stream_position()?)
    }
}

pub struct FileWriter {
    file: File,
}

impl FileWriter {
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .map_err(|source| Qs2Error::OpenFailure {
                path: path.display().to_string(),
                source,
            })?;
        Ok(FileWriter { file })
    }
}

impl ByteSink for FileWriter {
    fn write(&mut self, buf: &[u8]) -> Result<()> {
        self.file.write_all(buf)?;
        Ok(())
    }

    fn seek(&mut self, pos: u64) -> Result<()> {
        self.file.seek(SeekFrom::Start(pos))?;
        Ok(())
    }

    fn tell(&mut self) -> Result<u64> {
        Ok(self.file.stream_position()?)
    }

    fn is_valid(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f.bin");

        let mut w = FileWriter::create(&path).unwrap();
        w.write(b"abcdef").unwrap();
        w.seek(2).unwrap();
        w.write(b"XY").unwrap();
        drop(w);

        let mut r = FileReader::open(&path).unwrap();
        let mut buf = [0u8; 6];
        let n = r.read(&mut buf).unwrap();
        assert_eq!(n, 6);
        assert_eq!(&buf, b"abXYef");
    }

    #[test]
    fn open_missing_file_fails() {
        let err = FileReader::open("/nonexistent/path/to/nowhere.bin").unwrap_err();
        assert!(matches!(err, Qs2Error::OpenFailure { .. }));
    }
}
