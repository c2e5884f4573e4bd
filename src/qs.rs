//! QS: the transparent wrapper around the host's opaque serialization byte
//! stream (spec section 1, section 9 "opaque byte-stream adapter").
//!
//! Grounded on `qs_serializer.h`/`qs_deserializer.h`'s `OutBytes`/`InBytes`
//! R-connection shim, generalized per spec section 9's contract: "given a
//! writer/reader with `push_data`/`get_data`, provide byte-level entry
//! points; no QS logic examines the bytes." This module never inspects
//! `bytes`'s contents beyond passing it through the block framer.

use crate::block_st::{BlockReader, BlockWriter};
use crate::error::Result;
use crate::framing::{BlockSink, BlockSource};
use crate::io::{ByteSink, ByteSource};
use crate::options::Options;

/// Tunnel an already-serialized opaque byte stream through the block framer,
/// returning the finalized trailer digest. Generic over the backend
/// ([`BlockSink`]) so the same call works against the single-worker and
/// pipelined multi-worker framers (spec section 8, testable property 4: hash
/// determinism across worker counts).
pub fn save_qs<S: BlockSink>(writer: &mut S, bytes: &[u8]) -> Result<()> {
    writer.push_data(bytes)
}

/// Read `len` opaque bytes back out of the block framer.
pub fn load_qs<S: BlockSource>(reader: &mut S, len: usize) -> Result<Vec<u8>> {
    let mut out = vec![0u8; len];
    reader.get_data(&mut out)?;
    Ok(out)
}

/// Build a `BlockWriter` configured from `options`, for callers that need the
/// ST path directly (MT path is wired up in `api.rs`).
pub fn new_block_writer<W: ByteSink>(sink: W, options: &Options) -> BlockWriter<W> {
    BlockWriter::new(
        sink,
        options.compress_level,
        options.shuffle,
        options.shuffle_heuristic,
    )
}

pub fn new_block_reader<R: ByteSource>(source: R) -> BlockReader<R> {
    BlockReader::new(source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::{MemReader, MemWriter};
    use crate::options::Options;

    #[test]
    fn opaque_bytes_roundtrip_s2_style() {
        // An "empty list" in the host's opaque encoding is just some fixed
        // marker bytes to this layer; QS never interprets them.
        let opaque = b"\x00\x00\x00\x13empty-list-marker".to_vec();
        let options = Options::default();
        let mut w = new_block_writer(MemWriter::new(), &options);
        save_qs(&mut w, &opaque).unwrap();
        let (sink, hash) = w.finish().unwrap();
        assert_ne!(hash, 0);

        let mut r = new_block_reader(MemReader::new(sink.into_inner()));
        let out = load_qs(&mut r, opaque.len()).unwrap();
        assert_eq!(out, opaque);
    }
}
