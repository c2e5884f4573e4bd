//! Backend-agnostic block cursor traits.
//!
//! QDATA and QS only need "set the shuffle element size, push/pull typed
//! bytes" — not the particular reader/writer state machine behind it. These
//! traits let `qdata`/`qs` be written once against either the single-worker
//! framer (`block_st`) or the pipelined multi-worker one (`block_mt`),
//! mirroring how the teacher's own frame layer (`io/compress_frame.rs` vs
//! `io/compress_mt.rs`) share a single higher-level caller.

use crate::block_st::PodBytes;
use crate::error::Result;

/// The write side of the block layer.
pub trait BlockSink {
    fn set_type_size(&mut self, type_size: usize);
    fn push_data(&mut self, buf: &[u8]) -> Result<()>;
}

/// The read side of the block layer.
pub trait BlockSource {
    fn set_type_size(&mut self, type_size: usize);
    fn get_data(&mut self, dst: &mut [u8]) -> Result<()>;
}

/// Read one POD value through a [`BlockSource`]. Free function rather than a
/// trait method so the trait stays object-safety-agnostic and simple to
/// implement for new backends.
pub fn get_pod<S: BlockSource + ?Sized, T: PodBytes + Default>(s: &mut S) -> Result<T> {
    let size = std::mem::size_of::<T>();
    let mut buf = vec![0u8; size];
    s.get_data(&mut buf)?;
    let mut v = T::default();
    // SAFETY: `buf` holds exactly `size_of::<T>()` freshly read bytes; `v` is
    // a POD of the same size.
    unsafe {
        std::ptr::copy_nonoverlapping(buf.as_ptr(), (&mut v as *mut T) as *mut u8, size);
    }
    Ok(v)
}

mod st_impls {
    use super::{BlockSink, BlockSource};
    use crate::block_st::{BlockReader, BlockWriter};
    use crate::error::Result;
    use crate::io::{ByteSink, ByteSource};

    impl<W: ByteSink> BlockSink for BlockWriter<W> {
        fn set_type_size(&mut self, type_size: usize) {
            BlockWriter::set_type_size(self, type_size)
        }
        fn push_data(&mut self, buf: &[u8]) -> Result<()> {
            BlockWriter::push_data(self, buf)
        }
    }

    impl<R: ByteSource> BlockSource for BlockReader<R> {
        fn set_type_size(&mut self, type_size: usize) {
            BlockReader::set_type_size(self, type_size)
        }
        fn get_data(&mut self, dst: &mut [u8]) -> Result<()> {
            BlockReader::get_data(self, dst)
        }
    }
}

#[cfg(feature = "multithread")]
mod mt_impls {
    use super::{BlockSink, BlockSource, BufferedBlockReader, RawBlockSource};
    use crate::block_mt::{HashValidatedMtReader, MtBlockWriter, MtStreamReader};
    use crate::error::Result;
    use crate::io::{ByteSink, ByteSource};

    impl<W: ByteSink> BlockSink for MtBlockWriter<W> {
        fn set_type_size(&mut self, type_size: usize) {
            MtBlockWriter::set_type_size(self, type_size)
        }
        fn push_data(&mut self, buf: &[u8]) -> Result<()> {
            MtBlockWriter::push_data(self, buf)
        }
    }

    impl<R: ByteSource> RawBlockSource for MtStreamReader<R> {
        fn next_block(&mut self) -> Result<Option<(Vec<u8>, bool)>> {
            MtStreamReader::get_new_block(self)
        }
    }

    impl RawBlockSource for HashValidatedMtReader {
        fn next_block(&mut self) -> Result<Option<(Vec<u8>, bool)>> {
            HashValidatedMtReader::get_new_block(self)
        }
    }

    /// Type alias documenting the two MT-backed [`BlockSource`] flavors built
    /// from [`BufferedBlockReader`].
    pub type StreamingBlockSource<R> = BufferedBlockReader<MtStreamReader<R>>;
    pub type HashValidatedBlockSource = BufferedBlockReader<HashValidatedMtReader>;
}

#[cfg(feature = "multithread")]
pub use mt_impls::{HashValidatedBlockSource, StreamingBlockSource};

/// A source of whole decompressed blocks, each tagged with whether it was
/// shuffled when written. Implemented by the pipelined MT readers
/// (`block_mt::MtStreamReader`, `block_mt::HashValidatedMtReader`), which
/// decompress ahead of consumption but cannot know the correct shuffle
/// element size at decompression time — see [`BufferedBlockReader`].
#[cfg(feature = "multithread")]
pub trait RawBlockSource {
    fn next_block(&mut self) -> Result<Option<(Vec<u8>, bool)>>;
}

/// Adapts a [`RawBlockSource`] into a [`BlockSource`], replicating
/// `block_st::BlockReader`'s own cursor state machine (`cur`/`offset`)
/// but pulling whole blocks from `S` instead of decompressing them itself.
///
/// Unshuffle is applied here, at refill time, using whatever `type_size` is
/// current *then* — not whatever it was when the block was speculatively
/// decompressed on a worker thread. This is what makes shuffle-aware MT
/// reading safe under read-ahead: decompression (expensive, parallel) and
/// unshuffle (cheap, context-sensitive) are split across the worker/consumer
/// boundary instead of both happening inside the worker task.
#[cfg(feature = "multithread")]
pub struct BufferedBlockReader<S: RawBlockSource> {
    source: S,
    cur: Vec<u8>,
    offset: usize,
    type_size: usize,
}

#[cfg(feature = "multithread")]
impl<S: RawBlockSource> BufferedBlockReader<S> {
    pub fn new(source: S) -> Self {
        BufferedBlockReader {
            source,
            cur: Vec::new(),
            offset: 0,
            type_size: 1,
        }
    }

    pub fn into_inner(self) -> S {
        self.source
    }

    fn refill(&mut self) -> Result<bool> {
        match self.source.next_block()? {
            Some((raw, shuffled)) => {
                if shuffled && crate::shuffle::is_supported_type_size(self.type_size) {
                    let mut out = vec![0u8; raw.len()];
                    crate::shuffle::unshuffle(&mut out, &raw, self.type_size);
                    self.cur = out;
                } else {
                    self.cur = raw;
                }
                self.offset = 0;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(feature = "multithread")]
impl<S: RawBlockSource> BlockSource for BufferedBlockReader<S> {
    fn set_type_size(&mut self, type_size: usize) {
        self.type_size = type_size;
    }

    fn get_data(&mut self, dst: &mut [u8]) -> Result<()> {
        let mut filled = 0;
        while filled < dst.len() {
            if self.offset >= self.cur.len() {
                if !self.refill()? {
                    return Err(crate::error::Qs2Error::TruncatedInput(
                        "unexpected end of block stream",
                    ));
                }
                continue;
            }
            let take = (self.cur.len() - self.offset).min(dst.len() - filled);
            dst[filled..filled + take].copy_from_slice(&self.cur[self.offset..self.offset + take]);
            self.offset += take;
            filled += take;
        }
        Ok(())
    }
}

#[cfg(all(test, feature = "multithread"))]
mod mt_tests {
    use super::*;
    use crate::block_mt::{HashValidatedMtReader, MtBlockWriter, MtStreamReader};
    use crate::heuristic::ShuffleHeuristic;
    use crate::io::{MemReader, MemWriter};
    use crate::options::ShuffleMode;

    /// A worklist whose `type_size` changes between writes survives going
    /// through the pipelined writer/reader pair at different worker counts
    /// (spec section 8, testable property 4: hash determinism across worker
    /// counts), exercising the exact race this module's unshuffle-on-consume
    /// split is meant to avoid.
    #[test]
    fn shuffled_mixed_type_size_roundtrip_streaming() {
        let numeric: Vec<u8> = (0u64..2048).flat_map(|i| i.to_le_bytes()).collect();
        let integers: Vec<u8> = (0u32..4096).flat_map(|i| i.to_le_bytes()).collect();

        let mut w = MtBlockWriter::new(MemWriter::new(), 4, 3, ShuffleMode::On, ShuffleHeuristic::Threshold)
            .unwrap();
        w.set_type_size(8);
        w.push_data(&numeric).unwrap();
        w.set_type_size(4);
        w.push_data(&integers).unwrap();
        let (sink, hash) = w.finish().unwrap();
        assert_ne!(hash, 0);

        let source = MtStreamReader::new(MemReader::new(sink.into_inner()), 4).unwrap();
        let mut r = BufferedBlockReader::new(source);
        r.set_type_size(8);
        let mut out_numeric = vec![0u8; numeric.len()];
        r.get_data(&mut out_numeric).unwrap();
        r.set_type_size(4);
        let mut out_integers = vec![0u8; integers.len()];
        r.get_data(&mut out_integers).unwrap();

        assert_eq!(out_numeric, numeric);
        assert_eq!(out_integers, integers);
    }

    #[test]
    fn shuffled_mixed_type_size_roundtrip_hash_validated() {
        let numeric: Vec<u8> = (0u64..2048).flat_map(|i| i.to_le_bytes()).collect();
        let integers: Vec<u8> = (0u32..4096).flat_map(|i| i.to_le_bytes()).collect();

        let mut w = MtBlockWriter::new(MemWriter::new(), 2, 3, ShuffleMode::On, ShuffleHeuristic::Threshold)
            .unwrap();
        w.set_type_size(8);
        w.push_data(&numeric).unwrap();
        w.set_type_size(4);
        w.push_data(&integers).unwrap();
        let (sink, hash) = w.finish().unwrap();

        let source = HashValidatedMtReader::new(MemReader::new(sink.into_inner()), hash, 2).unwrap();
        let mut r = BufferedBlockReader::new(source);
        r.set_type_size(8);
        let mut out_numeric = vec![0u8; numeric.len()];
        r.get_data(&mut out_numeric).unwrap();
        r.set_type_size(4);
        let mut out_integers = vec![0u8; integers.len()];
        r.get_data(&mut out_integers).unwrap();

        assert_eq!(out_numeric, numeric);
        assert_eq!(out_integers, integers);
    }
}
