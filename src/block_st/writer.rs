use crate::compressor::{self, SHUFFLE_FLAG, SIZE_MASK};
use crate::error::Result;
use crate::hasher::TrailerHasher;
use crate::header::{MAX_BLOCKSIZE, MIN_BLOCKSIZE};
use crate::heuristic::ShuffleHeuristic;
use crate::io::ByteSink;
use crate::options::ShuffleMode;

/// Single-worker block writer (spec section 4.5).
///
/// State: `cur_block`, `cur_size`, a scratch compressed-block buffer, and a
/// [`TrailerHasher`] digesting everything that lands on disk (the 4-byte size
/// word plus the compressed payload of every block), so the reader can
/// re-hash the tail of the file without decompressing (spec section 4.5).
pub struct BlockWriter<W: ByteSink> {
    sink: W,
    cur_block: Vec<u8>,
    cur_size: usize,
    zblock: Vec<u8>,
    hasher: TrailerHasher,
    compress_level: i32,
    shuffle: ShuffleMode,
    shuffle_heuristic: ShuffleHeuristic,
    /// Element size (bytes) of whatever POD type is currently being pushed;
    /// drives the shuffle filter's transpose width. QDATA's serializer sets
    /// this before replaying each typed worklist (spec section 4.9); QS's
    /// opaque byte tunnel leaves it at the default of 1, which effectively
    /// disables shuffling for that block (spec section 6's `{4, 8}`
    /// constraint on valid shuffle element sizes).
    type_size: usize,
}

impl<W: ByteSink> BlockWriter<W> {
    pub fn new(sink: W, compress_level: i32, shuffle: ShuffleMode, heuristic: ShuffleHeuristic) -> Self {
        BlockWriter {
            sink,
            cur_block: Vec::with_capacity(MAX_BLOCKSIZE),
            cur_size: 0,
            zblock: vec![0u8; compressor::compress_bound(MAX_BLOCKSIZE)],
            hasher: TrailerHasher::new(),
            compress_level,
            shuffle,
            shuffle_heuristic: heuristic,
            type_size: 1,
        }
    }

    /// Set the element size used by the shuffle filter for subsequent pushes.
    /// Must be `1`, `4`, or `8`; `1` disables shuffling for this data.
    pub fn set_type_size(&mut self, type_size: usize) {
        self.type_size = type_size;
    }

    /// Append `len` bytes from `buf`. Zero-copy fast path: when the current
    /// block is empty and the caller has at least one full `MAX_BLOCKSIZE`
    /// slice, compress directly from `buf` without staging through
    /// `cur_block` (spec section 4.5).
    pub fn push_data(&mut self, buf: &[u8]) -> Result<()> {
        let mut remaining = buf;
        if self.cur_size == 0 {
            while remaining.len() >= MAX_BLOCKSIZE {
                let (chunk, rest) = remaining.split_at(MAX_BLOCKSIZE);
                self.compress_and_write(chunk)?;
                remaining = rest;
            }
        }
        self.accumulate(remaining)
    }

    fn accumulate(&mut self, mut data: &[u8]) -> Result<()> {
        while !data.is_empty() {
            let space = MAX_BLOCKSIZE - self.cur_size;
            let n = space.min(data.len());
            self.cur_block.extend_from_slice(&data[..n]);
            self.cur_size += n;
            data = &data[n..];
            if self.cur_size == MAX_BLOCKSIZE {
                self.flush()?;
            }
        }
        Ok(())
    }

    /// Append a POD value, flushing first if the current block is full
    /// enough that `T` might straddle the boundary (spec section 4.5:
    /// "Guarantees that `T` never straddles a block boundary").
    pub fn push_pod<T: PodBytes>(&mut self, v: T) -> Result<()> {
        if self.cur_size > MIN_BLOCKSIZE {
            self.flush()?;
        }
        self.push_pod_contiguous(v)
    }

    /// Append a POD value without the flush check; the caller must have
    /// already verified there's room (spec section 4.5).
    pub fn push_pod_contiguous<T: PodBytes>(&mut self, v: T) -> Result<()> {
        self.accumulate(v.as_bytes())
    }

    /// Flush the current block, if non-empty: compress, write the 4-byte
    /// `zsize` word then the compressed payload, and feed both to the
    /// hasher.
    pub fn flush(&mut self) -> Result<()> {
        if self.cur_size == 0 {
            return Ok(());
        }
        let block = std::mem::take(&mut self.cur_block);
        let size = self.cur_size;
        self.cur_size = 0;
        self.compress_and_write(&block[..size])?;
        self.cur_block = block;
        self.cur_block.clear();
        Ok(())
    }

    fn compress_and_write(&mut self, block: &[u8]) -> Result<()> {
        if self.zblock.len() < compressor::compress_bound(block.len()) {
            self.zblock
                .resize(compressor::compress_bound(block.len()), 0);
        }
        let (zsize, shuffled) = match self.shuffle {
            ShuffleMode::Off => (
                compressor::compress_plain(&mut self.zblock, block, self.compress_level),
                false,
            ),
            ShuffleMode::On if crate::shuffle::is_supported_type_size(self.type_size) => {
                // Force-shuffle: bypass the heuristic entirely.
                let mut shuffled_buf = vec![0u8; block.len()];
                crate::shuffle::shuffle(&mut shuffled_buf, block, self.type_size);
                let n = compressor::compress_plain(
                    &mut self.zblock,
                    &shuffled_buf,
                    self.compress_level,
                );
                (n, n != 0)
            }
            ShuffleMode::Auto if crate::shuffle::is_supported_type_size(self.type_size) => {
                compressor::compress_shuffle_adaptive(
                    &mut self.zblock,
                    block,
                    self.compress_level,
                    self.type_size,
                    self.shuffle_heuristic,
                )
            }
            _ => (
                compressor::compress_plain(&mut self.zblock, block, self.compress_level),
                false,
            ),
        };

        if zsize == 0 && !block.is_empty() {
            return Err(crate::error::Qs2Error::CorruptBlock(
                "compression failed",
            ));
        }

        let mut size_word = zsize as u32 & SIZE_MASK;
        if shuffled {
            size_word |= SHUFFLE_FLAG;
        }
        let size_word_bytes = size_word.to_le_bytes();
        self.sink.write(&size_word_bytes)?;
        self.sink.write(&self.zblock[..zsize])?;
        self.hasher.update(&size_word_bytes);
        self.hasher.update(&self.zblock[..zsize]);
        Ok(())
    }

    /// Flush any remaining data and return the finalized trailer digest.
    pub fn finish(mut self) -> Result<(W, u64)> {
        self.flush()?;
        Ok((self.sink, self.hasher.digest()))
    }
}

/// A fixed-size value whose raw little-endian byte representation can be
/// pushed verbatim (spec section 4.5's "POD").
pub trait PodBytes: Copy {
    fn as_bytes(&self) -> &[u8];
}

macro_rules! impl_pod_bytes {
    ($t:ty) => {
        impl PodBytes for $t {
            fn as_bytes(&self) -> &[u8] {
                // SAFETY: integer primitives have no padding and a
                // well-defined byte layout on all supported targets.
                unsafe {
                    std::slice::from_raw_parts(
                        (self as *const $t) as *const u8,
                        std::mem::size_of::<$t>(),
                    )
                }
            }
        }
    };
}

impl_pod_bytes!(u8);
impl_pod_bytes!(u16);
impl_pod_bytes!(u32);
impl_pod_bytes!(u64);
impl_pod_bytes!(i32);
impl_pod_bytes!(f64);
