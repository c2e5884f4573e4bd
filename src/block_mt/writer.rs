//! Pipelined multi-worker block writer (spec section 4.7).
//!
//! Node mapping onto the teacher's and the original's primitives:
//!
//! - **Compressor node** (unlimited parallelism) -> a `rayon::ThreadPool`
//!   sized to `n_threads`, each spawned task pulling a thread-local
//!   compressor via `zstd`'s stateless bulk API (no context to share, unlike
//!   the teacher's `enumerable_thread_specific<compressor>`).
//! - **Sequencer node** -> `pending: Arc<Mutex<BTreeMap<u64, PendingBlock>>>`,
//!   directly modeled on the teacher's `WriteRegister` in `io/compress_mt.rs`
//!   (itself a from-scratch Rust replacement for the original's TBB
//!   `sequencer_node` / C `WriteRegister` qsort-array).
//! - **Writer node** (serial) -> `drain_ready` below, called after every
//!   completed task and once more at `finish()`; it is the only code that
//!   touches `sink`/`hasher`, preserving "the hasher is single-threaded and
//!   lives on the writer node" (spec section 4.7).

use std::collections::BTreeMap;
use std::sync::{Arc, Condvar, Mutex};

use crate::compressor::{self, SHUFFLE_FLAG, SIZE_MASK};
use crate::error::{Qs2Error, Result};
use crate::hasher::TrailerHasher;
use crate::header::{MAX_BLOCKSIZE, MIN_BLOCKSIZE};
use crate::heuristic::ShuffleHeuristic;
use crate::io::ByteSink;
use crate::options::ShuffleMode;

use super::pool::BufferPool;

struct PendingBlock {
    zbuf: Vec<u8>,
    zsize: usize,
    shuffled: bool,
}

/// Shared state between the calling thread and spawned compressor tasks.
struct Shared {
    pending: Mutex<BTreeMap<u64, PendingBlock>>,
    /// Number of dispatched-but-not-yet-sequenced tasks, plus a condvar so
    /// `finish()` can block until the graph drains (spec section 5,
    /// "writer's finish() waits for graph drain").
    inflight: Mutex<u64>,
    inflight_cv: Condvar,
    /// Set when any worker observes a compression failure; `finish()` and
    /// `cleanup()` both check this (spec section 5 cancellation).
    cancelled: Mutex<Option<&'static str>>,
}

pub struct MtBlockWriter<W: ByteSink> {
    sink: W,
    pool: rayon::ThreadPool,
    zblock_pool: BufferPool,
    compress_level: i32,
    shuffle: ShuffleMode,
    shuffle_heuristic: ShuffleHeuristic,
    type_size: usize,
    cur_block: Vec<u8>,
    cur_size: usize,
    next_seqno: u64,
    write_seqno: u64,
    shared: Arc<Shared>,
    hasher: TrailerHasher,
}

impl<W: ByteSink> MtBlockWriter<W> {
    pub fn new(
        sink: W,
        n_threads: usize,
        compress_level: i32,
        shuffle: ShuffleMode,
        heuristic: ShuffleHeuristic,
    ) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(n_threads)
            .build()
            .map_err(|_| Qs2Error::InvalidArgument("failed to build worker pool"))?;
        Ok(MtBlockWriter {
            sink,
            pool,
            zblock_pool: BufferPool::new(),
            compress_level,
            shuffle,
            shuffle_heuristic: heuristic,
            type_size: 1,
            cur_block: Vec::with_capacity(MAX_BLOCKSIZE),
            cur_size: 0,
            next_seqno: 0,
            write_seqno: 0,
            shared: Arc::new(Shared {
                pending: Mutex::new(BTreeMap::new()),
                inflight: Mutex::new(0),
                inflight_cv: Condvar::new(),
                cancelled: Mutex::new(None),
            }),
            hasher: TrailerHasher::new(),
        })
    }

    pub fn set_type_size(&mut self, type_size: usize) {
        self.type_size = type_size;
    }

    pub fn push_data(&mut self, buf: &[u8]) -> Result<()> {
        let mut remaining = buf;
        if self.cur_size == 0 {
            while remaining.len() >= MAX_BLOCKSIZE {
                let (chunk, rest) = remaining.split_at(MAX_BLOCKSIZE);
                self.dispatch(chunk.to_vec())?;
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

    pub fn push_pod<T: crate::block_st::PodBytes>(&mut self, v: T) -> Result<()> {
        if self.cur_size > MIN_BLOCKSIZE {
            self.flush()?;
        }
        self.accumulate(v.as_bytes())
    }

    /// Flush the current in-progress block as the trailing partial block,
    /// dispatching it with the current `seqno` (spec section 4.7, `flush()`).
    pub fn flush(&mut self) -> Result<()> {
        if self.cur_size == 0 {
            return Ok(());
        }
        let block = std::mem::replace(&mut self.cur_block, Vec::with_capacity(MAX_BLOCKSIZE));
        let size = self.cur_size;
        self.cur_size = 0;
        let mut block = block;
        block.truncate(size);
        self.dispatch(block)
    }

    fn dispatch(&mut self, block: Vec<u8>) -> Result<()> {
        self.check_cancelled()?;
        let seqno = self.next_seqno;
        self.next_seqno += 1;

        {
            let mut inflight = self.shared.inflight.lock().unwrap();
            *inflight += 1;
        }

        let shared = Arc::clone(&self.shared);
        let zblock_pool = self.zblock_pool.clone();
        let level = self.compress_level;
        let shuffle = self.shuffle;
        let heuristic = self.shuffle_heuristic;
        let type_size = self.type_size;

        self.pool.spawn(move || {
            let bound = compressor::compress_bound(block.len());
            let mut zbuf = zblock_pool.acquire(bound);

            let (zsize, shuffled) = match shuffle {
                ShuffleMode::Off => (
                    compressor::compress_plain(&mut zbuf, &block, level),
                    false,
                ),
                ShuffleMode::On if crate::shuffle::is_supported_type_size(type_size) => {
                    let mut shuffled_buf = vec![0u8; block.len()];
                    crate::shuffle::shuffle(&mut shuffled_buf, &block, type_size);
                    let n = compressor::compress_plain(&mut zbuf, &shuffled_buf, level);
                    (n, n != 0)
                }
                ShuffleMode::Auto if crate::shuffle::is_supported_type_size(type_size) => {
                    compressor::compress_shuffle_adaptive(&mut zbuf, &block, level, type_size, heuristic)
                }
                _ => (
                    compressor::compress_plain(&mut zbuf, &block, level),
                    false,
                ),
            };

            if zsize == 0 && !block.is_empty() {
                *shared.cancelled.lock().unwrap() = Some("compression failed");
            } else {
                let mut pending = shared.pending.lock().unwrap();
                pending.insert(seqno, PendingBlock { zbuf, zsize, shuffled });
            }

            let mut inflight = shared.inflight.lock().unwrap();
            *inflight -= 1;
            shared.inflight_cv.notify_all();
        });

        // Opportunistically drain whatever is already in order; keeps
        // `pending`'s memory bounded instead of growing for the whole file.
        self.drain_ready()?;
        Ok(())
    }

    /// Write every block in `pending` whose `seqno` is next in line, in
    /// order, until a gap is hit.
    fn drain_ready(&mut self) -> Result<()> {
        loop {
            let next = {
                let mut pending = self.shared.pending.lock().unwrap();
                if pending.contains_key(&self.write_seqno) {
                    pending.remove(&self.write_seqno)
                } else {
                    None
                }
            };
            let Some(block) = next else { break };
            self.write_seqno += 1;

            let mut size_word = block.zsize as u32 & SIZE_MASK;
            if block.shuffled {
                size_word |= SHUFFLE_FLAG;
            }
            let size_word_bytes = size_word.to_le_bytes();
            self.sink.write(&size_word_bytes)?;
            self.sink.write(&block.zbuf[..block.zsize])?;
            self.hasher.update(&size_word_bytes);
            self.hasher.update(&block.zbuf[..block.zsize]);
            self.zblock_pool.release(block.zbuf);
        }
        Ok(())
    }

    fn check_cancelled(&self) -> Result<()> {
        if let Some(msg) = *self.shared.cancelled.lock().unwrap() {
            return Err(Qs2Error::CorruptBlock(msg));
        }
        Ok(())
    }

    fn wait_for_drain(&self) {
        let inflight = self.shared.inflight.lock().unwrap();
        let _guard = self
            .shared
            .inflight_cv
            .wait_while(inflight, |n| *n > 0)
            .unwrap();
    }

    /// Flush the trailing block, wait for the worker graph to drain, write
    /// every remaining in-order block, and return the finalized trailer
    /// digest (spec section 4.7, `finish()`).
    pub fn finish(mut self) -> Result<(W, u64)> {
        self.flush()?;
        self.wait_for_drain();
        self.check_cancelled()?;
        self.drain_ready()?;
        debug_assert_eq!(self.write_seqno, self.next_seqno);
        Ok((self.sink, self.hasher.digest()))
    }

    /// Cancel the worker graph and wait for it to drain, discarding any
    /// pending output. Idempotent; must be called on every error path before
    /// discarding the writer (spec section 4.7/5).
    pub fn cleanup(&mut self) {
        *self.shared.cancelled.lock().unwrap() = Some("cancelled by cleanup()");
        self.wait_for_drain();
        self.shared.pending.lock().unwrap().clear();
    }
}
