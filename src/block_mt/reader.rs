//! Pipelined multi-worker block reader, in its two modes (spec section 4.8):
//! streaming (read-ahead with backpressure) and hash-validated (read the
//! whole body up front, verify the trailer hash, then permit pulls).

use std::collections::BTreeMap;
use std::sync::{Arc, Condvar, Mutex};

use crate::compressor::{self, SHUFFLE_FLAG, SIZE_MASK};
use crate::error::{Qs2Error, Result};
use crate::hasher::TrailerHasher;
use crate::header::MAX_BLOCKSIZE;
use crate::io::ByteSource;

struct StreamShared {
    ready: Mutex<BTreeMap<u64, (Vec<u8>, bool)>>,
    ready_cv: Condvar,
    cancelled: Mutex<Option<&'static str>>,
}

/// Streaming-mode pipelined reader. A single "source node" (the calling
/// thread, inside [`Self::prefetch`]) reads framed blocks sequentially and
/// assigns each an ascending `seqno`; decompression of already-read blocks
/// happens on the worker pool while the main thread continues pulling
/// in-order results via [`Self::get_new_block`].
///
/// Decompression workers never apply the shuffle-inverse step: they only
/// inflate bytes and tag the result with the block's shuffle flag. Unshuffle
/// is applied by the consumer (see `framing::BufferedBlockReader`) using
/// whatever element size is current *at the moment a block is actually
/// consumed*, not whatever it happened to be when that block was
/// speculatively decompressed — prefetch runs ahead of the caller's
/// `set_type_size` calls, so baking the shuffle element size into a worker
/// task would race against worklist boundaries the consumer hasn't reached
/// yet.
pub struct MtStreamReader<R: ByteSource> {
    source: R,
    pool: rayon::ThreadPool,
    shared: Arc<StreamShared>,
    next_to_submit: u64,
    next_to_consume: u64,
    prefetch_window: usize,
    end_of_file: bool,
}

impl<R: ByteSource> MtStreamReader<R> {
    pub fn new(source: R, n_threads: usize) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(n_threads)
            .build()
            .map_err(|_| Qs2Error::InvalidArgument("failed to build worker pool"))?;
        Ok(MtStreamReader {
            source,
            pool,
            shared: Arc::new(StreamShared {
                ready: Mutex::new(BTreeMap::new()),
                ready_cv: Condvar::new(),
                cancelled: Mutex::new(None),
            }),
            next_to_submit: 0,
            next_to_consume: 0,
            prefetch_window: n_threads.max(1),
            end_of_file: false,
        })
    }

    /// Read and dispatch up to `prefetch_window` blocks ahead of what the
    /// caller has consumed so far.
    fn prefetch(&mut self) -> Result<()> {
        while !self.end_of_file
            && self.next_to_submit < self.next_to_consume + self.prefetch_window as u64
        {
            let mut word = [0u8; 4];
            let n = self.source.read(&mut word)?;
            if n == 0 {
                self.end_of_file = true;
                break;
            }
            if n != 4 {
                return Err(Qs2Error::TruncatedInput("block size word"));
            }
            let raw = u32::from_le_bytes(word);
            let shuffled = raw & SHUFFLE_FLAG != 0;
            let zsize = (raw & SIZE_MASK) as usize;
            if zsize > compressor::compress_bound(MAX_BLOCKSIZE) {
                return Err(Qs2Error::CorruptBlock("compressed size exceeds bound"));
            }
            let mut zbuf = vec![0u8; zsize];
            self.source.read_exact(&mut zbuf)?;

            let seqno = self.next_to_submit;
            self.next_to_submit += 1;
            let shared = Arc::clone(&self.shared);
            self.pool.spawn(move || {
                let mut out = vec![0u8; MAX_BLOCKSIZE];
                match compressor::decompress_plain(&mut out, &zbuf) {
                    Ok(n) => {
                        out.truncate(n);
                        shared.ready.lock().unwrap().insert(seqno, (out, shuffled));
                    }
                    Err(_) => {
                        *shared.cancelled.lock().unwrap() = Some("decompression failed");
                    }
                }
                shared.ready_cv.notify_all();
            });
        }
        Ok(())
    }

    /// Pull the next in-order decompressed block, or `None` at true EOF.
    ///
    /// If the main thread outruns the decompressor pool, it waits on the
    /// same condvar the workers notify ("moonlighting" in spec terms — the
    /// work itself is still performed by the pool; blocking here is what
    /// stands in for the original's ability to run a decompressor task
    /// inline).
    pub fn get_new_block(&mut self) -> Result<Option<(Vec<u8>, bool)>> {
        loop {
            self.prefetch()?;
            self.check_cancelled()?;

            {
                let mut ready = self.shared.ready.lock().unwrap();
                if let Some(block) = ready.remove(&self.next_to_consume) {
                    self.next_to_consume += 1;
                    return Ok(Some(block));
                }
            }

            if self.end_of_file && self.next_to_consume >= self.next_to_submit {
                return Ok(None);
            }

            let ready = self.shared.ready.lock().unwrap();
            if !ready.contains_key(&self.next_to_consume) {
                let _unused = self.shared.ready_cv.wait(ready).unwrap();
            }
        }
    }

    fn check_cancelled(&self) -> Result<()> {
        if let Some(msg) = *self.shared.cancelled.lock().unwrap() {
            return Err(Qs2Error::CorruptBlock(msg));
        }
        Ok(())
    }

    /// Cancel outstanding work; idempotent.
    pub fn cleanup(&mut self) {
        *self.shared.cancelled.lock().unwrap() = Some("cancelled by cleanup()");
        self.shared.ready.lock().unwrap().clear();
    }
}

/// Hash-validated pipelined reader (spec section 4.8). The constructor makes
/// a single sequential pass reading every framed block, feeding the size
/// word and payload to the hasher and dispatching each payload as an
/// independent decompression task; only after every task completes and the
/// digest matches the stored header hash does it return, ready to serve
/// pulls via [`Self::get_new_block`].
pub struct HashValidatedMtReader {
    blocks: Mutex<Vec<Option<(Vec<u8>, bool)>>>,
    next_to_consume: usize,
}

impl HashValidatedMtReader {
    pub fn new<R: ByteSource>(mut source: R, stored_hash: u64, n_threads: usize) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(n_threads)
            .build()
            .map_err(|_| Qs2Error::InvalidArgument("failed to build worker pool"))?;

        let mut hasher = TrailerHasher::new();
        let mut raw_blocks: Vec<(Vec<u8>, bool)> = Vec::new();

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
            let shuffled = raw & SHUFFLE_FLAG != 0;
            let zsize = (raw & SIZE_MASK) as usize;
            if zsize > compressor::compress_bound(MAX_BLOCKSIZE) {
                return Err(Qs2Error::CorruptBlock("compressed size exceeds bound"));
            }
            let mut zbuf = vec![0u8; zsize];
            source.read_exact(&mut zbuf)?;

            hasher.update(&word);
            hasher.update(&zbuf);
            raw_blocks.push((zbuf, shuffled));
        }

        let computed = hasher.digest();
        if stored_hash == 0 {
            return Err(Qs2Error::HashMissing);
        }
        if computed != stored_hash {
            return Err(Qs2Error::HashMismatch {
                expected: stored_hash,
                computed,
            });
        }

        let results: Mutex<Vec<Option<(Vec<u8>, bool)>>> =
            Mutex::new((0..raw_blocks.len()).map(|_| None).collect());
        let cancelled: Mutex<Option<&'static str>> = Mutex::new(None);

        pool.scope(|scope| {
            for (idx, (zbuf, shuffled)) in raw_blocks.into_iter().enumerate() {
                let results = &results;
                let cancelled = &cancelled;
                scope.spawn(move |_| {
                    let mut out = vec![0u8; MAX_BLOCKSIZE];
                    match compressor::decompress_plain(&mut out, &zbuf) {
                        Ok(n) => {
                            out.truncate(n);
                            results.lock().unwrap()[idx] = Some((out, shuffled));
                        }
                        Err(_) => {
                            *cancelled.lock().unwrap() = Some("decompression failed");
                        }
                    }
                });
            }
        });

        if let Some(msg) = *cancelled.lock().unwrap() {
            return Err(Qs2Error::CorruptBlock(msg));
        }

        Ok(HashValidatedMtReader {
            blocks: results,
            next_to_consume: 0,
        })
    }

    /// Pull the next decompressed block in order, freeing it from internal
    /// storage immediately to cap peak memory (spec section 4.8).
    pub fn get_new_block(&mut self) -> Result<Option<(Vec<u8>, bool)>> {
        let mut blocks = self.blocks.lock().unwrap();
        if self.next_to_consume >= blocks.len() {
            return Ok(None);
        }
        let block = blocks[self.next_to_consume]
            .take()
            .expect("block decompressed during construction");
        self.next_to_consume += 1;
        Ok(Some(block))
    }
}
