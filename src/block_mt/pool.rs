//! Recyclable buffer pools for the pipelined multi-worker writer/reader
//! (spec section 4.7): "two lock-free unbounded queues of recyclable
//! buffers, one for raw blocks, one for compressed blocks."
//!
//! Grounded on the teacher's `threadpool.rs`, which backs `TPool`'s
//! bounded-submission semaphore with a `crossbeam_channel`; here the same
//! crate's unbounded channel doubles as the lock-free MPMC buffer pool spec
//! section 5 calls for ("the block-pool queue is the sole contention point
//! between workers... implemented with a lock-free MPMC structure").

use crossbeam_channel::{Receiver, Sender};

/// A pool of reusable `Vec<u8>` buffers. `acquire` pops a recycled buffer
/// (allocating fresh if the pool is empty) and `release` returns one for
/// reuse — this is the "allocation performed when pool is empty" / "pushed
/// back to the pool when no longer in use" lifecycle from spec section 4.7.
pub struct BufferPool {
    tx: Sender<Vec<u8>>,
    rx: Receiver<Vec<u8>>,
}

impl BufferPool {
    pub fn new() -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        BufferPool { tx, rx }
    }

    /// Acquire a buffer with at least `min_capacity` bytes of backing
    /// storage, resized to exactly `len`.
    pub fn acquire(&self, len: usize) -> Vec<u8> {
        match self.rx.try_recv() {
            Ok(mut buf) => {
                buf.clear();
                buf.resize(len, 0);
                buf
            }
            Err(_) => vec![0u8; len],
        }
    }

    pub fn release(&self, buf: Vec<u8>) {
        // A full channel can never happen (unbounded); ignore disconnects,
        // which only occur if every pool handle (including this one) was
        // already dropped.
        let _ = self.tx.send(buf);
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for BufferPool {
    fn clone(&self) -> Self {
        BufferPool {
            tx: self.tx.clone(),
            rx: self.rx.clone(),
        }
    }
}
