//! Thin wrapper around `xxhash-rust`'s XXH64, used as the container's rolling
//! trailer digest (spec sections 3.1, 4.5, 4.11).
//!
//! Mirrors the teacher's `src/xxhash.rs`, which wraps XXH32 for LZ4 frame
//! content checksums; this crate needs the wider 64-bit variant instead.

pub use xxhash_rust::xxh64::Xxh64;

/// Streaming trailer-hash state. One instance lives on the writer (or the
/// reader's pre-pass) for the duration of a save/load operation.
#[derive(Debug, Clone)]
pub struct TrailerHasher {
    state: Xxh64,
}

impl TrailerHasher {
    pub fn new() -> Self {
        TrailerHasher {
            state: Xxh64::new(0),
        }
    }

    #[inline]
    pub fn update(&mut self, data: &[u8]) {
        self.state.update(data);
    }

    /// Finalize and return the 64-bit digest. Does not consume `self` so
    /// streaming re-hash passes (spec section 4.11 `read_hash`) can reuse the
    /// same type without an `Option` dance.
    #[inline]
    pub fn digest(&self) -> u64 {
        self.state.digest()
    }
}

impl Default for TrailerHasher {
    fn default() -> Self {
        Self::new()
    }
}

/// One-shot XXH64 over a single buffer — used by tests and by
/// `verify_trailer_hash` for small inputs.
#[inline]
pub fn xxh64_oneshot(data: &[u8], seed: u64) -> u64 {
    xxhash_rust::xxh64::xxh64(data, seed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn streaming_matches_oneshot() {
        let data = b"the quick brown fox jumps over the lazy dog";
        let mut h = TrailerHasher::new();
        h.update(&data[..10]);
        h.update(&data[10..]);
        assert_eq!(h.digest(), xxh64_oneshot(data, 0));
    }
}
