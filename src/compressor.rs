//! Compressor wrappers (spec section 4.3): plain and shuffle-adaptive
//! compress/decompress, all signaling failure through a `0` size sentinel
//! rather than an error type, so the framing layer (BLOCK_ST/BLOCK_MT) can
//! raise a contextual [`Qs2Error`].
//!
//! The underlying algorithm is treated as the opaque
//! `compress(dst,src,level) -> size` / `decompress(dst,src) -> size`
//! collaborator named in spec section 1, bound here to the `zstd` crate's
//! bulk API — the same "reuse the library, don't reimplement it" approach
//! the teacher takes with its own hand-ported LZ4 block functions one layer
//! down from the frame format.

use crate::error::Qs2Error;
use crate::heuristic::{self, Decision, ShuffleHeuristic};
use crate::shuffle::{shuffle, unshuffle};

/// Bit 31 of a block's size word: per-block shuffle flag (spec section 3.2).
pub const SHUFFLE_FLAG: u32 = 0x8000_0000;
/// Mask for the low 31 bits: compressed byte count.
pub const SIZE_MASK: u32 = 0x7FFF_FFFF;

/// Upper bound on compressed size for a buffer of `len` uncompressed bytes.
pub fn compress_bound(len: usize) -> usize {
    zstd::zstd_safe::compress_bound(len)
}

/// Raw, non-adaptive compress. Returns `0` on failure.
fn raw_compress(dst: &mut [u8], src: &[u8], level: i32) -> usize {
    match zstd::bulk::compress_to_buffer(src, dst, level) {
        Ok(n) => n,
        Err(_) => 0,
    }
}

/// Raw decompress into a destination of known exact size. Returns `0` on
/// failure (spec section 4.3 sentinel).
fn raw_decompress(dst: &mut [u8], src: &[u8]) -> usize {
    match zstd::bulk::decompress_to_buffer(src, dst) {
        Ok(n) => n,
        Err(_) => 0,
    }
}

/// Plain compress — direct call to the backend, no shuffle involved.
pub fn compress_plain(dst: &mut [u8], src: &[u8], level: i32) -> usize {
    raw_compress(dst, src, level)
}

/// Plain decompress. Rejects compressed sizes exceeding the compressed-bound
/// ceiling for `dst.len()` before calling into the backend.
pub fn decompress_plain(dst: &mut [u8], src: &[u8]) -> crate::error::Result<usize> {
    if src.len() > compress_bound(dst.len()) {
        return Err(Qs2Error::CorruptBlock("compressed size exceeds bound"));
    }
    let n = raw_decompress(dst, src);
    if n == 0 && !dst.is_empty() {
        return Err(Qs2Error::CorruptBlock("decompression failed"));
    }
    Ok(n)
}

/// Shuffle-adaptive compress: runs the shuffle-use heuristic, then compresses
/// either the shuffled or raw payload, ORing the shuffle bit into the
/// returned size word's high bit position (the caller is responsible for
/// actually packing the 4-byte `zsize` word; this returns `(size, shuffled)`).
///
/// The model heuristic's level>=14 verify step already compresses the full
/// block both ways to pick a winner (spec section 4.4); when it does,
/// [`heuristic::Decision::Verified`] carries that winning buffer back here so
/// it is copied into `dst` rather than compressed a third time.
pub fn compress_shuffle_adaptive(
    dst: &mut [u8],
    src: &[u8],
    level: i32,
    type_size: usize,
    heuristic_kind: ShuffleHeuristic,
) -> (usize, bool) {
    match heuristic::decide(src, type_size, level, heuristic_kind) {
        Decision::Verified { shuffled, compressed } => {
            dst[..compressed.len()].copy_from_slice(&compressed);
            (compressed.len(), shuffled)
        }
        Decision::Predicted(true) => {
            let mut shuffled = vec![0u8; src.len()];
            shuffle(&mut shuffled, src, type_size);
            let n = raw_compress(dst, &shuffled, level);
            (n, n != 0)
        }
        Decision::Predicted(false) => {
            let n = raw_compress(dst, src, level);
            (n, false)
        }
    }
}

/// Shuffle-aware decompress: decompresses into a scratch buffer, then applies
/// the inverse shuffle into `dst` if `shuffled` is set (copying the tail
/// remainder verbatim, which [`unshuffle`] already does internally).
pub fn decompress_shuffle_aware(
    dst: &mut [u8],
    src: &[u8],
    shuffled: bool,
    type_size: usize,
) -> crate::error::Result<usize> {
    if !shuffled {
        return decompress_plain(dst, src);
    }
    let mut scratch = vec![0u8; dst.len()];
    let n = decompress_plain(&mut scratch, src)?;
    unshuffle(dst, &scratch[..dst.len()], type_size);
    Ok(n)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_roundtrip() {
        let src = b"hello hello hello hello hello world world world".repeat(4);
        let bound = compress_bound(src.len());
        let mut zbuf = vec![0u8; bound];
        let zn = compress_plain(&mut zbuf, &src, 3);
        assert!(zn > 0);
        let mut out = vec![0u8; src.len()];
        let n = decompress_plain(&mut out, &zbuf[..zn]).unwrap();
        assert_eq!(n, src.len());
        assert_eq!(out, src);
    }

    #[test]
    fn shuffle_adaptive_roundtrip_both_paths() {
        for type_size in [4usize, 8] {
            let mut src = Vec::new();
            for i in 0u64..4096 {
                src.extend_from_slice(&i.to_le_bytes()[..type_size]);
            }
            let bound = compress_bound(src.len());
            let mut zbuf = vec![0u8; bound];
            let (zn, shuffled) =
                compress_shuffle_adaptive(&mut zbuf, &src, 3, type_size, ShuffleHeuristic::Threshold);
            assert!(zn > 0);
            let mut out = vec![0u8; src.len()];
            decompress_shuffle_aware(&mut out, &zbuf[..zn], shuffled, type_size).unwrap();
            assert_eq!(out, src);
        }
    }

    #[test]
    fn decompress_rejects_oversized_input() {
        let fake = vec![0u8; compress_bound(16) + 1];
        let mut dst = vec![0u8; 16];
        assert!(decompress_plain(&mut dst, &fake).is_err());
    }
}
