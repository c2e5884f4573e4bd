//! Shuffle-use heuristic (spec section 4.4): per-block decision of whether
//! shuffling improves compression enough to use.
//!
//! Ported from `inst/analysis/blockshuffle_xgboost_model/blockshuffle_heuristic.cpp`'s
//! window-sampling scheme. The trained decision-tree ensemble itself is not
//! reproduced (spec section 9: "calibration ... must be captured as data, not
//! code" — the real coefficients live in a model file this crate does not
//! have); `ShuffleHeuristic::Model` implements the same four-window feature
//! vector and a hand-coded linear-threshold stand-in, documented in
//! DESIGN.md.

use crate::shuffle::shuffle;

/// Size of one heuristic sampling window (spec section 4.4).
pub const SHUFFLE_HEURISTIC_BLOCKSIZE: usize = 16 * 1024;

/// Which heuristic implementation to run. Spec section 4.4 requires both be
/// supported as alternatives, selected explicitly rather than switched on
/// implicitly (spec section 9, design notes).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShuffleHeuristic {
    /// Simple ratio-threshold heuristic (the default).
    Threshold,
    /// Four-window feature-vector heuristic intended for high compression
    /// levels, with a full verify-by-compressing-both-ways step at level >= 14.
    Model,
}

/// Fast compression level used when sampling windows for the heuristic.
const FAST_PROBE_LEVEL: i32 = -1;

/// Compress `data` at the fast probe level and return the compressed size,
/// or `usize::MAX` on failure (callers treat that as "very large").
fn probe_compress_size(data: &[u8]) -> usize {
    compress_at_level(data, FAST_PROBE_LEVEL).0
}

fn shuffled_copy(data: &[u8], type_size: usize) -> Vec<u8> {
    let mut out = vec![0u8; data.len()];
    shuffle(&mut out, data, type_size);
    out
}

/// Outcome of [`decide`]. The level>=14 model verify step already has to
/// compress the full block both ways to pick a winner without risking a
/// ratio regression (spec section 4.4); `Verified` carries that winning
/// buffer back so the caller doesn't compress the same bytes a third time.
pub enum Decision {
    /// No full-block compression happened; the caller still needs to
    /// compress `block` itself, shuffled or not per the `bool`.
    Predicted(bool),
    /// The full block was already compressed both ways; `compressed` is the
    /// smaller of the two results, `shuffled` says which path produced it.
    Verified { shuffled: bool, compressed: Vec<u8> },
}

/// Decide whether `block` should be shuffled before compression at `level`,
/// using `type_size`-byte elements.
///
/// Blocks smaller than one heuristic window always return `false` (spec
/// section 4.4, "Blocks smaller than the minimum window use false").
pub fn decide(block: &[u8], type_size: usize, level: i32, heuristic: ShuffleHeuristic) -> Decision {
    if block.len() < SHUFFLE_HEURISTIC_BLOCKSIZE {
        return Decision::Predicted(false);
    }
    match heuristic {
        ShuffleHeuristic::Threshold => Decision::Predicted(decide_threshold(block, type_size)),
        ShuffleHeuristic::Model => decide_model(block, type_size, level),
    }
}

/// Threshold heuristic: sample one or two windows, compress both shuffled and
/// unshuffled at the fast probe level, and shuffle iff
/// `no_shuffle_size / shuffle_size > 1.07`.
fn decide_threshold(block: &[u8], type_size: usize) -> bool {
    let window = SHUFFLE_HEURISTIC_BLOCKSIZE;
    let mut shuffle_size = 0usize;
    let mut no_shuffle_size = 0usize;

    let sample = |start: usize| -> (usize, usize) {
        let w = &block[start..start + window];
        let s = shuffled_copy(w, type_size);
        (probe_compress_size(&s), probe_compress_size(w))
    };

    let (s0, u0) = sample(0);
    shuffle_size += s0;
    no_shuffle_size += u0;

    let half_mark = block.len() / 2;
    if crate::header::MAX_BLOCKSIZE / 2 + window <= block.len() {
        let (s1, u1) = sample(half_mark);
        shuffle_size += s1;
        no_shuffle_size += u1;
    }

    if shuffle_size == 0 {
        return false;
    }
    (no_shuffle_size as f64 / shuffle_size as f64) > 1.07
}

/// Model-based heuristic: sample four equally-spaced windows, form the
/// feature vector `[s0, u0, s1, u1, s2, u2, s3, u3, level]`, and evaluate a
/// linear-threshold approximation of the trained ensemble (see module docs).
/// At levels >= 14, verify by compressing the full block both ways and
/// choosing the smaller (guaranteeing no ratio regression, spec property 7);
/// that winning buffer is returned in `Decision::Verified` so the caller
/// doesn't have to compress the same bytes again.
fn decide_model(block: &[u8], type_size: usize, level: i32) -> Decision {
    let window = SHUFFLE_HEURISTIC_BLOCKSIZE;
    if block.len() < 8 * window {
        return Decision::Predicted(decide_threshold(block, type_size));
    }

    let span = block.len() - window;
    let mut features = [0f64; 9];
    for k in 0..4usize {
        let start = (span * k / 3).min(span);
        let w = &block[start..start + window];
        let s = shuffled_copy(w, type_size);
        let sc = probe_compress_size(&s) as f64;
        let uc = probe_compress_size(w) as f64;
        features[2 * k] = sc;
        features[2 * k + 1] = uc;
    }
    features[8] = level as f64;

    // Linear-threshold stand-in for the trained ensemble: weights favor
    // shuffling whenever shuffled samples compress noticeably smaller than
    // unshuffled ones, with the decision threshold lowered at level >= 14
    // (spec: "lower the threshold, accept shuffle more readily").
    let mut score = 0f64;
    for k in 0..4 {
        score += features[2 * k + 1] - features[2 * k]; // unshuffled - shuffled
    }
    let threshold = if level >= 14 { -4.0 } else { 0.0 };
    let predicted_shuffle = score > threshold;

    if level >= 14 {
        // Verify step: compress the full block both ways at the final level
        // and pick the smaller, regardless of what the model predicted.
        let (unshuffled_size, unshuffled_buf) = compress_at_level(block, level);
        let (shuffled_size, shuffled_buf) =
            compress_at_level(&shuffled_copy(block, type_size), level);
        return if shuffled_size < unshuffled_size {
            Decision::Verified {
                shuffled: true,
                compressed: shuffled_buf,
            }
        } else {
            Decision::Verified {
                shuffled: false,
                compressed: unshuffled_buf,
            }
        };
    }

    Decision::Predicted(predicted_shuffle)
}

/// Compress `data` at `level`, returning `(size, compressed_bytes)`. The
/// bytes are truncated to `size` so callers can copy them directly.
/// `size == usize::MAX` on failure.
fn compress_at_level(data: &[u8], level: i32) -> (usize, Vec<u8>) {
    let bound = crate::compressor::compress_bound(data.len());
    let mut dst = vec![0u8; bound];
    let n = crate::compressor::compress_plain(&mut dst, data, level);
    if n == 0 {
        (usize::MAX, Vec::new())
    } else {
        dst.truncate(n);
        (n, dst)
    }
}
