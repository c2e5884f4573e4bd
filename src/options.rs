//! Process-wide defaults replaced by an explicit, owner-held struct.
//!
//! The teacher keeps per-call settings in `io::prefs::Prefs` plus a handful of
//! scattered `static` globals (`g_displayLevel` equivalent via
//! `set_notification_level`, `NB_WORKERS_DEFAULT` in `config.rs`). Per
//! SPEC_FULL.md's design-notes section, this crate folds all of that into a
//! single `Options` value passed into every entry point.

use crate::heuristic::ShuffleHeuristic;

/// Minimum accepted zstd compression level (matches the backend's own range).
pub const MIN_COMPRESS_LEVEL: i32 = -131072;
/// Maximum accepted zstd compression level.
pub const MAX_COMPRESS_LEVEL: i32 = 22;

/// Shuffle mode requested by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShuffleMode {
    /// Never shuffle.
    Off,
    /// Shuffle every eligible block unconditionally.
    On,
    /// Run the shuffle-use heuristic per block (spec section 4.4).
    Auto,
}

/// Options threaded through every `save`/`load`/`serialize`/`deserialize`
/// call. Construct with [`Options::default`] and adjust fields, mirroring the
/// builder-by-field-assignment style of the teacher's `Prefs::default()`.
#[derive(Debug, Clone)]
pub struct Options {
    /// zstd compression level. Validated against
    /// [`MIN_COMPRESS_LEVEL`]..=[`MAX_COMPRESS_LEVEL`] before any I/O.
    pub compress_level: i32,
    /// Whether/how to shuffle blocks before compression.
    pub shuffle: ShuffleMode,
    /// Which shuffle-use heuristic to run when `shuffle == Auto`.
    pub shuffle_heuristic: ShuffleHeuristic,
    /// Number of worker threads. `1` selects the single-worker path
    /// unconditionally; `>= 2` requires the `multithread` feature.
    pub n_threads: usize,
    /// Whether to validate the trailer hash on load (spec section 4.8,
    /// hash-validated mode) rather than only streaming-decode.
    pub validate_hash: bool,
    /// Emit a `log::warn!` when an attribute's value type can't be
    /// represented in QDATA and is dropped (spec section 3.3).
    pub warn_unsupported: bool,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            compress_level: 1,
            shuffle: ShuffleMode::Auto,
            shuffle_heuristic: ShuffleHeuristic::Threshold,
            n_threads: default_n_threads(),
            validate_hash: false,
            warn_unsupported: true,
        }
    }
}

impl Options {
    /// Validate field values that spec section 7 requires be rejected
    /// before any I/O happens (`InvalidArgument`).
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.compress_level < MIN_COMPRESS_LEVEL || self.compress_level > MAX_COMPRESS_LEVEL {
            return Err(crate::error::Qs2Error::InvalidArgument(
                "compress_level out of range",
            ));
        }
        if self.n_threads == 0 {
            return Err(crate::error::Qs2Error::InvalidArgument(
                "n_threads must be >= 1",
            ));
        }
        if self.n_threads > 1 && !cfg!(feature = "multithread") {
            return Err(crate::error::Qs2Error::InvalidArgument(
                "n_threads > 1 requires the multithread feature",
            ));
        }
        Ok(())
    }
}

/// Mirrors `io::prefs::default_nb_workers` — `num_cpus`-derived default.
pub fn default_n_threads() -> usize {
    num_cpus::get().max(1)
}
