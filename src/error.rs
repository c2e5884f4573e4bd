//! Error types for the container format.
//!
//! The kinds enumerated here correspond 1:1 to spec section 7. Unlike the
//! teacher's hand-rolled `Lz4FError` (a C-parity error-code enum with manual
//! `Display`/`Error` impls), this crate's error set is small and closed, so
//! it is derived with `thiserror` — see SPEC_FULL.md's ambient-stack notes.

use std::fmt;

/// Errors produced while opening, reading, or writing a QS/QDATA container.
#[derive(thiserror::Error, Debug)]
pub enum Qs2Error {
    #[error("failed to open {path}: {source}")]
    OpenFailure {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("bad magic number: {0}")]
    BadMagic(BadMagicKind),

    #[error("unsupported format version {found}; this build supports up to {max}")]
    UnsupportedVersion { found: u8, max: u8 },

    #[error("unsupported compression algorithm byte {0}")]
    UnsupportedCompression(u8),

    #[error("file endian ({file:?}) does not match host endian ({host:?})")]
    EndianMismatch { file: Endian, host: Endian },

    #[error("truncated input while reading {0}")]
    TruncatedInput(&'static str),

    #[error("corrupt block: {0}")]
    CorruptBlock(&'static str),

    #[error("stored trailer hash is zero; writer never called finish()")]
    HashMissing,

    #[error("trailer hash mismatch: expected {expected:#018x}, computed {computed:#018x}")]
    HashMismatch { expected: u64, computed: u64 },

    #[error("unknown QDATA type tag {0:#04x}")]
    UnknownTypeTag(u8),

    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Sub-kind for [`Qs2Error::BadMagic`], distinguishing the three ways a
/// magic-number check can fail (spec section 7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BadMagicKind {
    /// Expected a QS container but found a QDATA one.
    ExpectedQsGotQdata,
    /// Expected a QDATA container but found a QS one.
    ExpectedQdataGotQs,
    /// The legacy `0B 0E 0A 0C` magic was detected; it is rejected outright.
    Legacy,
    /// Neither QS, QDATA, nor the legacy magic matched.
    Unrecognized,
}

impl fmt::Display for BadMagicKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BadMagicKind::ExpectedQsGotQdata => "expected QS container, found QDATA",
            BadMagicKind::ExpectedQdataGotQs => "expected QDATA container, found QS",
            BadMagicKind::Legacy => "legacy qs format (0B 0E 0A 0C) is not supported",
            BadMagicKind::Unrecognized => "unrecognized magic number",
        };
        f.write_str(s)
    }
}

/// Header byte-6 endian tag (spec section 3.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian {
    Big,
    Little,
}

impl Endian {
    pub fn host() -> Self {
        if cfg!(target_endian = "big") {
            Endian::Big
        } else {
            Endian::Little
        }
    }

    pub(crate) fn to_byte(self) -> u8 {
        match self {
            Endian::Big => 1,
            Endian::Little => 2,
        }
    }

    pub(crate) fn from_byte(b: u8) -> Option<Self> {
        match b {
            1 => Some(Endian::Big),
            2 => Some(Endian::Little),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Qs2Error>;
