//! qs2: a block-framed, shuffle-filtered compression container with two wire
//! formats — QS, a transparent tunnel for an already-serialized opaque byte
//! stream, and QDATA, a self-describing, type-tagged serializer for an
//! in-memory value tree (spec section 1).
//!
//! `options` holds the single `Options` struct threaded through every entry
//! point; `header` the 24-byte container header; `io` the byte sink/source
//! abstraction; `block_st`/`block_mt` the single- and multi-worker block
//! framers (spec sections 4.6–4.8); `framing` the backend-agnostic traits
//! that let `qdata`/`qs` run over either; `shuffle`/`heuristic`/`compressor`
//! the per-block filter pipeline (spec sections 4.2–4.4); `hasher` the
//! trailer digest; `qdata`/`qs` the two wire formats; `api` the public
//! save/load surface.

pub mod api;
pub mod block_st;
pub mod compressor;
pub mod error;
pub mod framing;
pub mod hasher;
pub mod header;
pub mod heuristic;
pub mod io;
pub mod options;
pub mod qdata;
pub mod qs;
pub mod shuffle;

#[cfg(feature = "multithread")]
pub mod block_mt;

pub use api::{load_qdata, load_qs, save_qdata, save_qs, verify_trailer_hash};
pub use error::{Qs2Error, Result};
pub use header::{ContainerHeader, Format};
pub use options::{Options, ShuffleMode};
pub use qdata::{Attributes, NullableVec, Tagged, TypeTag, Value};
