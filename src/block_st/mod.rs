//! Single-worker block framing (spec sections 4.5, 4.6): the fully
//! synchronous reader/writer pair that both the MT variants and the QS/QDATA
//! layers build on.
//!
//! Grounded on `io/compress_frame.rs` / `io/decompress_frame.rs`'s
//! single-threaded chunk-at-a-time loop and on `io/block_module.h` /
//! `block_module.h` (original_source) for the exact buffer/flush state
//! machine.

mod reader;
mod writer;

pub use reader::BlockReader;
pub use writer::{BlockWriter, PodBytes};
