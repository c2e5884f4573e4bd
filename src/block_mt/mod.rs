//! Pipelined multi-worker block framing (spec sections 4.7, 4.8), gated
//! behind the `multithread` feature since it pulls in `rayon`.
//!
//! Grounded on the teacher's `io/compress_mt.rs` / `io/decompress_mt.rs` and
//! `threadpool.rs`, and on the original's `multithreaded_block_module.h` TBB
//! flow graph — see each submodule's doc comment for the node-by-node
//! mapping.

mod pool;
mod reader;
mod writer;

pub use pool::BufferPool;
pub use reader::{HashValidatedMtReader, MtStreamReader};
pub use writer::MtBlockWriter;
