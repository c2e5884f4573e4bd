//! QDATA: the self-describing, type-tagged container format (spec sections
//! 3.3, 4.9, 4.10).
//!
//! `header` holds the opcode table, `value` the in-memory object model,
//! `serializer`/`deserializer` the depth-first walk with deferred bulk
//! payload replay.

mod deserializer;
mod header;
mod serializer;
mod value;

pub use header::TypeTag;
pub use value::{Attributes, NullableVec, Tagged, Value};

pub(crate) use deserializer::deserialize;
pub(crate) use serializer::serialize;
