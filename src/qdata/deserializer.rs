//! QDATA deserializer (spec section 4.10): a structural pass that builds the
//! value spine and records per-type worklist lengths, followed by a payload
//! pass that drains each worklist in the same order the serializer replayed
//! them, and a final assembly pass that re-walks the spine filling in the
//! now-available payloads.
//!
//! Grounded on `qd_deserializer.h`'s two-pass read loop. Unlike the
//! serializer (which holds borrowed slices into an already-built tree), the
//! deserializer cannot know node identity until it has read the type byte,
//! so spine and payload are kept as separate parallel structures (`Shape`
//! and the `*_payloads` vectors) joined by worklist index rather than by a
//! shared handle — the Rust-idiomatic substitute for the original's
//! `(handle, length)` queue of live pointers.

use crate::error::{Qs2Error, Result};
use crate::framing::BlockSource;
use crate::options::Options;

use super::header::{self, StringHeader, TypeTag};
use super::serializer::NA_INTEGER;
use super::value::{Attributes, NullableVec, Tagged, Value};

enum IntLogicalSlot {
    Integer(usize),
    Logical(usize),
}

enum IntLogicalPayload {
    Integer(Vec<Option<i32>>),
    Logical(Vec<Option<bool>>),
}

/// Structural shape of the spine: identical topology to the final value
/// tree, but bulk leaves hold only an index into a worklist instead of data.
enum Shape {
    Nil,
    Logical(usize),
    Integer(usize),
    Numeric(usize),
    Complex(usize),
    Character(usize),
    Raw(usize),
    List(Vec<TaggedShape>),
}

struct TaggedShape {
    attributes: Vec<(String, TaggedShape)>,
    shape: Shape,
}

#[derive(Default)]
struct Worklists {
    character: Vec<usize>,
    complex: Vec<usize>,
    numeric: Vec<usize>,
    int_logical: Vec<IntLogicalSlot>,
    raw: Vec<usize>,
}

pub fn deserialize<S: BlockSource>(reader: &mut S, options: &Options) -> Result<Tagged> {
    let mut worklists = Worklists::default();
    let shape = read_tagged_shape(reader, &mut worklists)?;

    let character_payloads = read_character_payloads(reader, &worklists)?;
    let complex_payloads = read_complex_payloads(reader, &worklists)?;
    let numeric_payloads = read_numeric_payloads(reader, &worklists)?;
    let int_logical_payloads = read_int_logical_payloads(reader, &worklists)?;
    let raw_payloads = read_raw_payloads(reader, &worklists)?;

    let payloads = Payloads {
        character: character_payloads,
        complex: complex_payloads,
        numeric: numeric_payloads,
        int_logical: int_logical_payloads,
        raw: raw_payloads,
    };
    assemble(shape, &payloads, options)
}

fn read_tagged_shape<S: BlockSource>(
    reader: &mut S,
    worklists: &mut Worklists,
) -> Result<TaggedShape> {
    let mut attributes = Vec::new();
    let mut header = header::read_header(reader)?;

    if let Some((TypeTag::Attribute, count)) = header {
        for _ in 0..count {
            let name = read_inline_string_required(reader)?;
            let value = read_tagged_shape(reader, worklists)?;
            attributes.push((name, value));
        }
        header = header::read_header(reader)?;
        if let Some((TypeTag::Attribute, _)) = header {
            return Err(Qs2Error::CorruptBlock("back-to-back ATTRIBUTE headers"));
        }
    }

    let shape = match header {
        None => Shape::Nil,
        Some((TypeTag::List, len)) => {
            let mut children = Vec::with_capacity(len as usize);
            for _ in 0..len {
                children.push(read_tagged_shape(reader, worklists)?);
            }
            Shape::List(children)
        }
        Some((TypeTag::Logical, len)) => {
            let idx = worklists.int_logical.len();
            worklists.int_logical.push(IntLogicalSlot::Logical(len as usize));
            Shape::Logical(idx)
        }
        Some((TypeTag::Integer, len)) => {
            let idx = worklists.int_logical.len();
            worklists.int_logical.push(IntLogicalSlot::Integer(len as usize));
            Shape::Integer(idx)
        }
        Some((TypeTag::Numeric, len)) => {
            let idx = worklists.numeric.len();
            worklists.numeric.push(len as usize);
            Shape::Numeric(idx)
        }
        Some((TypeTag::Complex, len)) => {
            let idx = worklists.complex.len();
            worklists.complex.push(len as usize);
            Shape::Complex(idx)
        }
        Some((TypeTag::Character, len)) => {
            let idx = worklists.character.len();
            worklists.character.push(len as usize);
            Shape::Character(idx)
        }
        Some((TypeTag::Raw, len)) => {
            let idx = worklists.raw.len();
            worklists.raw.push(len as usize);
            Shape::Raw(idx)
        }
        Some((TypeTag::Attribute, _)) => {
            return Err(Qs2Error::CorruptBlock("back-to-back ATTRIBUTE headers"))
        }
    };

    Ok(TaggedShape { attributes, shape })
}

fn read_inline_string_required<S: BlockSource>(reader: &mut S) -> Result<String> {
    match read_inline_string(reader)? {
        Some(s) => Ok(s),
        None => Err(Qs2Error::CorruptBlock("attribute name cannot be missing")),
    }
}

fn read_inline_string<S: BlockSource>(reader: &mut S) -> Result<Option<String>> {
    match header::read_string_header(reader)? {
        StringHeader::Missing => Ok(None),
        StringHeader::Len(0) => Ok(Some(String::new())),
        StringHeader::Len(len) => {
            let mut bytes = vec![0u8; len as usize];
            reader.set_type_size(1);
            reader.get_data(&mut bytes)?;
            String::from_utf8(bytes)
                .map(Some)
                .map_err(|_| Qs2Error::CorruptBlock("string payload is not valid UTF-8"))
        }
    }
}

fn read_character_payloads<S: BlockSource>(
    reader: &mut S,
    worklists: &Worklists,
) -> Result<Vec<Vec<Option<String>>>> {
    worklists
        .character
        .iter()
        .map(|&len| {
            let mut v = Vec::with_capacity(len);
            for _ in 0..len {
                v.push(read_inline_string(reader)?);
            }
            Ok(v)
        })
        .collect()
}

fn read_complex_payloads<S: BlockSource>(
    reader: &mut S,
    worklists: &Worklists,
) -> Result<Vec<Vec<(f64, f64)>>> {
    reader.set_type_size(16);
    worklists
        .complex
        .iter()
        .map(|&len| {
            let mut bytes = vec![0u8; len * 16];
            reader.get_data(&mut bytes)?;
            let mut v = Vec::with_capacity(len);
            for chunk in bytes.chunks_exact(16) {
                let re = f64::from_bits(u64::from_le_bytes(chunk[0..8].try_into().unwrap()));
                let im = f64::from_bits(u64::from_le_bytes(chunk[8..16].try_into().unwrap()));
                v.push((re, im));
            }
            Ok(v)
        })
        .collect()
}

fn read_numeric_payloads<S: BlockSource>(
    reader: &mut S,
    worklists: &Worklists,
) -> Result<Vec<Vec<f64>>> {
    reader.set_type_size(8);
    worklists
        .numeric
        .iter()
        .map(|&len| {
            let mut bytes = vec![0u8; len * 8];
            reader.get_data(&mut bytes)?;
            let v = bytes
                .chunks_exact(8)
                .map(|c| f64::from_bits(u64::from_le_bytes(c.try_into().unwrap())))
                .collect();
            Ok(v)
        })
        .collect()
}

fn read_int_logical_payloads<S: BlockSource>(
    reader: &mut S,
    worklists: &Worklists,
) -> Result<Vec<IntLogicalPayload>> {
    reader.set_type_size(4);
    worklists
        .int_logical
        .iter()
        .map(|slot| match slot {
            IntLogicalSlot::Integer(len) => {
                let mut bytes = vec![0u8; len * 4];
                reader.get_data(&mut bytes)?;
                let v = bytes
                    .chunks_exact(4)
                    .map(|c| {
                        let n = i32::from_le_bytes(c.try_into().unwrap());
                        if n == NA_INTEGER {
                            None
                        } else {
                            Some(n)
                        }
                    })
                    .collect();
                Ok(IntLogicalPayload::Integer(v))
            }
            IntLogicalSlot::Logical(len) => {
                let mut bytes = vec![0u8; len * 4];
                reader.get_data(&mut bytes)?;
                let v = bytes
                    .chunks_exact(4)
                    .map(|c| {
                        let n = i32::from_le_bytes(c.try_into().unwrap());
                        if n == NA_INTEGER {
                            None
                        } else {
                            Some(n != 0)
                        }
                    })
                    .collect();
                Ok(IntLogicalPayload::Logical(v))
            }
        })
        .collect()
}

fn read_raw_payloads<S: BlockSource>(
    reader: &mut S,
    worklists: &Worklists,
) -> Result<Vec<Vec<u8>>> {
    reader.set_type_size(1);
    worklists
        .raw
        .iter()
        .map(|&len| {
            let mut v = vec![0u8; len];
            reader.get_data(&mut v)?;
            Ok(v)
        })
        .collect()
}

struct Payloads {
    character: Vec<Vec<Option<String>>>,
    complex: Vec<Vec<(f64, f64)>>,
    numeric: Vec<Vec<f64>>,
    int_logical: Vec<IntLogicalPayload>,
    raw: Vec<Vec<u8>>,
}

fn assemble(shape: TaggedShape, payloads: &Payloads, options: &Options) -> Result<Tagged> {
    let mut attributes = Attributes::new();
    for (name, attr_shape) in shape.attributes {
        let attr_value = assemble(attr_shape, payloads, options)?;
        attributes.push(name, attr_value);
    }

    let value = match shape.shape {
        Shape::Nil => Value::Nil,
        Shape::List(children) => {
            let mut out = Vec::with_capacity(children.len());
            for child in children {
                out.push(assemble(child, payloads, options)?);
            }
            Value::List(out)
        }
        Shape::Logical(idx) => match &payloads.int_logical[idx] {
            IntLogicalPayload::Logical(v) => Value::Logical(NullableVec::from_vec(v.clone())),
            IntLogicalPayload::Integer(_) => unreachable!("shape/payload index kind mismatch"),
        },
        Shape::Integer(idx) => match &payloads.int_logical[idx] {
            IntLogicalPayload::Integer(v) => Value::Integer(NullableVec::from_vec(v.clone())),
            IntLogicalPayload::Logical(_) => unreachable!("shape/payload index kind mismatch"),
        },
        Shape::Numeric(idx) => Value::Numeric(payloads.numeric[idx].clone()),
        Shape::Complex(idx) => Value::Complex(payloads.complex[idx].clone()),
        Shape::Character(idx) => Value::Character(payloads.character[idx].clone()),
        Shape::Raw(idx) => Value::Raw(payloads.raw[idx].clone()),
    };

    Ok(Tagged { attributes, value })
}
