//! QDATA serializer (spec section 4.9): depth-first spine walk with deferred
//! bulk-payload replay.
//!
//! Grounded on `qd_serializer.h`'s two-pass structure; the per-type worklists
//! below are the Rust equivalent of its `(handle, length)` queues, holding
//! borrowed slices instead of host-runtime handles since the whole value
//! tree already lives in memory before serialization starts.

use log::warn;

use crate::error::Result;
use crate::framing::BlockSink;
use crate::options::Options;

use super::header::{self, StringHeader, TypeTag};
use super::value::{Attributes, Tagged, Value};

/// Types allowed as attribute values (spec section 3.3): everything except
/// `Nil`.
fn attribute_type_allowed(v: &Value) -> bool {
    v.supports_attributes()
}

enum IntLogicalRef<'a> {
    Integer(&'a [Option<i32>]),
    Logical(&'a [Option<bool>]),
}

#[derive(Default)]
struct Worklists<'a> {
    character: Vec<&'a [Option<String>]>,
    complex: Vec<&'a [(f64, f64)]>,
    numeric: Vec<&'a [f64]>,
    int_logical: Vec<IntLogicalRef<'a>>,
    raw: Vec<&'a [u8]>,
}

/// Serialize `root` as a QDATA body (everything after the 24-byte container
/// header) onto `writer`, then return it with the finalized digest.
pub fn serialize<S: BlockSink>(writer: &mut S, root: &Tagged, options: &Options) -> Result<()> {
    let mut worklists = Worklists::default();
    walk(writer, root, options, &mut worklists)?;
    replay_worklists(writer, &worklists)?;
    Ok(())
}

fn walk<'a, S: BlockSink>(
    writer: &mut S,
    node: &'a Tagged,
    options: &Options,
    worklists: &mut Worklists<'a>,
) -> Result<()> {
    // Attribute header and attribute name/value pairs precede the node's own
    // type header on the wire (spec section 8, scenario S1's concrete byte
    // sequence — authoritative over the numbered step order in section 4.9,
    // which lists the value's type header before the attribute replay).
    //
    // NIL cannot carry attributes (spec section 3.3); a caller-constructed
    // `Tagged { value: Nil, .. }` with non-empty attributes silently drops
    // them rather than emitting an ATTRIBUTE header before the 0x00 byte.
    if matches!(node.value, Value::Nil) {
        if !node.attributes.is_empty() && options.warn_unsupported {
            warn!("dropping attributes on a NIL value: NIL cannot carry attributes");
        }
    } else {
        write_attributes(writer, &node.attributes, options, worklists)?;
    }
    write_value(writer, &node.value, options, worklists)
}

fn write_attributes<'a, S: BlockSink>(
    writer: &mut S,
    attrs: &'a Attributes,
    options: &Options,
    worklists: &mut Worklists<'a>,
) -> Result<()> {
    if attrs.is_empty() {
        return Ok(());
    }
    let kept: Vec<&(String, Tagged)> = attrs
        .entries
        .iter()
        .filter(|(name, value)| {
            if attribute_type_allowed(&value.value) {
                true
            } else {
                if options.warn_unsupported {
                    warn!("dropping attribute {:?}: value type unsupported in QDATA", name);
                }
                false
            }
        })
        .collect();
    if kept.is_empty() {
        return Ok(());
    }
    header::write_header(writer, TypeTag::Attribute, kept.len() as u64)?;
    for (name, value) in kept {
        write_string(writer, Some(name))?;
        walk(writer, value, options, worklists)?;
    }
    Ok(())
}

fn write_value<'a, S: BlockSink>(
    writer: &mut S,
    value: &'a Value,
    options: &Options,
    worklists: &mut Worklists<'a>,
) -> Result<()> {
    match value {
        Value::Nil => header::write_nil(writer),
        Value::List(children) => {
            header::write_header(writer, TypeTag::List, children.len() as u64)?;
            for child in children {
                walk(writer, child, options, worklists)?;
            }
            Ok(())
        }
        Value::Logical(v) => {
            header::write_header(writer, TypeTag::Logical, v.len() as u64)?;
            worklists.int_logical.push(IntLogicalRef::Logical(v.as_slice()));
            Ok(())
        }
        Value::Integer(v) => {
            header::write_header(writer, TypeTag::Integer, v.len() as u64)?;
            worklists.int_logical.push(IntLogicalRef::Integer(v.as_slice()));
            Ok(())
        }
        Value::Numeric(v) => {
            header::write_header(writer, TypeTag::Numeric, v.len() as u64)?;
            worklists.numeric.push(v.as_slice());
            Ok(())
        }
        Value::Complex(v) => {
            header::write_header(writer, TypeTag::Complex, v.len() as u64)?;
            worklists.complex.push(v.as_slice());
            Ok(())
        }
        Value::Character(v) => {
            header::write_header(writer, TypeTag::Character, v.len() as u64)?;
            worklists.character.push(v.as_slice());
            Ok(())
        }
        Value::Raw(v) => {
            header::write_header(writer, TypeTag::Raw, v.len() as u64)?;
            worklists.raw.push(v.as_slice());
            Ok(())
        }
    }
}

/// Write a single string inline (used only for attribute names, which are
/// not deferred — spec section 4.9 step 4).
fn write_string<S: BlockSink>(writer: &mut S, s: Option<&str>) -> Result<()> {
    match s {
        None => header::write_string_header(writer, StringHeader::Missing),
        Some(s) => {
            let bytes = translate_to_utf8(s);
            header::write_string_header(writer, StringHeader::Len(bytes.len() as u64))?;
            if bytes.is_empty() {
                return Ok(());
            }
            writer.set_type_size(1);
            writer.push_data(&bytes)
        }
    }
}

/// Translate a string to UTF-8 bytes. The host's encoding-tagged string
/// representation (Latin-1, native-non-UTF-8) is out of scope (spec section
/// 1); every string handled here is already valid UTF-8, so this is the
/// identity transform, kept as a named seam for a real binding to hook
/// (spec section 9, open question (c)).
fn translate_to_utf8(s: &str) -> Vec<u8> {
    s.as_bytes().to_vec()
}

/// Replay every worklist in the fixed order spec section 4.9 specifies:
/// CHARACTER, COMPLEX, NUMERIC, INTEGER/LOGICAL, RAW.
fn replay_worklists<S: BlockSink>(writer: &mut S, worklists: &Worklists) -> Result<()> {
    for strings in &worklists.character {
        for s in strings.iter() {
            write_string(writer, s.as_deref())?;
        }
    }

    writer.set_type_size(16);
    for slice in &worklists.complex {
        let mut bytes = Vec::with_capacity(slice.len() * 16);
        for (re, im) in slice.iter() {
            bytes.extend_from_slice(&re.to_bits().to_le_bytes());
            bytes.extend_from_slice(&im.to_bits().to_le_bytes());
        }
        writer.push_data(&bytes)?;
    }

    writer.set_type_size(8);
    for slice in &worklists.numeric {
        let mut bytes = Vec::with_capacity(slice.len() * 8);
        for v in slice.iter() {
            bytes.extend_from_slice(&v.to_bits().to_le_bytes());
        }
        writer.push_data(&bytes)?;
    }

    writer.set_type_size(4);
    for item in &worklists.int_logical {
        let bytes = match item {
            IntLogicalRef::Integer(v) => encode_i32_sentinel(v),
            IntLogicalRef::Logical(v) => encode_logical_sentinel(v),
        };
        writer.push_data(&bytes)?;
    }

    writer.set_type_size(1);
    for slice in &worklists.raw {
        writer.push_data(slice)?;
    }

    Ok(())
}

/// The host's NA_INTEGER sentinel (spec section 3.3: "INTEGER ... sentinel
/// for missing").
pub const NA_INTEGER: i32 = i32::MIN;

fn encode_i32_sentinel(v: &[Option<i32>]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(v.len() * 4);
    for x in v {
        bytes.extend_from_slice(&x.unwrap_or(NA_INTEGER).to_le_bytes());
    }
    bytes
}

fn encode_logical_sentinel(v: &[Option<bool>]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(v.len() * 4);
    for x in v {
        let word = match x {
            Some(true) => 1i32,
            Some(false) => 0i32,
            None => NA_INTEGER,
        };
        bytes.extend_from_slice(&word.to_le_bytes());
    }
    bytes
}
