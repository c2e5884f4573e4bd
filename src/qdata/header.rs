//! QDATA type-tagged headers (spec section 3.3, opcode table in section 6).
//!
//! Grounded on `qd_constants.h` for the opcode values (cross-checked against
//! spec section 6, which is authoritative where the two differ) and
//! `qd_serializer.h`/`qd_deserializer.h` for the short-form/long-form
//! dispatch order — check the 5-bit short-form mask first (spec section 9,
//! open question (b)).

use crate::error::{Qs2Error, Result};
use crate::framing::{self, BlockSink, BlockSource};

/// The eight value types a QDATA header can name, plus ATTRIBUTE, which
/// precedes a value rather than naming one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeTag {
    List,
    Numeric,
    Integer,
    Logical,
    Character,
    Complex,
    Raw,
    Attribute,
}

/// Width of the length field following a long-form opcode byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Width {
    W8,
    W16,
    W32,
    W64,
}

impl Width {
    fn byte_len(self) -> usize {
        match self {
            Width::W8 => 1,
            Width::W16 => 2,
            Width::W32 => 4,
            Width::W64 => 8,
        }
    }

    fn max_value(self) -> u64 {
        match self {
            Width::W8 => u8::MAX as u64,
            Width::W16 => u16::MAX as u64,
            Width::W32 => u32::MAX as u64,
            Width::W64 => u64::MAX,
        }
    }
}

/// `(top-3-bits, base long-form opcode, widths supported by the long form)`
/// per type. `List`/`Numeric`/`Integer`/`Logical`/`Character` get a 5-bit
/// short form plus all four long-form widths; `Complex`/`Raw` have no short
/// form and only the 32/64-bit long forms (spec section 3.3: "RAW and
/// COMPLEX omit the 5/8/16-bit variants"); `Attribute` has a short form plus
/// only the 8/32-bit long forms.
fn short_top3(tag: TypeTag) -> Option<u8> {
    match tag {
        TypeTag::List => Some(1),
        TypeTag::Numeric => Some(2),
        TypeTag::Integer => Some(3),
        TypeTag::Logical => Some(4),
        TypeTag::Character => Some(5),
        TypeTag::Attribute => Some(7),
        TypeTag::Complex | TypeTag::Raw => None,
    }
}

fn long_base_and_widths(tag: TypeTag) -> (u8, &'static [Width]) {
    use Width::*;
    match tag {
        TypeTag::List => (0x01, &[W8, W16, W32, W64]),
        TypeTag::Numeric => (0x05, &[W8, W16, W32, W64]),
        TypeTag::Integer => (0x09, &[W8, W16, W32, W64]),
        TypeTag::Logical => (0x0D, &[W8, W16, W32, W64]),
        TypeTag::Character => (0x11, &[W8, W16, W32, W64]),
        TypeTag::Complex => (0x15, &[W32, W64]),
        TypeTag::Raw => (0x17, &[W32, W64]),
        TypeTag::Attribute => (0x1E, &[W8, W32]),
    }
}

/// Write a type header, choosing the shortest form that can hold `length`
/// (spec section 4.9, step 3: "choose the shortest width that fits").
pub fn write_header<S: BlockSink>(w: &mut S, tag: TypeTag, length: u64) -> Result<()> {
    if let Some(top3) = short_top3(tag) {
        if length <= 0x1F {
            w.set_type_size(1);
            return w.push_data(&[(top3 << 5) | (length as u8)]);
        }
    }
    let (base, widths) = long_base_and_widths(tag);
    for (idx, width) in widths.iter().enumerate() {
        if length <= width.max_value() {
            let opcode = base + idx as u8;
            let mut bytes = vec![opcode];
            bytes.extend_from_slice(&length.to_le_bytes()[..width.byte_len()]);
            w.set_type_size(1);
            return w.push_data(&bytes);
        }
    }
    unreachable!("length exceeds u64::MAX")
}

/// Write the one-byte NIL header (spec section 3.3: "carries no payload and
/// cannot carry attributes").
pub fn write_nil<S: BlockSink>(w: &mut S) -> Result<()> {
    w.set_type_size(1);
    w.push_data(&[0x00])
}

/// Read a type header, returning `None` for NIL (which carries no length).
pub fn read_header<S: BlockSource>(r: &mut S) -> Result<Option<(TypeTag, u64)>> {
    r.set_type_size(1);
    let b: u8 = framing::get_pod(r)?;
    if b == 0x00 {
        return Ok(None);
    }
    if b >= 0x20 {
        let tag = match (b >> 5) & 0x7 {
            1 => TypeTag::List,
            2 => TypeTag::Numeric,
            3 => TypeTag::Integer,
            4 => TypeTag::Logical,
            5 => TypeTag::Character,
            7 => TypeTag::Attribute,
            _ => return Err(Qs2Error::UnknownTypeTag(b)),
        };
        return Ok(Some((tag, (b & 0x1F) as u64)));
    }

    let (tag, width) = match b {
        0x01..=0x04 => (TypeTag::List, width_from_index(b - 0x01)),
        0x05..=0x08 => (TypeTag::Numeric, width_from_index(b - 0x05)),
        0x09..=0x0C => (TypeTag::Integer, width_from_index(b - 0x09)),
        0x0D..=0x10 => (TypeTag::Logical, width_from_index(b - 0x0D)),
        0x11..=0x14 => (TypeTag::Character, width_from_index(b - 0x11)),
        0x15..=0x16 => (TypeTag::Complex, wide_32_64(b - 0x15)),
        0x17..=0x18 => (TypeTag::Raw, wide_32_64(b - 0x17)),
        0x1E => (TypeTag::Attribute, Width::W8),
        0x1F => (TypeTag::Attribute, Width::W32),
        _ => return Err(Qs2Error::UnknownTypeTag(b)),
    };

    let mut buf = [0u8; 8];
    r.get_data(&mut buf[..width.byte_len()])?;
    let length = u64::from_le_bytes(buf);
    Ok(Some((tag, length)))
}

fn width_from_index(i: u8) -> Width {
    match i {
        0 => Width::W8,
        1 => Width::W16,
        2 => Width::W32,
        _ => Width::W64,
    }
}

fn wide_32_64(i: u8) -> Width {
    if i == 0 {
        Width::W32
    } else {
        Width::W64
    }
}

/// A decoded string header (spec section 6): either a byte count or the
/// dedicated missing-string sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringHeader {
    Missing,
    Len(u64),
}

/// Write a string header. Lengths 0..=252 are a single byte; `0xFD`
/// introduces a 16-bit length, `0xFE` a 32-bit length, and `0xFF` is the
/// missing-string sentinel, distinct from any real length prefix.
pub fn write_string_header<S: BlockSink>(w: &mut S, header: StringHeader) -> Result<()> {
    w.set_type_size(1);
    match header {
        StringHeader::Missing => w.push_data(&[0xFF]),
        StringHeader::Len(len) if len <= 252 => w.push_data(&[len as u8]),
        StringHeader::Len(len) if len <= u16::MAX as u64 => {
            let mut bytes = vec![0xFD];
            bytes.extend_from_slice(&(len as u16).to_le_bytes());
            w.push_data(&bytes)
        }
        StringHeader::Len(len) => {
            let mut bytes = vec![0xFE];
            bytes.extend_from_slice(&(len as u32).to_le_bytes());
            w.push_data(&bytes)
        }
    }
}

pub fn read_string_header<S: BlockSource>(r: &mut S) -> Result<StringHeader> {
    r.set_type_size(1);
    let b: u8 = framing::get_pod(r)?;
    match b {
        0xFF => Ok(StringHeader::Missing),
        0xFD => {
            let mut buf = [0u8; 2];
            r.get_data(&mut buf)?;
            Ok(StringHeader::Len(u16::from_le_bytes(buf) as u64))
        }
        0xFE => {
            let mut buf = [0u8; 4];
            r.get_data(&mut buf)?;
            Ok(StringHeader::Len(u32::from_le_bytes(buf) as u64))
        }
        _ => Ok(StringHeader::Len(b as u64)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block_st::{BlockReader, BlockWriter};
    use crate::heuristic::ShuffleHeuristic;
    use crate::io::{MemReader, MemWriter};
    use crate::options::ShuffleMode;

    fn roundtrip_header(tag: TypeTag, length: u64) -> (TypeTag, u64) {
        let mut w = BlockWriter::new(MemWriter::new(), 1, ShuffleMode::Off, ShuffleHeuristic::Threshold);
        write_header(&mut w, tag, length).unwrap();
        let (sink, _) = w.finish().unwrap();
        let mut r = BlockReader::new(MemReader::new(sink.into_inner()));
        read_header(&mut r).unwrap().unwrap()
    }

    #[test]
    fn short_form_roundtrip() {
        assert_eq!(roundtrip_header(TypeTag::Character, 5), (TypeTag::Character, 5));
        assert_eq!(roundtrip_header(TypeTag::List, 31), (TypeTag::List, 31));
    }

    #[test]
    fn long_form_picks_shortest_width() {
        assert_eq!(roundtrip_header(TypeTag::Numeric, 200), (TypeTag::Numeric, 200));
        assert_eq!(roundtrip_header(TypeTag::Numeric, 70_000), (TypeTag::Numeric, 70_000));
    }

    #[test]
    fn complex_and_raw_have_no_short_form() {
        assert_eq!(roundtrip_header(TypeTag::Complex, 3), (TypeTag::Complex, 3));
        assert_eq!(roundtrip_header(TypeTag::Raw, 0), (TypeTag::Raw, 0));
    }

    #[test]
    fn nil_has_no_length() {
        let mut w = BlockWriter::new(MemWriter::new(), 1, ShuffleMode::Off, ShuffleHeuristic::Threshold);
        write_nil(&mut w).unwrap();
        let (sink, _) = w.finish().unwrap();
        let mut r = BlockReader::new(MemReader::new(sink.into_inner()));
        assert_eq!(read_header(&mut r).unwrap(), None);
    }

    #[test]
    fn string_header_roundtrip() {
        for header in [
            StringHeader::Missing,
            StringHeader::Len(0),
            StringHeader::Len(252),
            StringHeader::Len(300),
            StringHeader::Len(70_000),
        ] {
            let mut w = BlockWriter::new(MemWriter::new(), 1, ShuffleMode::Off, ShuffleHeuristic::Threshold);
            write_string_header(&mut w, header).unwrap();
            let (sink, _) = w.finish().unwrap();
            let mut r = BlockReader::new(MemReader::new(sink.into_inner()));
            assert_eq!(read_string_header(&mut r).unwrap(), header);
        }
    }
}
