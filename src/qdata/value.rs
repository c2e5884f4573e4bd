//! The in-memory value model QDATA walks (spec section 3.3, 3.4).
//!
//! Stands in for the host runtime's native object model (out of scope per
//! spec section 1); a real binding would convert to/from this tree at its
//! FFI boundary instead of using it as the host's own representation.

/// A fixed-size vector that can carry missing elements, mirroring the wire
/// representation's sentinel-based missingness (spec section 3.3: "LOGICAL
/// (i32 with sentinel for missing)").
#[derive(Debug, Clone, PartialEq)]
pub struct NullableVec<T>(Vec<Option<T>>);

impl<T> NullableVec<T> {
    pub fn new() -> Self {
        NullableVec(Vec::new())
    }

    pub fn from_vec(v: Vec<Option<T>>) -> Self {
        NullableVec(v)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[Option<T>] {
        &self.0
    }

    pub fn into_inner(self) -> Vec<Option<T>> {
        self.0
    }
}

impl<T> Default for NullableVec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FromIterator<Option<T>> for NullableVec<T> {
    fn from_iter<I: IntoIterator<Item = Option<T>>>(iter: I) -> Self {
        NullableVec(iter.into_iter().collect())
    }
}

/// A logical value in the object graph, without its attributes. List
/// children are [`Tagged`] so every nested value can itself carry
/// attributes (spec section 3.3).
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Nil,
    Logical(NullableVec<bool>),
    Integer(NullableVec<i32>),
    /// Raw bit patterns, not reinterpreted through Rust arithmetic, so an
    /// exact NaN payload round-trips byte-for-byte (spec section 8, S1).
    Numeric(Vec<f64>),
    Complex(Vec<(f64, f64)>),
    Character(Vec<Option<String>>),
    List(Vec<Tagged>),
    Raw(Vec<u8>),
}

impl Value {
    /// Per spec section 3.3: attributes may only be attached to these value
    /// types; everything else (i.e. `Nil`) is dropped with a warning.
    pub fn supports_attributes(&self) -> bool {
        !matches!(self, Value::Nil)
    }
}

/// A value together with its ordered attribute list (spec section 3.3).
#[derive(Debug, Clone, PartialEq)]
pub struct Tagged {
    pub attributes: Attributes,
    pub value: Value,
}

impl Tagged {
    pub fn plain(value: Value) -> Self {
        Tagged {
            attributes: Attributes::new(),
            value,
        }
    }
}

/// Ordered name/value attribute list attached to a [`Tagged`] node.
///
/// `object` is not a separately encoded wire bit: it is derived from the
/// presence of a `class` attribute carrying a non-empty string (spec section
/// 3.3, "the only semantic attribute"), cached here so round-tripped values
/// compare equal without recomputation at every read site.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Attributes {
    pub entries: Vec<(String, Tagged)>,
    pub object: bool,
}

impl Attributes {
    pub fn new() -> Self {
        Attributes::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Append an attribute, recomputing `object` if it is (or was) the
    /// `class` attribute.
    pub fn push(&mut self, name: String, value: Tagged) {
        if name == "class" {
            if let Value::Character(ref strs) = value.value {
                self.object = strs.iter().any(|s| matches!(s, Some(s) if !s.is_empty()));
            }
        }
        self.entries.push((name, value));
    }
}
