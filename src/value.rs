//! Serializable values for call arguments and cached results
//!
//! Every argument and result that flows through the cache is a [`Value`].
//! Its `Display` output is the canonical rendering used when deriving
//! cache keys, so it must stay stable across releases.

use crate::error::{RecallError, RecallResult};
use crate::reference::LazyRef;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::mem;

/// A cacheable argument or result value
///
/// Equality compares floats bit for bit (NaN equals NaN) so a stored record
/// containing NaN still matches the record it was computed from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(#[serde(with = "float_repr")] f64),
    Str(String),
    List(Vec<Value>),
    Matrix(Matrix),
    /// Pointer to another cache entry, resolved only on demand
    Ref(LazyRef),
}

impl Value {
    /// Short name of the variant, used in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "string",
            Self::List(_) => "list",
            Self::Matrix(_) => "matrix",
            Self::Ref(_) => "ref",
        }
    }

    /// Whether this value is a lazy reference
    pub fn is_ref(&self) -> bool {
        matches!(self, Self::Ref(_))
    }

    /// Borrow the inner reference, if any
    pub fn as_ref_handle(&self) -> Option<&LazyRef> {
        match self {
            Self::Ref(r) => Some(r),
            _ => None,
        }
    }

    /// Convert into a concrete type
    pub fn into_typed<T: FromValue>(self) -> RecallResult<T> {
        T::from_value(self)
    }

    /// Approximate number of bytes this value occupies in memory
    pub fn estimated_size(&self) -> usize {
        mem::size_of::<Self>() + self.heap_size()
    }

    fn heap_size(&self) -> usize {
        match self {
            Self::Str(s) => s.capacity(),
            Self::List(items) => items.iter().map(Value::estimated_size).sum(),
            Self::Matrix(m) => m.data.capacity() * mem::size_of::<f64>(),
            Self::Ref(r) => r.key().len(),
            Self::Null | Self::Bool(_) | Self::Int(_) | Self::Float(_) => 0,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => same_float(*a, *b),
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::List(a), Self::List(b)) => a == b,
            (Self::Matrix(a), Self::Matrix(b)) => a == b,
            (Self::Ref(a), Self::Ref(b)) => a == b,
            _ => false,
        }
    }
}

/// Bitwise float equality, except that every NaN equals every other NaN
/// (the stored form does not keep NaN payloads)
fn same_float(a: f64, b: f64) -> bool {
    a.to_bits() == b.to_bits() || (a.is_nan() && b.is_nan())
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "nothing"),
            Self::Bool(b) => write!(f, "{}", b),
            Self::Int(i) => write!(f, "{}", i),
            Self::Float(x) => write_float(f, *x),
            Self::Str(s) => write!(f, "{}", s),
            Self::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Self::Matrix(m) => write!(f, "{}", m),
            Self::Ref(r) => write!(f, "{}", r),
        }
    }
}

/// `Debug` on f64 is the shortest form that round-trips and always keeps
/// a decimal point or exponent, so `1.0` never collides with the integer `1`.
fn write_float(f: &mut fmt::Formatter<'_>, x: f64) -> fmt::Result {
    write!(f, "{:?}", x)
}

/// Dense row-major matrix of `f64`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    #[serde(with = "float_repr::seq")]
    data: Vec<f64>,
}

impl PartialEq for Matrix {
    fn eq(&self, other: &Self) -> bool {
        self.rows == other.rows
            && self.cols == other.cols
            && self.data.len() == other.data.len()
            && self
                .data
                .iter()
                .zip(&other.data)
                .all(|(a, b)| same_float(*a, *b))
    }
}

impl Matrix {
    /// Matrix with every element set to `value`
    pub fn filled(rows: usize, cols: usize, value: f64) -> Self {
        Self {
            rows,
            cols,
            data: vec![value; rows * cols],
        }
    }

    pub fn ones(rows: usize, cols: usize) -> Self {
        Self::filled(rows, cols, 1.0)
    }

    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self::filled(rows, cols, 0.0)
    }

    /// Build from row slices; all rows must have the same length
    pub fn from_rows(rows: &[Vec<f64>]) -> RecallResult<Self> {
        let cols = rows.first().map_or(0, Vec::len);
        if rows.iter().any(|r| r.len() != cols) {
            return Err(RecallError::User(
                "matrix rows must all have the same length".to_string(),
            ));
        }
        Ok(Self {
            rows: rows.len(),
            cols,
            data: rows.iter().flatten().copied().collect(),
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        if row < self.rows && col < self.cols {
            self.data.get(row * self.cols + col).copied()
        } else {
            None
        }
    }

    /// Sum of all elements
    pub fn sum(&self) -> f64 {
        self.data.iter().sum()
    }

    /// Element-wise addition
    pub fn add(&self, other: &Matrix) -> RecallResult<Matrix> {
        if self.rows != other.rows || self.cols != other.cols {
            return Err(RecallError::User(format!(
                "cannot add {}x{} matrix to {}x{} matrix",
                other.rows, other.cols, self.rows, self.cols
            )));
        }
        Ok(Self {
            rows: self.rows,
            cols: self.cols,
            data: self
                .data
                .iter()
                .zip(&other.data)
                .map(|(a, b)| a + b)
                .collect(),
        })
    }
}

impl fmt::Display for Matrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for row in 0..self.rows {
            if row > 0 {
                write!(f, "; ")?;
            }
            for col in 0..self.cols {
                if col > 0 {
                    write!(f, " ")?;
                }
                match self.get(row, col) {
                    Some(x) => write_float(f, x)?,
                    None => write!(f, "?")?,
                }
            }
        }
        write!(f, "]")
    }
}

/// Conversion out of a [`Value`] into a concrete Rust type
pub trait FromValue: Sized {
    fn from_value(value: Value) -> RecallResult<Self>;
}

impl FromValue for Value {
    fn from_value(value: Value) -> RecallResult<Self> {
        Ok(value)
    }
}

macro_rules! impl_from_value {
    ($ty:ty, $variant:ident, $name:literal) => {
        impl FromValue for $ty {
            fn from_value(value: Value) -> RecallResult<Self> {
                match value {
                    Value::$variant(inner) => Ok(inner),
                    other => Err(RecallError::type_mismatch($name, other.type_name())),
                }
            }
        }

        impl From<$ty> for Value {
            fn from(inner: $ty) -> Self {
                Value::$variant(inner)
            }
        }
    };
}

impl_from_value!(bool, Bool, "bool");
impl_from_value!(i64, Int, "int");
impl_from_value!(String, Str, "string");
impl_from_value!(Vec<Value>, List, "list");
impl_from_value!(Matrix, Matrix, "matrix");
impl_from_value!(LazyRef, Ref, "ref");

impl FromValue for f64 {
    fn from_value(value: Value) -> RecallResult<Self> {
        match value {
            Value::Float(x) => Ok(x),
            Value::Int(i) => Ok(i as f64),
            other => Err(RecallError::type_mismatch("float", other.type_name())),
        }
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl TryFrom<usize> for Value {
    type Error = RecallError;

    fn try_from(i: usize) -> RecallResult<Self> {
        i64::try_from(i).map(Value::Int).map_err(|_| {
            RecallError::User(format!("{} does not fit in a 64-bit signed integer", i))
        })
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Null
    }
}

/// JSON has no literal for NaN or the infinities: finite floats are written
/// as numbers, the rest as the strings `"NaN"`, `"inf"` and `"-inf"`.
mod float_repr {
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(f64),
        Text(String),
    }

    fn from_repr<E: serde::de::Error>(repr: Repr) -> Result<f64, E> {
        match repr {
            Repr::Number(x) => Ok(x),
            Repr::Text(text) => match text.as_str() {
                "NaN" => Ok(f64::NAN),
                "inf" => Ok(f64::INFINITY),
                "-inf" => Ok(f64::NEG_INFINITY),
                other => Err(E::custom(format!("invalid float {:?}", other))),
            },
        }
    }

    pub fn serialize<S: Serializer>(x: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if x.is_finite() {
            serializer.serialize_f64(*x)
        } else if x.is_nan() {
            serializer.serialize_str("NaN")
        } else if x.is_sign_positive() {
            serializer.serialize_str("inf")
        } else {
            serializer.serialize_str("-inf")
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        from_repr(Repr::deserialize(deserializer)?)
    }

    pub mod seq {
        use serde::{Deserialize, Deserializer, Serialize, Serializer};

        struct Element(f64);

        impl Serialize for Element {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                super::serialize(&self.0, serializer)
            }
        }

        pub fn serialize<S: Serializer>(xs: &[f64], serializer: S) -> Result<S::Ok, S::Error> {
            serializer.collect_seq(xs.iter().map(|x| Element(*x)))
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<f64>, D::Error> {
            Vec::<super::Repr>::deserialize(deserializer)?
                .into_iter()
                .map(super::from_repr)
                .collect()
        }
    }
}
