//! The tagged value type used for field values, diffs and inbound patches.
//!
//! A single [`Value`] describes three related things:
//! the full value of a field, the partial diff of a composite field
//! (only dirty sub-fields/indices/keys are present),
//! and a patch applied onto live state.

use std::collections::BTreeMap;

use indexmap::IndexMap;

/// Ordered field values of an object or component.
pub type Fields = IndexMap<String, Value>;

/// A field value, partial diff or patch.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// A boolean scalar.
    Bool(bool),
    /// An integer scalar of any declared integer kind.
    Int(i64),
    /// A floating point scalar of any declared float kind.
    Float(f64),
    /// A string scalar.
    Str(String),
    /// Some or all fields of an object.
    Object(Fields),
    /// The full, dense contents of an array.
    Array(Vec<Value>),
    /// Changed indices and deleted indices of an array.
    Sparse(Sparse),
    /// Map entries; `None` means the key was deleted.
    Map(IndexMap<String, Option<Value>>),
}

/// The sparse form of an array diff.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sparse {
    /// Indices that were set, with their new value or partial diff.
    pub set:     BTreeMap<u32, Value>,
    /// Indices that were removed, sorted from high to low.
    pub deleted: Vec<u32>,
}

impl Value {
    /// Returns the name of the variant, used in error messages.
    pub fn variant_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int(_) => "integer",
            Self::Float(_) => "float",
            Self::Str(_) => "string",
            Self::Object(_) => "object",
            Self::Array(_) => "array",
            Self::Sparse(_) => "sparse array",
            Self::Map(_) => "map",
        }
    }

    /// Whether the value is a boolean, number or string.
    pub fn is_scalar(&self) -> bool {
        matches!(self, Self::Bool(_) | Self::Int(_) | Self::Float(_) | Self::Str(_))
    }

    /// Returns the integer if this is an [`Int`](Self::Int).
    pub fn as_int(&self) -> Option<i64> {
        match *self {
            Self::Int(value) => Some(value),
            _ => None,
        }
    }

    /// Returns the number if this is a [`Float`](Self::Float) or an [`Int`](Self::Int).
    pub fn as_float(&self) -> Option<f64> {
        match *self {
            Self::Float(value) => Some(value),
            Self::Int(value) => Some(value as f64),
            _ => None,
        }
    }

    /// Returns the boolean if this is a [`Bool`](Self::Bool).
    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            Self::Bool(value) => Some(value),
            _ => None,
        }
    }

    /// Returns the string if this is a [`Str`](Self::Str).
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(value) => Some(value),
            _ => None,
        }
    }

    /// Returns the fields if this is an [`Object`](Self::Object).
    pub fn as_object(&self) -> Option<&Fields> {
        match self {
            Self::Object(fields) => Some(fields),
            _ => None,
        }
    }
}

impl Sparse {
    /// Whether the diff carries no change.
    pub fn is_empty(&self) -> bool { self.set.is_empty() && self.deleted.is_empty() }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self { Self::Bool(value) }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self { Self::Int(value) }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self { Self::Int(value.into()) }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self { Self::Int(value.into()) }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self { Self::Float(value) }
}

impl From<f32> for Value {
    fn from(value: f32) -> Self { Self::Float(value.into()) }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self { Self::Str(value.to_string()) }
}

impl From<String> for Value {
    fn from(value: String) -> Self { Self::Str(value) }
}

impl From<Fields> for Value {
    fn from(fields: Fields) -> Self { Self::Object(fields) }
}

impl From<Sparse> for Value {
    fn from(sparse: Sparse) -> Self { Self::Sparse(sparse) }
}

/// Builds a [`Fields`] map from `name => value` pairs.
///
/// ```
/// let fields = diffec::fields! { "x" => 1.5, "name" => "bob" };
/// assert_eq!(fields.len(), 2);
/// ```
#[macro_export]
macro_rules! fields {
    ($($name:expr => $value:expr),* $(,)?) => {{
        #[allow(unused_mut)]
        let mut fields = $crate::value::Fields::new();
        $(
            fields.insert(::std::string::String::from($name), $crate::value::Value::from($value));
        )*
        fields
    }};
}
