//! The in-memory JSON-like value tree.
//!
//! [`Value`] is a tagged union over null, boolean, number, string, array,
//! and object, exactly the six types in spec §3. Strings and child `Value`s
//! are owned, so dropping a `Value` recursively frees its whole subtree;
//! `get` hands callers an owned tree.

use std::{collections::BTreeMap, fmt};
use std::fmt::Write as _;

/// An object's key/value pairs. Insertion order is not preserved across a
/// store/reconstruct round trip (spec §3): the engine rebuilds objects from
/// a lexically ordered cursor scan, so `BTreeMap` costs nothing extra here
/// and gives deterministic iteration for free.
pub type Map = BTreeMap<String, Value>;

/// An ordered sequence of values.
pub type Array = Vec<Value>;

/// A JSON-like value: null, boolean, 64-bit float, UTF-8 string, ordered
/// array, or key-sorted object.
///
/// # Examples
///
/// ```
/// use pathkv::Value;
///
/// let v = Value::Object(
///     [("name".to_string(), Value::String("Alice".into()))]
///         .into_iter()
///         .collect(),
/// );
/// assert_eq!(v.to_string(), r#"{"name":"Alice"}"#);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    /// The JSON `null` literal.
    Null,
    /// `true` or `false`.
    Boolean(bool),
    /// A 64-bit IEEE-754 float. Integers round-trip exactly up to 2^53.
    Number(f64),
    /// A UTF-8 string.
    String(String),
    /// An ordered sequence of values.
    Array(Array),
    /// A key-sorted mapping from UTF-8 keys to values.
    Object(Map),
}

impl Default for Value {
    fn default() -> Self {
        Self::Null
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Boolean(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Number(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Self::Array(v)
    }
}

impl From<Map> for Value {
    fn from(v: Map) -> Self {
        Self::Object(v)
    }
}

impl Value {
    /// `true` if the value is [`Value::Null`].
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// `true` if the value is [`Value::Boolean`].
    #[must_use]
    pub fn is_bool(&self) -> bool {
        matches!(self, Self::Boolean(..))
    }

    /// `true` if the value is [`Value::Number`].
    #[must_use]
    pub fn is_number(&self) -> bool {
        matches!(self, Self::Number(..))
    }

    /// `true` if the value is [`Value::String`].
    #[must_use]
    pub fn is_string(&self) -> bool {
        matches!(self, Self::String(..))
    }

    /// `true` if the value is [`Value::Array`].
    #[must_use]
    pub fn is_array(&self) -> bool {
        matches!(self, Self::Array(..))
    }

    /// `true` if the value is [`Value::Object`].
    #[must_use]
    pub fn is_object(&self) -> bool {
        matches!(self, Self::Object(..))
    }

    /// `true` if the value is a primitive (terminal in the decomposition
    /// scheme): anything but an array or object.
    #[must_use]
    pub fn is_primitive(&self) -> bool {
        !self.is_array() && !self.is_object()
    }
}

fn write_escaped_string<W: fmt::Write>(src: &str, f: &mut W) -> fmt::Result {
    for c in src.chars() {
        match c {
            '"' => f.write_str("\\\"")?,
            '\\' => f.write_str("\\\\")?,
            '\n' => f.write_str("\\n")?,
            '\r' => f.write_str("\\r")?,
            '\t' => f.write_str("\\t")?,
            c if c.is_control() => write!(f, "\\u{:04X}", c as u32)?,
            _ => f.write_char(c)?,
        }
    }
    Ok(())
}

impl fmt::Display for Value {
    /// Renders the value as JSON text. This is a binding convenience for
    /// `pathkv-ffi`'s `get_string`, not part of the engine's own wire
    /// contract (spec §9: event values are binary-codec bytes; JSON text is
    /// layered on top at the FFI boundary).
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Boolean(b) => f.write_str(if *b { "true" } else { "false" }),
            Value::Number(n) => write!(f, "{n}"),
            Value::String(s) => {
                f.write_char('"')?;
                write_escaped_string(s, f)?;
                f.write_char('"')
            }
            Value::Array(arr) => {
                f.write_char('[')?;
                for (i, v) in arr.iter().enumerate() {
                    if i > 0 {
                        f.write_char(',')?;
                    }
                    write!(f, "{v}")?;
                }
                f.write_char(']')
            }
            Value::Object(map) => {
                f.write_char('{')?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        f.write_char(',')?;
                    }
                    f.write_char('"')?;
                    write_escaped_string(k, f)?;
                    write!(f, "\":{v}")?;
                }
                f.write_char('}')
            }
        }
    }
}
