//! Typed dynamic values carried in method arguments, replies and signals.
//!
//! The transport converts its own wire representation into `Value` so the
//! rest of the interpreter never depends on the bus library's types.

use std::fmt;

/// One decoded bus value. Variants (the `v` type) are unwrapped on decode.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Byte(u8),
    Int(i64),
    UInt(u64),
    Double(f64),
    Str(String),
    Path(String),
    Array(Vec<Value>),
    /// Dictionary entries in wire order.
    Dict(Vec<(String, Value)>),
    Struct(Vec<Value>),
}

impl Value {
    pub fn str(s: impl Into<String>) -> Self {
        Value::Str(s.into())
    }

    pub fn path(p: impl Into<String>) -> Self {
        Value::Path(p.into())
    }

    /// Build a string array from borrowed tokens.
    pub fn str_array<S: AsRef<str>>(items: &[S]) -> Self {
        Value::Array(items.iter().map(|s| Value::str(s.as_ref())).collect())
    }

    /// Build a dictionary from `(key, value)` pairs.
    pub fn dict<K: Into<String>>(entries: impl IntoIterator<Item = (K, Value)>) -> Self {
        Value::Dict(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) | Value::Path(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_dict(&self) -> Option<&[(String, Value)]> {
        match self {
            Value::Dict(entries) => Some(entries),
            _ => None,
        }
    }

    pub fn as_struct(&self) -> Option<&[Value]> {
        match self {
            Value::Struct(fields) => Some(fields),
            _ => None,
        }
    }

    /// Dictionary lookup by key (first match).
    #[cfg(test)]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_dict()?
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    /// Convert into a JSON view (used by `--json` output).
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as J;
        match self {
            Value::Bool(b) => J::Bool(*b),
            Value::Byte(n) => J::from(*n),
            Value::Int(n) => J::from(*n),
            Value::UInt(n) => J::from(*n),
            Value::Double(n) => serde_json::Number::from_f64(*n)
                .map(J::Number)
                .unwrap_or(J::Null),
            Value::Str(s) | Value::Path(s) => J::String(s.clone()),
            Value::Array(items) | Value::Struct(items) => {
                J::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Dict(entries) => J::Object(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }
}

impl fmt::Display for Value {
    /// Inline rendering: `True`/`False`, `[ a b ]` arrays, `{ k=v }` dicts.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(true) => f.write_str("True"),
            Value::Bool(false) => f.write_str("False"),
            Value::Byte(n) => write!(f, "{n}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::UInt(n) => write!(f, "{n}"),
            Value::Double(n) => write!(f, "{n}"),
            Value::Str(s) | Value::Path(s) => f.write_str(s),
            Value::Array(items) => {
                f.write_str("[ ")?;
                for item in items {
                    write!(f, "{item} ")?;
                }
                f.write_str("]")
            }
            Value::Struct(fields) => {
                f.write_str("( ")?;
                for field in fields {
                    write!(f, "{field} ")?;
                }
                f.write_str(")")
            }
            Value::Dict(entries) => {
                f.write_str("{ ")?;
                for (k, v) in entries {
                    write!(f, "{k}={v} ")?;
                }
                f.write_str("}")
            }
        }
    }
}
