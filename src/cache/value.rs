//! Cache Value Module
//!
//! Typed values accepted by the cache and the type tags that identify them
//! in storage.

use std::fmt;
use std::str::FromStr;

use serde_json::{Map, Value};

use crate::error::{CacheError, Result};

/// JSON object used for record values.
pub type Record = Map<String, Value>;

// == Type Tag ==
/// Identifies how a stored payload must be decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeTag {
    Text,
    Number,
    Boolean,
    Record,
    TextList,
    NumberList,
    BooleanList,
    RecordList,
}

impl TypeTag {
    pub const ALL: [TypeTag; 8] = [
        TypeTag::Text,
        TypeTag::Number,
        TypeTag::Boolean,
        TypeTag::Record,
        TypeTag::TextList,
        TypeTag::NumberList,
        TypeTag::BooleanList,
        TypeTag::RecordList,
    ];

    /// Wire name of the tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            TypeTag::Text => "string",
            TypeTag::Number => "number",
            TypeTag::Boolean => "boolean",
            TypeTag::Record => "object",
            TypeTag::TextList => "string[]",
            TypeTag::NumberList => "number[]",
            TypeTag::BooleanList => "boolean[]",
            TypeTag::RecordList => "object[]",
        }
    }

}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TypeTag {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self> {
        TypeTag::ALL
            .into_iter()
            .find(|tag| tag.as_str() == s)
            .ok_or_else(|| CacheError::decode(format!("unknown type tag '{s}'")))
    }
}

// == Cache Value ==
/// A value that can be stored in and recovered from the cache with its type.
///
/// Sequences are homogeneous by construction, so an empty sequence still
/// carries its element type.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheValue {
    Text(String),
    Number(f64),
    Boolean(bool),
    Record(Record),
    TextList(Vec<String>),
    NumberList(Vec<f64>),
    BooleanList(Vec<bool>),
    RecordList(Vec<Record>),
}

impl CacheValue {
    /// Returns the tag this value is stored under.
    pub fn tag(&self) -> TypeTag {
        match self {
            CacheValue::Text(_) => TypeTag::Text,
            CacheValue::Number(_) => TypeTag::Number,
            CacheValue::Boolean(_) => TypeTag::Boolean,
            CacheValue::Record(_) => TypeTag::Record,
            CacheValue::TextList(_) => TypeTag::TextList,
            CacheValue::NumberList(_) => TypeTag::NumberList,
            CacheValue::BooleanList(_) => TypeTag::BooleanList,
            CacheValue::RecordList(_) => TypeTag::RecordList,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            CacheValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CacheValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            CacheValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            CacheValue::Record(r) => Some(r),
            _ => None,
        }
    }

    // == From JSON ==
    /// Classifies an untyped JSON value.
    ///
    /// Arrays take their element type from the first element. Empty arrays,
    /// mixed arrays, `null` and nested arrays are rejected.
    pub fn from_json(value: Value) -> Result<Self> {
        match value {
            Value::String(s) => Ok(CacheValue::Text(s)),
            Value::Bool(b) => Ok(CacheValue::Boolean(b)),
            Value::Number(n) => n
                .as_f64()
                .map(CacheValue::Number)
                .ok_or_else(|| CacheValue::unsupported(&Value::Number(n))),
            Value::Object(map) => Ok(CacheValue::Record(map)),
            Value::Array(items) => CacheValue::from_json_array(items),
            Value::Null => Err(CacheValue::unsupported(&Value::Null)),
        }
    }

    fn from_json_array(items: Vec<Value>) -> Result<Self> {
        let tag = match items.first() {
            None => return Err(CacheError::EmptySequence),
            Some(Value::String(_)) => TypeTag::TextList,
            Some(Value::Number(_)) => TypeTag::NumberList,
            Some(Value::Bool(_)) => TypeTag::BooleanList,
            Some(Value::Object(_)) => TypeTag::RecordList,
            Some(other) => return Err(CacheValue::unsupported(other)),
        };

        let items = items.into_iter();
        match tag {
            TypeTag::TextList => items
                .map(|item| match item {
                    Value::String(s) => Ok(s),
                    _ => Err(CacheError::MixedSequence),
                })
                .collect::<Result<Vec<_>>>()
                .map(CacheValue::TextList),
            TypeTag::NumberList => items
                .map(|item| match item {
                    Value::Number(n) => n.as_f64().ok_or(CacheError::MixedSequence),
                    _ => Err(CacheError::MixedSequence),
                })
                .collect::<Result<Vec<_>>>()
                .map(CacheValue::NumberList),
            TypeTag::BooleanList => items
                .map(|item| match item {
                    Value::Bool(b) => Ok(b),
                    _ => Err(CacheError::MixedSequence),
                })
                .collect::<Result<Vec<_>>>()
                .map(CacheValue::BooleanList),
            _ => items
                .map(|item| match item {
                    Value::Object(map) => Ok(map),
                    _ => Err(CacheError::MixedSequence),
                })
                .collect::<Result<Vec<_>>>()
                .map(CacheValue::RecordList),
        }
    }

    fn unsupported(value: &Value) -> CacheError {
        CacheError::UnsupportedValue(format!("{value} has no cache representation"))
    }

    // == Into JSON ==
    /// Converts into an untyped JSON value. Non-finite numbers become `null`.
    pub fn into_json(self) -> Value {
        let number = |n: f64| {
            serde_json::Number::from_f64(n)
                .map(Value::Number)
                .unwrap_or(Value::Null)
        };

        match self {
            CacheValue::Text(s) => Value::String(s),
            CacheValue::Number(n) => number(n),
            CacheValue::Boolean(b) => Value::Bool(b),
            CacheValue::Record(map) => Value::Object(map),
            CacheValue::TextList(items) => items.into_iter().map(Value::String).collect(),
            CacheValue::NumberList(items) => items.into_iter().map(number).collect(),
            CacheValue::BooleanList(items) => items.into_iter().map(Value::Bool).collect(),
            CacheValue::RecordList(items) => items.into_iter().map(Value::Object).collect(),
        }
    }
}

impl TryFrom<Value> for CacheValue {
    type Error = CacheError;

    fn try_from(value: Value) -> Result<Self> {
        CacheValue::from_json(value)
    }
}

// == Conversions ==
impl From<&str> for CacheValue {
    fn from(value: &str) -> Self {
        CacheValue::Text(value.to_string())
    }
}

impl From<String> for CacheValue {
    fn from(value: String) -> Self {
        CacheValue::Text(value)
    }
}

impl From<f64> for CacheValue {
    fn from(value: f64) -> Self {
        CacheValue::Number(value)
    }
}

impl From<i32> for CacheValue {
    fn from(value: i32) -> Self {
        CacheValue::Number(f64::from(value))
    }
}

impl From<u32> for CacheValue {
    fn from(value: u32) -> Self {
        CacheValue::Number(f64::from(value))
    }
}

impl From<i64> for CacheValue {
    fn from(value: i64) -> Self {
        CacheValue::Number(value as f64)
    }
}

impl From<bool> for CacheValue {
    fn from(value: bool) -> Self {
        CacheValue::Boolean(value)
    }
}

impl From<Record> for CacheValue {
    fn from(value: Record) -> Self {
        CacheValue::Record(value)
    }
}

impl From<Vec<String>> for CacheValue {
    fn from(value: Vec<String>) -> Self {
        CacheValue::TextList(value)
    }
}

impl From<Vec<&str>> for CacheValue {
    fn from(value: Vec<&str>) -> Self {
        CacheValue::TextList(value.into_iter().map(str::to_string).collect())
    }
}

impl From<Vec<f64>> for CacheValue {
    fn from(value: Vec<f64>) -> Self {
        CacheValue::NumberList(value)
    }
}

impl From<Vec<i64>> for CacheValue {
    fn from(value: Vec<i64>) -> Self {
        CacheValue::NumberList(value.into_iter().map(|n| n as f64).collect())
    }
}

impl From<Vec<bool>> for CacheValue {
    fn from(value: Vec<bool>) -> Self {
        CacheValue::BooleanList(value)
    }
}

impl From<Vec<Record>> for CacheValue {
    fn from(value: Vec<Record>) -> Self {
        CacheValue::RecordList(value)
    }
}
