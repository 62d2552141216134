//! Values that may cross the host/engine boundary.
//!
//! Only primitives, strings and references to engine objects travel across;
//! function values never do (the multiplexer's native callback is installed
//! through a dedicated path, see [`crate::engine::ScriptEngine::add_listener`]).

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{BridgeError, Result};

/// Identifier of an object living inside the script engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EngineRef(pub u64);

impl EngineRef {
    pub const WINDOW: EngineRef = EngineRef(1);
    pub const DOCUMENT: EngineRef = EngineRef(2);

    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for EngineRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "engine#{}", self.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    Null,
    Bool(bool),
    Number(#[serde(with = "wire_number")] f64),
    String(String),
    Object(EngineRef),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    Null,
    Bool,
    Number,
    String,
    Object,
    Any,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::Null => "null",
            ValueKind::Bool => "bool",
            ValueKind::Number => "number",
            ValueKind::String => "string",
            ValueKind::Object => "object",
            ValueKind::Any => "any",
        };
        f.write_str(name)
    }
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Null => ValueKind::Null,
            Value::Bool(_) => ValueKind::Bool,
            Value::Number(_) => ValueKind::Number,
            Value::String(_) => ValueKind::String,
            Value::Object(_) => ValueKind::Object,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

// Numbers compare by bit pattern so results from the two calling modes can be
// checked for exact identity (NaN payloads and signed zero included).
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a.to_bits() == b.to_bits(),
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

mod wire_number {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Serialize, Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Finite(f64),
        Raw { bits: u64 },
    }

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            Repr::Finite(*value).serialize(serializer)
        } else {
            Repr::Raw {
                bits: value.to_bits(),
            }
            .serialize(serializer)
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        Ok(match Repr::deserialize(deserializer)? {
            Repr::Finite(value) => value,
            Repr::Raw { bits } => f64::from_bits(bits),
        })
    }
}

/// Typed extraction of an operation result.
pub trait FromValue: Sized {
    fn from_value(value: Value) -> Result<Self>;
}

fn mismatch(expected: ValueKind, got: &Value) -> BridgeError {
    BridgeError::decode_mismatch(expected.to_string(), format!("got {}", got.kind()))
}

impl FromValue for Value {
    fn from_value(value: Value) -> Result<Self> {
        Ok(value)
    }
}

impl FromValue for () {
    fn from_value(_value: Value) -> Result<Self> {
        Ok(())
    }
}

impl FromValue for bool {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Bool(flag) => Ok(flag),
            other => Err(mismatch(ValueKind::Bool, &other)),
        }
    }
}

impl FromValue for f64 {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Number(number) => Ok(number),
            other => Err(mismatch(ValueKind::Number, &other)),
        }
    }
}

impl FromValue for i64 {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Number(number) if number.fract() == 0.0 && number.is_finite() => {
                Ok(number as i64)
            }
            Value::Number(number) => Err(BridgeError::decode_mismatch(
                "integer",
                format!("{number} is not integral"),
            )),
            other => Err(mismatch(ValueKind::Number, &other)),
        }
    }
}

impl FromValue for u32 {
    fn from_value(value: Value) -> Result<Self> {
        let wide = i64::from_value(value)?;
        u32::try_from(wide)
            .map_err(|_| BridgeError::decode_mismatch("u32", format!("{wide} out of range")))
    }
}

impl FromValue for String {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::String(text) => Ok(text),
            other => Err(mismatch(ValueKind::String, &other)),
        }
    }
}

impl FromValue for EngineRef {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(target) => Ok(target),
            other => Err(mismatch(ValueKind::Object, &other)),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl From<bool> for Value {
    fn from(flag: bool) -> Self {
        Value::Bool(flag)
    }
}

impl From<f64> for Value {
    fn from(number: f64) -> Self {
        Value::Number(number)
    }
}

impl From<i32> for Value {
    fn from(number: i32) -> Self {
        Value::Number(f64::from(number))
    }
}

impl From<u32> for Value {
    fn from(number: u32) -> Self {
        Value::Number(f64::from(number))
    }
}

impl From<&str> for Value {
    fn from(text: &str) -> Self {
        Value::String(text.to_string())
    }
}

impl From<String> for Value {
    fn from(text: String) -> Self {
        Value::String(text)
    }
}

impl From<EngineRef> for Value {
    fn from(target: EngineRef) -> Self {
        Value::Object(target)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_compare_by_bits() {
        assert_eq!(Value::Number(f64::NAN), Value::Number(f64::NAN));
        assert_ne!(Value::Number(0.0), Value::Number(-0.0));
        assert_eq!(Value::Number(1.5), Value::from(1.5));
    }

    #[test]
    fn non_finite_numbers_survive_json() {
        for number in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY, -0.0, 0.1 + 0.2] {
            let encoded = serde_json::to_string(&Value::Number(number)).unwrap();
            let decoded: Value = serde_json::from_str(&encoded).unwrap();
            assert_eq!(decoded, Value::Number(number), "{encoded}");
        }
    }

    #[test]
    fn typed_extraction_reports_mismatch() {
        let err = bool::from_value(Value::from("true")).unwrap_err();
        assert!(matches!(err, BridgeError::DecodeMismatch { .. }));
        assert_eq!(Option::<String>::from_value(Value::Null).unwrap(), None);
        assert_eq!(i64::from_value(Value::from(42)).unwrap(), 42);
        assert!(i64::from_value(Value::from(4.5)).is_err());
    }
}
