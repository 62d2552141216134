//! Event and operation schemas, and the tolerant payload decoder.

pub mod records;

use std::collections::HashMap;
use std::fmt;

use serde::de::DeserializeOwned;
use serde_json::{Map as JsonMap, Value as JsonValue};

use crate::engine::RawPayload;
use crate::error::{BridgeError, Result};
use crate::value::{Value, ValueKind};

pub use records::{
    DataTransfer, DataTransferItem, DecodedEventRecord, DragEvent, EventRecord, GenericEvent,
    KeyboardEvent, MouseEvent, PointerEvent, SecurityPolicyViolationEvent, StorageEvent,
    ToggleEvent, TouchEvent, TouchPoint, WheelEvent,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventFamily {
    Pointer,
    Mouse,
    Keyboard,
    Touch,
    Drag,
    Wheel,
    Toggle,
    SecurityPolicyViolation,
    Storage,
    Generic,
}

impl fmt::Display for EventFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventFamily::Pointer => "PointerEvent",
            EventFamily::Mouse => "MouseEvent",
            EventFamily::Keyboard => "KeyboardEvent",
            EventFamily::Touch => "TouchEvent",
            EventFamily::Drag => "DragEvent",
            EventFamily::Wheel => "WheelEvent",
            EventFamily::Toggle => "ToggleEvent",
            EventFamily::SecurityPolicyViolation => "SecurityPolicyViolationEvent",
            EventFamily::Storage => "StorageEvent",
            EventFamily::Generic => "Event",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EventDescriptor {
    pub name: String,
    pub family: EventFamily,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationTag {
    Get,
    Set,
    Invoke,
}

/// Declared result shape of a remote member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationShape {
    pub member: String,
    pub kind: OperationTag,
    pub returns: ValueKind,
    pub nullable: bool,
}

impl OperationShape {
    pub fn property(member: impl Into<String>, returns: ValueKind) -> Self {
        Self {
            member: member.into(),
            kind: OperationTag::Get,
            returns,
            nullable: false,
        }
    }

    pub fn method(member: impl Into<String>, returns: ValueKind) -> Self {
        Self {
            member: member.into(),
            kind: OperationTag::Invoke,
            returns,
            nullable: false,
        }
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    fn accepts(&self, value: &Value) -> bool {
        match (self.returns, value) {
            (ValueKind::Any, _) => true,
            (_, Value::Null) => self.nullable || self.returns == ValueKind::Null,
            (expected, value) => value.kind() == expected,
        }
    }
}

const DEFAULT_EVENTS: &[(&str, EventFamily)] = &[
    ("click", EventFamily::Mouse),
    ("dblclick", EventFamily::Mouse),
    ("contextmenu", EventFamily::Mouse),
    ("mousedown", EventFamily::Mouse),
    ("mouseup", EventFamily::Mouse),
    ("mouseover", EventFamily::Mouse),
    ("mousemove", EventFamily::Mouse),
    ("mouseout", EventFamily::Mouse),
    ("mouseenter", EventFamily::Mouse),
    ("mouseleave", EventFamily::Mouse),
    ("pointerdown", EventFamily::Pointer),
    ("pointerup", EventFamily::Pointer),
    ("pointermove", EventFamily::Pointer),
    ("pointerover", EventFamily::Pointer),
    ("pointerout", EventFamily::Pointer),
    ("pointerenter", EventFamily::Pointer),
    ("pointerleave", EventFamily::Pointer),
    ("pointercancel", EventFamily::Pointer),
    ("gotpointercapture", EventFamily::Pointer),
    ("lostpointercapture", EventFamily::Pointer),
    ("keydown", EventFamily::Keyboard),
    ("keyup", EventFamily::Keyboard),
    ("keypress", EventFamily::Keyboard),
    ("touchstart", EventFamily::Touch),
    ("touchend", EventFamily::Touch),
    ("touchmove", EventFamily::Touch),
    ("touchcancel", EventFamily::Touch),
    ("drag", EventFamily::Drag),
    ("dragstart", EventFamily::Drag),
    ("dragend", EventFamily::Drag),
    ("dragenter", EventFamily::Drag),
    ("dragleave", EventFamily::Drag),
    ("dragover", EventFamily::Drag),
    ("drop", EventFamily::Drag),
    ("wheel", EventFamily::Wheel),
    ("mousewheel", EventFamily::Wheel),
    ("toggle", EventFamily::Toggle),
    ("beforetoggle", EventFamily::Toggle),
    ("securitypolicyviolation", EventFamily::SecurityPolicyViolation),
    ("storage", EventFamily::Storage),
];

pub struct DecoderRegistry {
    events: HashMap<String, EventFamily>,
    operations: HashMap<String, OperationShape>,
}

impl Default for DecoderRegistry {
    fn default() -> Self {
        let events = DEFAULT_EVENTS
            .iter()
            .map(|(name, family)| (name.to_string(), *family))
            .collect();
        Self {
            events,
            operations: HashMap::new(),
        }
    }
}

impl DecoderRegistry {
    /// A registry without the standard event table; every name is generic.
    pub fn empty() -> Self {
        Self {
            events: HashMap::new(),
            operations: HashMap::new(),
        }
    }

    pub fn register_event(&mut self, name: impl Into<String>, family: EventFamily) {
        self.events.insert(name.into(), family);
    }

    pub fn register_operation(&mut self, shape: OperationShape) {
        self.operations.insert(shape.member.clone(), shape);
    }

    pub fn describe_event(&self, name: &str) -> EventDescriptor {
        let family = self
            .events
            .get(name)
            .copied()
            .unwrap_or(EventFamily::Generic);
        EventDescriptor {
            name: name.to_string(),
            family,
        }
    }

    pub fn describe_operation(&self, member: &str) -> Option<&OperationShape> {
        self.operations.get(member)
    }

    /// Rejects a result that contradicts the member's registered shape.
    pub fn check_result(&self, member: &str, tag: OperationTag, value: &Value) -> Result<()> {
        let Some(shape) = self.operations.get(member) else {
            return Ok(());
        };
        if shape.kind != tag || tag == OperationTag::Set {
            return Ok(());
        }
        if shape.accepts(value) {
            Ok(())
        } else {
            Err(BridgeError::decode_mismatch(
                format!("{member}: {}", shape.returns),
                format!("remote returned {}", value.kind()),
            ))
        }
    }

    pub fn decode(
        &self,
        payload: &RawPayload,
        descriptor: &EventDescriptor,
    ) -> Result<DecodedEventRecord> {
        decode(payload, descriptor.family)
    }
}

/// Decodes a raw payload into the record for `family`.
///
/// `null` is treated as an absent field. A declared field carrying a value of
/// the wrong JSON type, or a payload that is not an object at all, is a
/// mismatch.
pub fn decode(payload: &RawPayload, family: EventFamily) -> Result<DecodedEventRecord> {
    let JsonValue::Object(fields) = payload else {
        return Err(BridgeError::decode_mismatch(
            family.to_string(),
            format!("payload is {}, not an object", json_kind(payload)),
        ));
    };
    let cleaned = JsonValue::Object(strip_nulls(fields));

    let record = match family {
        EventFamily::Pointer => DecodedEventRecord::Pointer(parse(cleaned, family)?),
        EventFamily::Mouse => DecodedEventRecord::Mouse(parse(cleaned, family)?),
        EventFamily::Keyboard => DecodedEventRecord::Keyboard(parse(cleaned, family)?),
        EventFamily::Touch => DecodedEventRecord::Touch(parse(cleaned, family)?),
        EventFamily::Drag => DecodedEventRecord::Drag(parse(cleaned, family)?),
        EventFamily::Wheel => DecodedEventRecord::Wheel(parse(cleaned, family)?),
        EventFamily::Toggle => DecodedEventRecord::Toggle(parse(cleaned, family)?),
        EventFamily::SecurityPolicyViolation => {
            DecodedEventRecord::SecurityPolicyViolation(parse(cleaned, family)?)
        }
        EventFamily::Storage => DecodedEventRecord::Storage(parse(cleaned, family)?),
        EventFamily::Generic => DecodedEventRecord::Generic(parse(cleaned, family)?),
    };
    Ok(record)
}

fn parse<T: DeserializeOwned>(payload: JsonValue, family: EventFamily) -> Result<T> {
    serde_json::from_value(payload).map_err(|err| BridgeError::decode_mismatch(family.to_string(), err))
}

fn strip_nulls(fields: &JsonMap<String, JsonValue>) -> JsonMap<String, JsonValue> {
    fields
        .iter()
        .filter(|(_, value)| !value.is_null())
        .map(|(key, value)| {
            let value = match value {
                JsonValue::Object(nested) => JsonValue::Object(strip_nulls(nested)),
                JsonValue::Array(items) => JsonValue::Array(
                    items
                        .iter()
                        .map(|item| match item {
                            JsonValue::Object(nested) => JsonValue::Object(strip_nulls(nested)),
                            other => other.clone(),
                        })
                        .collect(),
                ),
                other => other.clone(),
            };
            (key.clone(), value)
        })
        .collect()
}

fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "a boolean",
        JsonValue::Number(_) => "a number",
        JsonValue::String(_) => "a string",
        JsonValue::Array(_) => "an array",
        JsonValue::Object(_) => "an object",
    }
}
