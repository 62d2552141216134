//! Typed event records, one per event family.
//!
//! Every struct is `#[serde(default)]`: absent fields take the family default
//! and unknown fields are ignored. Field names follow the engine's own
//! spelling so payloads decode without a translation table.

use serde::{Deserialize, Serialize};

use super::EventFamily;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MouseEvent {
    pub detail: i64,
    pub screen_x: f64,
    pub screen_y: f64,
    pub client_x: f64,
    pub client_y: f64,
    pub offset_x: f64,
    pub offset_y: f64,
    pub page_x: f64,
    pub page_y: f64,
    pub movement_x: f64,
    pub movement_y: f64,
    pub button: i64,
    pub buttons: i64,
    pub ctrl_key: bool,
    pub shift_key: bool,
    pub alt_key: bool,
    pub meta_key: bool,
    #[serde(rename = "type")]
    pub event_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PointerEvent {
    #[serde(flatten)]
    pub mouse: MouseEvent,
    pub pointer_id: i64,
    pub width: f64,
    pub height: f64,
    pub pressure: f64,
    pub tilt_x: f64,
    pub tilt_y: f64,
    pub pointer_type: String,
    pub is_primary: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct KeyboardEvent {
    pub key: String,
    pub code: String,
    pub location: u32,
    pub repeat: bool,
    pub ctrl_key: bool,
    pub shift_key: bool,
    pub alt_key: bool,
    pub meta_key: bool,
    pub is_composing: bool,
    #[serde(rename = "type")]
    pub event_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TouchPoint {
    pub identifier: i64,
    pub screen_x: f64,
    pub screen_y: f64,
    pub client_x: f64,
    pub client_y: f64,
    pub page_x: f64,
    pub page_y: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TouchEvent {
    pub detail: i64,
    pub touches: Vec<TouchPoint>,
    pub target_touches: Vec<TouchPoint>,
    pub changed_touches: Vec<TouchPoint>,
    pub ctrl_key: bool,
    pub shift_key: bool,
    pub alt_key: bool,
    pub meta_key: bool,
    #[serde(rename = "type")]
    pub event_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataTransferItem {
    pub kind: String,
    #[serde(rename = "type")]
    pub item_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DataTransfer {
    pub drop_effect: String,
    pub effect_allowed: String,
    pub files: Vec<String>,
    pub items: Vec<DataTransferItem>,
    pub types: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DragEvent {
    #[serde(flatten)]
    pub mouse: MouseEvent,
    pub data_transfer: DataTransfer,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WheelEvent {
    #[serde(flatten)]
    pub mouse: MouseEvent,
    pub delta_x: f64,
    pub delta_y: f64,
    pub delta_z: f64,
    pub delta_mode: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ToggleEvent {
    pub old_state: String,
    pub new_state: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SecurityPolicyViolationEvent {
    #[serde(rename = "blockedURI")]
    pub blocked_uri: String,
    pub column_number: i64,
    pub disposition: String,
    #[serde(rename = "documentURI")]
    pub document_uri: String,
    pub effective_directive: String,
    pub line_number: i64,
    pub original_policy: String,
    pub referrer: String,
    pub sample: String,
    pub source_file: String,
    pub status_code: i64,
    pub violated_directive: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StorageEvent {
    pub key: Option<String>,
    pub new_value: Option<String>,
    pub old_value: Option<String>,
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GenericEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub bubbles: bool,
    pub cancelable: bool,
    pub time_stamp: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "family", rename_all = "snake_case")]
pub enum DecodedEventRecord {
    Pointer(PointerEvent),
    Mouse(MouseEvent),
    Keyboard(KeyboardEvent),
    Touch(TouchEvent),
    Drag(DragEvent),
    Wheel(WheelEvent),
    Toggle(ToggleEvent),
    SecurityPolicyViolation(SecurityPolicyViolationEvent),
    Storage(StorageEvent),
    Generic(GenericEvent),
}

impl DecodedEventRecord {
    pub fn family(&self) -> EventFamily {
        match self {
            DecodedEventRecord::Pointer(_) => EventFamily::Pointer,
            DecodedEventRecord::Mouse(_) => EventFamily::Mouse,
            DecodedEventRecord::Keyboard(_) => EventFamily::Keyboard,
            DecodedEventRecord::Touch(_) => EventFamily::Touch,
            DecodedEventRecord::Drag(_) => EventFamily::Drag,
            DecodedEventRecord::Wheel(_) => EventFamily::Wheel,
            DecodedEventRecord::Toggle(_) => EventFamily::Toggle,
            DecodedEventRecord::SecurityPolicyViolation(_) => {
                EventFamily::SecurityPolicyViolation
            }
            DecodedEventRecord::Storage(_) => EventFamily::Storage,
            DecodedEventRecord::Generic(_) => EventFamily::Generic,
        }
    }
}

/// A concrete record type a subscriber can ask for directly.
pub trait EventRecord: Send + Sync + 'static {
    const FAMILY: EventFamily;

    fn from_decoded(record: &DecodedEventRecord) -> Option<&Self>;
}

macro_rules! event_record {
    ($record:ty, $variant:ident) => {
        impl EventRecord for $record {
            const FAMILY: EventFamily = EventFamily::$variant;

            fn from_decoded(record: &DecodedEventRecord) -> Option<&Self> {
                match record {
                    DecodedEventRecord::$variant(inner) => Some(inner),
                    _ => None,
                }
            }
        }
    };
}

event_record!(PointerEvent, Pointer);
event_record!(MouseEvent, Mouse);
event_record!(KeyboardEvent, Keyboard);
event_record!(TouchEvent, Touch);
event_record!(DragEvent, Drag);
event_record!(WheelEvent, Wheel);
event_record!(ToggleEvent, Toggle);
event_record!(SecurityPolicyViolationEvent, SecurityPolicyViolation);
event_record!(StorageEvent, Storage);
event_record!(GenericEvent, Generic);
