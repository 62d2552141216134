use frontier_bridge::decoder::{self, KeyboardEvent, MouseEvent, WheelEvent};
use frontier_bridge::{BridgeError, DecodedEventRecord, DecoderRegistry, EventFamily};
use proptest::prelude::*;
use serde_json::{json, Map, Value as JsonValue};

const FAMILIES: [EventFamily; 10] = [
    EventFamily::Pointer,
    EventFamily::Mouse,
    EventFamily::Keyboard,
    EventFamily::Touch,
    EventFamily::Drag,
    EventFamily::Wheel,
    EventFamily::Toggle,
    EventFamily::SecurityPolicyViolation,
    EventFamily::Storage,
    EventFamily::Generic,
];

fn full_keyboard_payload() -> Map<String, JsonValue> {
    let JsonValue::Object(fields) = json!({
        "type": "keyup",
        "key": "Shift",
        "code": "ShiftLeft",
        "location": 1,
        "repeat": true,
        "ctrlKey": true,
        "shiftKey": true,
        "altKey": true,
        "metaKey": true,
        "isComposing": true,
    }) else {
        unreachable!()
    };
    fields
}

proptest! {
    #[test]
    fn missing_keyboard_fields_take_defaults(drop_mask in 0u16..(1 << 10)) {
        let full = full_keyboard_payload();
        let kept: Map<String, JsonValue> = full
            .iter()
            .enumerate()
            .filter(|(index, _)| drop_mask & (1 << index) == 0)
            .map(|(_, (key, value))| (key.clone(), value.clone()))
            .collect();
        let missing = |name: &str| !kept.contains_key(name);

        let record = decoder::decode(&JsonValue::Object(kept.clone()), EventFamily::Keyboard)
            .expect("partial payload decodes");
        let DecodedEventRecord::Keyboard(event) = record else {
            panic!("expected keyboard record");
        };

        prop_assert_eq!(event.key.is_empty(), missing("key"));
        prop_assert_eq!(event.code.is_empty(), missing("code"));
        prop_assert_eq!(event.location == 0, missing("location"));
        prop_assert_eq!(event.repeat, !missing("repeat"));
        prop_assert_eq!(event.ctrl_key, !missing("ctrlKey"));
        prop_assert_eq!(event.shift_key, !missing("shiftKey"));
        prop_assert_eq!(event.alt_key, !missing("altKey"));
        prop_assert_eq!(event.meta_key, !missing("metaKey"));
        prop_assert_eq!(event.is_composing, !missing("isComposing"));
        prop_assert_eq!(event.event_type.is_empty(), missing("type"));
    }

    #[test]
    fn non_object_payloads_never_decode(
        payload in prop_oneof![
            Just(JsonValue::Null),
            any::<bool>().prop_map(JsonValue::Bool),
            any::<i64>().prop_map(|n| json!(n)),
            ".{0,12}".prop_map(JsonValue::String),
            prop::collection::vec(any::<u8>(), 0..4).prop_map(|items| json!(items)),
        ],
        family in prop::sample::select(FAMILIES.to_vec()),
    ) {
        let err = decoder::decode(&payload, family).unwrap_err();
        let is_mismatch = matches!(err, BridgeError::DecodeMismatch { .. });
        prop_assert!(is_mismatch);
    }
}

#[test]
fn empty_payload_is_all_defaults_for_every_family() {
    for family in FAMILIES {
        let record = decoder::decode(&json!({}), family).expect("empty payload");
        assert_eq!(record.family(), family);
    }
    assert_eq!(
        decoder::decode(&json!({}), EventFamily::Keyboard).expect("keyboard"),
        DecodedEventRecord::Keyboard(KeyboardEvent::default())
    );
}

#[test]
fn unknown_fields_are_ignored() {
    let record = decoder::decode(
        &json!({"deltaY": -120.0, "deltaMode": 0, "wheelDelta": 120, "sourceCapabilities": {"firesTouchEvents": false}}),
        EventFamily::Wheel,
    )
    .expect("wheel");
    assert_eq!(
        record,
        DecodedEventRecord::Wheel(WheelEvent {
            delta_y: -120.0,
            ..WheelEvent::default()
        })
    );
}

#[test]
fn wrongly_typed_declared_field_is_a_mismatch() {
    let err = decoder::decode(&json!({"clientX": "12px"}), EventFamily::Mouse).unwrap_err();
    assert!(matches!(
        err,
        BridgeError::DecodeMismatch { ref expected, .. } if expected == "MouseEvent"
    ));
}

#[test]
fn registry_decodes_by_event_name() {
    let registry = DecoderRegistry::default();
    let click = registry.describe_event("click");
    let record = registry
        .decode(&json!({"button": 2, "clientX": 10.5, "type": "click"}), &click)
        .expect("click");
    assert_eq!(
        record,
        DecodedEventRecord::Mouse(MouseEvent {
            button: 2,
            client_x: 10.5,
            event_type: "click".to_string(),
            ..MouseEvent::default()
        })
    );

    // Timing-sensitive media events carry no family-specific fields.
    let stalled = registry.describe_event("stalled");
    let record = registry.decode(&json!({"type": "stalled"}), &stalled).expect("stalled");
    assert_eq!(record.family(), EventFamily::Generic);
}
