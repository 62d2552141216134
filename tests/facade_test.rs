use std::sync::Arc;
use std::time::Duration;

use frontier_bridge::config::BridgeConfig;
use frontier_bridge::decoder::{OperationShape, StorageEvent, ToggleEvent};
use frontier_bridge::engine::RemoteError;
use frontier_bridge::value::ValueKind;
use frontier_bridge::{
    duplex, Bridge, BridgeError, CallingMode, DecoderRegistry, EngineEndpoint, EngineRef,
    MemoryEngine, ScriptEngine, Value,
};
use parking_lot::Mutex;
use serde_json::json;

/// A small page: a document with one dialog and one video.
struct Page {
    engine: Arc<MemoryEngine>,
    dialog: EngineRef,
    video: EngineRef,
}

fn page() -> Page {
    let engine = Arc::new(MemoryEngine::new());
    let dialog = engine.create_object();
    let video = engine.create_object();

    engine.define_property(EngineRef::WINDOW, "innerWidth", 1280.0);
    engine.define_property(EngineRef::WINDOW, "innerHeight", 720.0);
    engine.define_property(EngineRef::WINDOW, "scrollX", 0.0);
    engine.define_property(EngineRef::WINDOW, "scrollY", 0.0);
    engine.define_method(EngineRef::WINDOW, "scrollTo", |engine, target, args| {
        let (Some(x), Some(y)) = (args.first(), args.get(1)) else {
            return Err(RemoteError::type_error("scrollTo requires 2 arguments"));
        };
        engine.define_property(target, "scrollX", x.clone());
        engine.define_property(target, "scrollY", y.clone());
        Ok(Value::Null)
    });

    engine.define_property(EngineRef::DOCUMENT, "title", "Page");
    engine.define_property(EngineRef::DOCUMENT, "hidden", false);
    engine.define_property(EngineRef::DOCUMENT, "visibilityState", "visible");
    engine.define_method(EngineRef::DOCUMENT, "getElementById", move |_, _, args| {
        Ok(match args.first() {
            Some(Value::String(id)) if id == "dialog" => Value::Object(dialog),
            Some(Value::String(id)) if id == "video" => Value::Object(video),
            _ => Value::Null,
        })
    });
    engine.define_method(EngineRef::DOCUMENT, "querySelector", move |_, _, args| {
        Ok(match args.first() {
            Some(Value::String(selector)) if selector == "dialog" => Value::Object(dialog),
            _ => Value::Null,
        })
    });

    engine.define_property(dialog, "id", "dialog");
    engine.define_property(dialog, "open", false);
    engine.define_property(dialog, "returnValue", "");
    engine.define_method(dialog, "showModal", |engine, target, _| {
        engine.define_property(target, "open", true);
        engine.dispatch(target, "toggle", &json!({"oldState": "closed", "newState": "open"}));
        Ok(Value::Null)
    });
    engine.define_method(dialog, "close", |engine, target, args| {
        if let Some(value) = args.first() {
            engine.define_property(target, "returnValue", value.clone());
        }
        engine.define_property(target, "open", false);
        engine.dispatch(target, "toggle", &json!({"oldState": "open", "newState": "closed"}));
        Ok(Value::Null)
    });
    engine.define_method(dialog, "getAttribute", |engine, target, args| match args.first() {
        Some(Value::String(name)) => Ok(engine.property(target, name).unwrap_or(Value::Null)),
        _ => Ok(Value::Null),
    });
    engine.define_method(dialog, "setAttribute", |engine, target, args| {
        if let (Some(Value::String(name)), Some(value)) = (args.first(), args.get(1)) {
            engine.define_property(target, name, value.clone());
        }
        Ok(Value::Null)
    });

    engine.define_property(video, "currentTime", 0.0);
    engine.define_property(video, "volume", 1.0);
    engine.define_property(video, "paused", true);
    engine.define_method(video, "play", |engine, target, _| {
        engine.define_property(target, "paused", false);
        Ok(Value::Null)
    });
    engine.define_method(video, "pause", |engine, target, _| {
        engine.define_property(target, "paused", true);
        Ok(Value::Null)
    });

    Page {
        engine,
        dialog,
        video,
    }
}

fn in_process(page: &Page) -> Arc<Bridge> {
    Bridge::builder()
        .config(BridgeConfig::default().with_mode(CallingMode::InProcess))
        .in_process(page.engine.clone())
        .build()
        .expect("bridge")
}

fn out_of_process(page: &Page) -> (Arc<Bridge>, EngineEndpoint) {
    let (host, engine_side) = duplex();
    let endpoint = EngineEndpoint::spawn(page.engine.clone() as Arc<dyn ScriptEngine>, engine_side)
        .expect("endpoint");
    let bridge = Bridge::builder()
        .config(BridgeConfig::default().with_call_timeout(Duration::from_secs(5)))
        .connect(host)
        .build()
        .expect("bridge");
    (bridge, endpoint)
}

async fn exercise_document(bridge: &Arc<Bridge>) {
    let document = bridge.document().expect("document");
    assert_eq!(document.title().await.expect("title"), "Page");
    document.set_title("Renamed".to_string()).await.expect("set title");
    assert_eq!(document.title().await.expect("title"), "Renamed");
    assert!(!document.hidden().await.expect("hidden"));
    assert_eq!(document.visibility_state().await.expect("visibility"), "visible");

    let dialog = document
        .get_element_by_id("dialog")
        .await
        .expect("lookup")
        .expect("dialog exists");
    assert_eq!(dialog.id().await.expect("id"), "dialog");
    assert!(document.get_element_by_id("nope").await.expect("lookup").is_none());
    assert!(document.query_selector("dialog").await.expect("query").is_some());

    let window = bridge.window().expect("window");
    assert_eq!(window.inner_width().await.expect("width"), 1280.0);
    window.scroll_to(10.0, 250.0).await.expect("scroll");
    assert_eq!(window.scroll_y().await.expect("scrollY"), 250.0);
}

#[tokio::test]
async fn document_and_window_in_process() {
    let page = page();
    let bridge = in_process(&page);
    exercise_document(&bridge).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn document_and_window_out_of_process() {
    let page = page();
    let (bridge, _endpoint) = out_of_process(&page);
    exercise_document(&bridge).await;
    assert_eq!(
        page.engine.property(EngineRef::DOCUMENT, "title"),
        Some(Value::from("Renamed"))
    );
}

#[tokio::test]
async fn dialog_lifecycle_fires_toggle_events() {
    let page = page();
    let bridge = in_process(&page);
    let dialog = bridge.element(page.dialog).expect("element").as_dialog();
    let states = Arc::new(Mutex::new(Vec::new()));

    let sink = states.clone();
    dialog
        .on_toggle(move |event: &ToggleEvent| {
            sink.lock().push(event.new_state.clone());
            Ok(())
        })
        .expect("toggle");

    dialog.show_modal().await.expect("showModal");
    assert!(dialog.open().await.expect("open"));
    dialog.close(Some("confirm")).await.expect("close");
    assert!(!dialog.open().await.expect("open"));
    assert_eq!(dialog.return_value().await.expect("returnValue"), "confirm");
    assert_eq!(*states.lock(), vec!["open", "closed"]);
}

#[tokio::test]
async fn media_controls_round_trip() {
    let page = page();
    let bridge = in_process(&page);
    let video = bridge.element(page.video).expect("element").as_media();

    assert!(video.paused().await.expect("paused"));
    video.play().await.expect("play");
    assert!(!video.paused().await.expect("paused"));
    video.set_current_time(12.25).await.expect("seek");
    assert_eq!(video.current_time().await.expect("time"), 12.25);
    video.pause().await.expect("pause");
    assert!(video.paused().await.expect("paused"));

    let err = video.duration().await.unwrap_err();
    assert!(matches!(err, BridgeError::DecodeMismatch { .. }));
}

#[tokio::test]
async fn attributes_read_back_as_optional_strings() {
    let page = page();
    let bridge = in_process(&page);
    let dialog = bridge.element(page.dialog).expect("element");

    assert_eq!(dialog.get_attribute("data-state").await.expect("get"), None);
    dialog.set_attribute("data-state", "armed").await.expect("set");
    assert_eq!(
        dialog.get_attribute("data-state").await.expect("get"),
        Some("armed".to_string())
    );
}

#[tokio::test]
async fn registered_shape_rejects_contradicting_result() {
    let page = page();
    page.engine.define_property(EngineRef::DOCUMENT, "title", 42.0);
    let mut registry = DecoderRegistry::default();
    registry.register_operation(OperationShape::property("title", ValueKind::String));
    let bridge = Bridge::builder()
        .config(BridgeConfig::default().with_mode(CallingMode::InProcess))
        .registry(registry)
        .in_process(page.engine.clone())
        .build()
        .expect("bridge");

    let err = bridge.document().expect("document").title().await.unwrap_err();
    assert!(matches!(
        err,
        BridgeError::DecodeMismatch { ref expected, .. } if expected.starts_with("title")
    ));
}

#[tokio::test]
async fn window_storage_events_are_typed() {
    let page = page();
    let bridge = in_process(&page);
    let window = bridge.window().expect("window");
    let seen = Arc::new(Mutex::new(None));

    let sink = seen.clone();
    window
        .on_storage(move |event: &StorageEvent| {
            *sink.lock() = Some(event.clone());
            Ok(())
        })
        .expect("storage");
    page.engine.dispatch(
        EngineRef::WINDOW,
        "storage",
        &json!({"key": "theme", "oldValue": null, "newValue": "dark", "url": "https://a.test/"}),
    );

    let event = seen.lock().clone().expect("storage event");
    assert_eq!(event.key.as_deref(), Some("theme"));
    assert_eq!(event.old_value, None);
    assert_eq!(event.new_value.as_deref(), Some("dark"));
}

#[test]
fn missing_backend_for_default_mode_fails_build() {
    let err = Bridge::builder()
        .config(BridgeConfig::default().with_mode(CallingMode::OutOfProcess))
        .in_process(Arc::new(MemoryEngine::new()))
        .build()
        .err()
        .expect("build should fail");
    assert_eq!(err, BridgeError::ModeUnavailable(CallingMode::OutOfProcess));
}
