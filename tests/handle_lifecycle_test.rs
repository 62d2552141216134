use std::sync::Arc;

use frontier_bridge::config::BridgeConfig;
use frontier_bridge::{
    Bridge, BridgeError, CallingMode, EngineRef, MemoryEngine, OperationDescriptor, RemoteObject,
};

fn in_process_bridge(engine: &Arc<MemoryEngine>) -> Arc<Bridge> {
    Bridge::builder()
        .config(BridgeConfig::default().with_mode(CallingMode::InProcess))
        .in_process(engine.clone())
        .build()
        .expect("bridge")
}

#[tokio::test]
async fn disposal_removes_native_listeners_and_rejects_calls() {
    let engine = Arc::new(MemoryEngine::new());
    let bridge = in_process_bridge(&engine);
    let target = engine.create_object();
    let element = bridge.element(target).expect("element");

    element.on("click", |_| Ok(())).expect("click");
    element.on("click", |_| Ok(())).expect("second click");
    element.on("keydown", |_| Ok(())).expect("keydown");
    assert_eq!(engine.listener_count(target, "click"), 1);
    assert_eq!(engine.listener_count(target, "keydown"), 1);

    element.dispose();

    assert_eq!(engine.total_listener_count(), 0);
    assert_eq!(bridge.multiplexer().installed_count(), 0);
    assert!(!element.handle().is_live());

    let err = element.on("click", |_| Ok(())).unwrap_err();
    assert_eq!(err, BridgeError::HandleDisposed);
    let err = element.id().await.unwrap_err();
    assert_eq!(err, BridgeError::HandleDisposed);
    let err = element.set_id("late".to_string()).await.unwrap_err();
    assert_eq!(err, BridgeError::HandleDisposed);
    assert_eq!(engine.property(target, "id"), None);
}

#[tokio::test]
async fn disposing_twice_is_harmless() {
    let engine = Arc::new(MemoryEngine::new());
    let bridge = in_process_bridge(&engine);
    let element = bridge.element(engine.create_object()).expect("element");
    let live_before = bridge.handles().live_count();

    element.dispose();
    element.dispose();

    assert_eq!(bridge.handles().live_count(), live_before - 1);
}

#[tokio::test]
async fn unsubscribe_after_disposal_reports_disposed() {
    let engine = Arc::new(MemoryEngine::new());
    let bridge = in_process_bridge(&engine);
    let element = bridge.element(engine.create_object()).expect("element");
    let subscription = element.on("input", |_| Ok(())).expect("subscribe");

    element.dispose();

    assert_eq!(
        element.off(&subscription).unwrap_err(),
        BridgeError::HandleDisposed
    );
}

#[tokio::test]
async fn engine_side_removal_invalidates_every_handle_to_the_object() {
    let engine = Arc::new(MemoryEngine::new());
    let bridge = in_process_bridge(&engine);
    let target = engine.create_object();
    let first = bridge.element(target).expect("first");
    let second = bridge.element(target).expect("second");
    let other = bridge.element(engine.create_object()).expect("other");
    first.on("focus", |_| Ok(())).expect("subscribe");

    assert_ne!(first.handle(), second.handle());
    assert_eq!(bridge.object_removed(target), 2);

    assert!(!first.handle().is_live());
    assert!(!second.handle().is_live());
    assert!(other.handle().is_live());
    assert_eq!(engine.listener_count(target, "focus"), 0);
}

#[tokio::test]
async fn shared_view_sees_disposal() {
    let engine = Arc::new(MemoryEngine::new());
    let bridge = in_process_bridge(&engine);
    let target = engine.create_object();
    engine.define_property(target, "currentTime", 4.5);
    let element = bridge.element(target).expect("element");
    let media = element.as_media();

    assert_eq!(media.current_time().await.expect("time"), 4.5);
    element.dispose();
    assert_eq!(media.current_time().await.unwrap_err(), BridgeError::HandleDisposed);
}

#[test]
fn well_known_handles_are_cached_until_released() {
    let engine = Arc::new(MemoryEngine::new());
    let bridge = in_process_bridge(&engine);
    let document = bridge.document().expect("document");
    let again = bridge.document().expect("document again");
    assert_eq!(document.handle(), again.handle());

    let title = OperationDescriptor::get("title").in_mode(CallingMode::InProcess);
    engine.define_property(EngineRef::DOCUMENT, "title", "cached");
    assert!(bridge.invoker().execute_sync(again.handle(), title.clone()).is_ok());

    document.dispose();
    assert_eq!(
        bridge.invoker().execute_sync(again.handle(), title.clone()).unwrap_err(),
        BridgeError::HandleDisposed
    );

    let fresh = bridge.document().expect("fresh document");
    assert_ne!(fresh.handle(), document.handle());
    assert!(bridge.invoker().execute_sync(fresh.handle(), title).is_ok());
}

#[test]
fn handle_limit_is_enforced() {
    let engine = Arc::new(MemoryEngine::new());
    let config = BridgeConfig {
        default_mode: CallingMode::InProcess,
        max_handles: 2,
        ..BridgeConfig::default()
    };
    let bridge = Bridge::builder()
        .config(config)
        .in_process(engine.clone())
        .build()
        .expect("bridge");

    let first = bridge.element(engine.create_object()).expect("first");
    let _second = bridge.element(engine.create_object()).expect("second");
    let err = bridge.element(engine.create_object()).err().expect("limit");
    assert_eq!(err, BridgeError::OutOfHandles { limit: 2 });

    first.dispose();
    assert!(bridge.element(engine.create_object()).is_ok());
}
