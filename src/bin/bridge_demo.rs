use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use frontier_bridge::{
    duplex, Bridge, BridgeConfig, CallingMode, EngineEndpoint, EngineRef, MemoryEngine,
    RemoteObject, ScriptEngine, Value,
};
use serde_json::json;
use tracing::info;
use tracing_subscriber::EnvFilter;

const SEARCH_ID: &str = "search";

fn main() -> Result<()> {
    let subscriber_result = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .try_init();
    if subscriber_result.is_err() {
        // tracing was already initialised; continue silently
    }

    let mut config = BridgeConfig::from_env().context("loading bridge config")?;
    if let Some(mode) = std::env::args().nth(1) {
        config.default_mode = match mode.as_str() {
            "in-process" => CallingMode::InProcess,
            "out-of-process" => CallingMode::OutOfProcess,
            other => return Err(anyhow!("unknown calling mode '{other}'")),
        };
    }

    let engine = Arc::new(MemoryEngine::new());
    let search = seed_page(&engine);

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("building tokio runtime")?;

    rt.block_on(async {
        let (host, engine_side) = duplex();
        let endpoint = EngineEndpoint::spawn(engine.clone() as Arc<dyn ScriptEngine>, engine_side)
            .context("spawning engine endpoint")?;

        let bridge = Bridge::builder()
            .config(config)
            .in_process(engine.clone())
            .connect(host)
            .build()?;

        let document = bridge.document()?;
        info!(title = %document.title().await?, "initial title");
        document.set_title("Bridged".to_string()).await?;
        info!(title = %document.title().await?, "updated title");

        let input = document
            .get_element_by_id(SEARCH_ID)
            .await?
            .ok_or_else(|| anyhow!("no element with id '{SEARCH_ID}'"))?;

        let first = input.on_keydown(|event| {
            println!("first subscriber: key={} ctrl={}", event.key, event.ctrl_key);
            Ok(())
        })?;
        let _second = input.on_keydown(|event| {
            println!("second subscriber: code={} repeat={}", event.code, event.repeat);
            Ok(())
        })?;
        info!(
            subscribers = bridge.multiplexer().subscriber_count(input.handle(), "keydown"),
            native = engine.listener_count(search, "keydown"),
            "keydown wired"
        );

        // The out-of-process listener is installed once the endpoint has read
        // the listen frame, so round-trip a call before firing.
        let _: Option<String> = input.get_attribute("placeholder").await?;
        engine.dispatch(
            search,
            "keydown",
            &json!({"type": "keydown", "key": "a", "code": "KeyA", "ctrlKey": true}),
        );
        let _: Option<String> = input.get_attribute("placeholder").await?;

        input.off(&first)?;
        input.dispose();
        info!(live = bridge.handles().live_count(), "element disposed");

        drop(document);
        drop(input);
        drop(bridge);
        tokio::task::spawn_blocking(move || endpoint.join()).await?;
        Ok::<(), anyhow::Error>(())
    })
}

fn seed_page(engine: &MemoryEngine) -> EngineRef {
    let search = engine.create_object();
    engine.define_property(search, "id", SEARCH_ID);
    engine.define_property(search, "tagName", "INPUT");
    engine.define_method(search, "getAttribute", |engine, target, args| {
        let name = match args.first() {
            Some(Value::String(name)) => name.clone(),
            _ => return Ok(Value::Null),
        };
        Ok(engine.property(target, &name).unwrap_or(Value::Null))
    });

    engine.define_property(EngineRef::DOCUMENT, "title", "Frontier");
    engine.define_method(EngineRef::DOCUMENT, "getElementById", move |_, _, args| {
        Ok(match args.first() {
            Some(Value::String(id)) if id == SEARCH_ID => Value::from(search),
            _ => Value::Null,
        })
    });
    search
}
