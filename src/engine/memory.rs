use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use super::{same_callback, NativeCallback, RawPayload, RemoteError, ScriptEngine};
use crate::value::{EngineRef, Value};

type Method = Arc<dyn Fn(&MemoryEngine, EngineRef, &[Value]) -> Result<Value, RemoteError> + Send + Sync>;

#[derive(Default)]
struct ObjectSlot {
    properties: HashMap<String, Value>,
    methods: HashMap<String, Method>,
    frozen: bool,
}

/// Thread-safe engine that keeps its objects in memory.
///
/// Starts with the window and document singletons registered. Methods are
/// host closures; they receive the engine so they can mutate state or
/// dispatch events the way script would.
pub struct MemoryEngine {
    objects: Mutex<HashMap<EngineRef, ObjectSlot>>,
    listeners: Mutex<HashMap<(EngineRef, String), Vec<NativeCallback>>>,
    next_ref: AtomicU64,
}

impl Default for MemoryEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryEngine {
    pub fn new() -> Self {
        let mut objects = HashMap::new();
        objects.insert(EngineRef::WINDOW, ObjectSlot::default());
        objects.insert(EngineRef::DOCUMENT, ObjectSlot::default());
        Self {
            objects: Mutex::new(objects),
            listeners: Mutex::new(HashMap::new()),
            next_ref: AtomicU64::new(EngineRef::DOCUMENT.raw() + 1),
        }
    }

    pub fn create_object(&self) -> EngineRef {
        let target = EngineRef(self.next_ref.fetch_add(1, Ordering::SeqCst));
        self.objects.lock().insert(target, ObjectSlot::default());
        target
    }

    /// Drops the object and every listener attached to it.
    pub fn remove_object(&self, target: EngineRef) -> bool {
        let removed = self.objects.lock().remove(&target).is_some();
        self.listeners.lock().retain(|(owner, _), _| *owner != target);
        removed
    }

    pub fn contains(&self, target: EngineRef) -> bool {
        self.objects.lock().contains_key(&target)
    }

    pub fn define_property(&self, target: EngineRef, name: &str, value: impl Into<Value>) {
        let mut objects = self.objects.lock();
        let slot = objects.entry(target).or_default();
        slot.properties.insert(name.to_string(), value.into());
    }

    pub fn define_method<F>(&self, target: EngineRef, name: &str, method: F)
    where
        F: Fn(&MemoryEngine, EngineRef, &[Value]) -> Result<Value, RemoteError>
            + Send
            + Sync
            + 'static,
    {
        let mut objects = self.objects.lock();
        let slot = objects.entry(target).or_default();
        slot.methods.insert(name.to_string(), Arc::new(method));
    }

    /// Makes every subsequent property assignment on `target` throw.
    pub fn freeze(&self, target: EngineRef) {
        if let Some(slot) = self.objects.lock().get_mut(&target) {
            slot.frozen = true;
        }
    }

    pub fn property(&self, target: EngineRef, name: &str) -> Option<Value> {
        self.objects
            .lock()
            .get(&target)
            .and_then(|slot| slot.properties.get(name).cloned())
    }

    pub fn listener_count(&self, target: EngineRef, event: &str) -> usize {
        self.listeners
            .lock()
            .get(&(target, event.to_string()))
            .map_or(0, Vec::len)
    }

    pub fn total_listener_count(&self) -> usize {
        self.listeners.lock().values().map(Vec::len).sum()
    }

    /// Fires `event` on `target`, returning how many native listeners ran.
    ///
    /// Listeners are snapshotted first so they may add or remove listeners
    /// while running.
    pub fn dispatch(&self, target: EngineRef, event: &str, payload: &RawPayload) -> usize {
        let snapshot = self
            .listeners
            .lock()
            .get(&(target, event.to_string()))
            .cloned()
            .unwrap_or_default();
        for listener in &snapshot {
            listener(payload);
        }
        snapshot.len()
    }

    fn missing(target: EngineRef) -> RemoteError {
        RemoteError::reference_error(format!("{target} does not exist"))
    }
}

impl ScriptEngine for MemoryEngine {
    fn get_property(&self, target: EngineRef, name: &str) -> Result<Value, RemoteError> {
        let objects = self.objects.lock();
        let slot = objects.get(&target).ok_or_else(|| Self::missing(target))?;
        Ok(slot.properties.get(name).cloned().unwrap_or(Value::Null))
    }

    fn set_property(
        &self,
        target: EngineRef,
        name: &str,
        value: Value,
    ) -> Result<(), RemoteError> {
        let mut objects = self.objects.lock();
        let slot = objects
            .get_mut(&target)
            .ok_or_else(|| Self::missing(target))?;
        if slot.frozen {
            return Err(RemoteError::type_error(format!(
                "Cannot assign to read only property '{name}' of object"
            )));
        }
        slot.properties.insert(name.to_string(), value);
        Ok(())
    }

    fn invoke(&self, target: EngineRef, name: &str, args: &[Value]) -> Result<Value, RemoteError> {
        let method = {
            let objects = self.objects.lock();
            let slot = objects.get(&target).ok_or_else(|| Self::missing(target))?;
            slot.methods.get(name).cloned()
        };
        // The object lock is released so the method can re-enter the engine.
        match method {
            Some(method) => method(self, target, args),
            None => Err(RemoteError::type_error(format!("{name} is not a function"))),
        }
    }

    fn add_listener(
        &self,
        target: EngineRef,
        event: &str,
        callback: NativeCallback,
    ) -> Result<(), RemoteError> {
        if !self.contains(target) {
            return Err(Self::missing(target));
        }
        let mut listeners = self.listeners.lock();
        let bucket = listeners.entry((target, event.to_string())).or_default();
        if !bucket.iter().any(|existing| same_callback(existing, &callback)) {
            bucket.push(callback);
        }
        debug!(target = "engine", object = %target, event, "listener added");
        Ok(())
    }

    fn remove_listener(
        &self,
        target: EngineRef,
        event: &str,
        callback: &NativeCallback,
    ) -> Result<(), RemoteError> {
        let mut listeners = self.listeners.lock();
        let key = (target, event.to_string());
        if let Some(bucket) = listeners.get_mut(&key) {
            bucket.retain(|existing| !same_callback(existing, callback));
            if bucket.is_empty() {
                listeners.remove(&key);
            }
        }
        debug!(target = "engine", object = %target, event, "listener removed");
        Ok(())
    }
}
