//! Fans one native listener per (handle, event name) out to many subscribers.
//!
//! Per key the state is either absent (no native listener) or registered
//! (native listener installed, at least one subscriber). Subscribe and
//! unsubscribe calls that land while the key is fanning out are queued and
//! applied once the fan-out completes, and a native event that fires during a
//! fan-out is queued behind it, so one fan-out never interleaves with another.

use std::any::Any;
use std::borrow::Cow;
use std::collections::{HashMap, VecDeque};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Weak};

use anyhow::anyhow;
use parking_lot::Mutex;
use tracing::{debug, error, warn};

use crate::decoder::{DecodedEventRecord, DecoderRegistry, EventDescriptor, EventRecord};
use crate::engine::{NativeCallback, RawPayload, ScriptEngine};
use crate::error::{BridgeError, Result};
use crate::handle::{Handle, HandleId, HandleTable, ReleaseObserver};
use crate::value::EngineRef;

/// Installs and removes the single native listener for a key.
///
/// `handle` identifies the key; several handles may alias one engine object,
/// and each gets a listener of its own.
pub trait ListenerHost: Send + Sync {
    fn install(
        &self,
        handle: HandleId,
        target: EngineRef,
        event: &str,
        callback: NativeCallback,
    ) -> Result<()>;

    fn uninstall(
        &self,
        handle: HandleId,
        target: EngineRef,
        event: &str,
        callback: &NativeCallback,
    ) -> Result<()>;
}

/// Listener host for an engine sharing the caller's execution context.
pub struct InProcessListeners {
    engine: Arc<dyn ScriptEngine>,
}

impl InProcessListeners {
    pub fn new(engine: Arc<dyn ScriptEngine>) -> Self {
        Self { engine }
    }
}

impl ListenerHost for InProcessListeners {
    fn install(
        &self,
        _handle: HandleId,
        target: EngineRef,
        event: &str,
        callback: NativeCallback,
    ) -> Result<()> {
        self.engine
            .add_listener(target, event, callback)
            .map_err(BridgeError::from)
    }

    fn uninstall(
        &self,
        _handle: HandleId,
        target: EngineRef,
        event: &str,
        callback: &NativeCallback,
    ) -> Result<()> {
        self.engine
            .remove_listener(target, event, callback)
            .map_err(BridgeError::from)
    }
}

pub type SubscriberCallback =
    Arc<dyn Fn(&DecodedEventRecord) -> anyhow::Result<()> + Send + Sync>;

#[derive(Debug, Clone, PartialEq)]
pub enum MultiplexFault {
    /// The payload could not be decoded; no subscriber ran for that firing.
    Decode {
        handle: HandleId,
        event: String,
        error: BridgeError,
    },
    /// A subscriber returned an error or panicked.
    Callback {
        handle: HandleId,
        event: String,
        ordinal: u64,
        message: String,
    },
}

/// Side channel for faults that must not abort a fan-out.
pub trait FaultSink: Send + Sync {
    fn report(&self, fault: MultiplexFault);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TracingFaultSink;

impl FaultSink for TracingFaultSink {
    fn report(&self, fault: MultiplexFault) {
        match fault {
            MultiplexFault::Decode {
                handle,
                event,
                error,
            } => {
                error!(target = "bridge", handle = %handle, event = %event, error = %error, "failed to decode native event");
            }
            MultiplexFault::Callback {
                handle,
                event,
                ordinal,
                message,
            } => {
                error!(target = "bridge", handle = %handle, event = %event, ordinal, error = %message, "event subscriber failed");
            }
        }
    }
}

/// Token for one subscriber; pass it back to [`Multiplexer::unsubscribe`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    handle: Handle,
    event: String,
    ordinal: u64,
}

impl Subscription {
    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    pub fn event(&self) -> &str {
        &self.event
    }

    pub fn ordinal(&self) -> u64 {
        self.ordinal
    }
}

struct Subscriber {
    ordinal: u64,
    callback: SubscriberCallback,
}

enum Deferred {
    Add(Arc<Subscriber>),
    Remove(u64),
}

struct MultiplexState {
    target: EngineRef,
    descriptor: EventDescriptor,
    subscribers: Vec<Arc<Subscriber>>,
    native: NativeCallback,
    next_ordinal: u64,
    dispatching: bool,
    deferred: Vec<Deferred>,
    queued: VecDeque<RawPayload>,
}

impl MultiplexState {
    fn contains(&self, ordinal: u64) -> bool {
        let mut present = self.subscribers.iter().any(|sub| sub.ordinal == ordinal);
        for op in &self.deferred {
            match op {
                Deferred::Add(sub) if sub.ordinal == ordinal => present = true,
                Deferred::Remove(removed) if *removed == ordinal => present = false,
                _ => {}
            }
        }
        present
    }

    fn apply_deferred(&mut self) {
        for op in self.deferred.drain(..) {
            match op {
                Deferred::Add(sub) => self.subscribers.push(sub),
                Deferred::Remove(ordinal) => self.subscribers.retain(|sub| sub.ordinal != ordinal),
            }
        }
    }
}

type Key = (HandleId, String);

pub struct Multiplexer {
    table: Arc<HandleTable>,
    registry: Arc<DecoderRegistry>,
    listeners: Arc<dyn ListenerHost>,
    faults: Arc<dyn FaultSink>,
    states: Mutex<HashMap<Key, MultiplexState>>,
    this: Weak<Multiplexer>,
}

impl Multiplexer {
    /// Creates the multiplexer and registers it for handle release so that
    /// disposing a handle tears down its native listeners.
    pub fn new(
        table: Arc<HandleTable>,
        registry: Arc<DecoderRegistry>,
        listeners: Arc<dyn ListenerHost>,
        faults: Arc<dyn FaultSink>,
    ) -> Arc<Self> {
        let multiplexer = Arc::new_cyclic(|this| Self {
            table: Arc::clone(&table),
            registry,
            listeners,
            faults,
            states: Mutex::new(HashMap::new()),
            this: this.clone(),
        });
        let observer: Weak<Multiplexer> = Arc::downgrade(&multiplexer);
        table.add_observer(observer);
        multiplexer
    }

    pub fn subscribe<F>(&self, handle: &Handle, event: &str, callback: F) -> Result<Subscription>
    where
        F: Fn(&DecodedEventRecord) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.subscribe_callback(handle, event, Arc::new(callback))
    }

    /// Subscribes with a callback that receives the concrete record type.
    ///
    /// Fails with `DecodeMismatch` when the event is not described as `E`'s family.
    pub fn subscribe_typed<E, F>(&self, handle: &Handle, event: &str, callback: F) -> Result<Subscription>
    where
        E: EventRecord,
        F: Fn(&E) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let descriptor = self.registry.describe_event(event);
        if descriptor.family != E::FAMILY {
            return Err(BridgeError::decode_mismatch(
                E::FAMILY.to_string(),
                format!("'{event}' is described as {}", descriptor.family),
            ));
        }
        self.subscribe(handle, event, move |record| match E::from_decoded(record) {
            Some(typed) => callback(typed),
            None => Err(anyhow!("received {} record", record.family())),
        })
    }

    pub fn subscribe_callback(
        &self,
        handle: &Handle,
        event: &str,
        callback: SubscriberCallback,
    ) -> Result<Subscription> {
        let target = self.table.resolve(handle)?;
        let key = (handle.id(), event.to_string());

        let mut states = self.states.lock();
        // Release flips the flag before notifying us, so checking under the
        // lock means a concurrent release will find and remove this entry.
        if !handle.is_live() {
            return Err(BridgeError::HandleDisposed);
        }

        if let Some(state) = states.get_mut(&key) {
            let ordinal = state.next_ordinal;
            state.next_ordinal += 1;
            let subscriber = Arc::new(Subscriber { ordinal, callback });
            if state.dispatching {
                state.deferred.push(Deferred::Add(subscriber));
            } else {
                state.subscribers.push(subscriber);
            }
            return Ok(Subscription {
                handle: handle.clone(),
                event: event.to_string(),
                ordinal,
            });
        }

        let native = self.native_callback(handle.id(), event);
        self.listeners
            .install(handle.id(), target, event, Arc::clone(&native))?;
        debug!(target = "bridge", handle = %handle.id(), event, "native listener installed");

        states.insert(
            key,
            MultiplexState {
                target,
                descriptor: self.registry.describe_event(event),
                subscribers: vec![Arc::new(Subscriber {
                    ordinal: 0,
                    callback,
                })],
                native,
                next_ordinal: 1,
                dispatching: false,
                deferred: Vec::new(),
                queued: VecDeque::new(),
            },
        );
        Ok(Subscription {
            handle: handle.clone(),
            event: event.to_string(),
            ordinal: 0,
        })
    }

    /// Removes one subscriber. Returns `Ok(false)` if it was already gone.
    pub fn unsubscribe(&self, subscription: &Subscription) -> Result<bool> {
        let mut states = self.states.lock();
        if !subscription.handle.is_live() {
            return Err(BridgeError::HandleDisposed);
        }
        let key = (subscription.handle.id(), subscription.event.clone());
        let Some(state) = states.get_mut(&key) else {
            return Ok(false);
        };

        if state.dispatching {
            let present = state.contains(subscription.ordinal);
            if present {
                state.deferred.push(Deferred::Remove(subscription.ordinal));
            }
            return Ok(present);
        }

        let before = state.subscribers.len();
        state
            .subscribers
            .retain(|sub| sub.ordinal != subscription.ordinal);
        let removed = state.subscribers.len() < before;
        if state.subscribers.is_empty() {
            if let Some(state) = states.remove(&key) {
                self.teardown(key.0, &key.1, &state);
            }
        }
        Ok(removed)
    }

    pub fn subscriber_count(&self, handle: &Handle, event: &str) -> usize {
        self.states
            .lock()
            .get(&(handle.id(), event.to_string()))
            .map_or(0, |state| state.subscribers.len())
    }

    pub fn is_installed(&self, handle: &Handle, event: &str) -> bool {
        self.states
            .lock()
            .contains_key(&(handle.id(), event.to_string()))
    }

    pub fn installed_count(&self) -> usize {
        self.states.lock().len()
    }

    fn native_callback(&self, handle: HandleId, event: &str) -> NativeCallback {
        let this = self.this.clone();
        let event = event.to_string();
        Arc::new(move |payload: &RawPayload| {
            if let Some(multiplexer) = this.upgrade() {
                multiplexer.dispatch(handle, &event, payload);
            }
        })
    }

    fn dispatch(&self, handle: HandleId, event: &str, payload: &RawPayload) {
        let key = (handle, event.to_string());
        {
            let mut states = self.states.lock();
            let Some(state) = states.get_mut(&key) else {
                return;
            };
            if state.dispatching {
                state.queued.push_back(payload.clone());
                return;
            }
            state.dispatching = true;
        }

        let mut current: Cow<'_, RawPayload> = Cow::Borrowed(payload);
        loop {
            let round = {
                let states = self.states.lock();
                states
                    .get(&key)
                    .map(|state| (state.subscribers.clone(), state.descriptor.clone()))
            };
            let Some((snapshot, descriptor)) = round else {
                return;
            };

            self.fan_out(handle, &descriptor, &snapshot, &current);

            match self.finish_round(&key) {
                Some(next) => current = Cow::Owned(next),
                None => return,
            }
        }
    }

    fn fan_out(
        &self,
        handle: HandleId,
        descriptor: &EventDescriptor,
        subscribers: &[Arc<Subscriber>],
        payload: &RawPayload,
    ) {
        let record = match self.registry.decode(payload, descriptor) {
            Ok(record) => record,
            Err(error) => {
                self.faults.report(MultiplexFault::Decode {
                    handle,
                    event: descriptor.name.clone(),
                    error,
                });
                return;
            }
        };

        for subscriber in subscribers {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| (subscriber.callback)(&record)));
            let message = match outcome {
                Ok(Ok(())) => continue,
                Ok(Err(err)) => format!("{err:#}"),
                Err(panic) => panic_message(panic.as_ref()),
            };
            self.faults.report(MultiplexFault::Callback {
                handle,
                event: descriptor.name.clone(),
                ordinal: subscriber.ordinal,
                message,
            });
        }
    }

    /// Applies deferred changes after a fan-out and hands back the next queued
    /// payload, if any. Tears the key down when no subscribers remain.
    fn finish_round(&self, key: &Key) -> Option<RawPayload> {
        let mut states = self.states.lock();
        let state = states.get_mut(key)?;
        state.apply_deferred();

        if state.subscribers.is_empty() {
            if let Some(state) = states.remove(key) {
                self.teardown(key.0, &key.1, &state);
            }
            return None;
        }

        match state.queued.pop_front() {
            Some(next) => Some(next),
            None => {
                state.dispatching = false;
                None
            }
        }
    }

    fn teardown(&self, handle: HandleId, event: &str, state: &MultiplexState) {
        match self.listeners.uninstall(handle, state.target, event, &state.native) {
            Ok(()) => {
                debug!(target = "bridge", handle = %handle, event, "native listener removed");
            }
            Err(err) => {
                warn!(target = "bridge", handle = %handle, event, error = %err, "failed to remove native listener");
            }
        }
    }
}

impl ReleaseObserver for Multiplexer {
    fn handle_released(&self, id: HandleId, _target: EngineRef) {
        let mut states = self.states.lock();
        let keys: Vec<Key> = states
            .keys()
            .filter(|(handle, _)| *handle == id)
            .cloned()
            .collect();
        for key in keys {
            if let Some(state) = states.remove(&key) {
                self.teardown(id, &key.1, &state);
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        format!("panicked: {message}")
    } else if let Some(message) = panic.downcast_ref::<String>() {
        format!("panicked: {message}")
    } else {
        "panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::MemoryEngine;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Collect(Mutex<Vec<MultiplexFault>>);

    impl FaultSink for Collect {
        fn report(&self, fault: MultiplexFault) {
            self.0.lock().push(fault);
        }
    }

    fn setup() -> (Arc<MemoryEngine>, Arc<HandleTable>, Arc<Multiplexer>, Arc<Collect>) {
        let engine = Arc::new(MemoryEngine::new());
        let table = Arc::new(HandleTable::new(64));
        let faults = Arc::new(Collect::default());
        let multiplexer = Multiplexer::new(
            Arc::clone(&table),
            Arc::new(DecoderRegistry::default()),
            Arc::new(InProcessListeners::new(engine.clone())),
            faults.clone(),
        );
        (engine, table, multiplexer, faults)
    }

    #[test]
    fn queued_native_events_run_after_current_fan_out() {
        let (engine, table, multiplexer, _faults) = setup();
        let window = table.acquire(EngineRef::WINDOW).unwrap();
        let order = Arc::new(Mutex::new(Vec::new()));

        let log = order.clone();
        let fire = engine.clone();
        multiplexer
            .subscribe(&window, "resize", move |record| {
                let DecodedEventRecord::Generic(generic) = record else {
                    return Err(anyhow!("unexpected record"));
                };
                log.lock().push(generic.time_stamp);
                if generic.time_stamp == 1.0 {
                    // Fires again mid fan-out; must run after this round.
                    fire.dispatch(EngineRef::WINDOW, "resize", &json!({"timeStamp": 2.0}));
                    log.lock().push(1.5);
                }
                Ok(())
            })
            .unwrap();

        engine.dispatch(EngineRef::WINDOW, "resize", &json!({"timeStamp": 1.0}));
        assert_eq!(*order.lock(), vec![1.0, 1.5, 2.0]);
    }

    #[test]
    fn decode_failure_is_reported_once() {
        let (engine, table, multiplexer, faults) = setup();
        let element = engine.create_object();
        let handle = table.acquire(element).unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let hits = hits.clone();
            multiplexer
                .subscribe(&handle, "keydown", move |_| {
                    hits.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                })
                .unwrap();
        }

        engine.dispatch(element, "keydown", &json!("not an object"));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        let faults = faults.0.lock();
        assert_eq!(faults.len(), 1);
        assert!(matches!(faults[0], MultiplexFault::Decode { .. }));
    }

    #[test]
    fn typed_subscription_checks_family() {
        let (_engine, table, multiplexer, _faults) = setup();
        let document = table.acquire(EngineRef::DOCUMENT).unwrap();
        let err = multiplexer
            .subscribe_typed::<crate::decoder::KeyboardEvent, _>(&document, "click", |_| Ok(()))
            .unwrap_err();
        assert!(matches!(err, BridgeError::DecodeMismatch { .. }));
        assert!(!multiplexer.is_installed(&document, "click"));
    }

    #[test]
    fn unsubscribing_twice_is_a_no_op() {
        let (engine, table, multiplexer, _faults) = setup();
        let document = table.acquire(EngineRef::DOCUMENT).unwrap();
        let sub = multiplexer.subscribe(&document, "click", |_| Ok(())).unwrap();
        assert!(multiplexer.unsubscribe(&sub).unwrap());
        assert!(!multiplexer.unsubscribe(&sub).unwrap());
        assert_eq!(engine.listener_count(EngineRef::DOCUMENT, "click"), 0);
    }
}
