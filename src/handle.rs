//! Host-side handles onto engine objects.
//!
//! The table is the sole owner of the `HandleId -> EngineRef` mapping. Ids are
//! issued from a monotonically increasing counter and are never handed out
//! twice, so a stale handle can only ever fail with `HandleDisposed`.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{BridgeError, Result};
use crate::value::EngineRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HandleId(u64);

impl HandleId {
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "handle#{}", self.0)
    }
}

/// Opaque reference plus a liveness flag shared by every clone.
#[derive(Debug, Clone)]
pub struct Handle {
    id: HandleId,
    live: Arc<AtomicBool>,
}

impl Handle {
    pub fn id(&self) -> HandleId {
        self.id
    }

    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }
}

impl PartialEq for Handle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Handle {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WellKnown {
    Window,
    Document,
}

impl WellKnown {
    pub fn engine_ref(self) -> EngineRef {
        match self {
            WellKnown::Window => EngineRef::WINDOW,
            WellKnown::Document => EngineRef::DOCUMENT,
        }
    }
}

/// Notified after a handle has been invalidated.
pub trait ReleaseObserver: Send + Sync {
    fn handle_released(&self, id: HandleId, target: EngineRef);
}

struct Entry {
    target: EngineRef,
    live: Arc<AtomicBool>,
}

#[derive(Default)]
struct TableState {
    entries: HashMap<HandleId, Entry>,
    well_known: HashMap<WellKnown, Handle>,
}

pub struct HandleTable {
    state: Mutex<TableState>,
    next_id: AtomicU64,
    max_handles: usize,
    observers: Mutex<Vec<Weak<dyn ReleaseObserver>>>,
}

impl HandleTable {
    pub fn new(max_handles: usize) -> Self {
        Self {
            state: Mutex::new(TableState::default()),
            next_id: AtomicU64::new(1),
            max_handles,
            observers: Mutex::new(Vec::new()),
        }
    }

    pub fn add_observer(&self, observer: Weak<dyn ReleaseObserver>) {
        self.observers.lock().push(observer);
    }

    pub fn acquire(&self, target: EngineRef) -> Result<Handle> {
        let mut state = self.state.lock();
        self.insert_locked(&mut state, target)
    }

    fn insert_locked(&self, state: &mut TableState, target: EngineRef) -> Result<Handle> {
        if state.entries.len() >= self.max_handles {
            return Err(BridgeError::OutOfHandles {
                limit: self.max_handles,
            });
        }
        let id = HandleId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let live = Arc::new(AtomicBool::new(true));
        state.entries.insert(
            id,
            Entry {
                target,
                live: Arc::clone(&live),
            },
        );
        debug!(target = "bridge", handle = %id, object = %target, "handle acquired");
        Ok(Handle { id, live })
    }

    /// Returns the cached handle for a singleton, acquiring it on first use.
    pub fn well_known(&self, which: WellKnown) -> Result<Handle> {
        let mut state = self.state.lock();
        if let Some(existing) = state.well_known.get(&which) {
            if existing.is_live() {
                return Ok(existing.clone());
            }
        }
        let handle = self.insert_locked(&mut state, which.engine_ref())?;
        state.well_known.insert(which, handle.clone());
        Ok(handle)
    }

    pub fn resolve(&self, handle: &Handle) -> Result<EngineRef> {
        if !handle.is_live() {
            return Err(BridgeError::HandleDisposed);
        }
        self.state
            .lock()
            .entries
            .get(&handle.id)
            .map(|entry| entry.target)
            .ok_or(BridgeError::HandleDisposed)
    }

    /// Invalidates the handle. Releasing twice is a no-op.
    pub fn release(&self, handle: &Handle) {
        let removed = {
            let mut state = self.state.lock();
            let removed = state.entries.remove(&handle.id);
            state.well_known.retain(|_, cached| cached.id != handle.id);
            removed
        };
        if let Some(entry) = removed {
            entry.live.store(false, Ordering::Release);
            debug!(target = "bridge", handle = %handle.id, object = %entry.target, "handle released");
            self.notify_released(handle.id, entry.target);
        }
    }

    /// Releases every handle that refers to an engine object known to be gone.
    pub fn invalidate_target(&self, target: EngineRef) -> usize {
        let removed: Vec<(HandleId, Entry)> = {
            let mut state = self.state.lock();
            let ids: Vec<HandleId> = state
                .entries
                .iter()
                .filter(|(_, entry)| entry.target == target)
                .map(|(id, _)| *id)
                .collect();
            state
                .well_known
                .retain(|_, cached| !ids.contains(&cached.id));
            ids.into_iter()
                .filter_map(|id| state.entries.remove(&id).map(|entry| (id, entry)))
                .collect()
        };
        for (id, entry) in &removed {
            entry.live.store(false, Ordering::Release);
            self.notify_released(*id, entry.target);
        }
        removed.len()
    }

    pub fn live_count(&self) -> usize {
        self.state.lock().entries.len()
    }

    fn notify_released(&self, id: HandleId, target: EngineRef) {
        let observers: Vec<Arc<dyn ReleaseObserver>> = {
            let mut observers = self.observers.lock();
            observers.retain(|weak| weak.strong_count() > 0);
            observers.iter().filter_map(Weak::upgrade).collect()
        };
        for observer in observers {
            observer.handle_released(id, target);
        }
    }
}
