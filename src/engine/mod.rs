//! Boundary with the script engine that owns the proxied objects.

pub mod memory;

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::invoker::OperationKind;
use crate::value::{EngineRef, Value};

pub use memory::MemoryEngine;

/// Loosely typed event payload exactly as the engine dispatched it.
pub type RawPayload = serde_json::Value;

/// The one function value allowed across the boundary: the listener the
/// multiplexer installs per (handle, event name).
pub type NativeCallback = Arc<dyn Fn(&RawPayload) + Send + Sync>;

/// An exception raised on the engine side, carried verbatim to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteError {
    pub category: String,
    pub message: String,
}

impl RemoteError {
    pub fn new(category: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            message: message.into(),
        }
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new("TypeError", message)
    }

    pub fn reference_error(message: impl Into<String>) -> Self {
        Self::new("ReferenceError", message)
    }
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.category, self.message)
    }
}

impl std::error::Error for RemoteError {}

pub trait ScriptEngine: Send + Sync {
    fn get_property(&self, target: EngineRef, name: &str) -> Result<Value, RemoteError>;

    fn set_property(&self, target: EngineRef, name: &str, value: Value)
        -> Result<(), RemoteError>;

    fn invoke(&self, target: EngineRef, name: &str, args: &[Value]) -> Result<Value, RemoteError>;

    fn add_listener(
        &self,
        target: EngineRef,
        event: &str,
        callback: NativeCallback,
    ) -> Result<(), RemoteError>;

    /// Removes the listener previously added with the same callback (pointer identity).
    fn remove_listener(
        &self,
        target: EngineRef,
        event: &str,
        callback: &NativeCallback,
    ) -> Result<(), RemoteError>;
}

/// Executes one operation against an engine. Both calling modes funnel
/// through here, the out-of-process path on the engine side of the channel.
pub fn apply_operation(
    engine: &dyn ScriptEngine,
    target: EngineRef,
    member: &str,
    kind: &OperationKind,
) -> Result<Value, RemoteError> {
    match kind {
        OperationKind::Get => engine.get_property(target, member),
        OperationKind::Set(value) => engine
            .set_property(target, member, value.clone())
            .map(|()| Value::Null),
        OperationKind::Invoke(args) => engine.invoke(target, member, args),
    }
}

pub fn same_callback(a: &NativeCallback, b: &NativeCallback) -> bool {
    Arc::ptr_eq(a, b)
}
