//! Executes property and method operations against handles in either calling mode.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::channel::RemoteChannel;
use crate::decoder::{DecoderRegistry, OperationTag};
use crate::engine::{apply_operation, ScriptEngine};
use crate::error::{BridgeError, Result};
use crate::handle::{Handle, HandleTable};
use crate::value::{FromValue, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CallingMode {
    /// Host and engine share an execution context; calls complete inline.
    InProcess,
    /// Calls are serialized over a message channel and awaited.
    #[default]
    OutOfProcess,
}

impl fmt::Display for CallingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallingMode::InProcess => f.write_str("in-process"),
            CallingMode::OutOfProcess => f.write_str("out-of-process"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "args", rename_all = "snake_case")]
pub enum OperationKind {
    Get,
    Set(Value),
    Invoke(Vec<Value>),
}

impl OperationKind {
    pub fn tag(&self) -> OperationTag {
        match self {
            OperationKind::Get => OperationTag::Get,
            OperationKind::Set(_) => OperationTag::Set,
            OperationKind::Invoke(_) => OperationTag::Invoke,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationDescriptor {
    pub member: String,
    pub kind: OperationKind,
    pub mode: CallingMode,
}

impl OperationDescriptor {
    pub fn get(member: impl Into<String>) -> Self {
        Self {
            member: member.into(),
            kind: OperationKind::Get,
            mode: CallingMode::default(),
        }
    }

    pub fn set(member: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            member: member.into(),
            kind: OperationKind::Set(value.into()),
            mode: CallingMode::default(),
        }
    }

    pub fn invoke(member: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            member: member.into(),
            kind: OperationKind::Invoke(args),
            mode: CallingMode::default(),
        }
    }

    pub fn in_mode(mut self, mode: CallingMode) -> Self {
        self.mode = mode;
        self
    }
}

/// Runs operations the same way regardless of calling mode.
///
/// Both paths end in [`apply_operation`] against the same kind of engine and
/// their results pass through the same registry check, so a given remote
/// state yields identical values in either mode.
pub struct Invoker {
    table: Arc<HandleTable>,
    registry: Arc<DecoderRegistry>,
    in_process: Option<Arc<dyn ScriptEngine>>,
    remote: Option<Arc<RemoteChannel>>,
    default_mode: CallingMode,
}

impl Invoker {
    pub fn new(
        table: Arc<HandleTable>,
        registry: Arc<DecoderRegistry>,
        in_process: Option<Arc<dyn ScriptEngine>>,
        remote: Option<Arc<RemoteChannel>>,
        default_mode: CallingMode,
    ) -> Self {
        Self {
            table,
            registry,
            in_process,
            remote,
            default_mode,
        }
    }

    pub fn default_mode(&self) -> CallingMode {
        self.default_mode
    }

    pub fn supports(&self, mode: CallingMode) -> bool {
        match mode {
            CallingMode::InProcess => self.in_process.is_some(),
            CallingMode::OutOfProcess => self.remote.is_some(),
        }
    }

    pub async fn execute(&self, handle: &Handle, op: OperationDescriptor) -> Result<Value> {
        match op.mode {
            CallingMode::InProcess => self.execute_sync(handle, op),
            CallingMode::OutOfProcess => {
                let remote = self
                    .remote
                    .as_ref()
                    .ok_or(BridgeError::ModeUnavailable(CallingMode::OutOfProcess))?;
                let target = self.table.resolve(handle)?;
                let value = remote.call(target, &op.member, &op.kind).await?;
                self.registry.check_result(&op.member, op.kind.tag(), &value)?;
                Ok(value)
            }
        }
    }

    /// Runs an in-process operation inline. Out-of-process descriptors are
    /// rejected because they can only complete by suspending.
    pub fn execute_sync(&self, handle: &Handle, op: OperationDescriptor) -> Result<Value> {
        if op.mode != CallingMode::InProcess {
            return Err(BridgeError::ModeUnavailable(op.mode));
        }
        let engine = self
            .in_process
            .as_ref()
            .ok_or(BridgeError::ModeUnavailable(CallingMode::InProcess))?;
        let target = self.table.resolve(handle)?;
        let value = apply_operation(engine.as_ref(), target, &op.member, &op.kind)?;
        self.registry.check_result(&op.member, op.kind.tag(), &value)?;
        Ok(value)
    }

    pub async fn get<T: FromValue>(&self, handle: &Handle, member: &str) -> Result<T> {
        let op = OperationDescriptor::get(member).in_mode(self.default_mode);
        T::from_value(self.execute(handle, op).await?)
    }

    pub async fn set(&self, handle: &Handle, member: &str, value: impl Into<Value>) -> Result<()> {
        let op = OperationDescriptor::set(member, value).in_mode(self.default_mode);
        self.execute(handle, op).await.map(|_| ())
    }

    pub async fn call<T: FromValue>(
        &self,
        handle: &Handle,
        member: &str,
        args: Vec<Value>,
    ) -> Result<T> {
        let op = OperationDescriptor::invoke(member, args).in_mode(self.default_mode);
        T::from_value(self.execute(handle, op).await?)
    }
}
