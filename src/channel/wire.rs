use serde::{Deserialize, Serialize};

use crate::engine::{RawPayload, RemoteError};
use crate::error::TransportFailure;
use crate::handle::HandleId;
use crate::invoker::OperationKind;
use crate::value::{EngineRef, Value};

/// Envelope exchanged over the channel.
///
/// `handle` is the engine reference the host handle resolved to. Calls never
/// carry host handle ids; listener frames carry the owning one as `listener`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "frame", rename_all = "snake_case")]
pub enum Frame {
    Call {
        correlation_id: u64,
        handle: EngineRef,
        member: String,
        operation: OperationKind,
    },
    Reply {
        correlation_id: u64,
        outcome: Outcome,
    },
    /// `listener` is the host handle the listener belongs to, so handles
    /// aliasing one engine object each get their own native listener.
    Listen {
        listener: HandleId,
        handle: EngineRef,
        event: String,
    },
    Unlisten {
        listener: HandleId,
        handle: EngineRef,
        event: String,
    },
    /// One-way native event; carries no correlation id.
    Event {
        listener: HandleId,
        event: String,
        payload: RawPayload,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Ok { value: Value },
    Threw { category: String, message: String },
}

impl From<Result<Value, RemoteError>> for Outcome {
    fn from(result: Result<Value, RemoteError>) -> Self {
        match result {
            Ok(value) => Outcome::Ok { value },
            Err(err) => Outcome::Threw {
                category: err.category,
                message: err.message,
            },
        }
    }
}

impl Frame {
    pub fn encode(&self) -> Result<String, TransportFailure> {
        serde_json::to_string(self).map_err(|err| TransportFailure::Codec(err.to_string()))
    }

    pub fn decode(text: &str) -> Result<Self, TransportFailure> {
        serde_json::from_str(text).map_err(|err| TransportFailure::Codec(err.to_string()))
    }
}
