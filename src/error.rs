use std::fmt;

use thiserror::Error;

use crate::engine::RemoteError;
use crate::invoker::CallingMode;

pub type Result<T, E = BridgeError> = std::result::Result<T, E>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    #[error("handle has been disposed")]
    HandleDisposed,
    #[error("handle table exhausted ({limit} live handles)")]
    OutOfHandles { limit: usize },
    #[error("remote operation threw {category}: {message}")]
    RemoteThrew { category: String, message: String },
    #[error("transport failure: {0}")]
    TransportFailure(TransportFailure),
    #[error("{0} calling mode is not available on this bridge")]
    ModeUnavailable(CallingMode),
    #[error("payload does not decode as {expected}: {detail}")]
    DecodeMismatch { expected: String, detail: String },
}

/// Why an out-of-process exchange did not produce a reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportFailure {
    Closed,
    TimedOut { after_ms: u64 },
    Codec(String),
}

impl fmt::Display for TransportFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportFailure::Closed => f.write_str("channel closed"),
            TransportFailure::TimedOut { after_ms } => {
                write!(f, "no reply within {after_ms}ms")
            }
            TransportFailure::Codec(detail) => write!(f, "malformed frame: {detail}"),
        }
    }
}

impl BridgeError {
    pub fn decode_mismatch(expected: impl Into<String>, detail: impl fmt::Display) -> Self {
        BridgeError::DecodeMismatch {
            expected: expected.into(),
            detail: detail.to_string(),
        }
    }

    pub fn is_handle_disposed(&self) -> bool {
        matches!(self, BridgeError::HandleDisposed)
    }
}

impl From<RemoteError> for BridgeError {
    fn from(err: RemoteError) -> Self {
        BridgeError::RemoteThrew {
            category: err.category,
            message: err.message,
        }
    }
}

impl From<TransportFailure> for BridgeError {
    fn from(failure: TransportFailure) -> Self {
        BridgeError::TransportFailure(failure)
    }
}
