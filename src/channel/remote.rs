use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::wire::{Frame, Outcome};
use super::Transport;
use crate::engine::NativeCallback;
use crate::error::{BridgeError, Result, TransportFailure};
use crate::handle::HandleId;
use crate::invoker::OperationKind;
use crate::multiplexer::ListenerHost;
use crate::value::{EngineRef, Value};

type PendingReplies = Arc<Mutex<HashMap<u64, oneshot::Sender<Outcome>>>>;
type RemoteListeners = Arc<Mutex<HashMap<(HandleId, String), NativeCallback>>>;

/// Host side of the out-of-process channel.
///
/// Calls are correlated by id; a reader task routes replies to the awaiting
/// caller and event frames to the listener installed for that key. Event
/// listeners run on the reader task, so they must not block waiting on a
/// reply from this same channel.
pub struct RemoteChannel {
    outbound: UnboundedSender<String>,
    pending: PendingReplies,
    listeners: RemoteListeners,
    next_correlation: AtomicU64,
    call_timeout: Option<Duration>,
    closed: Arc<AtomicBool>,
    reader: JoinHandle<()>,
}

impl RemoteChannel {
    /// Connects over `transport`. Must be called from within a Tokio runtime.
    pub fn connect(transport: Transport, call_timeout: Option<Duration>) -> Self {
        let Transport { outbound, inbound } = transport;
        let pending: PendingReplies = Arc::new(Mutex::new(HashMap::new()));
        let listeners: RemoteListeners = Arc::new(Mutex::new(HashMap::new()));
        let closed = Arc::new(AtomicBool::new(false));

        let reader = tokio::spawn(read_frames(
            inbound,
            Arc::clone(&pending),
            Arc::clone(&listeners),
            Arc::clone(&closed),
        ));

        Self {
            outbound,
            pending,
            listeners,
            next_correlation: AtomicU64::new(1),
            call_timeout,
            closed,
            reader,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire) || self.outbound.is_closed()
    }

    pub fn pending_calls(&self) -> usize {
        self.pending.lock().len()
    }

    /// Sends one operation and waits for its correlated reply.
    ///
    /// On timeout the pending entry is dropped, so a reply arriving late is
    /// discarded instead of completing anything a second time.
    pub async fn call(&self, target: EngineRef, member: &str, kind: &OperationKind) -> Result<Value> {
        if self.is_closed() {
            return Err(TransportFailure::Closed.into());
        }
        let correlation_id = self.next_correlation.fetch_add(1, Ordering::SeqCst);
        let (reply_tx, reply_rx) = oneshot::channel();
        self.pending.lock().insert(correlation_id, reply_tx);
        // The reader may have shut down between the check above and the insert.
        if self.closed.load(Ordering::Acquire) {
            self.pending.lock().remove(&correlation_id);
            return Err(TransportFailure::Closed.into());
        }

        let frame = Frame::Call {
            correlation_id,
            handle: target,
            member: member.to_string(),
            operation: kind.clone(),
        };
        if let Err(failure) = self.send(&frame) {
            self.pending.lock().remove(&correlation_id);
            return Err(failure.into());
        }

        let received = match self.call_timeout {
            Some(limit) => match tokio::time::timeout(limit, reply_rx).await {
                Ok(received) => received,
                Err(_) => {
                    self.pending.lock().remove(&correlation_id);
                    let after_ms = u64::try_from(limit.as_millis()).unwrap_or(u64::MAX);
                    warn!(
                        target = "bridge",
                        correlation_id,
                        member,
                        after_ms,
                        "out-of-process call timed out"
                    );
                    return Err(TransportFailure::TimedOut { after_ms }.into());
                }
            },
            None => reply_rx.await,
        };

        match received {
            Ok(Outcome::Ok { value }) => Ok(value),
            Ok(Outcome::Threw { category, message }) => {
                Err(BridgeError::RemoteThrew { category, message })
            }
            Err(_) => Err(TransportFailure::Closed.into()),
        }
    }

    fn send(&self, frame: &Frame) -> std::result::Result<(), TransportFailure> {
        let encoded = frame.encode()?;
        self.outbound
            .send(encoded)
            .map_err(|_| TransportFailure::Closed)
    }
}

impl ListenerHost for RemoteChannel {
    fn install(
        &self,
        handle: HandleId,
        target: EngineRef,
        event: &str,
        callback: NativeCallback,
    ) -> Result<()> {
        let key = (handle, event.to_string());
        self.listeners.lock().insert(key.clone(), callback);
        let frame = Frame::Listen {
            listener: handle,
            handle: target,
            event: event.to_string(),
        };
        if let Err(failure) = self.send(&frame) {
            self.listeners.lock().remove(&key);
            return Err(failure.into());
        }
        Ok(())
    }

    fn uninstall(
        &self,
        handle: HandleId,
        target: EngineRef,
        event: &str,
        _callback: &NativeCallback,
    ) -> Result<()> {
        self.listeners.lock().remove(&(handle, event.to_string()));
        let frame = Frame::Unlisten {
            listener: handle,
            handle: target,
            event: event.to_string(),
        };
        // A closed channel has nothing left to tear down on the far side.
        if let Err(failure) = self.send(&frame) {
            debug!(target = "bridge", handle = %handle, object = %target, event, error = %failure, "unlisten not delivered");
        }
        Ok(())
    }
}

impl Drop for RemoteChannel {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

async fn read_frames(
    mut inbound: UnboundedReceiver<String>,
    pending: PendingReplies,
    listeners: RemoteListeners,
    closed: Arc<AtomicBool>,
) {
    while let Some(text) = inbound.recv().await {
        match Frame::decode(&text) {
            Ok(Frame::Reply {
                correlation_id,
                outcome,
            }) => {
                let waiter = pending.lock().remove(&correlation_id);
                match waiter {
                    Some(waiter) => {
                        let _ = waiter.send(outcome);
                    }
                    None => {
                        debug!(target = "bridge", correlation_id, "dropping reply for expired call");
                    }
                }
            }
            Ok(Frame::Event {
                listener,
                event,
                payload,
            }) => {
                let callback = listeners.lock().get(&(listener, event.clone())).cloned();
                match callback {
                    Some(callback) => callback(&payload),
                    None => {
                        debug!(target = "bridge", handle = %listener, event = %event, "event with no listener");
                    }
                }
            }
            Ok(other) => {
                warn!(target = "bridge", frame = ?other, "unexpected frame from engine");
            }
            Err(err) => {
                warn!(target = "bridge", error = %err, "undecodable frame from engine");
            }
        }
    }

    closed.store(true, Ordering::Release);
    let abandoned = {
        let mut pending = pending.lock();
        let count = pending.len();
        pending.clear();
        count
    };
    warn!(target = "bridge", abandoned, "engine channel closed");
}
