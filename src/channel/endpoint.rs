use std::collections::HashMap;
use std::sync::Arc;
use std::thread;

use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, warn};

use super::wire::{Frame, Outcome};
use super::Transport;
use crate::engine::{apply_operation, NativeCallback, RawPayload, ScriptEngine};
use crate::handle::HandleId;
use crate::value::EngineRef;

/// Engine side of the out-of-process channel.
///
/// Frames are handled one at a time in arrival order on a dedicated thread,
/// which is what gives callers FIFO ordering per handle.
pub struct EngineEndpoint {
    worker: thread::JoinHandle<()>,
}

impl EngineEndpoint {
    pub fn spawn(engine: Arc<dyn ScriptEngine>, transport: Transport) -> std::io::Result<Self> {
        let worker = thread::Builder::new()
            .name("bridge-engine-endpoint".to_string())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread().build() {
                    Ok(runtime) => runtime,
                    Err(err) => {
                        error!(target = "bridge", error = %err, "failed to build endpoint runtime");
                        return;
                    }
                };
                runtime.block_on(serve(engine, transport));
            })?;
        Ok(Self { worker })
    }

    /// Waits for the endpoint to finish. It stops once the host end is dropped.
    pub fn join(self) {
        if self.worker.join().is_err() {
            error!(target = "bridge", "engine endpoint thread panicked");
        }
    }
}

async fn serve(engine: Arc<dyn ScriptEngine>, transport: Transport) {
    let Transport {
        outbound,
        mut inbound,
    } = transport;
    let mut installed: HashMap<(HandleId, String), (EngineRef, NativeCallback)> = HashMap::new();

    while let Some(text) = inbound.recv().await {
        let frame = match Frame::decode(&text) {
            Ok(frame) => frame,
            Err(err) => {
                warn!(target = "bridge", error = %err, "undecodable frame from host");
                continue;
            }
        };

        match frame {
            Frame::Call {
                correlation_id,
                handle,
                member,
                operation,
            } => {
                let outcome = Outcome::from(apply_operation(
                    engine.as_ref(),
                    handle,
                    &member,
                    &operation,
                ));
                let reply = Frame::Reply {
                    correlation_id,
                    outcome,
                };
                if !send(&outbound, &reply) {
                    break;
                }
            }
            Frame::Listen {
                listener,
                handle,
                event,
            } => {
                let key = (listener, event.clone());
                if installed.contains_key(&key) {
                    continue;
                }
                let callback = forwarder(outbound.clone(), listener, event.clone());
                match engine.add_listener(handle, &event, Arc::clone(&callback)) {
                    Ok(()) => {
                        installed.insert(key, (handle, callback));
                    }
                    Err(err) => {
                        warn!(target = "bridge", handle = %listener, object = %handle, event = %event, error = %err, "engine refused listener");
                    }
                }
            }
            Frame::Unlisten {
                listener,
                handle,
                event,
            } => {
                if let Some((_, callback)) = installed.remove(&(listener, event.clone())) {
                    if let Err(err) = engine.remove_listener(handle, &event, &callback) {
                        warn!(target = "bridge", handle = %listener, object = %handle, event = %event, error = %err, "engine failed to remove listener");
                    }
                }
            }
            Frame::Reply { .. } | Frame::Event { .. } => {
                warn!(target = "bridge", "host sent an engine-only frame");
            }
        }
    }

    for ((listener, event), (handle, callback)) in installed.drain() {
        if let Err(err) = engine.remove_listener(handle, &event, &callback) {
            warn!(target = "bridge", handle = %listener, object = %handle, event = %event, error = %err, "engine failed to remove listener on shutdown");
        }
    }
    debug!(target = "bridge", "engine endpoint stopped");
}

fn forwarder(outbound: UnboundedSender<String>, listener: HandleId, event: String) -> NativeCallback {
    Arc::new(move |payload: &RawPayload| {
        let frame = Frame::Event {
            listener,
            event: event.clone(),
            payload: payload.clone(),
        };
        send(&outbound, &frame);
    })
}

fn send(outbound: &UnboundedSender<String>, frame: &Frame) -> bool {
    match frame.encode() {
        Ok(text) => outbound.send(text).is_ok(),
        Err(err) => {
            error!(target = "bridge", error = %err, "failed to encode frame");
            true
        }
    }
}
