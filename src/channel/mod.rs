//! Message channel used by the out-of-process calling mode.
//!
//! Frames are JSON text. The host side is [`RemoteChannel`]; the engine side
//! is [`EngineEndpoint`], which owns the engine on its own thread.

pub mod endpoint;
pub mod remote;
pub mod wire;

use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

pub use endpoint::EngineEndpoint;
pub use remote::RemoteChannel;
pub use wire::{Frame, Outcome};

/// One end of a bidirectional text channel.
pub struct Transport {
    pub outbound: UnboundedSender<String>,
    pub inbound: UnboundedReceiver<String>,
}

/// Two connected transport ends: what one sends, the other receives.
pub fn duplex() -> (Transport, Transport) {
    let (host_tx, engine_rx) = unbounded_channel();
    let (engine_tx, host_rx) = unbounded_channel();
    (
        Transport {
            outbound: host_tx,
            inbound: host_rx,
        },
        Transport {
            outbound: engine_tx,
            inbound: engine_rx,
        },
    )
}
