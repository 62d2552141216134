// Library exports for the host/engine bridge

pub mod bridge;
pub mod channel;
pub mod config;
pub mod decoder;
pub mod engine;
pub mod error;
pub mod facade;
pub mod handle;
pub mod invoker;
pub mod multiplexer;
pub mod value;

// Re-export commonly used types
pub use bridge::{Bridge, BridgeBuilder};
pub use channel::{duplex, EngineEndpoint, RemoteChannel, Transport};
pub use config::BridgeConfig;
pub use decoder::{DecodedEventRecord, DecoderRegistry, EventFamily};
pub use engine::{MemoryEngine, ScriptEngine};
pub use error::{BridgeError, Result, TransportFailure};
pub use facade::{DialogElement, Document, Element, MediaElement, RemoteObject, Window};
pub use handle::{Handle, HandleTable};
pub use invoker::{CallingMode, Invoker, OperationDescriptor, OperationKind};
pub use multiplexer::{Multiplexer, Subscription};
pub use value::{EngineRef, Value};
