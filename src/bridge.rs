use std::sync::Arc;

use tracing::info;

use crate::channel::{RemoteChannel, Transport};
use crate::config::BridgeConfig;
use crate::decoder::DecoderRegistry;
use crate::engine::ScriptEngine;
use crate::error::{BridgeError, Result};
use crate::facade::{Document, Element, Window};
use crate::handle::{Handle, HandleTable, WellKnown};
use crate::invoker::{CallingMode, Invoker};
use crate::multiplexer::{
    FaultSink, InProcessListeners, ListenerHost, Multiplexer, TracingFaultSink,
};
use crate::value::EngineRef;

/// Composes the handle table, decoder registry, invoker and multiplexer.
pub struct Bridge {
    config: BridgeConfig,
    table: Arc<HandleTable>,
    registry: Arc<DecoderRegistry>,
    invoker: Invoker,
    multiplexer: Arc<Multiplexer>,
}

impl Bridge {
    pub fn builder() -> BridgeBuilder {
        BridgeBuilder::default()
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn handles(&self) -> &HandleTable {
        &self.table
    }

    pub fn registry(&self) -> &DecoderRegistry {
        &self.registry
    }

    pub fn invoker(&self) -> &Invoker {
        &self.invoker
    }

    pub fn multiplexer(&self) -> &Multiplexer {
        &self.multiplexer
    }

    pub fn document(self: &Arc<Self>) -> Result<Document> {
        let handle = self.table.well_known(WellKnown::Document)?;
        Ok(Document::new(Arc::clone(self), handle))
    }

    pub fn window(self: &Arc<Self>) -> Result<Window> {
        let handle = self.table.well_known(WellKnown::Window)?;
        Ok(Window::new(Arc::clone(self), handle))
    }

    pub fn element(self: &Arc<Self>, target: EngineRef) -> Result<Element> {
        let handle = self.table.acquire(target)?;
        Ok(Element::new(Arc::clone(self), handle))
    }

    /// Invalidates the handle and tears down any subscriptions left on it.
    pub fn dispose(&self, handle: &Handle) {
        self.table.release(handle);
    }

    /// Called when the engine reports that an object no longer exists.
    pub fn object_removed(&self, target: EngineRef) -> usize {
        self.table.invalidate_target(target)
    }
}

pub struct BridgeBuilder {
    config: BridgeConfig,
    registry: DecoderRegistry,
    in_process: Option<Arc<dyn ScriptEngine>>,
    remote: Option<Arc<RemoteChannel>>,
    transport: Option<Transport>,
    faults: Arc<dyn FaultSink>,
}

impl Default for BridgeBuilder {
    fn default() -> Self {
        Self {
            config: BridgeConfig::default(),
            registry: DecoderRegistry::default(),
            in_process: None,
            remote: None,
            transport: None,
            faults: Arc::new(TracingFaultSink),
        }
    }
}

impl BridgeBuilder {
    pub fn config(mut self, config: BridgeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn registry(mut self, registry: DecoderRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn in_process(mut self, engine: Arc<dyn ScriptEngine>) -> Self {
        self.in_process = Some(engine);
        self
    }

    pub fn out_of_process(mut self, channel: Arc<RemoteChannel>) -> Self {
        self.remote = Some(channel);
        self
    }

    /// Connects a [`RemoteChannel`] over `transport` at build time, using the
    /// configured call timeout. Building then requires a Tokio runtime.
    pub fn connect(mut self, transport: Transport) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn fault_sink(mut self, faults: Arc<dyn FaultSink>) -> Self {
        self.faults = faults;
        self
    }

    pub fn build(self) -> Result<Arc<Bridge>> {
        let BridgeBuilder {
            config,
            registry,
            in_process,
            remote,
            transport,
            faults,
        } = self;

        let remote = match (remote, transport) {
            (Some(channel), _) => Some(channel),
            (None, Some(transport)) => Some(Arc::new(RemoteChannel::connect(
                transport,
                config.call_timeout(),
            ))),
            (None, None) => None,
        };

        let listeners: Arc<dyn ListenerHost> = match config.default_mode {
            CallingMode::InProcess => {
                let engine = in_process
                    .clone()
                    .ok_or(BridgeError::ModeUnavailable(CallingMode::InProcess))?;
                Arc::new(InProcessListeners::new(engine)) as Arc<dyn ListenerHost>
            }
            CallingMode::OutOfProcess => {
                let channel = remote
                    .clone()
                    .ok_or(BridgeError::ModeUnavailable(CallingMode::OutOfProcess))?;
                channel as Arc<dyn ListenerHost>
            }
        };

        let table = Arc::new(HandleTable::new(config.max_handles));
        let registry = Arc::new(registry);
        let invoker = Invoker::new(
            Arc::clone(&table),
            Arc::clone(&registry),
            in_process,
            remote,
            config.default_mode,
        );
        let multiplexer = Multiplexer::new(
            Arc::clone(&table),
            Arc::clone(&registry),
            listeners,
            faults,
        );

        info!(
            target = "bridge",
            mode = %config.default_mode,
            in_process = invoker.supports(CallingMode::InProcess),
            out_of_process = invoker.supports(CallingMode::OutOfProcess),
            "bridge ready"
        );

        Ok(Arc::new(Bridge {
            config,
            table,
            registry,
            invoker,
            multiplexer,
        }))
    }
}
