use std::sync::Arc;

use crate::bridge::Bridge;
use crate::decoder::ToggleEvent;
use crate::error::Result;
use crate::facade::RemoteObject;
use crate::handle::Handle;
use crate::multiplexer::Subscription;
use crate::value::Value;

pub struct DialogElement {
    bridge: Arc<Bridge>,
    handle: Handle,
}

remote_object!(DialogElement);

impl DialogElement {
    bridge_property!(open, "open", bool);
    bridge_property!(return_value, set_return_value, "returnValue", String);

    pub async fn show(&self) -> Result<()> {
        self.bridge.invoker().call(&self.handle, "show", Vec::new()).await
    }

    pub async fn show_modal(&self) -> Result<()> {
        self.bridge
            .invoker()
            .call(&self.handle, "showModal", Vec::new())
            .await
    }

    pub async fn close(&self, return_value: Option<&str>) -> Result<()> {
        let args = return_value.map(Value::from).into_iter().collect();
        self.bridge.invoker().call(&self.handle, "close", args).await
    }

    pub fn on_toggle<F>(&self, callback: F) -> Result<Subscription>
    where
        F: Fn(&ToggleEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.on_typed::<ToggleEvent, _>("toggle", callback)
    }
}
