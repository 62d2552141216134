use std::sync::Arc;

use crate::bridge::Bridge;
use crate::decoder::StorageEvent;
use crate::error::Result;
use crate::facade::RemoteObject;
use crate::handle::Handle;
use crate::multiplexer::Subscription;
use crate::value::Value;

pub struct Window {
    bridge: Arc<Bridge>,
    handle: Handle,
}

remote_object!(Window);

impl Window {
    bridge_property!(inner_width, "innerWidth", f64);
    bridge_property!(inner_height, "innerHeight", f64);
    bridge_property!(scroll_x, "scrollX", f64);
    bridge_property!(scroll_y, "scrollY", f64);

    pub async fn scroll_to(&self, x: f64, y: f64) -> Result<()> {
        self.bridge
            .invoker()
            .call(&self.handle, "scrollTo", vec![Value::from(x), Value::from(y)])
            .await
    }

    pub fn on_storage<F>(&self, callback: F) -> Result<Subscription>
    where
        F: Fn(&StorageEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.on_typed::<StorageEvent, _>("storage", callback)
    }
}
