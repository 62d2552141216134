use std::sync::Arc;

use crate::bridge::Bridge;
use crate::error::Result;
use crate::handle::Handle;

pub struct MediaElement {
    bridge: Arc<Bridge>,
    handle: Handle,
}

remote_object!(MediaElement);

impl MediaElement {
    bridge_property!(current_time, set_current_time, "currentTime", f64);
    bridge_property!(volume, set_volume, "volume", f64);
    bridge_property!(muted, set_muted, "muted", bool);
    bridge_property!(paused, "paused", bool);
    bridge_property!(duration, "duration", f64);

    pub async fn play(&self) -> Result<()> {
        self.bridge.invoker().call(&self.handle, "play", Vec::new()).await
    }

    pub async fn pause(&self) -> Result<()> {
        self.bridge.invoker().call(&self.handle, "pause", Vec::new()).await
    }
}
