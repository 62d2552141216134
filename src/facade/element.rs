use std::sync::Arc;

use super::{DialogElement, MediaElement};
use crate::bridge::Bridge;
use crate::decoder::{KeyboardEvent, MouseEvent, PointerEvent};
use crate::error::Result;
use crate::facade::RemoteObject;
use crate::handle::Handle;
use crate::multiplexer::Subscription;
use crate::value::Value;

pub struct Element {
    bridge: Arc<Bridge>,
    handle: Handle,
}

remote_object!(Element);

impl Element {
    bridge_property!(id, set_id, "id", String);
    bridge_property!(hidden, set_hidden, "hidden", bool);
    bridge_property!(scroll_left, set_scroll_left, "scrollLeft", f64);
    bridge_property!(scroll_top, set_scroll_top, "scrollTop", f64);
    bridge_property!(tag_name, "tagName", String);

    pub async fn get_attribute(&self, name: &str) -> Result<Option<String>> {
        self.bridge
            .invoker()
            .call(&self.handle, "getAttribute", vec![Value::from(name)])
            .await
    }

    pub async fn set_attribute(&self, name: &str, value: &str) -> Result<()> {
        self.bridge
            .invoker()
            .call(
                &self.handle,
                "setAttribute",
                vec![Value::from(name), Value::from(value)],
            )
            .await
    }

    pub async fn focus(&self) -> Result<()> {
        self.bridge.invoker().call(&self.handle, "focus", Vec::new()).await
    }

    pub fn on_keydown<F>(&self, callback: F) -> Result<Subscription>
    where
        F: Fn(&KeyboardEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.on_typed::<KeyboardEvent, _>("keydown", callback)
    }

    pub fn on_pointerdown<F>(&self, callback: F) -> Result<Subscription>
    where
        F: Fn(&PointerEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.on_typed::<PointerEvent, _>("pointerdown", callback)
    }

    pub fn on_click<F>(&self, callback: F) -> Result<Subscription>
    where
        F: Fn(&MouseEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.on_typed::<MouseEvent, _>("click", callback)
    }

    /// Views the same engine object as a media element. The handle is shared.
    pub fn as_media(&self) -> MediaElement {
        MediaElement::new(Arc::clone(&self.bridge), self.handle.clone())
    }

    pub fn as_dialog(&self) -> DialogElement {
        DialogElement::new(Arc::clone(&self.bridge), self.handle.clone())
    }
}
