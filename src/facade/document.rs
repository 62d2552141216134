use std::sync::Arc;

use super::{wrap_element, Element};
use crate::bridge::Bridge;
use crate::error::Result;
use crate::handle::Handle;
use crate::value::{EngineRef, Value};

pub struct Document {
    bridge: Arc<Bridge>,
    handle: Handle,
}

remote_object!(Document);

impl Document {
    bridge_property!(title, set_title, "title", String);
    bridge_property!(hidden, "hidden", bool);
    bridge_property!(visibility_state, "visibilityState", String);

    pub async fn get_element_by_id(&self, id: &str) -> Result<Option<Element>> {
        let target: Option<EngineRef> = self
            .bridge
            .invoker()
            .call(&self.handle, "getElementById", vec![Value::from(id)])
            .await?;
        wrap_element(&self.bridge, target)
    }

    pub async fn query_selector(&self, selector: &str) -> Result<Option<Element>> {
        let target: Option<EngineRef> = self
            .bridge
            .invoker()
            .call(&self.handle, "querySelector", vec![Value::from(selector)])
            .await?;
        wrap_element(&self.bridge, target)
    }
}
