//! Typed wrappers over engine objects.
//!
//! Every member is written once against the invoker and runs in whichever
//! calling mode the bridge was configured with.

macro_rules! bridge_property {
    ($getter:ident, $setter:ident, $member:literal, $ty:ty) => {
        pub async fn $getter(&self) -> $crate::error::Result<$ty> {
            self.bridge.invoker().get(&self.handle, $member).await
        }

        pub async fn $setter(&self, value: $ty) -> $crate::error::Result<()> {
            self.bridge.invoker().set(&self.handle, $member, value).await
        }
    };
    ($getter:ident, $member:literal, $ty:ty) => {
        pub async fn $getter(&self) -> $crate::error::Result<$ty> {
            self.bridge.invoker().get(&self.handle, $member).await
        }
    };
}

macro_rules! remote_object {
    ($wrapper:ident) => {
        impl $crate::facade::RemoteObject for $wrapper {
            fn bridge(&self) -> &std::sync::Arc<$crate::bridge::Bridge> {
                &self.bridge
            }

            fn handle(&self) -> &$crate::handle::Handle {
                &self.handle
            }
        }

        impl $wrapper {
            pub(crate) fn new(
                bridge: std::sync::Arc<$crate::bridge::Bridge>,
                handle: $crate::handle::Handle,
            ) -> Self {
                Self { bridge, handle }
            }
        }
    };
}

mod dialog;
mod document;
mod element;
mod media;
mod window;

use std::sync::Arc;

use crate::bridge::Bridge;
use crate::decoder::{DecodedEventRecord, EventRecord};
use crate::error::Result;
use crate::handle::Handle;
use crate::multiplexer::Subscription;
use crate::value::EngineRef;

pub use dialog::DialogElement;
pub use document::Document;
pub use element::Element;
pub use media::MediaElement;
pub use window::Window;

pub trait RemoteObject {
    fn bridge(&self) -> &Arc<Bridge>;

    fn handle(&self) -> &Handle;

    /// Subscribes to any event, receiving the decoded record as-is.
    fn on<F>(&self, event: &str, callback: F) -> Result<Subscription>
    where
        F: Fn(&DecodedEventRecord) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.bridge()
            .multiplexer()
            .subscribe(self.handle(), event, callback)
    }

    fn on_typed<E, F>(&self, event: &str, callback: F) -> Result<Subscription>
    where
        E: EventRecord,
        F: Fn(&E) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.bridge()
            .multiplexer()
            .subscribe_typed(self.handle(), event, callback)
    }

    fn off(&self, subscription: &Subscription) -> Result<bool> {
        self.bridge().multiplexer().unsubscribe(subscription)
    }

    fn dispose(&self) {
        self.bridge().dispose(self.handle());
    }
}

fn wrap_element(bridge: &Arc<Bridge>, target: Option<EngineRef>) -> Result<Option<Element>> {
    target.map(|target| bridge.element(target)).transpose()
}
