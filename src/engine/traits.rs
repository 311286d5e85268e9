use std::sync::Arc;

use super::value::{HostId, Value};

/// The host side of host-object proxies.
///
/// The engine calls these on its own thread while a request is in progress. They must not
/// call back into the same engine; such calls fail with [`super::EngineError::Reentrant`].
pub trait HostObjects: Send + Sync + 'static {
    /// The proxy for `id` was collected. Called at most once per proxy.
    fn remove(&self, id: HostId);

    /// Reads a property. Return `HostError` to make the access throw in script.
    fn get_property(&self, id: HostId, name: &str) -> Value;

    /// Writes a property. The host takes ownership of `value`.
    /// Return `HostError` to make the assignment throw in script; any other result is discarded.
    fn set_property(&self, id: HostId, name: &str, value: Value) -> Value;
}

impl<H: HostObjects> HostObjects for Arc<H> {
    fn remove(&self, id: HostId) {
        (**self).remove(id)
    }

    fn get_property(&self, id: HostId, name: &str) -> Value {
        (**self).get_property(id, name)
    }

    fn set_property(&self, id: HostId, name: &str, value: Value) -> Value {
        (**self).set_property(id, name, value)
    }
}
