//! Host objects as seen from script.
//!
//! A host proxy is a JS `Proxy` whose target is a plain native-data object carrying
//! the host id. Property reads and writes hit the `get`/`set` traps, which call the host.
//! When the GC collects the target, its finalizer tells the host to drop the id.

use std::cell::Cell;
use std::fmt;
use std::sync::Arc;

use boa_engine::{Context, JsData, JsError, JsNativeError, JsObject, JsResult, JsValue};
use boa_gc::{Finalize, Trace};
use tracing::{debug, trace};

use crate::engine::traits::HostObjects;
use crate::engine::value::{HostId, Value};

use super::context::{Bridge, WeakBridge};
use super::value::{from_native, to_native};

#[derive(Trace, JsData)]
pub struct HostProxy {
    #[unsafe_ignore_trace]
    id: HostId,
    #[unsafe_ignore_trace]
    host: Arc<dyn HostObjects>,
    #[unsafe_ignore_trace]
    bridge: WeakBridge,
    #[unsafe_ignore_trace]
    finalized: Cell<bool>,
}

impl Finalize for HostProxy {
    fn finalize(&self) {
        // The collector may finalize and then drop; only the first one counts.
        if !self.finalized.replace(true) {
            debug!(id = %self.id, "host proxy collected");
            self.host.remove(self.id);
        }
    }
}

impl fmt::Debug for HostProxy {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("HostProxy").field("id", &self.id).finish()
    }
}

pub fn new_proxy(bridge: &Bridge, id: HostId, context: &mut Context) -> JsResult<JsObject> {
    let data = HostProxy {
        id,
        host: bridge.host().clone(),
        bridge: bridge.downgrade(),
        finalized: Cell::new(false),
    };
    let target = JsObject::from_proto_and_data(None::<JsObject>, data);
    let proxy = bridge.template().instantiate(target, context)?;
    trace!(%id, "host proxy created");
    Ok(proxy)
}

/// The host id behind `object`, if it's one of this engine's host proxies.
pub fn host_id_of(bridge: &Bridge, object: &JsObject, context: &mut Context) -> JsResult<Option<HostId>> {
    let target = match bridge.template().target_of(object, context)? {
        Some(target) => target,
        None => return Ok(None),
    };
    let id = target.downcast_ref::<HostProxy>().map(|p| p.id);
    Ok(id)
}

/// Unpacks the trap's target argument. The borrow on the target ends before the host is called.
fn target_parts(args: &[JsValue]) -> JsResult<(HostId, Arc<dyn HostObjects>, Bridge)> {
    let target = args.first().and_then(JsValue::as_object)
        .ok_or_else(|| JsNativeError::typ().with_message("host proxy trap called without a target"))?;
    let proxy = target.downcast_ref::<HostProxy>()
        .ok_or_else(|| JsNativeError::typ().with_message("host proxy trap called on a foreign target"))?;
    let bridge = proxy.bridge.upgrade()
        .ok_or_else(|| JsNativeError::typ().with_message("engine has been disposed"))?;
    Ok((proxy.id, proxy.host.clone(), bridge))
}

/// Symbol keys aren't forwarded to the host.
fn property_name(key: Option<&JsValue>) -> Option<String> {
    key.and_then(JsValue::as_string).map(|s| s.to_std_string_escaped())
}

/// A `HostError` result is thrown into script as a fresh proxy for the error object.
fn into_script(result: Value, bridge: &Bridge, context: &mut Context) -> JsResult<JsValue> {
    let thrown = matches!(result, Value::HostError(_));
    let value = to_native(&result, bridge, context)?;
    if thrown {
        Err(JsError::from_opaque(value))
    } else {
        Ok(value)
    }
}

/// `handler.get(target, property, receiver)`
pub fn get_trap(_this: &JsValue, args: &[JsValue], context: &mut Context) -> JsResult<JsValue> {
    let (id, host, bridge) = target_parts(args)?;
    let name = match property_name(args.get(1)) {
        Some(name) => name,
        None => return Ok(JsValue::undefined()),
    };
    trace!(%id, name = %name, "host get");
    let result = host.get_property(id, &name);
    into_script(result, &bridge, context)
}

/// `handler.set(target, property, value, receiver)`
pub fn set_trap(_this: &JsValue, args: &[JsValue], context: &mut Context) -> JsResult<JsValue> {
    let (id, host, bridge) = target_parts(args)?;
    let name = match property_name(args.get(1)) {
        Some(name) => name,
        None => return Ok(JsValue::new(false)),
    };
    let value = from_native(args.get(2).unwrap_or(&JsValue::undefined()), &bridge, context)?;
    trace!(%id, name = %name, "host set");
    let result = host.set_property(id, &name, value);
    into_script(result, &bridge, context)?;
    Ok(JsValue::new(true))
}
