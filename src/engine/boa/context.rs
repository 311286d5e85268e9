use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::sync::Arc;

use boa_engine::object::ObjectInitializer;
use boa_engine::{js_string, Context, JsNativeError, JsObject, JsResult, JsString, NativeFunction};
use tracing::debug;

use crate::engine::config::EngineConfig;
use crate::engine::handle::{HandleId, ObjectHandle};
use crate::engine::traits::HostObjects;

use super::handles::HandleTable;
use super::proxy;

/// Everything a host proxy is made from. Built once per isolate, before any script runs,
/// so script can't tamper with the intrinsics it captures.
pub struct ProxyTemplate {
    /// A WeakMap from proxy to its target. Never exposed to script; membership is how
    /// the engine tells its own proxies apart from script objects.
    registry: JsObject,
    registry_get: JsObject,
    registry_set: JsObject,
    handler: JsObject,
    proxy_ctor: JsObject,
}

fn new_proxy_template(context: &mut Context) -> JsResult<ProxyTemplate> {
    let (weak_map, weak_map_proto, proxy_ctor) = {
        let constructors = context.intrinsics().constructors();
        (constructors.weak_map().constructor(),
         constructors.weak_map().prototype(),
         constructors.proxy().constructor())
    };

    let registry = weak_map.construct(&[], None, context)?;
    let registry_get = method(&weak_map_proto, js_string!("get"), context)?;
    let registry_set = method(&weak_map_proto, js_string!("set"), context)?;

    let handler = ObjectInitializer::new(context)
        .function(NativeFunction::from_fn_ptr(proxy::get_trap), js_string!("get"), 3)
        .function(NativeFunction::from_fn_ptr(proxy::set_trap), js_string!("set"), 4)
        .build();

    Ok(ProxyTemplate { registry, registry_get, registry_set, handler, proxy_ctor })
}

fn method(object: &JsObject, name: JsString, context: &mut Context) -> JsResult<JsObject> {
    match object.get(name, context)?.as_callable() {
        Some(f) => Ok(f.clone()),
        None => Err(JsNativeError::typ().with_message("intrinsic method missing").into()),
    }
}

impl ProxyTemplate {
    /// Wraps `target` in a proxy using the host trap handler, and registers it.
    pub fn instantiate(&self, target: JsObject, context: &mut Context) -> JsResult<JsObject> {
        let proxy = self.proxy_ctor.construct(
            &[target.clone().into(), self.handler.clone().into()], None, context)?;
        self.registry_set.call(
            &self.registry.clone().into(), &[proxy.clone().into(), target.into()], context)?;
        Ok(proxy)
    }

    /// The proxy target registered for `object`, if `object` is one of our proxies.
    pub fn target_of(&self, object: &JsObject, context: &mut Context) -> JsResult<Option<JsObject>> {
        let target = self.registry_get.call(
            &self.registry.clone().into(), &[object.clone().into()], context)?;
        Ok(target.as_object().cloned())
    }
}

struct BridgeInner {
    host: Arc<dyn HostObjects>,
    template: ProxyTemplate,
    handles: RefCell<HandleTable>,
    engine: u64,
}

/// The per-isolate state that conversions need: the host callbacks, the proxy template
/// and the host's object handles. Lives on the isolate thread.
///
/// Proxy targets keep a [`WeakBridge`], so tearing the bridge down doesn't wait on the GC.
#[derive(Clone)]
pub struct Bridge {
    inner: Rc<BridgeInner>,
}

#[derive(Clone)]
pub struct WeakBridge {
    inner: Weak<BridgeInner>,
}

impl WeakBridge {
    pub fn upgrade(&self) -> Option<Bridge> {
        self.inner.upgrade().map(|inner| Bridge { inner })
    }
}

impl Bridge {
    pub fn downgrade(&self) -> WeakBridge {
        WeakBridge { inner: Rc::downgrade(&self.inner) }
    }

    pub fn host(&self) -> &Arc<dyn HostObjects> {
        &self.inner.host
    }

    pub fn template(&self) -> &ProxyTemplate {
        &self.inner.template
    }

    pub fn engine_id(&self) -> u64 {
        self.inner.engine
    }

    pub fn persist(&self, object: JsObject) -> ObjectHandle {
        self.inner.handles.borrow_mut().persist(object)
    }

    pub fn object(&self, id: HandleId) -> Option<JsObject> {
        self.inner.handles.borrow().get_id(id)
    }

    /// Resolves a handle coming back from the host. Fails for handles of other engines.
    pub fn resolve(&self, handle: &ObjectHandle) -> JsResult<JsObject> {
        match self.inner.handles.borrow().get(handle) {
            Some(object) => Ok(object),
            None => Err(JsNativeError::typ()
                .with_message(format!("{:?} does not belong to engine {}", handle, self.inner.engine))
                .into()),
        }
    }

    pub fn collect_released(&self) -> usize {
        self.inner.handles.borrow_mut().collect_released()
    }

    pub fn handle_count(&self) -> usize {
        self.inner.handles.borrow().len()
    }

    fn release_all(&self) {
        self.inner.handles.borrow_mut().clear();
    }
}

/// An isolate: the boa context plus the bridge state that goes with it.
pub struct ContextEnv {
    pub context: Context,
    pub bridge: Bridge,
}

pub fn new_context_env(host: Arc<dyn HostObjects>, config: &EngineConfig, engine: u64)
                       -> JsResult<ContextEnv> {
    let mut context = Context::default();
    if let Some(limit) = config.recursion_limit {
        context.runtime_limits_mut().set_recursion_limit(limit);
    }
    if let Some(limit) = config.loop_iteration_limit {
        context.runtime_limits_mut().set_loop_iteration_limit(limit);
    }

    let template = new_proxy_template(&mut context)?;
    let bridge = Bridge {
        inner: Rc::new(BridgeInner {
            host,
            template,
            handles: RefCell::new(HandleTable::new(engine)),
            engine,
        }),
    };
    Ok(ContextEnv { context, bridge })
}

impl ContextEnv {
    /// Tears down in dependency order: host handles and the proxy template, then the context,
    /// then a final collection so every proxy still alive gets its `remove` callback.
    pub fn teardown(self) {
        let ContextEnv { context, bridge } = self;
        let engine = bridge.engine_id();
        debug!(engine, handles = bridge.handle_count(), "tearing down isolate");

        bridge.release_all();
        drop(bridge);
        drop(context);
        boa_gc::force_collect();
        debug!(engine, "isolate torn down");
    }
}
