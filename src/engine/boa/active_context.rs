//! Request execution on the isolate thread.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::Sender;

use boa_engine::{Context, JsResult, JsString, JsValue, Script, Source};
use tracing::{debug, trace, warn};

use crate::engine::handle::HandleId;
use crate::engine::value::{JsText, Value};

use super::context::{Bridge, ContextEnv};
use super::{error, value};

pub const NOT_CALLABLE: &str = "property not found or isn't a function";
const INVALID_HANDLE: &str = "invalid object handle";

pub enum Request {
    Execute(String),
    GetVariable(String),
    SetVariable(String, Value),
    GetProperty(HandleId, String),
    SetProperty(HandleId, String, Value),
    InvokeProperty(HandleId, String, Vec<Value>),
    CollectGarbage,
}

impl Request {
    fn name(&self) -> &'static str {
        match *self {
            Request::Execute(_) => "execute",
            Request::GetVariable(_) => "get_variable",
            Request::SetVariable(..) => "set_variable",
            Request::GetProperty(..) => "get_property",
            Request::SetProperty(..) => "set_property",
            Request::InvokeProperty(..) => "invoke_property",
            Request::CollectGarbage => "collect_garbage",
        }
    }
}

pub struct Command {
    pub request: Request,
    pub reply: Sender<Value>,
}

/// An isolate that's entered for one request.
pub struct ActiveContext<'a> {
    context: &'a mut Context,
    bridge: &'a Bridge,
}

impl<'a> ActiveContext<'a> {
    pub fn new(env: &'a mut ContextEnv) -> ActiveContext<'a> {
        ActiveContext { context: &mut env.context, bridge: &env.bridge }
    }

    /// Runs one request. Handles the host dropped since the last request are released first.
    /// Nothing escapes: exceptions become error values and so do panics.
    pub fn dispatch(&mut self, request: Request) -> Value {
        let released = self.bridge.collect_released();
        let name = request.name();
        trace!(request = name, released, "entering isolate");

        let result = panic::catch_unwind(AssertUnwindSafe(|| self.run(request)));
        match result {
            Ok(value) => {
                trace!(request = name, kind = ?value.kind(), "leaving isolate");
                value
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                warn!(request = name, panic = %message, "request panicked");
                Value::UnknownError(Some(JsText::from(format!("engine panicked: {}", message))))
            }
        }
    }

    fn run(&mut self, request: Request) -> Value {
        match request {
            Request::Execute(source) => self.execute(&source),
            Request::GetVariable(name) => self.get_variable(&name),
            Request::SetVariable(name, value) => self.set_variable(&name, value),
            Request::GetProperty(id, name) => self.get_property(id, &name),
            Request::SetProperty(id, name, value) => self.set_property(id, &name, value),
            Request::InvokeProperty(id, name, args) => self.invoke_property(id, &name, args),
            Request::CollectGarbage => {
                boa_gc::force_collect();
                Value::Null
            }
        }
    }

    /// Runs `f`, turning any exception it raises into an error value.
    fn call_js<F>(&mut self, f: F) -> Value where F: FnOnce(&mut Context, &Bridge) -> JsResult<Value> {
        match f(&mut *self.context, self.bridge) {
            Ok(value) => value,
            Err(e) => error::classify(&e, self.bridge, &mut *self.context),
        }
    }

    pub fn execute(&mut self, source: &str) -> Value {
        let script = match Script::parse(Source::from_bytes(source), None, &mut *self.context) {
            Ok(script) => script,
            Err(e) => {
                debug!(error = %e, "script failed to compile");
                return Value::CompileError(JsText::from(e.to_string()));
            }
        };
        self.call_js(|context, bridge| {
            let result = script.evaluate(context)?;
            value::from_native(&result, bridge, context)
        })
    }

    pub fn get_variable(&mut self, name: &str) -> Value {
        self.call_js(|context, bridge| {
            let global = context.global_object();
            let result = global.get(JsString::from(name), context)?;
            value::from_native(&result, bridge, context)
        })
    }

    pub fn set_variable(&mut self, name: &str, value: Value) -> Value {
        self.call_js(|context, bridge| {
            let native = value::to_native(&value, bridge, context)?;
            let global = context.global_object();
            Ok(set_result(global.set(JsString::from(name), native, false, context)?, name))
        })
    }

    pub fn get_property(&mut self, id: HandleId, name: &str) -> Value {
        let object = match self.bridge.object(id) {
            Some(object) => object,
            None => return invalid_handle(id),
        };
        self.call_js(|context, bridge| {
            let result = object.get(JsString::from(name), context)?;
            value::from_native(&result, bridge, context)
        })
    }

    pub fn set_property(&mut self, id: HandleId, name: &str, value: Value) -> Value {
        let object = match self.bridge.object(id) {
            Some(object) => object,
            None => return invalid_handle(id),
        };
        self.call_js(|context, bridge| {
            let native = value::to_native(&value, bridge, context)?;
            Ok(set_result(object.set(JsString::from(name), native, false, context)?, name))
        })
    }

    /// Calls `object[name](...args)` with `this` bound to the object.
    pub fn invoke_property(&mut self, id: HandleId, name: &str, args: Vec<Value>) -> Value {
        let object = match self.bridge.object(id) {
            Some(object) => object,
            None => return invalid_handle(id),
        };
        self.call_js(|context, bridge| {
            let property = object.get(JsString::from(name), context)?;
            let function = match property.as_callable() {
                Some(function) => function.clone(),
                None => return Ok(Value::Error(JsText::from(NOT_CALLABLE))),
            };
            let mut native_args = Vec::with_capacity(args.len());
            for arg in &args {
                native_args.push(value::to_native(arg, bridge, context)?);
            }
            let result = function.call(&JsValue::from(object.clone()), &native_args, context)?;
            value::from_native(&result, bridge, context)
        })
    }
}

fn set_result(succeeded: bool, name: &str) -> Value {
    if succeeded {
        Value::Null
    } else {
        Value::Error(JsText::from(format!("property could not be set: {}", name)))
    }
}

fn invalid_handle(id: HandleId) -> Value {
    warn!(handle = id, "request for a released object handle");
    Value::UnknownError(Some(JsText::from(INVALID_HANDLE)))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".into()
    }
}
