//! C ABI for hosts that aren't written in Rust.
//!
//! Text crosses as UTF-16 pointer/length pairs. Values cross as [`RawValue`] records:
//! records returned by these functions belong to the caller, records passed in are consumed.
//! Engine failures (disposed engine, foreign handle, reentry) come back as `UnknownError`
//! records carrying the failure message.

use std::ffi::c_void;
use std::ptr;
use std::slice;

use tracing::{error, warn};

use crate::engine::{Engine, EngineError, HostId, HostObjects, JsText, ObjectHandle, Value};
use crate::raw::RawValue;

pub type RemoveCallback = extern "C" fn(id: i32);
pub type GetPropertyCallback = extern "C" fn(id: i32, name: *const u16, name_len: i32) -> RawValue;
/// Receives ownership of `value`'s contents only for the duration of the call;
/// the engine disposes it afterwards.
pub type SetPropertyCallback =
    extern "C" fn(id: i32, name: *const u16, name_len: i32, value: RawValue) -> RawValue;

/// Host objects implemented by C callbacks.
pub struct ForeignHost {
    remove: RemoveCallback,
    get_property: GetPropertyCallback,
    set_property: SetPropertyCallback,
}

impl HostObjects for ForeignHost {
    fn remove(&self, id: HostId) {
        (self.remove)(id.0)
    }

    fn get_property(&self, id: HostId, name: &str) -> Value {
        let name: Vec<u16> = name.encode_utf16().collect();
        let result = (self.get_property)(id.0, name.as_ptr(), name.len() as i32);
        unsafe { Value::from_raw(result) }
    }

    fn set_property(&self, id: HostId, name: &str, value: Value) -> Value {
        let name: Vec<u16> = name.encode_utf16().collect();
        let value = value.into_raw();
        let result = (self.set_property)(id.0, name.as_ptr(), name.len() as i32, value);
        unsafe {
            value.dispose();
            Value::from_raw(result)
        }
    }
}

unsafe fn text_arg(text: *const u16, len: i32) -> String {
    let len = usize::try_from(len).unwrap_or(0);
    if text.is_null() || len == 0 {
        return String::new();
    }
    String::from_utf16_lossy(slice::from_raw_parts(text, len))
}

fn reply(result: Result<Value, EngineError>) -> RawValue {
    match result {
        Ok(value) => value.into_raw(),
        Err(e) => failure(&e.to_string()),
    }
}

fn failure(message: &str) -> RawValue {
    Value::UnknownError(Some(JsText::from(message))).into_raw()
}

/// Starts an engine. Returns null if it couldn't start.
#[no_mangle]
pub extern "C" fn hostjs_engine_new(remove: RemoveCallback, get_property: GetPropertyCallback,
                                    set_property: SetPropertyCallback) -> *mut Engine {
    match Engine::new(ForeignHost { remove, get_property, set_property }) {
        Ok(engine) => Box::into_raw(Box::new(engine)),
        Err(e) => {
            error!(error = %e, "could not start engine");
            ptr::null_mut()
        }
    }
}

/// Disposes and frees an engine. The pointer is invalid afterwards.
///
/// # Safety
///
/// `engine` must be null or come from [`hostjs_engine_new`], and not be used afterwards.
#[no_mangle]
pub unsafe extern "C" fn hostjs_engine_dispose(engine: *mut Engine) {
    if engine.is_null() {
        return;
    }
    let engine = Box::from_raw(engine);
    if let Err(e) = engine.dispose() {
        warn!(error = %e, "engine dispose failed");
    }
}

/// # Safety
///
/// `engine` must be null or a live engine. `source` must point to `len` code units.
#[no_mangle]
pub unsafe extern "C" fn hostjs_engine_execute(engine: *const Engine, source: *const u16, len: i32) -> RawValue {
    match engine.as_ref() {
        Some(engine) => reply(engine.execute(&text_arg(source, len))),
        None => failure("null engine"),
    }
}

/// # Safety
///
/// As [`hostjs_engine_execute`].
#[no_mangle]
pub unsafe extern "C" fn hostjs_engine_get_variable(engine: *const Engine, name: *const u16, len: i32) -> RawValue {
    match engine.as_ref() {
        Some(engine) => reply(engine.get_variable(&text_arg(name, len))),
        None => failure("null engine"),
    }
}

/// Consumes `value`.
///
/// # Safety
///
/// As [`hostjs_engine_execute`]; `value` must be a record owned by the caller.
#[no_mangle]
pub unsafe extern "C" fn hostjs_engine_set_variable(engine: *const Engine, name: *const u16, len: i32,
                                                    value: RawValue) -> RawValue {
    let value = Value::from_raw(value);
    match engine.as_ref() {
        Some(engine) => reply(engine.set_variable(&text_arg(name, len), value)),
        None => failure("null engine"),
    }
}

/// `object` is the payload pointer of a Wrapped or WrappedError record. It's borrowed.
///
/// # Safety
///
/// As [`hostjs_engine_execute`]; `object` must be null or a live handle pointer.
#[no_mangle]
pub unsafe extern "C" fn hostjs_engine_get_property_value(engine: *const Engine, object: *const c_void,
                                                          name: *const u16, len: i32) -> RawValue {
    match (engine.as_ref(), (object as *const ObjectHandle).as_ref()) {
        (Some(engine), Some(object)) => reply(engine.get_property(object, &text_arg(name, len))),
        _ => failure("null engine or object"),
    }
}

/// Consumes `value`.
///
/// # Safety
///
/// As [`hostjs_engine_get_property_value`]; `value` must be a record owned by the caller.
#[no_mangle]
pub unsafe extern "C" fn hostjs_engine_set_property_value(engine: *const Engine, object: *const c_void,
                                                          name: *const u16, len: i32, value: RawValue) -> RawValue {
    let value = Value::from_raw(value);
    match (engine.as_ref(), (object as *const ObjectHandle).as_ref()) {
        (Some(engine), Some(object)) => reply(engine.set_property(object, &text_arg(name, len), value)),
        _ => failure("null engine or object"),
    }
}

/// Consumes `args`, which is an Array record, or Null for no arguments.
///
/// # Safety
///
/// As [`hostjs_engine_set_property_value`].
#[no_mangle]
pub unsafe extern "C" fn hostjs_engine_invoke_property(engine: *const Engine, object: *const c_void,
                                                       name: *const u16, len: i32, args: RawValue) -> RawValue {
    let args = match Value::from_raw(args) {
        Value::Array(items) => items,
        Value::Null => Vec::new(),
        other => vec![other],
    };
    match (engine.as_ref(), (object as *const ObjectHandle).as_ref()) {
        (Some(engine), Some(object)) => reply(engine.invoke_property(object, &text_arg(name, len), args)),
        _ => failure("null engine or object"),
    }
}

/// # Safety
///
/// `engine` must be null or a live engine.
#[no_mangle]
pub unsafe extern "C" fn hostjs_engine_collect_garbage(engine: *const Engine) {
    if let Some(engine) = engine.as_ref() {
        if let Err(e) = engine.collect_garbage() {
            warn!(error = %e, "collect_garbage failed");
        }
    }
}

/// # Safety
///
/// `units` must point to `len` code units.
#[no_mangle]
pub unsafe extern "C" fn hostjs_value_alloc_string(units: *const u16, len: i32) -> RawValue {
    let len = usize::try_from(len).unwrap_or(0);
    if units.is_null() || len == 0 {
        return RawValue::alloc_string(&[]);
    }
    RawValue::alloc_string(slice::from_raw_parts(units, len))
}

#[no_mangle]
pub extern "C" fn hostjs_value_alloc_array(len: i32) -> RawValue {
    RawValue::alloc_array(usize::try_from(len).unwrap_or(0))
}

/// # Safety
///
/// `value` must be a record owned by the caller.
#[no_mangle]
pub unsafe extern "C" fn hostjs_value_dispose(value: RawValue) {
    value.dispose()
}
