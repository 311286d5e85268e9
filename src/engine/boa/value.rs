//! Conversions between boa values and boundary values.

use boa_engine::object::builtins::{JsArray, JsDate};
use boa_engine::{Context, JsNativeError, JsObject, JsResult, JsString, JsValue};

use crate::engine::value::{JsText, Value};

use super::context::Bridge;
use super::proxy;

/// Deeper arrays than this are almost certainly cyclic.
const MAX_DEPTH: usize = 512;

/// Array elements one conversion may produce, across all nesting levels. Sparse arrays
/// can claim a length of 2^32 - 1 without holding anything.
pub const MAX_ELEMENTS: usize = 1 << 22;

pub const FUNCTION_VALUE: &str = "function values cannot cross the engine boundary";

/// Converts an engine value for the host. Objects the host can't see inside become handles.
/// Fails only if script runs during conversion (array element getters) and throws,
/// or arrays nest too deep or hold too many elements.
pub fn from_native(value: &JsValue, bridge: &Bridge, context: &mut Context) -> JsResult<Value> {
    let mut budget = MAX_ELEMENTS;
    convert(value, bridge, context, 0, &mut budget)
}

fn convert(value: &JsValue, bridge: &Bridge, context: &mut Context, depth: usize, budget: &mut usize)
           -> JsResult<Value> {
    let result = match *value {
        JsValue::Null | JsValue::Undefined => Value::Null,
        JsValue::Boolean(b) => Value::Boolean(b),
        JsValue::Integer(i) => Value::Integer(i),
        JsValue::Rational(n) => number(n),
        JsValue::String(ref s) => Value::String(JsText::from(s.to_vec())),
        JsValue::Object(ref object) => return convert_object(object, bridge, context, depth, budget),
        JsValue::BigInt(_) => Value::UnknownError(Some(JsText::from("unsupported value type: bigint"))),
        JsValue::Symbol(_) => Value::UnknownError(Some(JsText::from("unsupported value type: symbol"))),
    };
    Ok(result)
}

/// Integral values get the narrowest integer kind that holds them. -0 stays a Number.
pub fn number(n: f64) -> Value {
    if n.fract() == 0.0 && !(n == 0.0 && n.is_sign_negative()) {
        if n >= f64::from(i32::MIN) && n <= f64::from(i32::MAX) {
            return Value::Integer(n as i32);
        }
        if n >= 0.0 && n <= f64::from(u32::MAX) {
            return Value::Index(n as u32);
        }
    }
    Value::Number(n)
}

fn convert_object(object: &JsObject, bridge: &Bridge, context: &mut Context, depth: usize,
                  budget: &mut usize) -> JsResult<Value> {
    if let Ok(date) = JsDate::from_object(object.clone()) {
        let time = date.get_time(context)?;
        return Ok(Value::Date(time.as_number().unwrap_or(f64::NAN)));
    }

    if object.is_array() {
        if depth >= MAX_DEPTH {
            return Err(JsNativeError::range().with_message("array nesting too deep to convert").into());
        }
        let array = JsArray::from_object(object.clone())?;
        let len = usize::try_from(array.length(context)?).unwrap_or(usize::MAX);
        if len > *budget {
            return Err(JsNativeError::range().with_message("array too large to convert").into());
        }
        *budget -= len;
        let mut items = Vec::with_capacity(len.min(1024));
        for i in 0..len {
            let item = array.get(i as u32, context)?;
            items.push(convert(&item, bridge, context, depth + 1, budget)?);
        }
        return Ok(Value::Array(items));
    }

    if object.is_callable() {
        return Ok(Value::UnknownError(Some(JsText::from(FUNCTION_VALUE))));
    }

    if let Some(id) = proxy::host_id_of(bridge, object, context)? {
        return Ok(Value::HostRef(id));
    }

    Ok(Value::Wrapped(bridge.persist(object.clone())))
}

/// Converts a host value for the engine. Fails if the value holds a handle of another engine.
pub fn to_native(value: &Value, bridge: &Bridge, context: &mut Context) -> JsResult<JsValue> {
    let result = match *value {
        Value::Null => JsValue::null(),
        Value::Boolean(b) => JsValue::new(b),
        Value::Integer(i) => JsValue::new(i),
        Value::Index(i) => JsValue::new(i),
        Value::Number(n) => JsValue::new(n),
        Value::String(ref s) => JsValue::new(JsString::from(s.as_units())),
        Value::Date(ms) => {
            let date = context.intrinsics().constructors().date().constructor();
            date.construct(&[JsValue::new(ms)], None, context)?.into()
        }
        Value::Array(ref items) => {
            let mut elements = Vec::with_capacity(items.len());
            for item in items {
                elements.push(to_native(item, bridge, context)?);
            }
            JsArray::from_iter(elements, context).into()
        }
        Value::HostRef(id) | Value::HostError(id) => proxy::new_proxy(bridge, id, context)?.into(),
        Value::Wrapped(ref h) | Value::WrappedError(ref h) => bridge.resolve(h)?.into(),
        Value::Error(ref message) | Value::CompileError(ref message) => {
            JsNativeError::error().with_message(message.to_string_lossy()).to_opaque(context).into()
        }
        Value::UnknownError(_) => JsValue::undefined(),
    };
    Ok(result)
}
