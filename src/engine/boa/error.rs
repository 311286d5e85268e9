use boa_engine::{Context, JsError, JsValue};
use tracing::{debug, warn};

use crate::engine::value::{JsText, Value};

use super::context::Bridge;
use super::proxy;

/// Turns an exception into an error-kind value.
///
/// - a host proxy was thrown: `HostError` with its id
/// - any other object was thrown: `WrappedError` with a handle to it
/// - a primitive was thrown: `Error` with its string form
///
/// Errors the engine raises itself (`null.x`, undeclared names) are the same objects script
/// would catch, so they take the object path too. Errors script can't catch, such as runtime
/// limits, have no object form and become `Error` with the message.
/// `UnknownError` is left for exceptions that can't be inspected.
pub fn classify(err: &JsError, bridge: &Bridge, context: &mut Context) -> Value {
    if err.as_native().is_some_and(|native| native.is_runtime_limit()) {
        debug!(error = %err, "uncatchable engine error");
        return Value::Error(JsText::from(err.to_string()));
    }
    let thrown = err.to_opaque(context);

    let result = match thrown {
        JsValue::Object(ref object) => match proxy::host_id_of(bridge, object, context) {
            Ok(Some(id)) => Value::HostError(id),
            Ok(None) => Value::WrappedError(bridge.persist(object.clone())),
            Err(e) => {
                warn!(error = %e, "could not inspect thrown object");
                Value::UnknownError(None)
            }
        },
        ref primitive => match primitive.to_string(context) {
            Ok(s) => Value::Error(JsText::from(s.to_vec())),
            Err(_) => Value::UnknownError(None),
        },
    };
    debug!(kind = ?result.kind(), "script threw");
    result
}
