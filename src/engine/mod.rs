//! The engine and everything that crosses its boundary.
//!
//! An engine owns one isolate: a JS heap plus a single context with its global object.
//! Isolates are single-threaded, so each engine runs its isolate on a dedicated thread
//! and callers queue requests to it. Calls from any number of host threads are serialized
//! in arrival order.
//!
//! The boundary types are engine-agnostic. [`boa`] is the only engine implementation so far,
//! and it's the only module that knows about engine internals.

pub mod boa;
pub use self::boa::Engine;

mod config;
pub use self::config::EngineConfig;

mod error;
pub use self::error::EngineError;

mod handle;
pub use self::handle::{HandleId, ObjectHandle};
#[cfg(test)]
pub(crate) use self::handle::ReleaseQueue;

mod keepalive;
pub use self::keepalive::KeepAlive;

mod traits;
pub use self::traits::HostObjects;

mod value;
pub use self::value::{HostId, JsText, Kind, Value};
