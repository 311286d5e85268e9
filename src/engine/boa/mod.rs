//! The boa-backed engine.
//!
//! [`Engine`] is the public handle; it owns the isolate thread. On that thread,
//! `context` holds the isolate state, `active_context` runs requests against it,
//! `value` and `error` convert results, and `proxy` implements host objects.

mod active_context;
mod context;
mod engine;
mod error;
mod handles;
mod proxy;
mod value;

pub use self::engine::Engine;

#[cfg(test)]
pub mod testlib;
