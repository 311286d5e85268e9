//! hostjs embeds a JavaScript engine inside a host process.
//!
//! The host drives the engine through a small set of operations (execute a script,
//! read and write globals, read, write and invoke properties of engine objects).
//! Values cross the boundary as a tagged [`Value`]. Host objects surface in script
//! as proxies whose property traffic is routed back to the host through
//! [`HostObjects`]; engine objects surface in the host as [`ObjectHandle`]s.
//!
//! For non-Rust hosts, [`raw`] defines the fixed wire layout of a value and [`ffi`]
//! exports the operations over a C ABI.

pub mod engine;
pub use engine::*;

pub mod ffi;

pub mod raw;
