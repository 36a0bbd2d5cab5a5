//! A bidirectional value-interchange bridge between a host Rust embedder
//! and a guest WebAssembly module.
//!
//! The wire format is the tagged 128-bit "IPL value": a 4-bit variant tag
//! plus a 124-bit payload, transported across the wasm call boundary as two
//! `u64` halves. [`Bridge`] hides this from callers behind [`Value`], an
//! ordinary Rust enum.

pub mod bits;
mod bridge;
mod config;
mod decode;
mod encode;
mod error;
mod free;
mod memory;
mod ops;
mod registry;
mod tag;
mod value;

pub use bridge::Bridge;
pub use config::BridgeConfig;
pub use error::BridgeError;
pub use registry::HostCallback;
pub use tag::Tag;
pub use value::{Function, IplValue, Origin, PtrLen, Value};
