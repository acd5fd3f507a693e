//! Caller-facing records: inline caches and VM configuration.

pub mod cache;
pub mod config;

pub use cache::*;
pub use config::VmConfig;
