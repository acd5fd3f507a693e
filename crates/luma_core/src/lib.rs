//! Core types for the Luma object model.
//!
//! This crate contains the fundamental types that are independent of the runtime:
//! - `Value` - tagged runtime value (`nil`, booleans, numbers, strings, tables)
//! - `PropertyKey` - the key of a named property, including the reserved special keys
//! - `StringId` / `TableId` - handles to heap-allocated objects
//! - `fast_hasher` - fixed-seed hashing shared by every shape and map

pub mod gc;
pub mod value;

pub use gc::{StringId, TableId};
pub use value::{
    FastHashMap, PropertyKey, SpecialKey, Value, fast_hasher, fast_map_new, hash_f64, round_up_pow2,
};
