//! Core runtime infrastructure.
//!
//! This module contains the storage building blocks of a table:
//! - `ArrayType` - packed description of the array part, and its growth policy
//! - `ArraySparseMap` - numeric indices that do not fit the vector
//! - `Butterfly` - out-of-line named slots plus the array part
//! - `Heap` - arena owning every table object
//! - `StringTable` - string interning

pub mod array_type;
pub mod butterfly;
pub mod heap;
pub mod sparse_map;
pub mod strings;

pub use array_type::{ArrayGrowthPolicy, ArrayKind, ArrayType};
pub use butterfly::{ArrayLength, Butterfly};
pub use heap::Heap;
pub use sparse_map::ArraySparseMap;
pub use strings::StringTable;
