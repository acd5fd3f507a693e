//! Luma object model: tables, hidden classes and inline cache records.

#![allow(clippy::collapsible_if)]
#![allow(clippy::collapsible_else_if)]
#![allow(clippy::new_without_default)]
#![allow(clippy::should_implement_trait)]
#![allow(clippy::too_many_arguments)]
#![allow(clippy::manual_range_contains)]
#![allow(clippy::unnecessary_cast)]
#![allow(clippy::len_zero)]
#![allow(clippy::unnecessary_map_or)]

pub mod core;
pub mod errors;
pub mod runtime;
pub mod shape;
pub mod table;
pub mod vm;

// Re-exports from core/
pub use core::{ArrayKind, ArrayType, Butterfly, Heap, StringTable};

// Re-exports from runtime/
pub use runtime::VmConfig;

// Re-exports from shape/
pub use shape::{DictionaryId, HiddenClass, MetamethodKind, Shapes, StructureId};

// Re-exports from table/ and vm/
pub use table::{GetMetatableResult, IteratorState, TableObject, TableObjectIterator};
pub use vm::Vm;

pub use luma_core::{PropertyKey, StringId, TableId, Value};
