//! The VM owning every table, shape and string.
//!
//! `Vm` is the caller-facing surface over the object model: it resolves
//! `TableId`s through the heap and routes each access to the named or array
//! path of the table.

mod access;

use crate::core::{Heap, StringTable};
use crate::runtime::config::VmConfig;
use crate::shape::{MetamethodKind, Shapes, StructureId};
use crate::table::TableObject;
use luma_core::{StringId, TableId};

pub struct Vm {
    pub shapes: Shapes,
    pub heap: Heap,
    pub strings: StringTable,
    config: VmConfig,
    global: TableId,
}

impl Default for Vm {
    fn default() -> Self {
        Self::new()
    }
}

impl Vm {
    /// VM configured from the environment, see `VmConfig::from_env`.
    pub fn new() -> Self {
        Self::with_config(VmConfig::from_env())
    }

    pub fn with_config(config: VmConfig) -> Self {
        let mut shapes = Shapes::new();
        shapes.trace_transitions = config.trace_transitions;
        let mut strings = StringTable::new();
        for kind in MetamethodKind::ALL {
            shapes.register_metamethod_name(strings.intern(kind.name()), kind);
        }
        let mut heap = Heap::new();
        let anticipated = config.global_anticipated_slots;
        let global = heap.alloc(TableObject::create_empty_global(&mut shapes, anticipated));
        tracing::debug!(?config, "vm initialized");
        Self {
            shapes,
            heap,
            strings,
            config,
            global,
        }
    }

    #[inline]
    pub fn config(&self) -> &VmConfig {
        &self.config
    }

    #[inline]
    pub fn global_object(&self) -> TableId {
        self.global
    }

    pub fn intern(&mut self, s: &str) -> StringId {
        self.strings.intern(s)
    }

    pub fn resolve(&self, id: StringId) -> Option<&str> {
        self.strings.resolve(id)
    }

    #[inline]
    pub fn table(&self, id: TableId) -> &TableObject {
        self.heap.get(id)
    }

    /// New table with the configured default capacities.
    pub fn new_table(&mut self) -> TableId {
        let inline_capacity = self.config.default_inline_capacity;
        let array_capacity = self.config.default_array_capacity;
        self.new_table_with_capacity(inline_capacity, array_capacity)
    }

    /// New table sized for about `inline_capacity` named properties and
    /// `array_capacity` array entries.
    pub fn new_table_with_capacity(
        &mut self,
        inline_capacity: u32,
        array_capacity: u32,
    ) -> TableId {
        let structure = self.initial_structure_for_inline_capacity(inline_capacity);
        let table = TableObject::create_empty(&self.shapes, structure, array_capacity);
        self.heap.alloc(table)
    }

    pub fn initial_structure_for_inline_capacity(&mut self, inline_capacity: u32) -> StructureId {
        self.shapes.initial_structure_for_inline_capacity(inline_capacity)
    }

    pub fn shallow_clone(&mut self, id: TableId) -> TableId {
        let copy = self.heap.get(id).shallow_clone(&mut self.shapes);
        self.heap.alloc(copy)
    }
}
