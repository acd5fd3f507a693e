//! Table objects.
//!
//! A table keeps its named properties in `inline_storage` and, once that is
//! full, in the named part of its butterfly. The butterfly also holds the
//! array part. Where each named property lives is decided by the hidden
//! class; how the array part is laid out is summarized by `array_type`.

mod index;
mod iter;
mod metatable;
mod named;

pub use iter::{IteratorState, TableObjectIterator};
pub use metatable::GetMetatableResult;

use crate::core::array_type::ArrayType;
use crate::core::butterfly::Butterfly;
use crate::shape::{HiddenClass, Shapes, StructureId};
use luma_core::{TableId, Value};

#[derive(Debug)]
pub struct TableObject {
    pub(crate) hidden_class: HiddenClass,
    /// Copy of the array type of the structure, kept on the object so array
    /// accesses do not have to load the structure.
    pub(crate) array_type: ArrayType,
    pub(crate) butterfly: Option<Butterfly>,
    pub(crate) inline_storage: Box<[Value]>,
}

impl TableObject {
    /// Empty table with shape `structure`, with `initial_array_capacity`
    /// vector slots preallocated.
    pub fn create_empty(
        shapes: &Shapes,
        structure: StructureId,
        initial_array_capacity: u32,
    ) -> Self {
        let s = shapes.structure(structure);
        debug_assert_eq!(s.num_slots(), 0);
        let named_capacity = s.butterfly_capacity() as u32;
        let butterfly = if initial_array_capacity > 0 {
            let b = Butterfly::with_capacities(named_capacity, initial_array_capacity);
            Some(b)
        } else {
            None
        };
        Self {
            hidden_class: HiddenClass::Structure(structure),
            array_type: s.array_type(),
            butterfly,
            inline_storage: vec![Value::Nil; s.inline_capacity() as usize].into_boxed_slice(),
        }
    }

    /// The global object: a table in dictionary mode from the start, whose
    /// dictionary never turns uncacheable.
    pub fn create_empty_global(shapes: &mut Shapes, anticipated_slots: u32) -> Self {
        let inline_capacity = crate::shape::structure::MAX_INLINE_CAPACITY;
        let dict = shapes.create_empty_dictionary(anticipated_slots, inline_capacity, true);
        Self {
            hidden_class: HiddenClass::Dictionary(dict),
            array_type: ArrayType::initial(),
            butterfly: None,
            inline_storage: vec![Value::Nil; inline_capacity as usize].into_boxed_slice(),
        }
    }

    /// Copy of this table with the same contents and metatable. Structures
    /// are shared; a dictionary is per object and gets cloned.
    pub fn shallow_clone(&self, shapes: &mut Shapes) -> TableObject {
        let hidden_class = match self.hidden_class {
            HiddenClass::Structure(id) => HiddenClass::Structure(id),
            HiddenClass::Dictionary(id) => HiddenClass::Dictionary(shapes.clone_dictionary(id)),
        };
        TableObject {
            hidden_class,
            array_type: self.array_type,
            butterfly: self.butterfly.clone(),
            inline_storage: self.inline_storage.clone(),
        }
    }

    #[inline]
    pub fn hidden_class(&self) -> HiddenClass {
        self.hidden_class
    }

    #[inline]
    pub fn array_type(&self) -> ArrayType {
        self.array_type
    }

    #[inline]
    pub fn butterfly(&self) -> Option<&Butterfly> {
        self.butterfly.as_ref()
    }

    #[inline]
    pub fn inline_capacity(&self) -> usize {
        self.inline_storage.len()
    }

    /// Value of named slot `slot`, inline or outlined.
    #[inline]
    pub(crate) fn value_for_slot(&self, slot: u32) -> Value {
        let slot = slot as usize;
        let inline_capacity = self.inline_storage.len();
        if slot < inline_capacity {
            self.inline_storage[slot]
        } else {
            match &self.butterfly {
                Some(b) => b.named(slot - inline_capacity),
                None => Value::Nil,
            }
        }
    }

    #[inline]
    pub(crate) fn set_value_for_slot(&mut self, slot: u32, value: Value) {
        let slot = slot as usize;
        let inline_capacity = self.inline_storage.len();
        if slot < inline_capacity {
            self.inline_storage[slot] = value;
        } else {
            self.butterfly_mut().set_named(slot - inline_capacity, value);
        }
    }

    #[inline]
    pub(crate) fn butterfly_mut(&mut self) -> &mut Butterfly {
        self.butterfly.get_or_insert_with(|| Butterfly::with_capacities(0, 0))
    }

    pub(crate) fn grow_butterfly_named(&mut self, new_capacity: u32) {
        tracing::trace!(new_capacity, "growing butterfly named storage");
        match &mut self.butterfly {
            Some(b) => b.grow_named(new_capacity),
            None => self.butterfly = Some(Butterfly::with_capacities(new_capacity, 0)),
        }
    }

    pub(crate) fn grow_butterfly_array(&mut self, new_capacity: u32) {
        tracing::trace!(new_capacity, "growing butterfly vector");
        match &mut self.butterfly {
            Some(b) => b.grow_array(new_capacity),
            None => self.butterfly = Some(Butterfly::with_capacities(0, new_capacity)),
        }
    }

    /// Moves the table to `array_type`. A structure has to transition along
    /// with it; a dictionary does not track the array type.
    pub(crate) fn update_array_type(&mut self, shapes: &mut Shapes, array_type: ArrayType) {
        debug_assert!(array_type.is_consistent());
        if let HiddenClass::Structure(id) = self.hidden_class {
            let new_structure = shapes.update_array_type(id, array_type);
            self.hidden_class = HiddenClass::Structure(new_structure);
        }
        self.array_type = array_type;
    }

    /// Metatable stored in the poly-metatable slot.
    #[inline]
    pub(crate) fn poly_metatable(&self, slot: u8) -> Option<TableId> {
        self.value_for_slot(slot as u32).as_table()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_table_has_nil_inline_slots() {
        let mut shapes = Shapes::new();
        let s = shapes.initial_structure_for_inline_capacity(8);
        let t = TableObject::create_empty(&shapes, s, 0);
        assert_eq!(t.inline_capacity(), 14);
        assert!(t.inline_storage.iter().all(Value::is_nil));
        assert!(t.butterfly().is_none());
        assert_eq!(t.array_type(), ArrayType::initial());
    }

    #[test]
    fn preallocated_array_capacity_keeps_initial_array_type() {
        let mut shapes = Shapes::new();
        let s = shapes.initial_structure_for_inline_capacity(0);
        let t = TableObject::create_empty(&shapes, s, 16);
        assert_eq!(t.butterfly().map(Butterfly::array_capacity), Some(16));
        assert_eq!(t.array_type(), ArrayType::initial());
    }

    #[test]
    fn global_object_starts_as_dictionary() {
        let mut shapes = Shapes::new();
        let g = TableObject::create_empty_global(&mut shapes, 128);
        let HiddenClass::Dictionary(d) = g.hidden_class() else {
            panic!("global object should be a dictionary");
        };
        assert!(shapes.dictionary(d).should_never_transit_to_uncacheable());
        assert_eq!(g.inline_capacity(), 253);
    }
}
