//! Iteration over the key set of a structure, in slot order.

use super::structure::Structure;
use super::{Shapes, StructureId};
use luma_core::PropertyKey;

pub struct StructureIterator<'a> {
    structures: &'a [Structure],
    structure: &'a Structure,
    next_slot: u8,
}

impl<'a> StructureIterator<'a> {
    pub fn new(shapes: &'a Shapes, id: StructureId) -> Self {
        Self {
            structures: &shapes.structures,
            structure: shapes.structure(id),
            next_slot: 0,
        }
    }
}

impl Iterator for StructureIterator<'_> {
    /// `(key, slot)`
    type Item = (PropertyKey, u8);

    fn next(&mut self) -> Option<Self::Item> {
        if self.next_slot >= self.structure.num_slots() {
            return None;
        }
        let slot = self.next_slot;
        self.next_slot += 1;
        Some((self.structure.key_for_slot(self.structures, slot), slot))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = (self.structure.num_slots() - self.next_slot) as usize;
        (n, Some(n))
    }
}

impl ExactSizeIterator for StructureIterator<'_> {}

impl Shapes {
    pub fn iter_structure(&self, id: StructureId) -> StructureIterator<'_> {
        StructureIterator::new(self, id)
    }
}
