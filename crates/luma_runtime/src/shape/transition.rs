//! Child edges of a structure node.
//!
//! Most structures have at most one child, which is stored inline. The hash
//! table is only materialized for the second child. Edges are never removed;
//! `upsert` may redirect an edge to a different child.

use super::StructureId;
use luma_core::{PropertyKey, fast_hasher};

/// What a transition edge is keyed by.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TransitionKey {
    Property(PropertyKey),
    AddOrToPolyMetatable,
    RemoveMetatable,
    ChangeArrayType(u8),
}

impl TransitionKey {
    #[inline]
    fn hash(&self) -> u64 {
        fast_hasher().hash_one(self)
    }
}

type Entry = Option<(TransitionKey, StructureId)>;

#[derive(Clone, Debug, Default)]
pub enum TransitionTable {
    #[default]
    Empty,
    Single(TransitionKey, StructureId),
    Table(Box<TransitionHashTable>),
}

#[derive(Clone, Debug)]
pub struct TransitionHashTable {
    mask: usize,
    len: usize,
    entries: Box<[Entry]>,
}

impl TransitionHashTable {
    const INITIAL_SIZE: usize = 4;

    fn with_size(size: usize) -> Self {
        debug_assert!(size.is_power_of_two());
        Self {
            mask: size - 1,
            len: 0,
            entries: vec![None; size].into_boxed_slice(),
        }
    }

    fn find(&self, key: &TransitionKey) -> Result<usize, usize> {
        let mut slot = key.hash() as usize & self.mask;
        loop {
            match &self.entries[slot] {
                None => return Err(slot),
                Some((k, _)) if k == key => return Ok(slot),
                Some(_) => slot = (slot + 1) & self.mask,
            }
        }
    }

    fn get(&self, key: &TransitionKey) -> Option<StructureId> {
        let slot = self.find(key).ok()?;
        self.entries[slot].map(|(_, c)| c)
    }

    fn insert_or_replace(&mut self, key: TransitionKey, child: StructureId) {
        match self.find(&key) {
            Ok(slot) => self.entries[slot] = Some((key, child)),
            Err(slot) => {
                self.entries[slot] = Some((key, child));
                self.len += 1;
                if self.len >= self.mask / 2 + 1 {
                    self.grow();
                }
            }
        }
    }

    fn grow(&mut self) {
        let mut bigger = Self::with_size((self.mask + 1) * 2);
        for (k, c) in self.entries.iter().flatten() {
            bigger.insert_or_replace(*k, *c);
        }
        *self = bigger;
    }
}

impl TransitionTable {
    pub fn get(&self, key: &TransitionKey) -> Option<StructureId> {
        match self {
            TransitionTable::Empty => None,
            TransitionTable::Single(k, c) => (k == key).then_some(*c),
            TransitionTable::Table(t) => t.get(key),
        }
    }

    /// Adds an edge that must not exist yet.
    pub fn insert(&mut self, key: TransitionKey, child: StructureId) {
        debug_assert!(self.get(&key).is_none());
        self.upsert(key, child);
    }

    /// Adds an edge, or redirects the existing edge under `key`.
    pub fn upsert(&mut self, key: TransitionKey, child: StructureId) {
        match self {
            TransitionTable::Empty => *self = TransitionTable::Single(key, child),
            TransitionTable::Single(k, c) if *k == key => *c = child,
            TransitionTable::Single(k, c) => {
                let mut table = TransitionHashTable::with_size(TransitionHashTable::INITIAL_SIZE);
                table.insert_or_replace(*k, *c);
                table.insert_or_replace(key, child);
                *self = TransitionTable::Table(Box::new(table));
            }
            TransitionTable::Table(t) => t.insert_or_replace(key, child),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            TransitionTable::Empty => 0,
            TransitionTable::Single(..) => 1,
            TransitionTable::Table(t) => t.len,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, TransitionTable::Empty)
    }

    /// Every child reachable from this table.
    pub fn children(&self) -> Vec<StructureId> {
        match self {
            TransitionTable::Empty => Vec::new(),
            TransitionTable::Single(_, c) => vec![*c],
            TransitionTable::Table(t) => t.entries.iter().flatten().map(|(_, c)| *c).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use luma_core::StringId;

    fn prop(i: u32) -> TransitionKey {
        TransitionKey::Property(PropertyKey::String(StringId(i)))
    }

    #[test]
    fn single_child_then_table() {
        let mut t = TransitionTable::default();
        assert!(t.get(&prop(1)).is_none());
        t.insert(prop(1), StructureId(10));
        assert!(matches!(t, TransitionTable::Single(..)));
        t.insert(prop(2), StructureId(20));
        assert!(matches!(t, TransitionTable::Table(_)));
        assert_eq!(t.get(&prop(1)), Some(StructureId(10)));
        assert_eq!(t.get(&prop(2)), Some(StructureId(20)));
        assert_eq!(t.len(), 2);
    }

    #[test]
    fn many_children_survive_growth() {
        let mut t = TransitionTable::default();
        for i in 0..500 {
            t.insert(prop(i), StructureId(i + 1000));
        }
        let array_type = TransitionKey::ChangeArrayType(3);
        t.insert(array_type, StructureId(1));
        for i in 0..500 {
            assert_eq!(t.get(&prop(i)), Some(StructureId(i + 1000)));
        }
        assert_eq!(t.get(&array_type), Some(StructureId(1)));
        assert!(t.get(&TransitionKey::ChangeArrayType(4)).is_none());
        assert_eq!(t.len(), 501);
        assert_eq!(t.children().len(), 501);
    }

    #[test]
    fn upsert_redirects_edge() {
        let mut t = TransitionTable::default();
        let metatable = TransitionKey::AddOrToPolyMetatable;
        t.upsert(metatable, StructureId(1));
        t.upsert(metatable, StructureId(2));
        assert_eq!(t.len(), 1);
        assert_eq!(t.get(&metatable), Some(StructureId(2)));
        t.insert(TransitionKey::RemoveMetatable, StructureId(3));
        t.upsert(metatable, StructureId(4));
        assert_eq!(t.len(), 2);
        assert_eq!(t.get(&metatable), Some(StructureId(4)));
    }
}
