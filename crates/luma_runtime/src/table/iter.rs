//! Key-value iteration, `next` style.
//!
//! Named properties come first (slot order for structures, hash table order
//! for dictionaries), then the vector part in index order, then the sparse
//! map in hash table order. Nil values are skipped.

use super::TableObject;
use super::index::double_as_int64;
use crate::core::butterfly::Butterfly;
use crate::shape::{HiddenClass, Shapes};
use luma_core::{PropertyKey, Value};

/// Position of an iterator. Each ordinal is the next position to examine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IteratorState {
    Uninitialized,
    /// Slot ordinal for structures, hash table position for dictionaries.
    NamedProperty(u32),
    /// Array index.
    VectorStorage(u32),
    /// Sparse map hash table position.
    SparseMap(u32),
    Terminated,
}

#[derive(Clone, Copy, Debug)]
pub struct TableObjectIterator {
    state: IteratorState,
}

impl Default for TableObjectIterator {
    fn default() -> Self {
        Self::new()
    }
}

impl TableObjectIterator {
    pub fn new() -> Self {
        Self {
            state: IteratorState::Uninitialized,
        }
    }

    fn resume_at(state: IteratorState) -> Self {
        Self { state }
    }

    #[inline]
    pub fn state(&self) -> IteratorState {
        self.state
    }

    /// The next non-nil `(key, value)` pair, or `(nil, nil)` once exhausted.
    pub fn advance(&mut self, shapes: &Shapes, table: &TableObject) -> (Value, Value) {
        loop {
            match self.state {
                IteratorState::Uninitialized => self.state = IteratorState::NamedProperty(0),
                IteratorState::NamedProperty(pos) => match next_named(shapes, table, pos) {
                    Some((key, value, at)) => {
                        self.state = IteratorState::NamedProperty(at + 1);
                        return (key, value);
                    }
                    None => self.state = IteratorState::VectorStorage(1),
                },
                IteratorState::VectorStorage(idx) => {
                    let Some(b) = table.butterfly() else {
                        self.state = IteratorState::Terminated;
                        continue;
                    };
                    let found = (idx..=b.array_capacity())
                        .map(|i| (i, b.vector_get(i as i64)))
                        .find(|(_, v)| !v.is_nil());
                    match found {
                        Some((i, v)) => {
                            self.state = IteratorState::VectorStorage(i + 1);
                            return (Value::Double(i as f64), v);
                        }
                        None if b.sparse_map().is_some() => {
                            self.state = IteratorState::SparseMap(0);
                        }
                        None => self.state = IteratorState::Terminated,
                    }
                }
                IteratorState::SparseMap(pos) => {
                    let Some(m) = table.butterfly().and_then(Butterfly::sparse_map) else {
                        self.state = IteratorState::Terminated;
                        continue;
                    };
                    let found = (pos..m.capacity())
                        .map(|p| (p, m.entry(p)))
                        .find(|(_, e)| !e.is_empty() && !e.value.is_nil());
                    match found {
                        Some((p, e)) => {
                            self.state = IteratorState::SparseMap(p + 1);
                            return (Value::Double(e.key), e.value);
                        }
                        None => self.state = IteratorState::Terminated,
                    }
                }
                IteratorState::Terminated => return (Value::Nil, Value::Nil),
            }
        }
    }
}

/// First non-nil named property at or after `pos`, with its position.
fn next_named(shapes: &Shapes, table: &TableObject, pos: u32) -> Option<(Value, Value, u32)> {
    match table.hidden_class {
        HiddenClass::Structure(id) => {
            let s = shapes.structure(id);
            let poly_slot = s.poly_metatable_slot().map(u32::from);
            (pos..s.num_slots() as u32)
                .filter(|&slot| Some(slot) != poly_slot)
                .find_map(|slot| {
                    let value = table.value_for_slot(slot);
                    if value.is_nil() {
                        return None;
                    }
                    let key = s.key_for_slot(&shapes.structures, slot as u8).to_value()?;
                    Some((key, value, slot))
                })
        }
        HiddenClass::Dictionary(id) => {
            let d = shapes.dictionary(id);
            (pos..=d.hash_table_mask()).find_map(|p| {
                let (key, slot) = d.entry_at(p)?;
                let value = table.value_for_slot(slot);
                if value.is_nil() {
                    return None;
                }
                Some((key.to_value()?, value, p))
            })
        }
    }
}

impl TableObject {
    /// Iteration step keyed by the previously returned key, as Lua's `next`
    /// does. `None` means `key` is not a key of this table.
    pub fn get_next_from_key(&self, shapes: &Shapes, key: Value) -> Option<(Value, Value)> {
        let state = match key {
            Value::Nil => return Some(TableObjectIterator::new().advance(shapes, self)),
            Value::Bool(_) | Value::String(_) | Value::Table(_) => {
                let pkey = PropertyKey::from_value(key)?;
                let pos = match self.hidden_class {
                    HiddenClass::Structure(id) => shapes
                        .structure(id)
                        .get_slot_ordinal(&shapes.structures, &pkey)
                        .map(u32::from)?,
                    HiddenClass::Dictionary(id) => {
                        shapes.dictionary(id).hash_table_position_of(&pkey)?
                    }
                };
                IteratorState::NamedProperty(pos + 1)
            }
            Value::Int32(i) => self.array_state_after(i as f64)?,
            Value::Double(d) => self.array_state_after(d)?,
        };
        Some(TableObjectIterator::resume_at(state).advance(shapes, self))
    }

    fn array_state_after(&self, key: f64) -> Option<IteratorState> {
        if key.is_nan() {
            return None;
        }
        let b = self.butterfly()?;
        if let Some(i) = double_as_int64(key) {
            if b.index_fits_in_vector_capacity(i) {
                return Some(IteratorState::VectorStorage(i as u32 + 1));
            }
        }
        // Keys outside the vector that `next` returned live in the sparse map.
        let m = b.sparse_map()?;
        let pos = m.get_hash_slot_ordinal(key)?;
        Some(IteratorState::SparseMap(pos + 1))
    }
}
