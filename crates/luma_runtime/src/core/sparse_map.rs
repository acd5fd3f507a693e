//! Sparse part of a table's array storage.
//!
//! Open addressing with linear probing, keyed by the numeric index. A NaN key
//! marks an empty entry, which is safe because NaN is never a valid index.
//! Entries are never removed: deleting an index stores `nil`, and `nil`
//! entries are dropped when the table is rehashed.

use luma_core::{Value, hash_f64};

#[derive(Clone, Copy, Debug)]
pub struct SparseMapEntry {
    pub key: f64,
    pub value: Value,
}

impl SparseMapEntry {
    const EMPTY: SparseMapEntry = SparseMapEntry {
        key: f64::NAN,
        value: Value::Nil,
    };

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.key.is_nan()
    }
}

#[derive(Clone, Debug)]
pub struct ArraySparseMap {
    hash_mask: u32,
    element_count: u32,
    entries: Box<[SparseMapEntry]>,
}

impl Default for ArraySparseMap {
    fn default() -> Self {
        Self::new()
    }
}

impl ArraySparseMap {
    pub fn new() -> Self {
        Self {
            hash_mask: 1,
            element_count: 0,
            entries: vec![SparseMapEntry::EMPTY; 2].into_boxed_slice(),
        }
    }

    /// Number of occupied entries, including ones holding `nil`.
    #[inline]
    pub fn element_count(&self) -> u32 {
        self.element_count
    }

    /// Number of hash table entries.
    #[inline]
    pub fn capacity(&self) -> u32 {
        self.hash_mask + 1
    }

    #[inline]
    pub fn entry(&self, ordinal: u32) -> &SparseMapEntry {
        &self.entries[ordinal as usize]
    }

    #[inline]
    fn find_slot(&self, key: f64) -> Result<usize, usize> {
        let mask = self.hash_mask as usize;
        let mut slot = hash_f64(key) as usize & mask;
        loop {
            let e = &self.entries[slot];
            if e.key == key {
                return Ok(slot);
            }
            if e.is_empty() {
                return Err(slot);
            }
            slot = (slot + 1) & mask;
        }
    }

    pub fn get_by_val(&self, key: f64) -> Value {
        match self.find_slot(key) {
            Ok(slot) => self.entries[slot].value,
            Err(_) => Value::Nil,
        }
    }

    /// Hash table ordinal of `key`. Entries holding `nil` still count as
    /// found so `next` can resume from a key deleted during traversal.
    pub fn get_hash_slot_ordinal(&self, key: f64) -> Option<u32> {
        self.find_slot(key).ok().map(|s| s as u32)
    }

    pub fn insert(&mut self, key: f64, value: Value) {
        debug_assert!(!key.is_nan());
        match self.find_slot(key) {
            Ok(slot) => self.entries[slot].value = value,
            Err(slot) => {
                self.entries[slot] = SparseMapEntry { key, value };
                self.element_count += 1;
                self.resize_if_needed();
            }
        }
    }

    #[inline]
    fn resize_if_needed(&mut self) {
        if self.element_count * 2 <= self.hash_mask + 1 {
            return;
        }
        self.resize();
    }

    #[cold]
    fn resize(&mut self) {
        let new_mask = self
            .hash_mask
            .checked_mul(2)
            .and_then(|m| m.checked_add(1))
            .unwrap_or_else(|| panic!("array sparse map too large"));
        let mut entries = vec![SparseMapEntry::EMPTY; new_mask as usize + 1].into_boxed_slice();
        let mut non_nil = 0;
        for e in self.entries.iter() {
            if e.is_empty() || e.value.is_nil() {
                continue;
            }
            let mut slot = hash_f64(e.key) as usize & new_mask as usize;
            while !entries[slot].is_empty() {
                debug_assert!(entries[slot].key != e.key);
                slot = (slot + 1) & new_mask as usize;
            }
            entries[slot] = *e;
            non_nil += 1;
        }
        tracing::trace!(
            hash_table_size = new_mask + 1,
            elements = non_nil,
            "resized array sparse map"
        );
        self.hash_mask = new_mask;
        self.entries = entries;
        self.element_count = non_nil;
    }

    /// Iterates the non-nil `(index, value)` pairs in hash table order.
    pub fn iter(&self) -> impl Iterator<Item = (f64, Value)> + '_ {
        self.entries
            .iter()
            .filter(|e| !e.is_empty() && !e.value.is_nil())
            .map(|e| (e.key, e.value))
    }
}
