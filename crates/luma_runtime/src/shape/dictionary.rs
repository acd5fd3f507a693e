//! Cacheable dictionary: the hidden class of a table that left the structure
//! tree.
//!
//! A dictionary belongs to exactly one table. Its `{key -> slot}` table grows
//! but never shrinks, and keys are never removed, so a slot stays valid for
//! the lifetime of the dictionary and inline caches keyed on it stay sound.
//! Adding or removing a metatable relocates the dictionary to a fresh id.

use super::builder::NamedStorageGrowth;
use super::structure::MetatableState;
use super::{DictionaryId, Shapes, StructureId};
use crate::errors::messages;
use luma_core::{PropertyKey, TableId, round_up_pow2};

/// Upper bound of the out-of-line named storage of a dictionary table.
pub const MAX_NAMED_STORAGE_CAPACITY: u32 = 1 << 24;
const MIN_HASH_TABLE_MASK: u32 = 127;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct DictionaryEntry {
    key: PropertyKey,
    slot: u32,
}

#[derive(Clone, Debug)]
pub struct CacheableDictionary {
    never_uncacheable: bool,
    inline_capacity: u8,
    butterfly_capacity: u32,
    hash_mask: u32,
    slot_count: u32,
    entries: Box<[Option<DictionaryEntry>]>,
    metatable: Option<TableId>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CreateFromStructureResult {
    pub dictionary: DictionaryId,
    /// Slot that receives the value of the property that caused the transition.
    pub slot: u32,
    pub should_grow_butterfly: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DictionaryPutResult {
    pub slot: u32,
    /// The table's butterfly must grow to this named capacity before `slot`
    /// is written. The dictionary already accounts for the new capacity.
    pub grow_butterfly_to: Option<u32>,
    /// The hash table was rehashed by this insertion.
    pub resized: bool,
}

impl CacheableDictionary {
    pub fn new_empty(anticipated_slots: u32, inline_capacity: u8, never_uncacheable: bool) -> Self {
        let hash_mask = (round_up_pow2(anticipated_slots) * 2 - 1).max(MIN_HASH_TABLE_MASK);
        Self {
            never_uncacheable,
            inline_capacity,
            butterfly_capacity: 0,
            hash_mask,
            slot_count: 0,
            entries: vec![None; hash_mask as usize + 1].into_boxed_slice(),
            metatable: None,
        }
    }

    #[inline]
    pub fn inline_capacity(&self) -> u8 {
        self.inline_capacity
    }

    #[inline]
    pub fn butterfly_capacity(&self) -> u32 {
        self.butterfly_capacity
    }

    #[inline]
    pub fn slot_count(&self) -> u32 {
        self.slot_count
    }

    #[inline]
    pub fn metatable(&self) -> Option<TableId> {
        self.metatable
    }

    #[inline]
    pub fn hash_table_mask(&self) -> u32 {
        self.hash_mask
    }

    /// Set for the global object, whose dictionary must stay cacheable.
    #[inline]
    pub fn should_never_transit_to_uncacheable(&self) -> bool {
        self.never_uncacheable
    }

    pub(crate) fn set_metatable(&mut self, metatable: Option<TableId>) {
        self.metatable = metatable;
    }

    fn find(&self, key: &PropertyKey) -> Result<usize, usize> {
        let mask = self.hash_mask as usize;
        let mut pos = key.hash32() as usize & mask;
        loop {
            match &self.entries[pos] {
                None => return Err(pos),
                Some(e) if e.key == *key => return Ok(pos),
                Some(_) => pos = (pos + 1) & mask,
            }
        }
    }

    pub fn get_slot(&self, key: &PropertyKey) -> Option<u32> {
        self.find(key).ok().and_then(|pos| self.entries[pos].map(|e| e.slot))
    }

    /// Position of `key` in the hash table; `next` resumes from there.
    pub fn hash_table_position_of(&self, key: &PropertyKey) -> Option<u32> {
        self.find(key).ok().map(|pos| pos as u32)
    }

    /// `(key, slot)` stored at hash table position `pos`, if occupied.
    #[inline]
    pub fn entry_at(&self, pos: u32) -> Option<(PropertyKey, u32)> {
        self.entries
            .get(pos as usize)
            .copied()
            .flatten()
            .map(|e| (e.key, e.slot))
    }

    /// Next named capacity of the butterfly. Aborts once the limit is reached.
    pub fn next_butterfly_capacity(&self) -> u32 {
        if self.butterfly_capacity == 0 {
            return NamedStorageGrowth::initial_capacity(self.inline_capacity as u32);
        }
        let cur = self.butterfly_capacity;
        let next = cur.saturating_mul(NamedStorageGrowth::GROWTH_FACTOR);
        if next > MAX_NAMED_STORAGE_CAPACITY {
            if cur >= MAX_NAMED_STORAGE_CAPACITY {
                panic!(
                    "{} (> {MAX_NAMED_STORAGE_CAPACITY})",
                    messages::TOO_MANY_NAMED_PROPERTIES
                );
            }
            return MAX_NAMED_STORAGE_CAPACITY;
        }
        next
    }

    /// Insertion that neither checks for a resize nor updates `slot_count`.
    fn insert_for_init_or_resize(&mut self, key: PropertyKey, slot: u32) {
        match self.find(&key) {
            Ok(_) => debug_assert!(false, "duplicate dictionary key {key:?}"),
            Err(pos) => self.entries[pos] = Some(DictionaryEntry { key, slot }),
        }
    }

    fn resize_if_needed(&mut self) -> bool {
        if self.slot_count * 2 < self.hash_mask {
            return false;
        }
        let new_mask = self.hash_mask * 2 + 1;
        let too_many = messages::TOO_MANY_NAMED_PROPERTIES;
        assert!(new_mask < u32::MAX, "{too_many}");
        let entries = vec![None; new_mask as usize + 1].into_boxed_slice();
        let old = std::mem::replace(&mut self.entries, entries);
        self.hash_mask = new_mask;
        for e in old.iter().flatten() {
            self.insert_for_init_or_resize(e.key, e.slot);
        }
        tracing::trace!(
            hash_table_size = new_mask + 1,
            slots = self.slot_count,
            "resized dictionary"
        );
        true
    }

    /// Slot for a put of `key`, inserting the key if it is new. A freshly
    /// inserted slot already reads as nil, so the property always exists
    /// afterwards.
    pub fn prepare_put(&mut self, key: PropertyKey) -> DictionaryPutResult {
        let pos = match self.find(&key) {
            Ok(pos) => {
                let slot = self.entries[pos].map_or(0, |e| e.slot);
                return DictionaryPutResult {
                    slot,
                    grow_butterfly_to: None,
                    resized: false,
                };
            }
            Err(pos) => pos,
        };
        let slot = self.slot_count;
        let capacity = self.inline_capacity as u32 + self.butterfly_capacity;
        debug_assert!(slot <= capacity);
        let grow_butterfly_to = if slot == capacity {
            let new_capacity = self.next_butterfly_capacity();
            debug_assert!(new_capacity > self.butterfly_capacity);
            self.butterfly_capacity = new_capacity;
            Some(new_capacity)
        } else {
            None
        };
        self.entries[pos] = Some(DictionaryEntry { key, slot });
        self.slot_count += 1;
        let resized = self.resize_if_needed();
        DictionaryPutResult {
            slot,
            grow_butterfly_to,
            resized,
        }
    }

    /// Every `(key, slot)` pair in hash table order.
    pub fn iter(&self) -> impl Iterator<Item = (PropertyKey, u32)> + '_ {
        self.entries.iter().flatten().map(|e| (e.key, e.slot))
    }
}

impl Shapes {
    pub fn create_empty_dictionary(
        &mut self,
        anticipated_slots: u32,
        inline_capacity: u8,
        never_uncacheable: bool,
    ) -> DictionaryId {
        let dict =
            CacheableDictionary::new_empty(anticipated_slots, inline_capacity, never_uncacheable);
        self.alloc_dictionary(dict)
    }

    /// Builds the dictionary replacing structure `id` once `new_key` no longer
    /// fits. `metatable` is the table's current metatable. A poly-metatable
    /// slot is handed to `new_key`, as the dictionary keeps the metatable
    /// itself.
    pub fn create_dictionary_from_structure(
        &mut self,
        id: StructureId,
        new_key: PropertyKey,
        metatable: Option<TableId>,
    ) -> CreateFromStructureResult {
        let s = self.structure(id);
        let poly_slot = s.poly_metatable_slot();
        let needed_slots = s.num_slots() as u32 + 1 - poly_slot.is_some() as u32;
        let mut dict = CacheableDictionary::new_empty(needed_slots, s.inline_capacity(), false);
        dict.butterfly_capacity = s.butterfly_capacity() as u32;
        debug_assert!(match s.metatable() {
            MetatableState::Monomorphic(mt) => metatable == Some(mt),
            MetatableState::None => metatable.is_none(),
            MetatableState::Poly { .. } => true,
        });
        dict.metatable = metatable;

        let total_capacity = s.inline_capacity() as u32 + s.butterfly_capacity() as u32;
        let (slot, should_grow_butterfly) = match poly_slot {
            Some(slot) => (slot as u32, false),
            None if total_capacity == s.num_slots() as u32 => {
                dict.butterfly_capacity = dict.next_butterfly_capacity();
                (s.num_slots() as u32, true)
            }
            None => (s.num_slots() as u32, false),
        };

        for (key, key_slot) in self.iter_structure(id) {
            if key.is_poly_metatable() {
                continue;
            }
            debug_assert_ne!(key_slot as u32, slot);
            dict.insert_for_init_or_resize(key, key_slot as u32);
        }
        dict.insert_for_init_or_resize(new_key, slot);
        dict.slot_count = needed_slots;
        let capacity = dict.inline_capacity as u32 + dict.butterfly_capacity;
        debug_assert!(capacity >= needed_slots);

        let dictionary = self.alloc_dictionary(dict);
        tracing::debug!(
            structure = id.0,
            dictionary = dictionary.0,
            slots = needed_slots,
            "table transitioned to dictionary mode"
        );
        CreateFromStructureResult {
            dictionary,
            slot,
            should_grow_butterfly,
        }
    }

    /// Moves dictionary `id` to a fresh id so caches keyed on the old one
    /// miss. The old dictionary must not be used afterwards.
    pub fn relocate_dictionary(&mut self, id: DictionaryId) -> DictionaryId {
        let old = self.dictionary_mut(id);
        let moved = CacheableDictionary {
            entries: std::mem::take(&mut old.entries),
            ..old.clone()
        };
        old.hash_mask = 0;
        old.slot_count = 0;
        self.alloc_dictionary(moved)
    }

    pub fn clone_dictionary(&mut self, id: DictionaryId) -> DictionaryId {
        let copy = self.dictionary(id).clone();
        self.alloc_dictionary(copy)
    }
}
