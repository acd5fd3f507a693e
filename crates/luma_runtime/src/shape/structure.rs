//! Structure: a node of the shape tree.
//!
//! A structure with `n` slots stores only its last, possibly non-full block
//! of up to 16 keys. Older keys are reached through two tables:
//!
//! - the inline hash table covers the node's own block and, when the anchor
//!   does not, the preceding full block (`final_full_block`);
//! - the anchor hash table, shared with every descendant, covers all older
//!   full blocks.
//!
//! Both lookups are O(1), while the total table size of a tree stays far below
//! one full copy per node.

use super::anchor::AnchorHashTable;
use super::transition::{TransitionKey, TransitionTable};
use super::{Shapes, StructureId};
use crate::core::array_type::ArrayType;
use luma_core::{PropertyKey, TableId};
use smallvec::SmallVec;
use std::rc::Rc;

pub const BLOCK_SIZE_LOG2: u32 = 4;
pub const BLOCK_SIZE: u8 = 1 << BLOCK_SIZE_LOG2;
/// Adding a property to a structure with this many slots transitions the
/// table to dictionary mode.
pub const MAX_NUM_SLOTS: u8 = 253;
pub const MAX_INLINE_CAPACITY: u8 = MAX_NUM_SLOTS;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct InlineEntry {
    pub(crate) check_hash: u8,
    /// `>= 0`: index into the own block, `[-16, 0)`: index into the final full block.
    pub(crate) ordinal: i8,
}

impl InlineEntry {
    pub(crate) const EMPTY: InlineEntry = InlineEntry {
        check_hash: 0,
        ordinal: 0x7f,
    };

    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.ordinal == Self::EMPTY.ordinal
    }
}

/// Where a table with this structure keeps its metatable.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MetatableState {
    None,
    /// Every table with this structure has this metatable.
    Monomorphic(TableId),
    /// Each table stores its metatable (or nil) in `slot`.
    Poly { slot: u8 },
}

/// How a structure was derived from its parent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransitionKind {
    /// Roots, and clones whose caller has not set a kind yet.
    BadTransitionKind,
    AddProperty,
    AddPropertyAndGrowPropertyStorageCapacity,
    AddMetaTable,
    TransitToPolyMetaTable,
    TransitToPolyMetaTableAndGrowPropertyStorageCapacity,
    RemoveMetaTable,
    UpdateArrayType,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum SlotAdditionKind {
    AddSlotForProperty,
    AddSlotForPolyMetatable,
    NoSlotAdded,
}

pub struct Structure {
    pub(crate) num_slots: u8,
    pub(crate) non_full_block_len: u8,
    pub(crate) inline_capacity: u8,
    pub(crate) butterfly_capacity: u8,
    pub(crate) array_type: ArrayType,
    pub(crate) known_nonexistent_metamethods: u16,
    pub(crate) metatable: MetatableState,
    pub(crate) parent: Option<StructureId>,
    pub(crate) parent_edge: TransitionKind,
    pub(crate) transitions: TransitionTable,
    /// Attached lazily once this node's own block becomes an anchor block.
    pub(crate) anchor: Option<Rc<AnchorHashTable>>,
    pub(crate) inline_table: Box<[InlineEntry]>,
    pub(crate) block: SmallVec<[PropertyKey; BLOCK_SIZE as usize]>,
    pub(crate) final_full_block: Option<StructureId>,
}

#[inline]
pub(crate) fn compute_non_full_block_len(num_slots: u8) -> u8 {
    if num_slots == 0 {
        0
    } else {
        ((num_slots - 1) & (BLOCK_SIZE - 1)) + 1
    }
}

/// Whether a structure with `num_slots` slots references a preceding full block.
#[inline]
pub(crate) fn has_final_full_block(num_slots: u8) -> bool {
    num_slots >= BLOCK_SIZE && num_slots % BLOCK_SIZE != 0
}

impl Structure {
    #[inline]
    pub fn num_slots(&self) -> u8 {
        self.num_slots
    }

    #[inline]
    pub fn inline_capacity(&self) -> u8 {
        self.inline_capacity
    }

    #[inline]
    pub fn butterfly_capacity(&self) -> u8 {
        self.butterfly_capacity
    }

    #[inline]
    pub fn array_type(&self) -> ArrayType {
        self.array_type
    }

    #[inline]
    pub fn metatable(&self) -> MetatableState {
        self.metatable
    }

    #[inline]
    pub fn parent(&self) -> Option<StructureId> {
        self.parent
    }

    #[inline]
    pub fn parent_edge(&self) -> TransitionKind {
        self.parent_edge
    }

    #[inline]
    pub fn known_nonexistent_metamethods(&self) -> u16 {
        self.known_nonexistent_metamethods
    }

    #[inline]
    pub fn anchor(&self) -> Option<&AnchorHashTable> {
        self.anchor.as_deref()
    }

    #[inline]
    pub fn inline_hash_table_mask(&self) -> usize {
        self.inline_table.len() - 1
    }

    pub fn transitions(&self) -> &TransitionTable {
        &self.transitions
    }

    #[inline]
    pub fn is_poly_metatable(&self) -> bool {
        matches!(self.metatable, MetatableState::Poly { .. })
    }

    #[inline]
    pub fn poly_metatable_slot(&self) -> Option<u8> {
        match self.metatable {
            MetatableState::Poly { slot } => Some(slot),
            _ => None,
        }
    }

    /// Whether the anchor table covers every full block of this node.
    #[inline]
    pub fn anchor_contains_final_block(&self) -> bool {
        let full_slots = self.num_slots & !(BLOCK_SIZE - 1);
        self.anchor
            .as_ref()
            .is_some_and(|a| a.num_total_slots() == full_slots)
    }

    /// Slot ordinal of `key`, or `None` if this shape does not have it.
    pub fn get_slot_ordinal(&self, structures: &[Structure], key: &PropertyKey) -> Option<u8> {
        let hash = key.hash32();
        if let Some(slot) = self.query_inline_hash_table(structures, key, hash as u16) {
            return Some(slot);
        }
        self.anchor.as_ref()?.find(structures, key, hash)
    }

    fn query_inline_hash_table(
        &self,
        structures: &[Structure],
        key: &PropertyKey,
        hash: u16,
    ) -> Option<u8> {
        let mask = self.inline_hash_table_mask();
        let check_hash = hash as u8;
        let mut slot = (hash >> 8) as usize & mask;
        loop {
            let e = self.inline_table[slot];
            if e.is_empty() {
                return None;
            }
            if e.check_hash == check_hash
                && self.key_for_inline_ordinal(structures, e.ordinal) == *key
            {
                let own_start = (self.num_slots - self.non_full_block_len) as i32;
                return Some((own_start + e.ordinal as i32) as u8);
            }
            slot = slot.wrapping_sub(1) & mask;
        }
    }

    #[inline]
    fn key_for_inline_ordinal(&self, structures: &[Structure], ordinal: i8) -> PropertyKey {
        if ordinal >= 0 {
            self.block[ordinal as usize]
        } else {
            let holder = self
                .final_full_block
                .unwrap_or_else(|| panic!("inline entry refers to a missing final block"));
            structures[holder.0 as usize].block[(BLOCK_SIZE as i8 + ordinal) as usize]
        }
    }

    /// Key stored at `slot`, which must be below `num_slots`.
    pub fn key_for_slot(&self, structures: &[Structure], slot: u8) -> PropertyKey {
        debug_assert!(slot < self.num_slots);
        let own_start = self.num_slots - self.non_full_block_len;
        if slot >= own_start {
            return self.block[(slot - own_start) as usize];
        }
        if let Some(holder) = self.final_full_block {
            if slot >= own_start - BLOCK_SIZE {
                let block = &structures[holder.0 as usize].block;
                return block[(slot + BLOCK_SIZE - own_start) as usize];
            }
        }
        match &self.anchor {
            Some(a) => a.key_at(structures, slot),
            None => panic!("structure slot {slot} is not covered by any table"),
        }
    }
}

/// Maps a requested inline capacity to one of a few shared steppings so
/// tables created with similar capacities share their initial structure.
pub struct InlineCapacityStepping;

impl InlineCapacityStepping {
    const STEPPINGS: [u8; 7] = [0, 6, 14, 30, 62, 126, MAX_INLINE_CAPACITY];
    pub const NUM_STEPPINGS: usize = Self::STEPPINGS.len();

    /// Capacity a request for `cap` inline slots is rounded to.
    pub fn optimal_capacity(cap: u32) -> u8 {
        let cap = cap.min(MAX_INLINE_CAPACITY as u32);
        if cap == 0 {
            return 0;
        }
        let cap = cap.max(4);
        let r = (cap + 2).next_power_of_two() - 2;
        r.min(MAX_INLINE_CAPACITY as u32) as u8
    }

    pub fn stepping_for(cap: u32) -> usize {
        let optimal = Self::optimal_capacity(cap);
        Self::STEPPINGS
            .iter()
            .position(|&s| s == optimal)
            .unwrap_or(Self::NUM_STEPPINGS - 1)
    }

    pub fn capacity_of_stepping(stepping: usize) -> u8 {
        Self::STEPPINGS[stepping]
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AddPropertyResult {
    Added {
        new_structure: StructureId,
        slot: u8,
        should_grow_butterfly: bool,
    },
    /// The structure has no room left; the table must become a dictionary.
    ShouldTransitToDictionaryMode,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SetMetatableResult {
    pub new_structure: StructureId,
    /// The new structure is poly-metatable; the metatable goes into `slot`.
    pub should_insert_metatable: bool,
    /// Only meaningful with `should_insert_metatable`.
    pub should_grow_butterfly: bool,
    pub slot: u8,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RemoveMetatableResult {
    pub new_structure: StructureId,
    /// The structure is poly-metatable; nil goes into `slot`.
    pub should_insert_metatable: bool,
    pub slot: u8,
}

impl Shapes {
    pub fn add_non_existent_property(
        &mut self,
        id: StructureId,
        key: PropertyKey,
    ) -> AddPropertyResult {
        let s = self.structure(id);
        debug_assert!(s.get_slot_ordinal(&self.structures, &key).is_none());
        if s.num_slots >= MAX_NUM_SLOTS {
            return AddPropertyResult::ShouldTransitToDictionaryMode;
        }
        let slot = s.num_slots;
        let tkey = TransitionKey::Property(key);
        let child = match s.transitions.get(&tkey) {
            Some(child) => child,
            None => {
                let child = self.create_structure_for_transition(
                    id,
                    SlotAdditionKind::AddSlotForProperty,
                    Some(key),
                );
                self.structure_mut(id).transitions.insert(tkey, child);
                child
            }
        };
        let c = self.structure(child);
        debug_assert_eq!(c.parent, Some(id));
        debug_assert_eq!(c.get_slot_ordinal(&self.structures, &key), Some(slot));
        AddPropertyResult::Added {
            new_structure: child,
            slot,
            should_grow_butterfly: c.parent_edge
                == TransitionKind::AddPropertyAndGrowPropertyStorageCapacity,
        }
    }

    pub fn set_metatable(&mut self, id: StructureId, metatable: TableId) -> SetMetatableResult {
        let tkey = TransitionKey::AddOrToPolyMetatable;
        let s = self.structure(id);
        let (state, parent, parent_edge) = (s.metatable, s.parent, s.parent_edge);
        let existing = s.transitions.get(&tkey);

        let target = match state {
            MetatableState::Poly { slot } => {
                return SetMetatableResult {
                    new_structure: id,
                    should_insert_metatable: true,
                    should_grow_butterfly: false,
                    slot,
                };
            }
            MetatableState::Monomorphic(mt) if mt == metatable => {
                return SetMetatableResult {
                    new_structure: id,
                    should_insert_metatable: false,
                    should_grow_butterfly: false,
                    slot: 0,
                };
            }
            MetatableState::None => {
                let target = match existing {
                    None => self.create_structure_for_monomorphic_metatable(id, metatable),
                    Some(e) => match self.structure(e).metatable {
                        MetatableState::Monomorphic(mt) if mt != metatable => {
                            self.create_structure_for_poly_metatable(id)
                        }
                        _ => e,
                    },
                };
                self.structure_mut(id).transitions.upsert(tkey, target);
                target
            }
            MetatableState::Monomorphic(_) if parent_edge == TransitionKind::AddMetaTable => {
                // Tables of the parent now disagree on their metatable: redirect
                // the parent's metatable edge to a poly-metatable structure.
                let Some(base) = parent else {
                    panic!("metatable transition without a parent");
                };
                let target = match self.structure(base).transitions.get(&tkey) {
                    Some(e) if e != id => {
                        debug_assert!(self.structure(e).is_poly_metatable());
                        e
                    }
                    _ => self.create_structure_for_poly_metatable(base),
                };
                self.structure_mut(base).transitions.upsert(tkey, target);
                target
            }
            MetatableState::Monomorphic(_) => match existing {
                Some(e) => e,
                None => {
                    let target = self.create_structure_for_poly_metatable(id);
                    self.structure_mut(id).transitions.insert(tkey, target);
                    target
                }
            },
        };

        let t = self.structure(target);
        match t.parent_edge {
            TransitionKind::AddMetaTable => SetMetatableResult {
                new_structure: target,
                should_insert_metatable: false,
                should_grow_butterfly: false,
                slot: 0,
            },
            kind => {
                debug_assert!(matches!(
                    kind,
                    TransitionKind::TransitToPolyMetaTable
                        | TransitionKind::TransitToPolyMetaTableAndGrowPropertyStorageCapacity
                ));
                SetMetatableResult {
                    new_structure: target,
                    should_insert_metatable: true,
                    should_grow_butterfly: kind
                        == TransitionKind::TransitToPolyMetaTableAndGrowPropertyStorageCapacity,
                    slot: t.poly_metatable_slot().unwrap_or_default(),
                }
            }
        }
    }

    pub fn remove_metatable(&mut self, id: StructureId) -> RemoveMetatableResult {
        let s = self.structure(id);
        let (state, parent, parent_edge) = (s.metatable, s.parent, s.parent_edge);
        let existing = s.transitions.get(&TransitionKey::RemoveMetatable);
        let unchanged = RemoveMetatableResult {
            new_structure: id,
            should_insert_metatable: false,
            slot: 0,
        };
        match state {
            MetatableState::None => unchanged,
            MetatableState::Poly { slot } => RemoveMetatableResult {
                should_insert_metatable: true,
                slot,
                ..unchanged
            },
            MetatableState::Monomorphic(_) if parent_edge == TransitionKind::AddMetaTable => {
                let Some(parent) = parent else {
                    panic!("metatable transition without a parent");
                };
                debug_assert_eq!(self.structure(parent).metatable, MetatableState::None);
                RemoveMetatableResult {
                    new_structure: parent,
                    ..unchanged
                }
            }
            MetatableState::Monomorphic(_) => {
                let target = match existing {
                    Some(t) => t,
                    None => {
                        let t = self.clone_structure(id);
                        let n = self.structure_mut(t);
                        n.parent_edge = TransitionKind::RemoveMetaTable;
                        n.metatable = MetatableState::None;
                        n.array_type.set_may_have_metatable(false);
                        self.structure_mut(id)
                            .transitions
                            .insert(TransitionKey::RemoveMetatable, t);
                        t
                    }
                };
                RemoveMetatableResult {
                    new_structure: target,
                    ..unchanged
                }
            }
        }
    }

    /// Structure identical to `id` except for its array type, which must differ.
    pub fn update_array_type(&mut self, id: StructureId, new_array_type: ArrayType) -> StructureId {
        debug_assert_ne!(self.structure(id).array_type, new_array_type);
        let tkey = TransitionKey::ChangeArrayType(new_array_type.bits());
        if let Some(t) = self.structure(id).transitions.get(&tkey) {
            return t;
        }
        let t = self.clone_structure(id);
        let n = self.structure_mut(t);
        n.parent_edge = TransitionKind::UpdateArrayType;
        n.array_type = new_array_type;
        self.structure_mut(id).transitions.insert(tkey, t);
        t
    }

    fn create_structure_for_monomorphic_metatable(
        &mut self,
        id: StructureId,
        metatable: TableId,
    ) -> StructureId {
        debug_assert_eq!(self.structure(id).metatable, MetatableState::None);
        let t = self.clone_structure(id);
        let n = self.structure_mut(t);
        n.parent_edge = TransitionKind::AddMetaTable;
        n.metatable = MetatableState::Monomorphic(metatable);
        debug_assert!(!n.array_type.may_have_metatable());
        n.array_type.set_may_have_metatable(true);
        t
    }

    fn create_structure_for_poly_metatable(&mut self, id: StructureId) -> StructureId {
        debug_assert!(!self.structure(id).is_poly_metatable());
        self.create_structure_for_transition(
            id,
            SlotAdditionKind::AddSlotForPolyMetatable,
            Some(PropertyKey::Special(luma_core::SpecialKey::PolyMetatable)),
        )
    }

    fn clone_structure(&mut self, id: StructureId) -> StructureId {
        self.create_structure_for_transition(id, SlotAdditionKind::NoSlotAdded, None)
    }
}
