//! Construction of structure nodes.

use super::anchor::AnchorHashTable;
use super::structure::{
    BLOCK_SIZE, InlineEntry, MAX_INLINE_CAPACITY, MAX_NUM_SLOTS, MetatableState, SlotAdditionKind,
    Structure, TransitionKind, compute_non_full_block_len, has_final_full_block,
};
use super::transition::TransitionTable;
use super::{MetamethodKind, Shapes, StructureId};
use crate::core::array_type::ArrayType;
use luma_core::{PropertyKey, round_up_pow2};
use smallvec::SmallVec;
use std::rc::Rc;

const INITIAL_INLINE_HASH_TABLE_SIZE: usize = 8;

/// Named storage growth for structures and dictionaries.
pub(crate) struct NamedStorageGrowth;

impl NamedStorageGrowth {
    pub(crate) const INITIAL_MINIMUM_CAPACITY: u32 = 4;
    pub(crate) const CAPACITY_FROM_INLINE_CAPACITY_FACTOR: u32 = 2;
    pub(crate) const GROWTH_FACTOR: u32 = 2;

    pub(crate) fn initial_capacity(inline_capacity: u32) -> u32 {
        let capacity = inline_capacity / Self::CAPACITY_FROM_INLINE_CAPACITY_FACTOR;
        capacity.max(Self::INITIAL_MINIMUM_CAPACITY)
    }

    /// A structure never needs more than `MAX_NUM_SLOTS + 1` slots in total.
    pub(crate) fn clamp_for_structure(capacity: u32, inline_capacity: u8) -> u8 {
        let limit = MAX_NUM_SLOTS as u32 + 1 - inline_capacity as u32;
        capacity.min(limit) as u8
    }
}

fn inline_hash_table_size(num_elements: u32) -> usize {
    (round_up_pow2(num_elements) as usize * 2).max(INITIAL_INLINE_HASH_TABLE_SIZE)
}

fn empty_inline_table(size: usize) -> Box<[InlineEntry]> {
    vec![InlineEntry::EMPTY; size].into_boxed_slice()
}

fn insert_into_inline_table(table: &mut [InlineEntry], key: &PropertyKey, ordinal: i8) {
    let mask = table.len() - 1;
    let hash = key.hash32() as u16;
    let mut slot = (hash >> 8) as usize & mask;
    while !table[slot].is_empty() {
        slot = slot.wrapping_sub(1) & mask;
    }
    table[slot] = InlineEntry {
        check_hash: hash as u8,
        ordinal,
    };
}

impl Shapes {
    /// Root structure with no slots. Callers normally go through
    /// `initial_structure_for_inline_capacity`.
    pub fn create_initial_structure(&mut self, inline_capacity: u8) -> StructureId {
        debug_assert!(inline_capacity <= MAX_INLINE_CAPACITY);
        let s = Structure {
            num_slots: 0,
            non_full_block_len: 0,
            inline_capacity,
            butterfly_capacity: 0,
            array_type: ArrayType::initial(),
            known_nonexistent_metamethods: MetamethodKind::FULL_MASK,
            metatable: MetatableState::None,
            parent: None,
            parent_edge: TransitionKind::BadTransitionKind,
            transitions: TransitionTable::Empty,
            anchor: None,
            inline_table: empty_inline_table(INITIAL_INLINE_HASH_TABLE_SIZE),
            block: SmallVec::new(),
            final_full_block: None,
        };
        let id = self.alloc_structure(s);
        tracing::trace!(
            structure = id.0,
            inline_capacity,
            "created initial structure"
        );
        id
    }

    /// Makes sure `holder`'s anchor covers `holder`'s own full block and returns it.
    pub(crate) fn build_new_anchor_table_if_necessary(
        &mut self,
        holder: StructureId,
    ) -> Rc<AnchorHashTable> {
        let s = self.structure(holder);
        debug_assert!(s.num_slots > 0 && s.num_slots % BLOCK_SIZE == 0);
        if s.anchor_contains_final_block() {
            if let Some(a) = &s.anchor {
                return a.clone();
            }
        }
        let anchor = Rc::new(AnchorHashTable::create(&self.structures, holder));
        tracing::debug!(
            structure = holder.0,
            num_blocks = anchor.num_blocks(),
            "built structure anchor hash table"
        );
        let s = self.structure_mut(holder);
        s.anchor = Some(anchor.clone());
        // Every key of `holder` is now in the anchor.
        s.inline_table.fill(InlineEntry::EMPTY);
        anchor
    }

    /// Builds the child of `base` for a property addition, a poly-metatable
    /// addition, or a plain clone (`key` is `None`). Clones get
    /// `BadTransitionKind` and the caller sets the real kind.
    pub(crate) fn create_structure_for_transition(
        &mut self,
        base: StructureId,
        kind: SlotAdditionKind,
        key: Option<PropertyKey>,
    ) -> StructureId {
        let adding = kind != SlotAdditionKind::NoSlotAdded;
        debug_assert_eq!(adding, key.is_some());

        let s = self.structure(base);
        let num_slots = s.num_slots;
        let non_full = s.non_full_block_len;
        let inline_capacity = s.inline_capacity;
        let base_anchor_contains_final = s.anchor_contains_final_block();
        let base_final = s.final_full_block;
        let base_anchor = s.anchor.clone();
        let slot_limit = if kind == SlotAdditionKind::AddSlotForPolyMetatable {
            MAX_NUM_SLOTS + 1
        } else {
            MAX_NUM_SLOTS
        };
        debug_assert!(!adding || num_slots < slot_limit);

        let copy_len: u8;
        let final_full_block: Option<StructureId>;
        let must_contain_final_block: bool;
        let may_copy_table: bool;
        let anchor: Option<Rc<AnchorHashTable>>;

        if adding && non_full == BLOCK_SIZE - 1 {
            // The new node completes its block. The block before it, if any,
            // goes into a fresh anchor.
            anchor = match base_final {
                Some(fb) if num_slots >= BLOCK_SIZE => {
                    Some(self.build_new_anchor_table_if_necessary(fb))
                }
                _ => None,
            };
            copy_len = BLOCK_SIZE - 1;
            final_full_block = None;
            must_contain_final_block = false;
            may_copy_table = !has_final_full_block(num_slots) || base_anchor_contains_final;
        } else if adding && non_full == BLOCK_SIZE {
            // The new node starts a block; `base` holds the previous full block.
            anchor = base_anchor;
            copy_len = 0;
            final_full_block = Some(base);
            must_contain_final_block = !base_anchor_contains_final;
            may_copy_table = false;
        } else {
            copy_len = non_full;
            final_full_block = base_final;
            let promoted_anchor = final_full_block
                .map(|fb| self.structure(fb))
                .filter(|fb| fb.anchor_contains_final_block())
                .and_then(|fb| fb.anchor.clone());
            if base_anchor_contains_final {
                anchor = base_anchor;
                must_contain_final_block = false;
                may_copy_table = true;
            } else if let Some(a) = promoted_anchor {
                // Another descendant promoted the final block since `base` was built.
                anchor = Some(a);
                must_contain_final_block = false;
                may_copy_table = false;
            } else {
                anchor = base_anchor;
                must_contain_final_block = final_full_block.is_some();
                may_copy_table = true;
            }
        }

        let s = self.structure(base);
        let new_num_slots = num_slots + adding as u8;

        let mut butterfly_capacity = s.butterfly_capacity;
        let mut grows_butterfly = false;
        if adding && num_slots as u32 == inline_capacity as u32 + s.butterfly_capacity as u32 {
            let wanted = if s.butterfly_capacity == 0 {
                NamedStorageGrowth::initial_capacity(inline_capacity as u32)
            } else {
                s.butterfly_capacity as u32 * NamedStorageGrowth::GROWTH_FACTOR
            };
            butterfly_capacity = NamedStorageGrowth::clamp_for_structure(wanted, inline_capacity);
            debug_assert!(butterfly_capacity > s.butterfly_capacity);
            grows_butterfly = true;
        }

        let final_block_len = if must_contain_final_block {
            BLOCK_SIZE as u32
        } else {
            0
        };
        let num_elements: u32 = if copy_len != BLOCK_SIZE {
            copy_len as u32 + adding as u32 + final_block_len
        } else if !base_anchor_contains_final {
            BLOCK_SIZE as u32
        } else {
            0
        };
        let ht_size = inline_hash_table_size(num_elements);

        let mut inline_table = if may_copy_table && s.inline_table.len() == ht_size {
            s.inline_table.clone()
        } else {
            let mut table = empty_inline_table(ht_size);
            if must_contain_final_block {
                if let Some(fb) = final_full_block {
                    let holder = self.structure(fb);
                    for (i, k) in holder.block.iter().enumerate() {
                        insert_into_inline_table(&mut table, k, i as i8 - BLOCK_SIZE as i8);
                    }
                }
            }
            if !(copy_len == BLOCK_SIZE && base_anchor_contains_final) {
                for (i, k) in s.block[..copy_len as usize].iter().enumerate() {
                    insert_into_inline_table(&mut table, k, i as i8);
                }
            }
            table
        };

        let mut block = s.block.clone();
        block.truncate(copy_len as usize);
        if let Some(k) = key {
            insert_into_inline_table(&mut inline_table, &k, copy_len as i8);
            block.push(k);
        }

        let mut array_type = s.array_type;
        let mut metatable = s.metatable;
        let mut known_nonexistent_metamethods = s.known_nonexistent_metamethods;
        let parent_edge = match kind {
            SlotAdditionKind::AddSlotForProperty => {
                if let Some(mm) = key.and_then(|k| self.metamethod_kind_of(&k)) {
                    known_nonexistent_metamethods &= !mm.bit();
                }
                if grows_butterfly {
                    TransitionKind::AddPropertyAndGrowPropertyStorageCapacity
                } else {
                    TransitionKind::AddProperty
                }
            }
            SlotAdditionKind::AddSlotForPolyMetatable => {
                array_type.set_may_have_metatable(true);
                metatable = MetatableState::Poly { slot: num_slots };
                if grows_butterfly {
                    TransitionKind::TransitToPolyMetaTableAndGrowPropertyStorageCapacity
                } else {
                    TransitionKind::TransitToPolyMetaTable
                }
            }
            SlotAdditionKind::NoSlotAdded => TransitionKind::BadTransitionKind,
        };

        let node = Structure {
            num_slots: new_num_slots,
            non_full_block_len: compute_non_full_block_len(new_num_slots),
            inline_capacity,
            butterfly_capacity,
            array_type,
            known_nonexistent_metamethods,
            metatable,
            parent: Some(base),
            parent_edge,
            transitions: TransitionTable::Empty,
            anchor,
            inline_table,
            block,
            final_full_block,
        };
        debug_assert_eq!(node.block.len(), node.non_full_block_len as usize);
        debug_assert_eq!(
            node.final_full_block.is_some(),
            has_final_full_block(new_num_slots)
        );

        let id = self.alloc_structure(node);
        if self.trace_transitions {
            tracing::debug!(
                structure = id.0,
                parent = base.0,
                num_slots = new_num_slots,
                ?parent_edge,
                "created structure"
            );
        } else {
            tracing::trace!(
                structure = id.0,
                parent = base.0,
                num_slots = new_num_slots,
                ?parent_edge,
                "created structure"
            );
        }
        if cfg!(any(debug_assertions, feature = "verify-structures")) {
            self.verify_structure(id);
        }
        id
    }

    /// Checks that every slot resolves to a distinct key that maps back to it.
    pub fn verify_structure(&self, id: StructureId) {
        let s = self.structure(id);
        let mut seen = hashbrown::HashSet::with_hasher(luma_core::fast_hasher());
        for slot in 0..s.num_slots {
            let key = s.key_for_slot(&self.structures, slot);
            assert!(
                seen.insert(key),
                "structure {} has duplicate key {key:?}",
                id.0
            );
            assert_eq!(
                s.get_slot_ordinal(&self.structures, &key),
                Some(slot),
                "structure {} resolves {key:?} to the wrong slot",
                id.0
            );
        }
        if let Some(a) = s.anchor() {
            assert!(a.num_total_slots() <= s.num_slots);
        }
        let capacity = s.inline_capacity as u32 + s.butterfly_capacity as u32;
        assert!(capacity >= s.num_slots as u32);
        if let Some(slot) = s.poly_metatable_slot() {
            assert!(s.key_for_slot(&self.structures, slot).is_poly_metatable());
        }
    }
}
