//! Anchor hash table: a snapshot of every property in the first `16 * k`
//! slots of a structure chain.
//!
//! The keys themselves are not copied. Each full block is referenced through
//! the structure that completed it, so an entry only stores the slot ordinal
//! and an 8-bit check hash.

use super::StructureId;
use super::structure::{BLOCK_SIZE, Structure};
use luma_core::{PropertyKey, round_up_pow2};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct AnchorEntry {
    ordinal: u8,
    check_hash: u8,
}

impl AnchorEntry {
    const EMPTY: AnchorEntry = AnchorEntry {
        ordinal: 0xff,
        check_hash: 0,
    };

    #[inline]
    fn is_empty(&self) -> bool {
        self.ordinal == 0xff
    }
}

#[derive(Debug)]
pub struct AnchorHashTable {
    num_total_slots: u8,
    mask: usize,
    blocks: Vec<StructureId>,
    entries: Box<[AnchorEntry]>,
}

impl AnchorHashTable {
    #[inline]
    pub fn num_blocks(&self) -> usize {
        self.blocks.len()
    }

    #[inline]
    pub fn num_total_slots(&self) -> u8 {
        self.num_total_slots
    }

    #[inline]
    pub fn hash_table_size(&self) -> usize {
        self.mask + 1
    }

    /// Key stored at slot `ordinal`, which must be below `num_total_slots`.
    #[inline]
    pub fn key_at(&self, structures: &[Structure], ordinal: u8) -> PropertyKey {
        debug_assert!(ordinal < self.num_total_slots);
        let holder = self.blocks[(ordinal / BLOCK_SIZE) as usize];
        structures[holder.0 as usize].block[(ordinal % BLOCK_SIZE) as usize]
    }

    pub fn find(&self, structures: &[Structure], key: &PropertyKey, hash: u32) -> Option<u8> {
        let check_hash = hash as u8;
        let mut slot = (hash >> 8) as usize & self.mask;
        loop {
            let e = self.entries[slot];
            if e.is_empty() {
                return None;
            }
            if e.check_hash == check_hash && self.key_at(structures, e.ordinal) == *key {
                return Some(e.ordinal);
            }
            slot = slot.wrapping_sub(1) & self.mask;
        }
    }

    fn insert(entries: &mut [AnchorEntry], mask: usize, key: &PropertyKey, ordinal: u8) {
        let hash = key.hash32();
        let mut slot = (hash >> 8) as usize & mask;
        while !entries[slot].is_empty() {
            slot = slot.wrapping_sub(1) & mask;
        }
        entries[slot] = AnchorEntry {
            ordinal,
            check_hash: hash as u8,
        };
    }

    /// Builds the anchor covering every slot of `holder`, whose own block
    /// must be full. The previous anchor of `holder` is extended by one block.
    pub(crate) fn create(structures: &[Structure], holder: StructureId) -> AnchorHashTable {
        let s = &structures[holder.0 as usize];
        debug_assert!(s.num_slots > 0 && s.num_slots % BLOCK_SIZE == 0);
        debug_assert_eq!(s.block.len(), BLOCK_SIZE as usize);
        let prev = s.anchor.as_deref();
        let prev_total = prev.map_or(0, |a| a.num_total_slots);
        let num_elements = prev_total + BLOCK_SIZE;
        debug_assert_eq!(num_elements, s.num_slots);

        let size = round_up_pow2(num_elements as u32) as usize * 2;
        let mask = size - 1;
        let mut entries = match prev {
            Some(p) if p.hash_table_size() == size => p.entries.clone(),
            _ => {
                let mut entries = vec![AnchorEntry::EMPTY; size].into_boxed_slice();
                if let Some(p) = prev {
                    for ord in 0..prev_total {
                        Self::insert(&mut entries, mask, &p.key_at(structures, ord), ord);
                    }
                }
                entries
            }
        };
        for (i, key) in s.block.iter().enumerate() {
            Self::insert(&mut entries, mask, key, prev_total + i as u8);
        }

        let mut blocks = prev.map_or_else(Vec::new, |p| p.blocks.clone());
        blocks.push(holder);
        debug_assert_eq!(blocks.len() * BLOCK_SIZE as usize, num_elements as usize);
        AnchorHashTable {
            num_total_slots: num_elements,
            mask,
            blocks,
            entries,
        }
    }
}
