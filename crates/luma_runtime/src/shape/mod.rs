//! Hidden classes: the shared structure tree and the per-object dictionary.
//!
//! - `Structure` - immutable shape tree node with its inline hash table
//! - `AnchorHashTable` - shared lookup table over all full 16-key blocks
//! - `TransitionTable` - child edges of a structure
//! - `CacheableDictionary` - per-object fallback once a shape has too many slots
//!
//! All nodes live in `Shapes`, addressed by `StructureId` / `DictionaryId`.
//! Nothing is ever freed.

pub mod anchor;
mod builder;
pub mod dictionary;
pub mod iter;
pub mod structure;
pub mod transition;

use dictionary::CacheableDictionary;
use luma_core::{FastHashMap, PropertyKey, StringId, fast_map_new};
use structure::{InlineCapacityStepping, Structure};

/// Handle to a structure node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StructureId(pub u32);

/// Handle to a cacheable dictionary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DictionaryId(pub u32);

/// Shape of a table object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HiddenClass {
    Structure(StructureId),
    Dictionary(DictionaryId),
}

/// Lua metamethods tracked by `Structure::known_nonexistent_metamethods`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MetamethodKind {
    Call,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    Unm,
    Concat,
    Len,
    Eq,
    Lt,
    Le,
    Index,
    NewIndex,
    ProtectedMt,
}

impl MetamethodKind {
    pub const ALL: [MetamethodKind; 16] = [
        MetamethodKind::Call,
        MetamethodKind::Add,
        MetamethodKind::Sub,
        MetamethodKind::Mul,
        MetamethodKind::Div,
        MetamethodKind::Mod,
        MetamethodKind::Pow,
        MetamethodKind::Unm,
        MetamethodKind::Concat,
        MetamethodKind::Len,
        MetamethodKind::Eq,
        MetamethodKind::Lt,
        MetamethodKind::Le,
        MetamethodKind::Index,
        MetamethodKind::NewIndex,
        MetamethodKind::ProtectedMt,
    ];

    pub const FULL_MASK: u16 = u16::MAX;

    pub fn name(self) -> &'static str {
        match self {
            MetamethodKind::Call => "__call",
            MetamethodKind::Add => "__add",
            MetamethodKind::Sub => "__sub",
            MetamethodKind::Mul => "__mul",
            MetamethodKind::Div => "__div",
            MetamethodKind::Mod => "__mod",
            MetamethodKind::Pow => "__pow",
            MetamethodKind::Unm => "__unm",
            MetamethodKind::Concat => "__concat",
            MetamethodKind::Len => "__len",
            MetamethodKind::Eq => "__eq",
            MetamethodKind::Lt => "__lt",
            MetamethodKind::Le => "__le",
            MetamethodKind::Index => "__index",
            MetamethodKind::NewIndex => "__newindex",
            MetamethodKind::ProtectedMt => "__metatable",
        }
    }

    #[inline]
    pub fn bit(self) -> u16 {
        1 << self as u8
    }
}

/// Arena owning every structure and dictionary of a VM.
pub struct Shapes {
    pub(crate) structures: Vec<Structure>,
    pub(crate) dictionaries: Vec<CacheableDictionary>,
    initial_structures: [Option<StructureId>; InlineCapacityStepping::NUM_STEPPINGS],
    metamethod_names: FastHashMap<StringId, MetamethodKind>,
    pub(crate) trace_transitions: bool,
}

impl Default for Shapes {
    fn default() -> Self {
        Self::new()
    }
}

impl Shapes {
    pub fn new() -> Self {
        Self {
            structures: Vec::new(),
            dictionaries: Vec::new(),
            initial_structures: [None; InlineCapacityStepping::NUM_STEPPINGS],
            metamethod_names: fast_map_new(),
            trace_transitions: false,
        }
    }

    #[inline]
    pub fn structure(&self, id: StructureId) -> &Structure {
        &self.structures[id.0 as usize]
    }

    #[inline]
    pub(crate) fn structure_mut(&mut self, id: StructureId) -> &mut Structure {
        &mut self.structures[id.0 as usize]
    }

    #[inline]
    pub fn dictionary(&self, id: DictionaryId) -> &CacheableDictionary {
        &self.dictionaries[id.0 as usize]
    }

    #[inline]
    pub(crate) fn dictionary_mut(&mut self, id: DictionaryId) -> &mut CacheableDictionary {
        &mut self.dictionaries[id.0 as usize]
    }

    pub(crate) fn alloc_structure(&mut self, s: Structure) -> StructureId {
        let id = StructureId(self.structures.len() as u32);
        self.structures.push(s);
        id
    }

    pub(crate) fn alloc_dictionary(&mut self, d: CacheableDictionary) -> DictionaryId {
        let id = DictionaryId(self.dictionaries.len() as u32);
        self.dictionaries.push(d);
        id
    }

    /// Registers the interned name of a metamethod.
    pub fn register_metamethod_name(&mut self, name: StringId, kind: MetamethodKind) {
        self.metamethod_names.insert(name, kind);
    }

    pub(crate) fn metamethod_kind_of(&self, key: &PropertyKey) -> Option<MetamethodKind> {
        match key {
            PropertyKey::String(s) => self.metamethod_names.get(s).copied(),
            _ => None,
        }
    }

    /// The cached initial structure for the stepping `cap` falls into.
    pub fn initial_structure_for_inline_capacity(&mut self, cap: u32) -> StructureId {
        let stepping = InlineCapacityStepping::stepping_for(cap);
        if let Some(id) = self.initial_structures[stepping] {
            return id;
        }
        let inline_cap = InlineCapacityStepping::capacity_of_stepping(stepping);
        let id = self.create_initial_structure(inline_cap);
        self.initial_structures[stepping] = Some(id);
        id
    }

    /// Slot of `key` in the shape of a table, if the shape has it.
    pub fn slot_of(&self, hc: HiddenClass, key: &PropertyKey) -> Option<u32> {
        match hc {
            HiddenClass::Structure(id) => self
                .structure(id)
                .get_slot_ordinal(&self.structures, key)
                .map(u32::from),
            HiddenClass::Dictionary(id) => self.dictionary(id).get_slot(key),
        }
    }
}
