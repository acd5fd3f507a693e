//! Inline cache records.
//!
//! Each table access is split in two: a `prepare_*` step that classifies the
//! access from the table's hidden class (or array type) into one of these
//! records, and an execute step that applies it. A caller may keep a record
//! per call site and replay it while the guard it was computed under, the
//! hidden class, still matches.

use crate::core::array_type::ArrayType;
use crate::shape::{HiddenClass, StructureId};

/// Where a named property lives, or why it cannot be cached.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GetByIdIcKind {
    /// Index into the table's inline storage.
    InlinedStorage(u32),
    /// Index into the butterfly's named storage.
    OutlinedStorage(u32),
    /// No table with this structure has the property.
    MustBeNil,
    /// Absent for now, but a dictionary may gain the key without changing
    /// its identity, so the answer must not be cached.
    MustBeNilButUncacheable,
    UncacheableDictionary,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GetByIdIcInfo {
    pub kind: GetByIdIcKind,
    /// A nil result must consult the metatable's `__index`.
    pub may_have_metatable: bool,
    pub hidden_class: HiddenClass,
}

impl GetByIdIcInfo {
    #[inline]
    pub fn is_cacheable(&self) -> bool {
        !matches!(
            self.kind,
            GetByIdIcKind::MustBeNilButUncacheable | GetByIdIcKind::UncacheableDictionary
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PutByIdIcKind {
    InlinedStorage(u32),
    OutlinedStorage(u32),
    /// The put must turn the table into a dictionary; never cacheable.
    TransitionedToDictionaryMode,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PutByIdIcInfo {
    pub kind: PutByIdIcKind,
    /// `false` means the put moves the table to `new_structure`.
    pub property_exists: bool,
    /// Only possible when the property does not exist yet.
    pub should_grow_butterfly: bool,
    /// The put must check for `__newindex` if the old value is nil.
    pub may_have_metatable: bool,
    pub is_inline_cacheable: bool,
    pub hidden_class: HiddenClass,
    pub new_structure: Option<StructureId>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GetByIntegerIndexIcKind {
    /// A present value must be in the vector part.
    VectorStorage,
    /// No array part: the result is nil.
    NoArrayPart,
    /// The sparse map holds no vector-qualifying index: qualifying indices
    /// are looked up in the vector only, the rest in the sparse map only.
    VectorStorageXorSparseMap,
    /// Qualifying indices outside the vector may still be in the sparse map.
    VectorStorageOrSparseMap,
}

impl GetByIntegerIndexIcKind {
    pub fn from_array_type(array_type: ArrayType) -> Self {
        use crate::core::array_type::ArrayKind;
        if array_type.is_continuous() {
            GetByIntegerIndexIcKind::VectorStorage
        } else if array_type.kind() == ArrayKind::NoButterflyArrayPart {
            debug_assert!(!array_type.has_sparse_map());
            GetByIntegerIndexIcKind::NoArrayPart
        } else if array_type.sparse_map_contains_vector_index() {
            GetByIntegerIndexIcKind::VectorStorageOrSparseMap
        } else if array_type.has_sparse_map() {
            GetByIntegerIndexIcKind::VectorStorageXorSparseMap
        } else {
            GetByIntegerIndexIcKind::VectorStorage
        }
    }

    /// Whether a non-vector index may be found in the sparse map.
    pub fn may_use_sparse_map(self) -> bool {
        matches!(
            self,
            Self::VectorStorageXorSparseMap | Self::VectorStorageOrSparseMap
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GetByIntegerIndexIcInfo {
    pub kind: GetByIntegerIndexIcKind,
    pub may_have_metatable: bool,
    /// Implies `kind == VectorStorage`.
    pub is_continuous: bool,
}

/// Guard on the written index for the fast path.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IndexCheckKind {
    /// No fast path, e.g. for dictionary tables.
    ForceSlowPath,
    /// Empty array part: only a write to index 1 with vector capacity left
    /// qualifies, and it makes the array continuous.
    NoArrayPart,
    /// Any index within the vector capacity.
    InBound,
    /// An index within the continuous range or one past its end.
    Continuous,
}

/// Guard on the written value for the fast path.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValueCheckKind {
    Int32,
    Int32OrNil,
    Double,
    DoubleOrNil,
    NotNil,
    NoCheck,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PutByIntegerIndexIcInfo {
    pub index_check: IndexCheckKind,
    pub value_check: ValueCheckKind,
    pub may_have_metatable: bool,
    pub hidden_class: HiddenClass,
    /// Used by `IndexCheckKind::NoArrayPart` only, the one fast path that
    /// changes the array type and structure.
    pub new_array_type: ArrayType,
    pub new_hidden_class: Option<HiddenClass>,
}

impl PutByIntegerIndexIcInfo {
    pub(crate) fn force_slow_path(hidden_class: HiddenClass, array_type: ArrayType) -> Self {
        Self {
            index_check: IndexCheckKind::ForceSlowPath,
            value_check: ValueCheckKind::NoCheck,
            may_have_metatable: array_type.may_have_metatable(),
            hidden_class,
            new_array_type: array_type,
            new_hidden_class: None,
        }
    }
}
