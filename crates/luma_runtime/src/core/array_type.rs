//! Array part classification and growth policy.

use luma_core::Value;

/// When to use the vector part and when to use the sparse map.
pub struct ArrayGrowthPolicy;

impl ArrayGrowthPolicy {
    /// Lua arrays are 1-based.
    pub const ARRAY_BASE_ORD: i64 = 1;
    /// Indices up to this cutoff always grow the vector.
    pub const ALWAYS_VECTOR_CUTOFF: i64 = 1000;
    /// Past this cutoff an index goes to the sparse map unless the array stays continuous.
    pub const SPARSE_MAP_UNLESS_CONTINUOUS_CUTOFF: i64 = 100_000;
    /// Between the two cutoffs the vector grows only if it stays this dense.
    pub const DENSITY_CUTOFF: u64 = 8;
    /// Indices above this always go to the sparse map.
    pub const UNCONDITIONALLY_SPARSE_MAP_CUTOFF: i64 = 1 << 27;
    pub const INITIAL_VECTOR_CAPACITY: u32 = 4;
    pub const VECTOR_GROWTH_FACTOR: u32 = 2;

    /// Whether `idx` could ever live in the vector part.
    #[inline]
    pub fn is_vector_qualifying_index(idx: i64) -> bool {
        (Self::ARRAY_BASE_ORD..=Self::UNCONDITIONALLY_SPARSE_MAP_CUTOFF).contains(&idx)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum ArrayKind {
    /// No readable array part: either no butterfly, or a butterfly whose
    /// array part holds nothing (no sparse map, vector possibly preallocated).
    NoButterflyArrayPart = 0,
    Int32 = 1,
    Double = 2,
    Any = 3,
}

impl ArrayKind {
    /// Kind of an array holding only `v`.
    #[inline]
    pub fn of_value(v: Value) -> ArrayKind {
        match v {
            Value::Int32(_) => ArrayKind::Int32,
            Value::Double(_) => ArrayKind::Double,
            _ => ArrayKind::Any,
        }
    }

    /// Kind after storing a non-nil `v` into an array of this kind.
    #[inline]
    pub fn merged_with(self, v: Value) -> ArrayKind {
        debug_assert!(!v.is_nil());
        match self {
            ArrayKind::NoButterflyArrayPart => ArrayKind::of_value(v),
            ArrayKind::Int32 if !v.is_int32() => ArrayKind::Any,
            ArrayKind::Double if !v.is_double() => ArrayKind::Any,
            k => k,
        }
    }
}

/// Packed description of a table's array part.
///
/// bit 0-1: kind, bit 2: has sparse map, bit 3: sparse map contains a vector
/// index, bit 4: continuous, bit 5: may have metatable.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ArrayType(u8);

impl ArrayType {
    const KIND_MASK: u8 = 0b11;
    const HAS_SPARSE_MAP: u8 = 1 << 2;
    const SPARSE_MAP_CONTAINS_VECTOR_INDEX: u8 = 1 << 3;
    const IS_CONTINUOUS: u8 = 1 << 4;
    const MAY_HAVE_METATABLE: u8 = 1 << 5;

    #[inline]
    pub const fn initial() -> ArrayType {
        ArrayType(0)
    }

    #[inline]
    pub const fn bits(self) -> u8 {
        self.0
    }

    #[inline]
    pub fn kind(self) -> ArrayKind {
        match self.0 & Self::KIND_MASK {
            0 => ArrayKind::NoButterflyArrayPart,
            1 => ArrayKind::Int32,
            2 => ArrayKind::Double,
            _ => ArrayKind::Any,
        }
    }

    #[inline]
    pub fn set_kind(&mut self, kind: ArrayKind) {
        self.0 = (self.0 & !Self::KIND_MASK) | kind as u8;
    }

    #[inline]
    pub fn has_sparse_map(self) -> bool {
        self.0 & Self::HAS_SPARSE_MAP != 0
    }

    #[inline]
    pub fn set_has_sparse_map(&mut self, v: bool) {
        self.set_bit(Self::HAS_SPARSE_MAP, v);
    }

    #[inline]
    pub fn sparse_map_contains_vector_index(self) -> bool {
        self.0 & Self::SPARSE_MAP_CONTAINS_VECTOR_INDEX != 0
    }

    #[inline]
    pub fn set_sparse_map_contains_vector_index(&mut self, v: bool) {
        self.set_bit(Self::SPARSE_MAP_CONTAINS_VECTOR_INDEX, v);
    }

    #[inline]
    pub fn is_continuous(self) -> bool {
        self.0 & Self::IS_CONTINUOUS != 0
    }

    #[inline]
    pub fn set_is_continuous(&mut self, v: bool) {
        self.set_bit(Self::IS_CONTINUOUS, v);
    }

    #[inline]
    pub fn may_have_metatable(self) -> bool {
        self.0 & Self::MAY_HAVE_METATABLE != 0
    }

    #[inline]
    pub fn set_may_have_metatable(&mut self, v: bool) {
        self.set_bit(Self::MAY_HAVE_METATABLE, v);
    }

    #[inline]
    fn set_bit(&mut self, bit: u8, v: bool) {
        if v {
            self.0 |= bit;
        } else {
            self.0 &= !bit;
        }
    }

    /// Checks the relations between the bits.
    pub fn is_consistent(self) -> bool {
        if self.is_continuous() && self.has_sparse_map() {
            return false;
        }
        if self.sparse_map_contains_vector_index() && !self.has_sparse_map() {
            return false;
        }
        if self.kind() == ArrayKind::NoButterflyArrayPart
            && (self.has_sparse_map() || self.is_continuous())
        {
            return false;
        }
        true
    }
}

impl std::fmt::Debug for ArrayType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArrayType")
            .field("kind", &self.kind())
            .field("has_sparse_map", &self.has_sparse_map())
            .field(
                "sparse_map_contains_vector_index",
                &self.sparse_map_contains_vector_index(),
            )
            .field("is_continuous", &self.is_continuous())
            .field("may_have_metatable", &self.may_have_metatable())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bits_are_independent() {
        let mut t = ArrayType::initial();
        t.set_kind(ArrayKind::Double);
        t.set_is_continuous(true);
        t.set_may_have_metatable(true);
        assert_eq!(t.kind(), ArrayKind::Double);
        assert!(t.is_continuous());
        assert!(t.may_have_metatable());
        assert!(!t.has_sparse_map());
        t.set_kind(ArrayKind::Any);
        t.set_is_continuous(false);
        assert_eq!(t.kind(), ArrayKind::Any);
        assert!(!t.is_continuous());
        assert!(t.may_have_metatable());
        assert!(t.is_consistent());
    }

    #[test]
    fn continuous_with_sparse_map_is_inconsistent() {
        let mut t = ArrayType::initial();
        t.set_kind(ArrayKind::Any);
        t.set_is_continuous(true);
        t.set_has_sparse_map(true);
        assert!(!t.is_consistent());
    }

    #[test]
    fn kind_merging() {
        let (int, double, boolean) = (Value::Int32(1), Value::Double(1.5), Value::Bool(true));
        let empty = ArrayKind::NoButterflyArrayPart;
        assert_eq!(empty.merged_with(int), ArrayKind::Int32);
        assert_eq!(ArrayKind::Int32.merged_with(int), ArrayKind::Int32);
        assert_eq!(ArrayKind::Int32.merged_with(double), ArrayKind::Any);
        assert_eq!(ArrayKind::Double.merged_with(boolean), ArrayKind::Any);
        assert_eq!(ArrayKind::Any.merged_with(int), ArrayKind::Any);
    }
}
