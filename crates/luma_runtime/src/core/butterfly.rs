//! Out-of-line storage of a table: named slots that do not fit inline, plus
//! the array part (vector storage and optional sparse map).

use super::array_type::ArrayGrowthPolicy;
use super::sparse_map::ArraySparseMap;
use luma_core::Value;

/// State of the array part stored in the butterfly header.
#[derive(Clone, Debug)]
pub enum ArrayLength {
    /// Indices `1..=len` are non-nil and every other index is nil.
    Continuous(u32),
    /// Holes may exist; no sparse map.
    NonContinuous,
    /// Holes may exist and indices outside the vector live in the map.
    SparseMap(Box<ArraySparseMap>),
}

#[derive(Clone, Debug)]
pub struct Butterfly {
    named: Vec<Value>,
    /// 1-based vector storage; `vector[i - 1]` holds index `i`.
    vector: Vec<Value>,
    array_length: ArrayLength,
}

impl Butterfly {
    pub fn with_capacities(named_capacity: u32, array_capacity: u32) -> Self {
        Self {
            named: vec![Value::Nil; named_capacity as usize],
            vector: vec![Value::Nil; array_capacity as usize],
            array_length: ArrayLength::Continuous(0),
        }
    }

    #[inline]
    pub fn named_capacity(&self) -> u32 {
        self.named.len() as u32
    }

    #[inline]
    pub fn array_capacity(&self) -> u32 {
        self.vector.len() as u32
    }

    pub fn grow_named(&mut self, new_capacity: u32) {
        debug_assert!(new_capacity as usize >= self.named.len());
        self.named.resize(new_capacity as usize, Value::Nil);
    }

    pub fn grow_array(&mut self, new_capacity: u32) {
        debug_assert!(new_capacity as usize >= self.vector.len());
        self.vector.resize(new_capacity as usize, Value::Nil);
    }

    #[inline]
    pub fn named(&self, outlined_slot: usize) -> Value {
        self.named[outlined_slot]
    }

    #[inline]
    pub fn set_named(&mut self, outlined_slot: usize, value: Value) {
        self.named[outlined_slot] = value;
    }

    /// Whether `idx` lies within `[1, capacity]`.
    #[inline]
    pub fn index_fits_in_vector_capacity(&self, idx: i64) -> bool {
        idx >= ArrayGrowthPolicy::ARRAY_BASE_ORD && idx <= self.vector.len() as i64
    }

    /// Whether `idx` lies within the continuous range `[1, len]`.
    #[inline]
    pub fn is_in_continuous_range(&self, idx: i64) -> bool {
        match self.array_length {
            ArrayLength::Continuous(len) => {
                idx >= ArrayGrowthPolicy::ARRAY_BASE_ORD && idx <= len as i64
            }
            _ => false,
        }
    }

    /// Reads vector index `idx`; the caller checked the capacity.
    #[inline]
    pub fn vector_get(&self, idx: i64) -> Value {
        debug_assert!(self.index_fits_in_vector_capacity(idx));
        self.vector[(idx - ArrayGrowthPolicy::ARRAY_BASE_ORD) as usize]
    }

    #[inline]
    pub fn vector_set(&mut self, idx: i64, value: Value) {
        debug_assert!(self.index_fits_in_vector_capacity(idx));
        self.vector[(idx - ArrayGrowthPolicy::ARRAY_BASE_ORD) as usize] = value;
    }

    #[inline]
    pub fn continuous_len(&self) -> Option<u32> {
        match self.array_length {
            ArrayLength::Continuous(len) => Some(len),
            _ => None,
        }
    }

    /// Marks the vector as continuous with `len` elements, or not continuous.
    /// Must not be called once a sparse map exists.
    pub fn set_continuous_len(&mut self, len: Option<u32>) {
        debug_assert!(!matches!(self.array_length, ArrayLength::SparseMap(_)));
        self.array_length = match len {
            Some(len) => {
                debug_assert!(len <= self.array_capacity());
                ArrayLength::Continuous(len)
            }
            None => ArrayLength::NonContinuous,
        };
    }

    #[inline]
    pub fn sparse_map(&self) -> Option<&ArraySparseMap> {
        match &self.array_length {
            ArrayLength::SparseMap(m) => Some(m),
            _ => None,
        }
    }

    pub fn get_or_allocate_sparse_map(&mut self) -> &mut ArraySparseMap {
        if !matches!(self.array_length, ArrayLength::SparseMap(_)) {
            tracing::debug!(
                vector_capacity = self.array_capacity(),
                "allocating array sparse map"
            );
            self.array_length = ArrayLength::SparseMap(Box::default());
        }
        match &mut self.array_length {
            ArrayLength::SparseMap(m) => m,
            _ => unreachable!(),
        }
    }

    /// Number of non-nil values in the vector part.
    pub fn count_vector_non_nil(&self) -> u64 {
        self.vector.iter().filter(|v| !v.is_nil()).count() as u64
    }
}
