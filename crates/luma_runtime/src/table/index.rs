//! Array part access: integer and floating point keys.
//!
//! Indices `1..=capacity` live in the vector part of the butterfly. Other
//! indices go to the sparse map, and so do vector-qualifying indices that
//! would make the vector too sparse. `ArrayType` records enough about the
//! layout that most accesses need a single check.

use super::TableObject;
use crate::core::array_type::{ArrayGrowthPolicy, ArrayKind};
use crate::core::butterfly::Butterfly;
use crate::core::sparse_map::ArraySparseMap;
use crate::runtime::cache::{
    GetByIntegerIndexIcInfo, GetByIntegerIndexIcKind, IndexCheckKind, PutByIntegerIndexIcInfo,
    ValueCheckKind,
};
use crate::shape::{HiddenClass, Shapes};
use luma_core::Value;

/// The integer `v` holds exactly, if any.
#[inline]
pub fn double_as_int64(v: f64) -> Option<i64> {
    let i = v as i64;
    (i as f64 == v && !(i == i64::MAX || i == i64::MIN)).then_some(i)
}

impl TableObject {
    pub fn prepare_get_by_integer_index(&self) -> GetByIntegerIndexIcInfo {
        let array_type = self.array_type;
        GetByIntegerIndexIcInfo {
            kind: GetByIntegerIndexIcKind::from_array_type(array_type),
            may_have_metatable: array_type.may_have_metatable(),
            is_continuous: array_type.is_continuous(),
        }
    }

    #[inline]
    fn vector_value(&self, idx: i64) -> Option<Value> {
        let b = self.butterfly.as_ref()?;
        b.index_fits_in_vector_capacity(idx).then(|| b.vector_get(idx))
    }

    fn sparse_map_value(&self, idx: f64) -> Value {
        match self.butterfly.as_ref().and_then(Butterfly::sparse_map) {
            Some(m) => m.get_by_val(idx),
            None => Value::Nil,
        }
    }

    pub fn get_by_integer_index(&self, idx: i64, ic: GetByIntegerIndexIcInfo) -> Value {
        if ic.kind == GetByIntegerIndexIcKind::NoArrayPart {
            return Value::Nil;
        }
        if let Some(v) = self.vector_value(idx) {
            return v;
        }
        match ic.kind {
            GetByIntegerIndexIcKind::VectorStorageXorSparseMap => {
                if ArrayGrowthPolicy::is_vector_qualifying_index(idx) {
                    Value::Nil
                } else {
                    self.sparse_map_value(idx as f64)
                }
            }
            GetByIntegerIndexIcKind::VectorStorageOrSparseMap => self.sparse_map_value(idx as f64),
            _ => Value::Nil,
        }
    }

    pub fn get_by_double_val(&self, idx: f64, ic: GetByIntegerIndexIcInfo) -> Value {
        if let Some(i) = double_as_int64(idx) {
            return self.get_by_integer_index(i, ic);
        }
        if ic.kind.may_use_sparse_map() {
            self.sparse_map_value(idx)
        } else {
            Value::Nil
        }
    }

    /// Classifies a write of `value` to `index`. For the first write to an
    /// empty array part this creates the structure the table moves to.
    pub fn prepare_put_by_integer_index(
        &self,
        shapes: &mut Shapes,
        index: i64,
        value: Value,
    ) -> PutByIntegerIndexIcInfo {
        let hidden_class = self.hidden_class;
        let array_type = self.array_type;
        let slow_path = PutByIntegerIndexIcInfo::force_slow_path(hidden_class, array_type);
        let HiddenClass::Structure(id) = hidden_class else {
            return slow_path;
        };
        if index < ArrayGrowthPolicy::ARRAY_BASE_ORD {
            return slow_path;
        }

        let kind = array_type.kind();
        if kind == ArrayKind::NoButterflyArrayPart {
            if index != ArrayGrowthPolicy::ARRAY_BASE_ORD {
                return slow_path;
            }
            let (value_check, new_kind) = match value {
                Value::Nil => return slow_path,
                Value::Int32(_) => (ValueCheckKind::Int32, ArrayKind::Int32),
                Value::Double(_) => (ValueCheckKind::Double, ArrayKind::Double),
                _ => (ValueCheckKind::NotNil, ArrayKind::Any),
            };
            let mut new_array_type = array_type;
            new_array_type.set_kind(new_kind);
            new_array_type.set_is_continuous(true);
            let new_structure = shapes.update_array_type(id, new_array_type);
            return PutByIntegerIndexIcInfo {
                index_check: IndexCheckKind::NoArrayPart,
                value_check,
                may_have_metatable: array_type.may_have_metatable(),
                hidden_class,
                new_array_type,
                new_hidden_class: Some(HiddenClass::Structure(new_structure)),
            };
        }

        let (index_check, value_check) = if array_type.is_continuous() {
            let value_check = match kind {
                ArrayKind::Int32 => ValueCheckKind::Int32,
                ArrayKind::Double => ValueCheckKind::Double,
                _ => ValueCheckKind::NotNil,
            };
            (IndexCheckKind::Continuous, value_check)
        } else {
            let value_check = match kind {
                ArrayKind::Int32 => ValueCheckKind::Int32OrNil,
                ArrayKind::Double => ValueCheckKind::DoubleOrNil,
                _ => ValueCheckKind::NoCheck,
            };
            (IndexCheckKind::InBound, value_check)
        };
        PutByIntegerIndexIcInfo {
            index_check,
            value_check,
            may_have_metatable: array_type.may_have_metatable(),
            hidden_class,
            new_array_type: array_type,
            new_hidden_class: None,
        }
    }

    /// Applies `ic` if the write qualifies for the fast path. Returns `false`
    /// with the table untouched otherwise.
    pub fn try_put_by_integer_index_fast(
        &mut self,
        index: i64,
        value: Value,
        ic: &PutByIntegerIndexIcInfo,
    ) -> bool {
        let value_ok = match ic.value_check {
            ValueCheckKind::Int32 => value.is_int32(),
            ValueCheckKind::Int32OrNil => value.is_int32() || value.is_nil(),
            ValueCheckKind::Double => value.is_double(),
            ValueCheckKind::DoubleOrNil => value.is_double() || value.is_nil(),
            ValueCheckKind::NotNil => !value.is_nil(),
            ValueCheckKind::NoCheck => true,
        };
        if !value_ok {
            return false;
        }

        match ic.index_check {
            IndexCheckKind::ForceSlowPath => false,
            IndexCheckKind::Continuous => {
                let Some(b) = self.butterfly.as_mut() else {
                    return false;
                };
                if b.is_in_continuous_range(index) {
                    b.vector_set(index, value);
                    return true;
                }
                let Some(len) = b.continuous_len() else {
                    return false;
                };
                if index == len as i64 + 1 && b.index_fits_in_vector_capacity(index) {
                    b.vector_set(index, value);
                    b.set_continuous_len(Some(len + 1));
                    return true;
                }
                false
            }
            IndexCheckKind::InBound => match self.butterfly.as_mut() {
                Some(b) if b.index_fits_in_vector_capacity(index) => {
                    b.vector_set(index, value);
                    true
                }
                _ => false,
            },
            IndexCheckKind::NoArrayPart => {
                let Some(b) = self.butterfly.as_mut() else {
                    return false;
                };
                if index != ArrayGrowthPolicy::ARRAY_BASE_ORD || b.array_capacity() == 0 {
                    return false;
                }
                debug_assert_eq!(b.continuous_len(), Some(0));
                b.vector_set(index, value);
                b.set_continuous_len(Some(1));
                self.array_type = ic.new_array_type;
                if let Some(hc) = ic.new_hidden_class {
                    self.hidden_class = hc;
                }
                true
            }
        }
    }

    /// Writes `value` to `index`, growing the vector or moving the index into
    /// the sparse map as the growth policy says.
    pub fn put_by_integer_index_slow(&mut self, shapes: &mut Shapes, index: i64, value: Value) {
        if !ArrayGrowthPolicy::is_vector_qualifying_index(index) {
            self.put_index_into_sparse_map(shapes, false, index as f64, value);
            return;
        }

        let array_type = self.array_type;
        let mut new_array_type = array_type;
        if array_type.kind() == ArrayKind::NoButterflyArrayPart {
            if value.is_nil() {
                return;
            }
            if index > ArrayGrowthPolicy::ALWAYS_VECTOR_CUTOFF {
                self.put_index_into_sparse_map(shapes, true, index as f64, value);
                return;
            }
            let fits = self
                .butterfly
                .as_ref()
                .is_some_and(|b| b.index_fits_in_vector_capacity(index));
            if !fits {
                let capacity = ArrayGrowthPolicy::INITIAL_VECTOR_CAPACITY.max(index as u32);
                self.grow_butterfly_array(capacity);
            }
            let b = self.butterfly_mut();
            if index == ArrayGrowthPolicy::ARRAY_BASE_ORD {
                b.set_continuous_len(Some(1));
                new_array_type.set_is_continuous(true);
            } else {
                b.set_continuous_len(None);
                new_array_type.set_is_continuous(false);
            }
            new_array_type.set_kind(ArrayKind::of_value(value));
        } else {
            let Some(b) = self.butterfly.as_mut() else {
                unreachable!("array part without a butterfly");
            };
            let capacity = b.array_capacity();
            if index > capacity as i64 {
                if array_type.sparse_map_contains_vector_index() {
                    self.put_index_into_sparse_map(shapes, true, index as f64, value);
                    return;
                }
                if value.is_nil() {
                    return;
                }
                let new_capacity = if capacity == 0 {
                    ArrayGrowthPolicy::INITIAL_VECTOR_CAPACITY.max(index as u32)
                } else {
                    capacity
                        .saturating_mul(ArrayGrowthPolicy::VECTOR_GROWTH_FACTOR)
                        .min(ArrayGrowthPolicy::UNCONDITIONALLY_SPARSE_MAP_CUTOFF as u32)
                        .max(index as u32)
                };
                let continuous_len = b.continuous_len().filter(|_| array_type.is_continuous());
                let stays_continuous = continuous_len.is_some_and(|len| index == len as i64 + 1);
                let continuous_cutoff = ArrayGrowthPolicy::SPARSE_MAP_UNLESS_CONTINUOUS_CUTOFF;
                let to_sparse_map = if index > continuous_cutoff {
                    !stays_continuous
                } else if index > ArrayGrowthPolicy::ALWAYS_VECTOR_CUTOFF {
                    let non_nil = 1 + b.count_vector_non_nil();
                    new_capacity as u64 > non_nil * ArrayGrowthPolicy::DENSITY_CUTOFF
                } else {
                    false
                };
                if to_sparse_map {
                    self.put_index_into_sparse_map(shapes, true, index as f64, value);
                    return;
                }
                b.grow_array(new_capacity);
                match continuous_len {
                    Some(len) if stays_continuous => b.set_continuous_len(Some(len + 1)),
                    Some(_) => b.set_continuous_len(None),
                    None => {}
                }
                new_array_type.set_is_continuous(stays_continuous);
            } else if array_type.is_continuous() {
                let len = b.continuous_len().unwrap_or(0) as i64;
                let mut is_continuous = true;
                if value.is_nil() {
                    if index > len {
                        return;
                    }
                    if index == len {
                        b.set_continuous_len(Some((len - 1) as u32));
                    } else {
                        is_continuous = false;
                    }
                } else if index > len + 1 {
                    is_continuous = false;
                } else if index == len + 1 {
                    b.set_continuous_len(Some((len + 1) as u32));
                }
                if !is_continuous {
                    b.set_continuous_len(None);
                }
                new_array_type.set_is_continuous(is_continuous);
            }

            if !value.is_nil() {
                new_array_type.set_kind(array_type.kind().merged_with(value));
            }
        }

        self.butterfly_mut().vector_set(index, value);
        if new_array_type != array_type {
            self.update_array_type(shapes, new_array_type);
        }
    }

    /// Stores `index` in the sparse map, allocating it if needed.
    /// `is_vector_qualifying` tells whether `index` is an integer in
    /// `1..=2^27`.
    pub fn put_index_into_sparse_map(
        &mut self,
        shapes: &mut Shapes,
        is_vector_qualifying: bool,
        index: f64,
        value: Value,
    ) {
        let array_type = self.array_type;
        let mut new_array_type = array_type;
        new_array_type.set_has_sparse_map(true);
        if is_vector_qualifying {
            new_array_type.set_sparse_map_contains_vector_index(true);
        }
        new_array_type.set_is_continuous(false);
        new_array_type.set_kind(ArrayKind::Any);

        self.butterfly_mut().get_or_allocate_sparse_map().insert(index, value);
        if new_array_type != array_type {
            tracing::trace!(index, ?new_array_type, "array part moved to sparse map");
            self.update_array_type(shapes, new_array_type);
        }
    }

    /// Raw write of an integer key: fast path first, slow path otherwise.
    pub fn raw_put_by_val_integer_index(&mut self, shapes: &mut Shapes, index: i64, value: Value) {
        let ic = self.prepare_put_by_integer_index(shapes, index, value);
        if !self.try_put_by_integer_index_fast(index, value, &ic) {
            self.put_by_integer_index_slow(shapes, index, value);
        }
    }

    /// Raw write of a floating point key, which must not be NaN.
    pub fn raw_put_by_val_double_index(&mut self, shapes: &mut Shapes, index: f64, value: Value) {
        debug_assert!(!index.is_nan());
        match double_as_int64(index) {
            Some(i) => self.raw_put_by_val_integer_index(shapes, i, value),
            None => self.put_index_into_sparse_map(shapes, false, index, value),
        }
    }

    /// The length operator: a border `n` such that `t[n]` is non-nil and
    /// `t[n + 1]` is nil, or `0` if `t[1]` is nil.
    pub fn length_with_lua_semantics(&self) -> u32 {
        let array_type = self.array_type;
        let Some(b) = self.butterfly.as_ref() else {
            return 0;
        };
        if array_type.is_continuous() {
            return b.continuous_len().unwrap_or(0);
        }
        if array_type.kind() == ArrayKind::NoButterflyArrayPart {
            return 0;
        }

        let capacity = b.array_capacity();
        if capacity == 0 {
            return match b.sparse_map() {
                Some(m) if !m.get_by_val(1.0).is_nil() => length_from_sparse_map(m, 1),
                _ => 0,
            };
        }
        if b.vector_get(1).is_nil() {
            return 0;
        }
        // Doubling probe: v[lb] is non-nil, v[ub] is nil or beyond capacity.
        let (mut lb, mut ub) = (1u32, 2u32);
        while ub <= capacity && !b.vector_get(ub as i64).is_nil() {
            lb = ub;
            ub *= 2;
        }
        if ub <= capacity {
            return vector_border(b, lb, ub);
        }
        if b.vector_get(capacity as i64).is_nil() {
            return vector_border(b, lb, capacity);
        }
        match b.sparse_map() {
            Some(m) => length_from_sparse_map(m, capacity),
            None => capacity,
        }
    }
}

/// Binary search for a border in `[lb, ub)`, given `v[lb]` non-nil and
/// `v[ub]` nil.
fn vector_border(b: &Butterfly, mut lb: u32, mut ub: u32) -> u32 {
    while ub - lb > 1 {
        let mid = lb + (ub - lb) / 2;
        if b.vector_get(mid as i64).is_nil() {
            ub = mid;
        } else {
            lb = mid;
        }
    }
    lb
}

/// Border search continuing in the sparse map from `existent_lb`, an index
/// known to be non-nil.
fn length_from_sparse_map(m: &ArraySparseMap, existent_lb: u32) -> u32 {
    let mut lb = existent_lb;
    let mut ub = existent_lb;
    loop {
        ub = (ub + 1) / 2 * 3;
        if ub >= u32::MAX / 2 {
            // Pathological: scan linearly.
            let mut i = existent_lb;
            while !m.get_by_val((i + 1) as f64).is_nil() {
                i += 1;
            }
            return i;
        }
        if m.get_by_val(ub as f64).is_nil() {
            break;
        }
        lb = ub;
    }
    while ub - lb > 1 {
        let mid = lb + (ub - lb) / 2;
        if m.get_by_val(mid as f64).is_nil() {
            ub = mid;
        } else {
            lb = mid;
        }
    }
    lb
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_table(shapes: &mut Shapes) -> TableObject {
        let s = shapes.initial_structure_for_inline_capacity(0);
        TableObject::create_empty(shapes, s, 0)
    }

    fn get(t: &TableObject, i: i64) -> Value {
        t.get_by_integer_index(i, t.prepare_get_by_integer_index())
    }

    #[test]
    fn double_keys_with_integer_value_are_integers() {
        assert_eq!(double_as_int64(3.0), Some(3));
        assert_eq!(double_as_int64(-0.0), Some(0));
        assert_eq!(double_as_int64(1.5), None);
        assert_eq!(double_as_int64(f64::NAN), None);
        assert_eq!(double_as_int64(f64::INFINITY), None);
    }

    #[test]
    fn sequential_int_writes_stay_continuous() {
        let mut shapes = Shapes::new();
        let mut t = new_table(&mut shapes);
        for i in 1..=20 {
            t.raw_put_by_val_integer_index(&mut shapes, i, Value::Int32(i as i32));
        }
        assert!(t.array_type().is_continuous());
        assert_eq!(t.array_type().kind(), ArrayKind::Int32);
        assert_eq!(t.length_with_lua_semantics(), 20);
        assert_eq!(get(&t, 20), Value::Int32(20));
        assert_eq!(get(&t, 21), Value::Nil);
    }

    #[test]
    fn mixed_value_kinds_widen_to_any() {
        let mut shapes = Shapes::new();
        let mut t = new_table(&mut shapes);
        t.raw_put_by_val_integer_index(&mut shapes, 1, Value::Int32(1));
        t.raw_put_by_val_integer_index(&mut shapes, 2, Value::Double(2.5));
        assert_eq!(t.array_type().kind(), ArrayKind::Any);
        assert!(t.array_type().is_continuous());
        assert_eq!(get(&t, 2), Value::Double(2.5));
    }

    #[test]
    fn far_index_goes_to_sparse_map() {
        let mut shapes = Shapes::new();
        let mut t = new_table(&mut shapes);
        t.raw_put_by_val_integer_index(&mut shapes, 5000, Value::Bool(true));
        let at = t.array_type();
        assert!(at.has_sparse_map());
        assert!(at.sparse_map_contains_vector_index());
        assert_eq!(get(&t, 5000), Value::Bool(true));
        assert_eq!(t.length_with_lua_semantics(), 0);
    }

    #[test]
    fn non_integer_keys_use_sparse_map_only() {
        let mut shapes = Shapes::new();
        let mut t = new_table(&mut shapes);
        t.raw_put_by_val_integer_index(&mut shapes, 1, Value::Int32(1));
        t.raw_put_by_val_double_index(&mut shapes, 0.5, Value::Int32(7));
        let at = t.array_type();
        assert!(at.has_sparse_map());
        assert!(!at.sparse_map_contains_vector_index());
        let ic = t.prepare_get_by_integer_index();
        assert_eq!(ic.kind, GetByIntegerIndexIcKind::VectorStorageXorSparseMap);
        assert_eq!(t.get_by_double_val(0.5, ic), Value::Int32(7));
        assert_eq!(t.get_by_double_val(1.0, ic), Value::Int32(1));
    }

    #[test]
    fn length_after_hole_and_far_write() {
        let mut shapes = Shapes::new();
        let mut t = new_table(&mut shapes);
        for i in 1..=3 {
            t.raw_put_by_val_integer_index(&mut shapes, i, Value::Int32(i as i32));
        }
        assert_eq!(t.length_with_lua_semantics(), 3);
        t.raw_put_by_val_integer_index(&mut shapes, 10, Value::Int32(10));
        assert!(!t.array_type().is_continuous());
        assert_eq!(t.length_with_lua_semantics(), 3);
        t.raw_put_by_val_integer_index(&mut shapes, 3, Value::Nil);
        assert_eq!(t.length_with_lua_semantics(), 2);
    }

    #[test]
    fn first_vector_write_after_sparse_map_gets_initial_capacity() {
        let mut shapes = Shapes::new();
        let mut t = new_table(&mut shapes);
        t.raw_put_by_val_double_index(&mut shapes, 0.5, Value::Int32(7));
        t.raw_put_by_val_integer_index(&mut shapes, 1, Value::Int32(1));
        let capacity = t.butterfly().map_or(0, Butterfly::array_capacity);
        assert_eq!(capacity, ArrayGrowthPolicy::INITIAL_VECTOR_CAPACITY);
        assert_eq!(get(&t, 1), Value::Int32(1));
        let ic = t.prepare_get_by_integer_index();
        assert_eq!(t.get_by_double_val(0.5, ic), Value::Int32(7));
    }

    #[test]
    fn nil_write_to_missing_index_is_a_no_op() {
        let mut shapes = Shapes::new();
        let mut t = new_table(&mut shapes);
        let hc = t.hidden_class();
        t.raw_put_by_val_integer_index(&mut shapes, 3, Value::Nil);
        assert_eq!(t.hidden_class(), hc);
        assert!(t.butterfly().is_none());
    }
}
