//! Runtime value representation.
//!
//! `Value` is a plain sum type; every variant is `Copy`, heap objects are
//! referenced through handles owned by the VM.

use crate::gc::{StringId, TableId};
use ahash::RandomState;
use hashbrown::HashMap;
use std::fmt;
use std::hash::Hash;

pub type FastHashMap<K, V> = HashMap<K, V, RandomState>;

/// Hasher with fixed seeds so shape layouts are reproducible across runs.
pub fn fast_hasher() -> RandomState {
    RandomState::with_seeds(0, 0, 0, 0)
}

pub fn fast_map_new<K: Eq + Hash, V>() -> FastHashMap<K, V> {
    HashMap::with_hasher(fast_hasher())
}

/// Hash of a numeric array index. `0.0` and `-0.0` hash alike.
#[inline]
pub fn hash_f64(v: f64) -> u64 {
    let bits = if v == 0.0 { 0u64 } else { v.to_bits() };
    fast_hasher().hash_one(bits)
}

/// Smallest power of two `>= v` (`0` maps to `1`).
#[inline]
pub fn round_up_pow2(v: u32) -> u32 {
    v.max(1).next_power_of_two()
}

#[derive(Clone, Copy, Default, PartialEq)]
pub enum Value {
    #[default]
    Nil,
    Bool(bool),
    Int32(i32),
    Double(f64),
    String(StringId),
    Table(TableId),
}

impl Value {
    #[inline]
    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    #[inline]
    pub fn is_int32(&self) -> bool {
        matches!(self, Value::Int32(_))
    }

    #[inline]
    pub fn is_double(&self) -> bool {
        matches!(self, Value::Double(_))
    }

    #[inline]
    pub fn as_table(&self) -> Option<TableId> {
        match *self {
            Value::Table(t) => Some(t),
            _ => None,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int32(i) => write!(f, "{i}"),
            Value::Double(d) => write!(f, "{d:?}"),
            Value::String(s) => write!(f, "string#{}", s.0),
            Value::Table(t) => write!(f, "table#{}", t.0),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int32(i)
    }
}

impl From<f64> for Value {
    fn from(d: f64) -> Self {
        Value::Double(d)
    }
}

/// Reserved keys that never collide with user keys.
///
/// `False` and `True` stand in for boolean keys. `PolyMetatable` names the
/// slot holding a per-object metatable and is never visible to user code.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SpecialKey {
    False,
    True,
    PolyMetatable,
}

/// Key of a named (non-numeric) property.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PropertyKey {
    String(StringId),
    Table(TableId),
    Special(SpecialKey),
}

impl PropertyKey {
    /// Named-property key for a value; numbers and nil have none.
    pub fn from_value(v: Value) -> Option<Self> {
        match v {
            Value::String(s) => Some(PropertyKey::String(s)),
            Value::Table(t) => Some(PropertyKey::Table(t)),
            Value::Bool(false) => Some(PropertyKey::Special(SpecialKey::False)),
            Value::Bool(true) => Some(PropertyKey::Special(SpecialKey::True)),
            _ => None,
        }
    }

    /// The user-visible key, `None` for internal keys.
    pub fn to_value(self) -> Option<Value> {
        match self {
            PropertyKey::String(s) => Some(Value::String(s)),
            PropertyKey::Table(t) => Some(Value::Table(t)),
            PropertyKey::Special(SpecialKey::False) => Some(Value::Bool(false)),
            PropertyKey::Special(SpecialKey::True) => Some(Value::Bool(true)),
            PropertyKey::Special(SpecialKey::PolyMetatable) => None,
        }
    }

    #[inline]
    pub fn hash64(&self) -> u64 {
        fast_hasher().hash_one(self)
    }

    /// Low 32 bits of the hash, used by the structure hash tables.
    #[inline]
    pub fn hash32(&self) -> u32 {
        self.hash64() as u32
    }

    #[inline]
    pub fn is_poly_metatable(&self) -> bool {
        matches!(self, PropertyKey::Special(SpecialKey::PolyMetatable))
    }
}

impl From<StringId> for PropertyKey {
    fn from(s: StringId) -> Self {
        PropertyKey::String(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_up_pow2_small_values() {
        assert_eq!(round_up_pow2(0), 1);
        assert_eq!(round_up_pow2(1), 1);
        assert_eq!(round_up_pow2(3), 4);
        assert_eq!(round_up_pow2(16), 16);
        assert_eq!(round_up_pow2(17), 32);
    }

    #[test]
    fn boolean_keys_map_to_special_keys() {
        let k = PropertyKey::from_value(Value::Bool(true)).unwrap();
        assert_eq!(k, PropertyKey::Special(SpecialKey::True));
        assert_eq!(k.to_value(), Some(Value::Bool(true)));
        assert!(PropertyKey::from_value(Value::Nil).is_none());
        assert!(PropertyKey::from_value(Value::Double(1.0)).is_none());
        assert!(
            PropertyKey::Special(SpecialKey::PolyMetatable)
                .to_value()
                .is_none()
        );
    }

    #[test]
    fn signed_zero_hashes_alike() {
        assert_eq!(hash_f64(0.0), hash_f64(-0.0));
    }
}
