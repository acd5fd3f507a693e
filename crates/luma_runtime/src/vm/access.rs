//! Raw table access by arbitrary key.

use super::Vm;
use crate::errors::messages;
use crate::shape::MetamethodKind;
use crate::table::GetMetatableResult;
use luma_core::{PropertyKey, TableId, Value};

impl Vm {
    /// `rawget`: reads `key` without consulting metatables.
    pub fn raw_get(&self, t: TableId, key: Value) -> Value {
        let table = self.heap.get(t);
        let ic = table.prepare_get_by_integer_index();
        match key {
            Value::Nil => Value::Nil,
            Value::Int32(i) => table.get_by_integer_index(i as i64, ic),
            Value::Double(d) if d.is_nan() => Value::Nil,
            Value::Double(d) => table.get_by_double_val(d, ic),
            Value::Bool(_) | Value::String(_) | Value::Table(_) => {
                let Some(pkey) = PropertyKey::from_value(key) else {
                    return Value::Nil;
                };
                table.raw_get_by_id(&self.shapes, pkey)
            }
        }
    }

    /// `rawset`: writes `key` without consulting metatables. Fails for nil
    /// and NaN keys.
    pub fn raw_set(&mut self, t: TableId, key: Value, value: Value) -> Result<(), String> {
        let table = self.heap.get_mut(t);
        match key {
            Value::Nil => return Err(messages::TABLE_INDEX_IS_NIL.to_string()),
            Value::Double(d) if d.is_nan() => {
                return Err(messages::TABLE_INDEX_IS_NAN.to_string());
            }
            Value::Int32(i) => {
                table.raw_put_by_val_integer_index(&mut self.shapes, i as i64, value);
            }
            Value::Double(d) => table.raw_put_by_val_double_index(&mut self.shapes, d, value),
            Value::Bool(_) | Value::String(_) | Value::Table(_) => {
                if let Some(pkey) = PropertyKey::from_value(key) {
                    table.raw_put_by_id(&mut self.shapes, pkey, value);
                }
            }
        }
        Ok(())
    }

    /// Reads the string-keyed field `name`.
    pub fn get_field(&mut self, t: TableId, name: &str) -> Value {
        let key = Value::String(self.intern(name));
        self.raw_get(t, key)
    }

    pub fn set_field(&mut self, t: TableId, name: &str, value: Value) {
        let key = PropertyKey::String(self.intern(name));
        self.heap.get_mut(t).raw_put_by_id(&mut self.shapes, key, value);
    }

    /// `next`: the pair following `key`, `(nil, nil)` at the end.
    pub fn next(&self, t: TableId, key: Value) -> Result<(Value, Value), String> {
        self.heap
            .get(t)
            .get_next_from_key(&self.shapes, key)
            .ok_or_else(|| messages::INVALID_KEY_TO_NEXT.to_string())
    }

    /// The `#` operator on a table.
    pub fn length(&self, t: TableId) -> u32 {
        self.heap.get(t).length_with_lua_semantics()
    }

    pub fn get_metatable(&self, t: TableId) -> Option<TableId> {
        self.get_metatable_for_cache(t).metatable
    }

    pub fn get_metatable_for_cache(&self, t: TableId) -> GetMetatableResult {
        self.heap.get(t).get_metatable(&self.shapes)
    }

    /// `setmetatable`; `None` removes the metatable.
    pub fn set_metatable(&mut self, t: TableId, metatable: Option<TableId>) {
        let table = self.heap.get_mut(t);
        match metatable {
            Some(mt) => table.set_metatable(&mut self.shapes, mt),
            None => table.remove_metatable(&mut self.shapes),
        }
    }

    /// Whether `mt`, used as a metatable, is known to lack `kind` without
    /// looking up the key. `false` is always a safe answer.
    pub fn try_quickly_rule_out_metamethod(&self, mt: TableId, kind: MetamethodKind) -> bool {
        self.heap.get(mt).try_quickly_rule_out_metamethod(&self.shapes, kind)
    }

    /// The `kind` metamethod of `t`, or nil.
    pub fn get_metamethod(&mut self, t: TableId, kind: MetamethodKind) -> Value {
        let Some(mt) = self.get_metatable(t) else {
            return Value::Nil;
        };
        if self.try_quickly_rule_out_metamethod(mt, kind) {
            return Value::Nil;
        }
        self.get_field(mt, kind.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nil_and_nan_keys_are_rejected() {
        let mut vm = Vm::new();
        let t = vm.new_table();
        assert_eq!(
            vm.raw_set(t, Value::Nil, Value::Int32(1)),
            Err(messages::TABLE_INDEX_IS_NIL.to_string())
        );
        assert_eq!(
            vm.raw_set(t, Value::Double(f64::NAN), Value::Int32(1)),
            Err(messages::TABLE_INDEX_IS_NAN.to_string())
        );
        assert_eq!(vm.raw_get(t, Value::Nil), Value::Nil);
    }

    #[test]
    fn int32_and_double_keys_alias() {
        let mut vm = Vm::new();
        let t = vm.new_table();
        vm.raw_set(t, Value::Int32(1), Value::Bool(true)).unwrap();
        assert_eq!(vm.raw_get(t, Value::Double(1.0)), Value::Bool(true));
        vm.raw_set(t, Value::Double(2.0), Value::Bool(false)).unwrap();
        assert_eq!(vm.raw_get(t, Value::Int32(2)), Value::Bool(false));
        assert_eq!(vm.length(t), 2);
    }

    #[test]
    fn metamethod_lookup_goes_through_metatable() {
        let mut vm = Vm::new();
        let t = vm.new_table();
        let mt = vm.new_table();
        assert_eq!(vm.get_metamethod(t, MetamethodKind::Index), Value::Nil);
        vm.set_metatable(t, Some(mt));
        let index = MetamethodKind::Index;
        assert!(vm.try_quickly_rule_out_metamethod(mt, index));
        vm.set_field(mt, "__index", Value::Int32(5));
        assert!(!vm.try_quickly_rule_out_metamethod(mt, index));
        assert!(vm.try_quickly_rule_out_metamethod(mt, MetamethodKind::Call));
        assert_eq!(vm.get_metamethod(t, MetamethodKind::Index), Value::Int32(5));
        vm.set_metatable(t, None);
        assert_eq!(vm.get_metatable(t), None);
    }
}
