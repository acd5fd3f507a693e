#![allow(dead_code)]

use luma_runtime::{HiddenClass, TableId, Value, Vm};

pub fn s(vm: &mut Vm, name: &str) -> Value {
    Value::String(vm.intern(name))
}

pub fn set(vm: &mut Vm, t: TableId, key: Value, value: Value) {
    vm.raw_set(t, key, value).unwrap();
}

pub fn is_dictionary(vm: &Vm, t: TableId) -> bool {
    matches!(vm.table(t).hidden_class(), HiddenClass::Dictionary(_))
}

pub fn int_array(vm: &mut Vm, values: &[i32]) -> TableId {
    let t = vm.new_table();
    for (i, v) in values.iter().enumerate() {
        set(vm, t, Value::Int32(i as i32 + 1), Value::Int32(*v));
    }
    t
}

/// Every `(key, value)` pair of `t`, walked with `next`.
pub fn pairs(vm: &Vm, t: TableId) -> Vec<(Value, Value)> {
    let mut out = Vec::new();
    let mut key = Value::Nil;
    loop {
        let (k, v) = vm.next(t, key).expect("next should accept the previous key");
        if k.is_nil() {
            return out;
        }
        assert!(!v.is_nil(), "iteration yielded a nil value for {k:?}");
        out.push((k, v));
        key = k;
    }
}

/// Asserts that `#t` is a border: `t[n]` non-nil (or `n == 0`) and `t[n + 1]` nil.
pub fn assert_border(vm: &Vm, t: TableId) -> u32 {
    let n = vm.length(t);
    let at = |i: u32| vm.raw_get(t, Value::Int32(i as i32));
    if n > 0 {
        assert!(!at(n).is_nil(), "t[{n}] is nil");
    }
    let next = n + 1;
    assert!(at(next).is_nil(), "t[{next}] is not nil");
    n
}
