mod common;

use common::{is_dictionary, pairs, s, set};
use luma_runtime::errors::messages;
use luma_runtime::{IteratorState, TableId, TableObjectIterator, Value, Vm};

/// Walks `t` with `next`, deleting every key right after it is returned.
fn drain_with_next(vm: &mut Vm, t: TableId) -> Vec<Value> {
    let mut visited = Vec::new();
    let mut key = Value::Nil;
    loop {
        let (k, _) = vm.next(t, key).expect("next should accept a deleted key");
        if k.is_nil() {
            return visited;
        }
        set(vm, t, k, Value::Nil);
        visited.push(k);
        key = k;
    }
}

fn assert_drained_once(vm: &mut Vm, t: TableId, keys: &[Value]) {
    let visited = drain_with_next(vm, t);
    for (i, k) in visited.iter().enumerate() {
        assert!(!visited[..i].contains(k), "{k:?} visited twice");
    }
    for k in keys {
        assert!(visited.contains(k), "{k:?} never visited");
    }
    assert_eq!(visited.len(), keys.len());
    assert!(pairs(vm, t).is_empty());
}

#[test]
fn empty_table_yields_nothing() {
    let mut vm = Vm::new();
    let t = vm.new_table();
    assert_eq!(vm.next(t, Value::Nil), Ok((Value::Nil, Value::Nil)));
}

#[test]
fn visits_named_then_vector_then_sparse() {
    let mut vm = Vm::new();
    let t = vm.new_table();
    let a = s(&mut vm, "a");
    let b = s(&mut vm, "b");
    set(&mut vm, t, a, Value::Int32(1));
    set(&mut vm, t, b, Value::Int32(2));
    set(&mut vm, t, Value::Int32(1), Value::Int32(10));
    set(&mut vm, t, Value::Int32(2), Value::Int32(20));
    set(&mut vm, t, Value::Double(0.5), Value::Int32(30));

    let got = pairs(&vm, t);
    assert_eq!(
        got,
        vec![
            (a, Value::Int32(1)),
            (b, Value::Int32(2)),
            (Value::Double(1.0), Value::Int32(10)),
            (Value::Double(2.0), Value::Int32(20)),
            (Value::Double(0.5), Value::Int32(30)),
        ]
    );
}

#[test]
fn nil_values_are_skipped() {
    let mut vm = Vm::new();
    let t = vm.new_table();
    let a = s(&mut vm, "a");
    let b = s(&mut vm, "b");
    set(&mut vm, t, a, Value::Int32(1));
    set(&mut vm, t, b, Value::Int32(2));
    set(&mut vm, t, a, Value::Nil);
    for i in 1..=4 {
        set(&mut vm, t, Value::Int32(i), Value::Int32(i));
    }
    set(&mut vm, t, Value::Int32(2), Value::Nil);
    let got = pairs(&vm, t);
    assert_eq!(
        got,
        vec![
            (b, Value::Int32(2)),
            (Value::Double(1.0), Value::Int32(1)),
            (Value::Double(3.0), Value::Int32(3)),
            (Value::Double(4.0), Value::Int32(4)),
        ]
    );
}

#[test]
fn next_accepts_int32_keys() {
    let mut vm = Vm::new();
    let t = vm.new_table();
    for i in 1..=3 {
        set(&mut vm, t, Value::Int32(i), Value::Bool(true));
    }
    let second = (Value::Double(2.0), Value::Bool(true));
    assert_eq!(vm.next(t, Value::Int32(1)), Ok(second));
    assert_eq!(vm.next(t, Value::Int32(3)), Ok((Value::Nil, Value::Nil)));
}

#[test]
fn boolean_keys_come_back_as_booleans() {
    let mut vm = Vm::new();
    let t = vm.new_table();
    set(&mut vm, t, Value::Bool(false), Value::Int32(0));
    set(&mut vm, t, Value::Bool(true), Value::Int32(1));
    assert_eq!(
        pairs(&vm, t),
        vec![
            (Value::Bool(false), Value::Int32(0)),
            (Value::Bool(true), Value::Int32(1)),
        ]
    );
}

#[test]
fn invalid_keys_are_rejected() {
    let mut vm = Vm::new();
    let t = vm.new_table();
    set(&mut vm, t, Value::Int32(1), Value::Int32(1));
    let missing = s(&mut vm, "missing");
    let err = Err(messages::INVALID_KEY_TO_NEXT.to_string());
    assert_eq!(vm.next(t, missing), err);
    assert_eq!(vm.next(t, Value::Double(f64::NAN)), err);
    assert_eq!(vm.next(t, Value::Double(7.5)), err);
    assert_eq!(vm.next(t, Value::Int32(100)), err);

    set(&mut vm, t, Value::Double(0.25), Value::Int32(2));
    assert_eq!(vm.next(t, Value::Double(7.5)), err);
}

#[test]
fn dictionary_iteration_covers_every_key() {
    let mut vm = Vm::new();
    let t = vm.new_table();
    for i in 0..400 {
        let k = s(&mut vm, &format!("n{i}"));
        set(&mut vm, t, k, Value::Int32(i));
    }
    set(&mut vm, t, Value::Bool(true), Value::Int32(-1));
    let got = pairs(&vm, t);
    assert_eq!(got.len(), 401);
    let mut seen: Vec<i32> = got
        .iter()
        .map(|(_, v)| match v {
            Value::Int32(i) => *i,
            other => panic!("unexpected value {other:?}"),
        })
        .collect();
    seen.sort_unstable();
    assert_eq!(seen, (-1..400).collect::<Vec<_>>());
    assert!(got.contains(&(Value::Bool(true), Value::Int32(-1))));
}

#[test]
fn iterator_object_walks_states_in_order() {
    let mut vm = Vm::new();
    let t = vm.new_table();
    vm.set_field(t, "x", Value::Int32(1));
    set(&mut vm, t, Value::Int32(1), Value::Int32(2));
    set(&mut vm, t, Value::Int32(-1), Value::Int32(3));

    let table = vm.table(t);
    let mut it = TableObjectIterator::new();
    assert_eq!(it.state(), IteratorState::Uninitialized);
    assert_eq!(it.advance(&vm.shapes, table).1, Value::Int32(1));
    assert!(matches!(it.state(), IteratorState::NamedProperty(_)));
    assert_eq!(it.advance(&vm.shapes, table).1, Value::Int32(2));
    assert!(matches!(it.state(), IteratorState::VectorStorage(_)));
    assert_eq!(it.advance(&vm.shapes, table).1, Value::Int32(3));
    assert!(matches!(it.state(), IteratorState::SparseMap(_)));
    assert_eq!(it.advance(&vm.shapes, table), (Value::Nil, Value::Nil));
    assert_eq!(it.state(), IteratorState::Terminated);
}

#[test]
fn deleting_named_keys_during_next_visits_each_once() {
    let mut vm = Vm::new();
    for count in [3, 300] {
        let t = vm.new_table();
        let mut keys = Vec::new();
        for i in 0..count {
            let k = s(&mut vm, &format!("d{i}"));
            set(&mut vm, t, k, Value::Int32(i));
            keys.push(k);
        }
        assert_eq!(is_dictionary(&vm, t), count == 300);
        assert_drained_once(&mut vm, t, &keys);
    }
}

#[test]
fn deleting_vector_keys_during_next_visits_each_once() {
    let mut vm = Vm::new();
    let t = vm.new_table();
    let mut keys = Vec::new();
    for i in 1..=10 {
        set(&mut vm, t, Value::Int32(i), Value::Int32(i));
        keys.push(Value::Double(i as f64));
    }
    assert_drained_once(&mut vm, t, &keys);
}

#[test]
fn deleting_sparse_keys_during_next_visits_each_once() {
    let mut vm = Vm::new();
    let t = vm.new_table();
    let mut keys: Vec<Value> = (0..40).map(|i| Value::Double(i as f64 + 0.5)).collect();
    keys.push(Value::Double(5000.0));
    for k in &keys {
        set(&mut vm, t, *k, Value::Bool(true));
    }
    assert!(vm.table(t).array_type().has_sparse_map());
    assert_drained_once(&mut vm, t, &keys);
}

#[test]
fn deleting_mixed_keys_during_next_visits_each_once() {
    let mut vm = Vm::new();
    let t = vm.new_table();
    let mut keys = Vec::new();
    for i in 0..5 {
        let k = s(&mut vm, &format!("m{i}"));
        set(&mut vm, t, k, Value::Int32(i));
        keys.push(k);
    }
    for i in 1..=5 {
        set(&mut vm, t, Value::Int32(i), Value::Int32(i));
        keys.push(Value::Double(i as f64));
    }
    for d in [-2.0, 7.25, 5000.0] {
        set(&mut vm, t, Value::Double(d), Value::Int32(0));
        keys.push(Value::Double(d));
    }
    assert_drained_once(&mut vm, t, &keys);
}
