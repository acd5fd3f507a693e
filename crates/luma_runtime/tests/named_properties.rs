mod common;

use common::{is_dictionary, s, set};
use luma_runtime::runtime::{GetByIdIcKind, PutByIdIcKind};
use luma_runtime::shape::structure::MAX_NUM_SLOTS;
use luma_runtime::{HiddenClass, PropertyKey, TableId, Value, Vm, VmConfig};

#[test]
fn get_and_put_by_id_round_trip() {
    let mut vm = Vm::new();
    let t = vm.new_table();
    let x = s(&mut vm, "x");
    let y = s(&mut vm, "y");
    set(&mut vm, t, x, Value::Int32(1));
    set(&mut vm, t, y, Value::Double(2.5));
    assert_eq!(vm.raw_get(t, x), Value::Int32(1));
    assert_eq!(vm.raw_get(t, y), Value::Double(2.5));
    let z = s(&mut vm, "z");
    assert_eq!(vm.raw_get(t, z), Value::Nil);
}

#[test]
fn tables_built_alike_share_structure() {
    let mut vm = Vm::new();
    let a = vm.new_table();
    let b = vm.new_table();
    for name in ["p", "q", "r"] {
        vm.set_field(a, name, Value::Bool(true));
        vm.set_field(b, name, Value::Bool(false));
    }
    assert_eq!(vm.table(a).hidden_class(), vm.table(b).hidden_class());

    let c = vm.new_table();
    for name in ["q", "p", "r"] {
        vm.set_field(c, name, Value::Bool(true));
    }
    assert_ne!(vm.table(a).hidden_class(), vm.table(c).hidden_class());
}

#[test]
fn boolean_and_table_keys_are_named_properties() {
    let mut vm = Vm::new();
    let t = vm.new_table();
    let k = vm.new_table();
    set(&mut vm, t, Value::Bool(true), Value::Int32(1));
    set(&mut vm, t, Value::Bool(false), Value::Int32(0));
    set(&mut vm, t, Value::Table(k), Value::Int32(7));
    assert_eq!(vm.raw_get(t, Value::Bool(true)), Value::Int32(1));
    assert_eq!(vm.raw_get(t, Value::Bool(false)), Value::Int32(0));
    assert_eq!(vm.raw_get(t, Value::Table(k)), Value::Int32(7));
    assert!(vm.table(t).butterfly().is_none());
}

#[test]
fn inline_cache_replays_on_same_structure() {
    let mut vm = Vm::new();
    let a = vm.new_table();
    let b = vm.new_table();
    vm.set_field(a, "v", Value::Int32(1));
    vm.set_field(b, "v", Value::Int32(2));
    let key = PropertyKey::String(vm.intern("v"));

    let ic = vm.table(a).prepare_get_by_id(&vm.shapes, key);
    assert_eq!(ic.kind, GetByIdIcKind::InlinedStorage(0));
    assert!(ic.is_cacheable());
    // The record computed on `a` is valid for `b`, which has the same hidden class.
    assert_eq!(ic.hidden_class, vm.table(b).hidden_class());
    assert_eq!(vm.table(b).get_by_id(ic), Value::Int32(2));
}

#[test]
fn put_by_id_transition_is_reported() {
    let mut vm = Vm::new();
    let t = vm.new_table();
    let key = PropertyKey::String(vm.intern("fresh"));
    let Vm { shapes, heap, .. } = &mut vm;
    let table = heap.get_mut(t);
    let ic = table.prepare_put_by_id(shapes, key);
    assert!(!ic.property_exists);
    assert!(ic.new_structure.is_some());
    assert_eq!(ic.kind, PutByIdIcKind::InlinedStorage(0));
    table.put_by_id(shapes, key, Value::Int32(3), ic);
    let new_structure = ic.new_structure.unwrap();
    assert_eq!(table.hidden_class(), HiddenClass::Structure(new_structure));
    assert_eq!(table.raw_get_by_id(shapes, key), Value::Int32(3));
}

fn fill(vm: &mut Vm, t: TableId, n: usize) -> Vec<Value> {
    (0..n)
        .map(|i| {
            let k = s(vm, &format!("k{i}"));
            set(vm, t, k, Value::Int32(i as i32));
            k
        })
        .collect()
}

#[test]
fn too_many_properties_switch_to_dictionary() {
    let mut vm = Vm::new();
    let t = vm.new_table();
    let a = s(&mut vm, "a");
    set(&mut vm, t, a, Value::Int32(-1));
    let mut keys = Vec::new();
    for i in 0..300 {
        let k = s(&mut vm, &format!("k{i}"));
        set(&mut vm, t, k, Value::Int32(i));
        keys.push(k);
        let count = i as usize + 2;
        let over_limit = count > MAX_NUM_SLOTS as usize;
        let dict = is_dictionary(&vm, t);
        assert_eq!(dict, over_limit, "after {count} properties");
    }
    assert_eq!(vm.raw_get(t, a), Value::Int32(-1));
    for (i, k) in keys.iter().enumerate() {
        assert_eq!(vm.raw_get(t, *k), Value::Int32(i as i32));
    }

    let key = PropertyKey::String(vm.intern("missing"));
    let ic = vm.table(t).prepare_get_by_id(&vm.shapes, key);
    assert_eq!(ic.kind, GetByIdIcKind::MustBeNilButUncacheable);
    assert!(!ic.is_cacheable());
}

#[test]
fn dictionary_overwrite_and_delete() {
    let mut vm = Vm::new();
    let t = vm.new_table();
    let keys = fill(&mut vm, t, 260);
    set(&mut vm, t, keys[3], Value::Bool(true));
    set(&mut vm, t, keys[200], Value::Nil);
    assert_eq!(vm.raw_get(t, keys[3]), Value::Bool(true));
    assert_eq!(vm.raw_get(t, keys[200]), Value::Nil);
    assert_eq!(vm.raw_get(t, keys[259]), Value::Int32(259));
}

#[test]
fn global_object_holds_many_names() {
    let mut vm = Vm::with_config(VmConfig {
        global_anticipated_slots: 4,
        ..VmConfig::default()
    });
    let g = vm.global_object();
    assert!(is_dictionary(&vm, g));
    let keys = fill(&mut vm, g, 1000);
    for (i, k) in keys.iter().enumerate() {
        assert_eq!(vm.raw_get(g, *k), Value::Int32(i as i32));
    }
}

#[test]
fn shallow_clone_is_independent() {
    let mut vm = Vm::new();
    let t = vm.new_table();
    vm.set_field(t, "x", Value::Int32(1));
    set(&mut vm, t, Value::Int32(1), Value::Int32(10));
    let c = vm.shallow_clone(t);
    assert_eq!(vm.table(c).hidden_class(), vm.table(t).hidden_class());
    vm.set_field(c, "x", Value::Int32(2));
    set(&mut vm, c, Value::Int32(1), Value::Int32(20));
    assert_eq!(vm.get_field(t, "x"), Value::Int32(1));
    assert_eq!(vm.raw_get(t, Value::Int32(1)), Value::Int32(10));
    assert_eq!(vm.get_field(c, "x"), Value::Int32(2));

    let d = vm.new_table();
    let keys = fill(&mut vm, d, 300);
    let dc = vm.shallow_clone(d);
    assert_ne!(vm.table(dc).hidden_class(), vm.table(d).hidden_class());
    set(&mut vm, dc, keys[0], Value::Nil);
    vm.set_field(dc, "only_in_clone", Value::Bool(true));
    assert_eq!(vm.raw_get(d, keys[0]), Value::Int32(0));
    assert_eq!(vm.get_field(d, "only_in_clone"), Value::Nil);
    assert_eq!(vm.raw_get(dc, keys[299]), Value::Int32(299));
}
