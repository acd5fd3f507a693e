mod common;

use common::{is_dictionary, s, set};
use luma_runtime::shape::structure::MetatableState;
use luma_runtime::{HiddenClass, MetamethodKind, PropertyKey, TableId, Value, Vm};

fn structure_metatable(vm: &Vm, t: TableId) -> MetatableState {
    match vm.table(t).hidden_class() {
        HiddenClass::Structure(id) => vm.shapes.structure(id).metatable(),
        HiddenClass::Dictionary(_) => panic!("expected a structure-mode table"),
    }
}

#[test]
fn same_metatable_is_monomorphic() {
    let mut vm = Vm::new();
    let mt = vm.new_table();
    let a = vm.new_table();
    let b = vm.new_table();
    vm.set_metatable(a, Some(mt));
    vm.set_metatable(b, Some(mt));
    assert_eq!(structure_metatable(&vm, a), MetatableState::Monomorphic(mt));
    assert_eq!(vm.table(a).hidden_class(), vm.table(b).hidden_class());
    let res = vm.get_metatable_for_cache(a);
    assert_eq!(res.metatable, Some(mt));
    assert!(res.is_cacheable);
}

#[test]
fn different_metatables_turn_poly() {
    let mut vm = Vm::new();
    let mt1 = vm.new_table();
    let mt2 = vm.new_table();
    let a = vm.new_table();
    let b = vm.new_table();
    let c = vm.new_table();
    vm.set_metatable(a, Some(mt1));
    vm.set_metatable(b, Some(mt2));
    let state = structure_metatable(&vm, b);
    assert!(matches!(state, MetatableState::Poly { .. }));
    assert_eq!(vm.get_metatable(a), Some(mt1));
    assert_eq!(vm.get_metatable(b), Some(mt2));
    assert!(!vm.get_metatable_for_cache(b).is_cacheable);

    // Later tables of the same shape go straight to the poly structure.
    vm.set_metatable(c, Some(mt1));
    assert_eq!(vm.table(c).hidden_class(), vm.table(b).hidden_class());
    assert_eq!(vm.get_metatable(c), Some(mt1));

    // Replacing a poly metatable only rewrites the hidden slot.
    let hc = vm.table(c).hidden_class();
    vm.set_metatable(c, Some(mt2));
    assert_eq!(vm.table(c).hidden_class(), hc);
    assert_eq!(vm.get_metatable(c), Some(mt2));
    vm.set_metatable(c, None);
    assert_eq!(vm.table(c).hidden_class(), hc);
    assert_eq!(vm.get_metatable(c), None);
}

#[test]
fn poly_slot_is_hidden_from_properties_and_iteration() {
    let mut vm = Vm::new();
    let mt1 = vm.new_table();
    let mt2 = vm.new_table();
    let a = vm.new_table();
    let b = vm.new_table();
    vm.set_field(a, "x", Value::Int32(1));
    vm.set_field(b, "x", Value::Int32(2));
    vm.set_metatable(a, Some(mt1));
    vm.set_metatable(b, Some(mt2));
    vm.set_field(b, "y", Value::Int32(3));
    assert_eq!(vm.get_field(b, "x"), Value::Int32(2));
    assert_eq!(vm.get_field(b, "y"), Value::Int32(3));
    let pairs = common::pairs(&vm, b);
    assert_eq!(pairs.len(), 2);
    assert!(pairs.iter().all(|(_, v)| v.as_table().is_none()));
}

#[test]
fn metatable_flag_reaches_inline_caches() {
    let mut vm = Vm::new();
    let mt = vm.new_table();
    let t = vm.new_table();
    vm.set_field(t, "present", Value::Int32(1));
    vm.set_metatable(t, Some(mt));
    assert!(vm.table(t).array_type().may_have_metatable());

    let present = PropertyKey::String(vm.intern("present"));
    let absent = PropertyKey::String(vm.intern("absent"));
    let ic = vm.table(t).prepare_get_by_id(&vm.shapes, absent);
    assert!(ic.may_have_metatable);

    let Vm { shapes, heap, .. } = &mut vm;
    let table = heap.get_mut(t);
    let ic = table.prepare_put_by_id(shapes, present);
    assert!(!table.put_by_id_need_to_check_metatable(ic));
    let ic = table.prepare_put_by_id(shapes, absent);
    assert!(table.put_by_id_need_to_check_metatable(ic));

    let ic = vm.table(t).prepare_get_by_integer_index();
    assert!(ic.may_have_metatable);
}

#[test]
fn metatable_survives_dictionary_transition() {
    let mut vm = Vm::new();
    let mt1 = vm.new_table();
    let mt2 = vm.new_table();
    let mono = vm.new_table();
    let poly_peer = vm.new_table();
    let poly = vm.new_table();
    vm.set_metatable(mono, Some(mt1));
    vm.set_metatable(poly_peer, Some(mt1));
    vm.set_metatable(poly, Some(mt2));
    for i in 0..300 {
        let k = s(&mut vm, &format!("f{i}"));
        set(&mut vm, mono, k, Value::Int32(i));
        set(&mut vm, poly, k, Value::Int32(i));
    }
    for t in [mono, poly] {
        assert!(is_dictionary(&vm, t));
        assert!(vm.table(t).array_type().may_have_metatable());
    }
    assert_eq!(vm.get_metatable(mono), Some(mt1));
    assert_eq!(vm.get_metatable(poly), Some(mt2));
    assert_eq!(common::pairs(&vm, poly).len(), 300);

    vm.set_metatable(poly, None);
    assert_eq!(vm.get_metatable(poly), None);
    assert!(!vm.table(poly).array_type().may_have_metatable());
    assert_eq!(vm.get_field(poly, "f299"), Value::Int32(299));
}

#[test]
fn known_nonexistent_metamethods_follow_keys() {
    let mut vm = Vm::new();
    let mt = vm.new_table();
    for kind in MetamethodKind::ALL {
        assert!(vm.try_quickly_rule_out_metamethod(mt, kind));
    }
    vm.set_field(mt, "__add", Value::Bool(true));
    vm.set_field(mt, "unrelated", Value::Bool(true));
    assert!(!vm.try_quickly_rule_out_metamethod(mt, MetamethodKind::Add));
    assert!(vm.try_quickly_rule_out_metamethod(mt, MetamethodKind::Sub));
    assert_eq!(vm.get_metamethod(mt, MetamethodKind::Add), Value::Nil);

    let t = vm.new_table();
    vm.set_metatable(t, Some(mt));
    assert_eq!(vm.get_metamethod(t, MetamethodKind::Add), Value::Bool(true));
    assert_eq!(vm.get_metamethod(t, MetamethodKind::Index), Value::Nil);
}
