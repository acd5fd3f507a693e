//! Named property access: string, table and boolean keys.

use super::TableObject;
use crate::errors::messages;
use crate::runtime::cache::{GetByIdIcInfo, GetByIdIcKind, PutByIdIcInfo, PutByIdIcKind};
use crate::shape::structure::{AddPropertyResult, MetatableState};
use crate::shape::{HiddenClass, Shapes, StructureId};
use luma_core::{PropertyKey, Value};

#[inline]
fn storage_kind(slot: u32, inline_capacity: u8) -> (bool, u32) {
    let inline_capacity = inline_capacity as u32;
    if slot < inline_capacity {
        (true, slot)
    } else {
        (false, slot - inline_capacity)
    }
}

impl TableObject {
    pub fn prepare_get_by_id(&self, shapes: &Shapes, key: PropertyKey) -> GetByIdIcInfo {
        let hidden_class = self.hidden_class;
        let (slot, inline_capacity, may_have_metatable, absent) = match hidden_class {
            HiddenClass::Structure(id) => {
                let s = shapes.structure(id);
                (
                    s.get_slot_ordinal(&shapes.structures, &key).map(u32::from),
                    s.inline_capacity(),
                    s.metatable() != MetatableState::None,
                    GetByIdIcKind::MustBeNil,
                )
            }
            HiddenClass::Dictionary(id) => {
                let d = shapes.dictionary(id);
                (
                    d.get_slot(&key),
                    d.inline_capacity(),
                    d.metatable().is_some(),
                    GetByIdIcKind::MustBeNilButUncacheable,
                )
            }
        };
        let kind = match slot {
            None => absent,
            Some(slot) => match storage_kind(slot, inline_capacity) {
                (true, i) => GetByIdIcKind::InlinedStorage(i),
                (false, i) => GetByIdIcKind::OutlinedStorage(i),
            },
        };
        GetByIdIcInfo {
            kind,
            may_have_metatable,
            hidden_class,
        }
    }

    pub fn get_by_id(&self, ic: GetByIdIcInfo) -> Value {
        debug_assert_eq!(ic.hidden_class, self.hidden_class);
        match ic.kind {
            GetByIdIcKind::InlinedStorage(i) => self.inline_storage[i as usize],
            GetByIdIcKind::OutlinedStorage(i) => match &self.butterfly {
                Some(b) => b.named(i as usize),
                None => Value::Nil,
            },
            GetByIdIcKind::MustBeNil | GetByIdIcKind::MustBeNilButUncacheable => Value::Nil,
            GetByIdIcKind::UncacheableDictionary => {
                panic!("{}", messages::UNCACHEABLE_DICTIONARY_UNIMPLEMENTED)
            }
        }
    }

    /// Classifies a put of `key`. For a new key this already creates the
    /// structure the table moves to, or, for a dictionary, inserts the key
    /// and grows the named storage.
    pub fn prepare_put_by_id(&mut self, shapes: &mut Shapes, key: PropertyKey) -> PutByIdIcInfo {
        let hidden_class = self.hidden_class;
        match hidden_class {
            HiddenClass::Structure(id) => {
                let s = shapes.structure(id);
                let inline_capacity = s.inline_capacity();
                let may_have_metatable = s.metatable() != MetatableState::None;
                if let Some(slot) = s.get_slot_ordinal(&shapes.structures, &key) {
                    return PutByIdIcInfo {
                        kind: put_kind(slot as u32, inline_capacity),
                        property_exists: true,
                        should_grow_butterfly: false,
                        may_have_metatable,
                        is_inline_cacheable: true,
                        hidden_class,
                        new_structure: None,
                    };
                }
                match shapes.add_non_existent_property(id, key) {
                    AddPropertyResult::Added {
                        new_structure,
                        slot,
                        should_grow_butterfly,
                    } => PutByIdIcInfo {
                        kind: put_kind(slot as u32, inline_capacity),
                        property_exists: false,
                        should_grow_butterfly,
                        may_have_metatable,
                        is_inline_cacheable: true,
                        hidden_class,
                        new_structure: Some(new_structure),
                    },
                    AddPropertyResult::ShouldTransitToDictionaryMode => PutByIdIcInfo {
                        kind: PutByIdIcKind::TransitionedToDictionaryMode,
                        property_exists: false,
                        should_grow_butterfly: false,
                        may_have_metatable,
                        is_inline_cacheable: false,
                        hidden_class,
                        new_structure: None,
                    },
                }
            }
            HiddenClass::Dictionary(id) => {
                let d = shapes.dictionary_mut(id);
                let res = d.prepare_put(key);
                let inline_capacity = d.inline_capacity();
                let may_have_metatable = d.metatable().is_some();
                if let Some(new_capacity) = res.grow_butterfly_to {
                    self.grow_butterfly_named(new_capacity);
                }
                PutByIdIcInfo {
                    kind: put_kind(res.slot, inline_capacity),
                    property_exists: true,
                    should_grow_butterfly: false,
                    may_have_metatable,
                    is_inline_cacheable: true,
                    hidden_class,
                    new_structure: None,
                }
            }
        }
    }

    pub fn put_by_id(
        &mut self,
        shapes: &mut Shapes,
        key: PropertyKey,
        value: Value,
        ic: PutByIdIcInfo,
    ) {
        debug_assert_eq!(ic.hidden_class, self.hidden_class);
        let kind = match ic.kind {
            PutByIdIcKind::TransitionedToDictionaryMode => {
                let HiddenClass::Structure(id) = self.hidden_class else {
                    unreachable!("dictionary tables never transition to dictionary mode");
                };
                self.put_by_id_transition_to_dictionary(shapes, id, key, value);
                return;
            }
            kind => kind,
        };
        if !ic.property_exists {
            let Some(new_structure) = ic.new_structure else {
                panic!("property addition without a target structure");
            };
            if ic.should_grow_butterfly {
                let capacity = shapes.structure(new_structure).butterfly_capacity() as u32;
                self.grow_butterfly_named(capacity);
            }
            self.hidden_class = HiddenClass::Structure(new_structure);
        }
        match kind {
            PutByIdIcKind::InlinedStorage(i) => self.inline_storage[i as usize] = value,
            PutByIdIcKind::OutlinedStorage(i) => self.butterfly_mut().set_named(i as usize, value),
            PutByIdIcKind::TransitionedToDictionaryMode => unreachable!(),
        }
    }

    fn put_by_id_transition_to_dictionary(
        &mut self,
        shapes: &mut Shapes,
        structure: StructureId,
        key: PropertyKey,
        value: Value,
    ) {
        let metatable = self.get_metatable(shapes).metatable;
        let res = shapes.create_dictionary_from_structure(structure, key, metatable);
        let dict = shapes.dictionary(res.dictionary);
        if res.should_grow_butterfly {
            self.grow_butterfly_named(dict.butterfly_capacity());
        }
        let may_have_metatable = dict.metatable().is_some();
        self.hidden_class = HiddenClass::Dictionary(res.dictionary);
        self.set_value_for_slot(res.slot, value);
        self.array_type.set_may_have_metatable(may_have_metatable);
    }

    /// Whether the put must go through `__newindex`: the table may have a
    /// metatable and the old value is nil.
    pub fn put_by_id_need_to_check_metatable(&self, ic: PutByIdIcInfo) -> bool {
        if !ic.may_have_metatable {
            return false;
        }
        if !ic.property_exists {
            return true;
        }
        match ic.kind {
            PutByIdIcKind::InlinedStorage(i) => self.inline_storage[i as usize].is_nil(),
            PutByIdIcKind::OutlinedStorage(i) => match &self.butterfly {
                Some(b) => b.named(i as usize).is_nil(),
                None => true,
            },
            PutByIdIcKind::TransitionedToDictionaryMode => true,
        }
    }

    /// Reads `key` without consulting any metatable.
    pub fn raw_get_by_id(&self, shapes: &Shapes, key: PropertyKey) -> Value {
        let ic = self.prepare_get_by_id(shapes, key);
        self.get_by_id(ic)
    }

    /// Writes `key` without consulting any metatable.
    pub fn raw_put_by_id(&mut self, shapes: &mut Shapes, key: PropertyKey, value: Value) {
        let ic = self.prepare_put_by_id(shapes, key);
        self.put_by_id(shapes, key, value, ic);
    }
}

#[inline]
fn put_kind(slot: u32, inline_capacity: u8) -> PutByIdIcKind {
    match storage_kind(slot, inline_capacity) {
        (true, i) => PutByIdIcKind::InlinedStorage(i),
        (false, i) => PutByIdIcKind::OutlinedStorage(i),
    }
}
