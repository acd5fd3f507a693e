//! Metatable storage.
//!
//! A structure-mode table either shares its metatable with every table of
//! its structure (monomorphic) or keeps it in a hidden slot (poly). A
//! dictionary-mode table keeps it in the dictionary.

use super::TableObject;
use crate::shape::structure::MetatableState;
use crate::shape::{HiddenClass, MetamethodKind, Shapes};
use luma_core::{TableId, Value};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GetMetatableResult {
    pub metatable: Option<TableId>,
    /// The answer is implied by the hidden class alone.
    pub is_cacheable: bool,
}

impl TableObject {
    pub fn get_metatable(&self, shapes: &Shapes) -> GetMetatableResult {
        match self.hidden_class {
            HiddenClass::Structure(id) => match shapes.structure(id).metatable() {
                MetatableState::None => GetMetatableResult {
                    metatable: None,
                    is_cacheable: true,
                },
                MetatableState::Monomorphic(mt) => GetMetatableResult {
                    metatable: Some(mt),
                    is_cacheable: true,
                },
                MetatableState::Poly { slot } => GetMetatableResult {
                    metatable: self.poly_metatable(slot),
                    is_cacheable: false,
                },
            },
            HiddenClass::Dictionary(id) => GetMetatableResult {
                metatable: shapes.dictionary(id).metatable(),
                is_cacheable: true,
            },
        }
    }

    pub fn set_metatable(&mut self, shapes: &mut Shapes, metatable: TableId) {
        match self.hidden_class {
            HiddenClass::Structure(id) => {
                let res = shapes.set_metatable(id, metatable);
                let s = shapes.structure(res.new_structure);
                if res.should_insert_metatable {
                    if res.should_grow_butterfly {
                        self.grow_butterfly_named(s.butterfly_capacity() as u32);
                    }
                    self.set_value_for_slot(res.slot as u32, Value::Table(metatable));
                }
                self.hidden_class = HiddenClass::Structure(res.new_structure);
                self.array_type = s.array_type();
            }
            HiddenClass::Dictionary(id) => {
                if shapes.dictionary(id).metatable() == Some(metatable) {
                    return;
                }
                let new_id = shapes.relocate_dictionary(id);
                shapes.dictionary_mut(new_id).set_metatable(Some(metatable));
                self.hidden_class = HiddenClass::Dictionary(new_id);
                self.array_type.set_may_have_metatable(true);
            }
        }
    }

    pub fn remove_metatable(&mut self, shapes: &mut Shapes) {
        match self.hidden_class {
            HiddenClass::Structure(id) => {
                let res = shapes.remove_metatable(id);
                if res.should_insert_metatable {
                    self.set_value_for_slot(res.slot as u32, Value::Nil);
                }
                self.hidden_class = HiddenClass::Structure(res.new_structure);
                self.array_type = shapes.structure(res.new_structure).array_type();
            }
            HiddenClass::Dictionary(id) => {
                if shapes.dictionary(id).metatable().is_none() {
                    return;
                }
                let new_id = shapes.relocate_dictionary(id);
                shapes.dictionary_mut(new_id).set_metatable(None);
                self.hidden_class = HiddenClass::Dictionary(new_id);
                self.array_type.set_may_have_metatable(false);
            }
        }
    }

    /// `true` if the table's metatable certainly lacks `kind`. `false` means
    /// the metatable has to be inspected.
    pub fn try_quickly_rule_out_metamethod(&self, shapes: &Shapes, kind: MetamethodKind) -> bool {
        match self.hidden_class {
            HiddenClass::Structure(id) => {
                shapes.structure(id).known_nonexistent_metamethods() & kind.bit() != 0
            }
            HiddenClass::Dictionary(_) => false,
        }
    }
}
