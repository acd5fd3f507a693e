//! String interning. Equal strings share one `StringId`, so string keys
//! compare by handle.

use ahash::RandomState;
use indexmap::IndexSet;
use luma_core::{StringId, fast_hasher};

pub struct StringTable {
    strings: IndexSet<Box<str>, RandomState>,
}

impl StringTable {
    pub fn new() -> Self {
        Self {
            strings: IndexSet::with_hasher(fast_hasher()),
        }
    }

    pub fn intern(&mut self, s: &str) -> StringId {
        if let Some(idx) = self.strings.get_index_of(s) {
            return StringId(idx as u32);
        }
        let (idx, _) = self.strings.insert_full(s.into());
        StringId(idx as u32)
    }

    pub fn resolve(&self, id: StringId) -> Option<&str> {
        self.strings.get_index(id.index()).map(|s| &**s)
    }
}
