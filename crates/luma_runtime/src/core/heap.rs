//! Table storage.

use crate::table::TableObject;
use luma_core::TableId;

/// Arena of table objects. Tables are never freed, so a `TableId` stays
/// valid for the lifetime of the heap.
pub struct Heap {
    pub(crate) tables: Vec<TableObject>,
}

impl Heap {
    pub fn new() -> Self {
        Self {
            tables: Vec::with_capacity(1024),
        }
    }

    /// Allocate a table on the heap.
    pub fn alloc(&mut self, table: TableObject) -> TableId {
        let id = TableId(self.tables.len() as u32);
        self.tables.push(table);
        id
    }

    #[inline]
    pub fn get(&self, id: TableId) -> &TableObject {
        &self.tables[id.index()]
    }

    #[inline]
    pub fn get_mut(&mut self, id: TableId) -> &mut TableObject {
        &mut self.tables[id.index()]
    }
}

impl Default for Heap {
    fn default() -> Self {
        Self::new()
    }
}
