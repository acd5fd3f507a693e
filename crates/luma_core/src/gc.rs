//! Handles to heap-allocated objects.
//!
//! Objects are never moved or freed while the owning VM is alive, so a handle
//! stays valid for the VM's lifetime.

/// Handle to an interned string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StringId(pub u32);

/// Handle to a table object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableId(pub u32);

impl StringId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl TableId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}
