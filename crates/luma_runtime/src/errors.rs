//! Common error message constants used throughout the runtime.

pub mod messages {
    pub const TABLE_INDEX_IS_NIL: &str = "table index is nil";
    pub const TABLE_INDEX_IS_NAN: &str = "table index is NaN";
    pub const INVALID_KEY_TO_NEXT: &str = "invalid key to 'next'";
    pub const TOO_MANY_NAMED_PROPERTIES: &str = "too many named properties in table object";
    pub const UNCACHEABLE_DICTIONARY_UNIMPLEMENTED: &str = "unimplemented: uncacheable dictionary";
}
