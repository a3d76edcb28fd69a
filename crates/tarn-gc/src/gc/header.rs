//! Block header
//!
//! Every heap block carries a header with the metadata the collector needs:
//! which variant the payload is, whether the current mark phase reached it,
//! whether the runtime pinned it, and how many bytes it was accounted as.

use std::fmt;

/// Discriminant for the heap variants a block can hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockKind {
    /// String or symbol bytes
    String,
    /// Mutable array of values
    Array,
    /// Mutable hash table
    Table,
    /// Immutable key/value struct
    Struct,
    /// Immutable tuple
    Tuple,
    /// Mutable byte buffer
    Buffer,
    /// Closure
    Function,
    /// Closure environment
    FuncEnv,
    /// Compiled function template
    FuncDef,
    /// Execution context
    Fiber,
    /// Host payload
    Userdata,
}

impl BlockKind {
    /// Lower-case name of the kind
    pub fn name(self) -> &'static str {
        match self {
            BlockKind::String => "string",
            BlockKind::Array => "array",
            BlockKind::Table => "table",
            BlockKind::Struct => "struct",
            BlockKind::Tuple => "tuple",
            BlockKind::Buffer => "buffer",
            BlockKind::Function => "function",
            BlockKind::FuncEnv => "funcenv",
            BlockKind::FuncDef => "funcdef",
            BlockKind::Fiber => "fiber",
            BlockKind::Userdata => "userdata",
        }
    }

    /// Kinds whose content is deduplicated by the intern cache
    #[inline]
    pub fn is_interned(self) -> bool {
        matches!(self, BlockKind::String | BlockKind::Struct | BlockKind::Tuple)
    }
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// GC header stored alongside each block
#[derive(Debug, Clone, Copy)]
pub struct BlockHeader {
    /// Variant of the payload
    kind: BlockKind,

    /// Mark bit (true = reached in the current mark phase)
    reachable: bool,

    /// Sticky keep-alive bit, independent of marking
    pinned: bool,

    /// Bytes accounted to this block at allocation
    size: usize,
}

impl BlockHeader {
    /// Create a header with both flags cleared
    pub fn new(kind: BlockKind, size: usize) -> Self {
        Self {
            kind,
            reachable: false,
            pinned: false,
            size,
        }
    }

    /// Get the block kind
    #[inline]
    pub fn kind(&self) -> BlockKind {
        self.kind
    }

    /// Check if the block was reached this cycle
    #[inline]
    pub fn is_reachable(&self) -> bool {
        self.reachable
    }

    /// Mark the block as reachable
    #[inline]
    pub fn mark(&mut self) {
        self.reachable = true;
    }

    /// Clear the mark bit (for next GC cycle)
    #[inline]
    pub fn unmark(&mut self) {
        self.reachable = false;
    }

    /// Check if the block is pinned
    #[inline]
    pub fn is_pinned(&self) -> bool {
        self.pinned
    }

    /// Set or clear the pin bit
    #[inline]
    pub fn set_pinned(&mut self, pinned: bool) {
        self.pinned = pinned;
    }

    /// Whether sweep must keep this block
    #[inline]
    pub fn survives_sweep(&self) -> bool {
        self.reachable || self.pinned
    }

    /// Get the accounted size
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_starts_clear() {
        let header = BlockHeader::new(BlockKind::Table, 64);
        assert!(!header.is_reachable());
        assert!(!header.is_pinned());
        assert!(!header.survives_sweep());
        assert_eq!(header.size(), 64);
        assert_eq!(header.kind(), BlockKind::Table);
    }

    #[test]
    fn test_header_mark_unmark() {
        let mut header = BlockHeader::new(BlockKind::Array, 32);
        header.mark();
        assert!(header.is_reachable());
        assert!(header.survives_sweep());

        header.unmark();
        assert!(!header.is_reachable());
    }

    #[test]
    fn test_pin_is_independent_of_mark() {
        let mut header = BlockHeader::new(BlockKind::Buffer, 16);
        header.set_pinned(true);
        assert!(header.survives_sweep());

        header.mark();
        header.unmark();
        assert!(header.is_pinned());

        header.set_pinned(false);
        assert!(!header.survives_sweep());
    }

    #[test]
    fn test_interned_kinds() {
        assert!(BlockKind::String.is_interned());
        assert!(BlockKind::Tuple.is_interned());
        assert!(BlockKind::Struct.is_interned());
        assert!(!BlockKind::Array.is_interned());
        assert!(!BlockKind::Userdata.is_interned());
        assert_eq!(BlockKind::FuncEnv.to_string(), "funcenv");
    }
}
