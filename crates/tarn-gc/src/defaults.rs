//! Default constants for collector configuration.

/// Default number of bytes allocated between collections (64 KiB).
pub const DEFAULT_COLLECTION_INTERVAL: usize = 0x10000;

/// Default number of block slots reserved up front.
pub const DEFAULT_INITIAL_CAPACITY: usize = 1024;
