//! # Memory Layout Constants

/// Architectural upper bound of the real memory area (RMO).
///
/// Whatever the first memory node reports, nothing at or above this address
/// is eligible for early kernel placement.
pub const RMO_CEILING: u64 = 0x3000_0000;

/// Size of the low-memory window the dump-capture kernel backs up.
///
/// On crash-capture boots a window of this many bytes directly below the
/// crash kernel base is reserved.
pub const KDUMP_BACKUP_LIMIT: u64 = 0x8000;

/// Capacity used for working lists when counting memory nodes yields nothing.
pub const MIN_LIST_CAPACITY: usize = 4;

const _: () = {
    assert!(RMO_CEILING.is_multiple_of(4096));
    assert!(KDUMP_BACKUP_LIMIT.is_multiple_of(4096));
    assert!(KDUMP_BACKUP_LIMIT < RMO_CEILING);
    assert!(MIN_LIST_CAPACITY > 0);
};
