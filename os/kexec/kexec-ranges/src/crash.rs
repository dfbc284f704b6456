//! # Crash-Capture Bookkeeping
//!
//! When loading a dump-capture kernel, the new image must land inside the
//! crash kernel window the running kernel reserved at boot, and the capture
//! kernel needs to know which reserved ranges of the crashed kernel it may
//! still read. Both are recorded here while the exclusion list is built.

use crate::list::{AllocationError, RegionList};
use crate::region::Region;
use log::debug;

/// The crash kernel window reserved by the running kernel.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct CrashParameters {
    pub base: u64,
    pub size: u64,
}

impl CrashParameters {
    /// First address past the window, or `None` on overflow.
    #[must_use]
    pub const fn limit(&self) -> Option<u64> {
        self.base.checked_add(self.size)
    }
}

/// Bounds external placement policy uses when choosing load addresses.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct PlacementBounds {
    pub min: u64,
    pub max: u64,
}

impl Default for PlacementBounds {
    fn default() -> Self {
        Self {
            min: 0,
            max: u64::MAX,
        }
    }
}

impl PlacementBounds {
    /// Tighten both bounds so that they lie inside `[base, limit]`.
    pub fn narrow_to(&mut self, base: u64, limit: u64) {
        if base > self.min {
            self.min = base;
        }
        if limit < self.max {
            self.max = limit;
        }
        debug!(
            "placement bounds narrowed to {:#x}..={:#x}",
            self.min, self.max
        );
    }
}

/// Reserved ranges of the crashed kernel that remain readable for dumping.
///
/// Append-only and kept in insertion order; nothing is merged or sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrashUsableRegions {
    regions: RegionList,
}

impl CrashUsableRegions {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            regions: RegionList::new(),
        }
    }

    /// Record `[start, end]` as readable.
    ///
    /// # Errors
    /// Returns [`AllocationError`] if the list cannot grow.
    pub fn add(&mut self, start: u64, end: u64) -> Result<(), AllocationError> {
        debug!("crash usable region {start:016x}-{end:016x}");
        self.regions.push(Region::reserved(start.min(end), end.max(start)))
    }

    #[must_use]
    pub fn as_slice(&self) -> &[Region] {
        self.regions.as_slice()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.regions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Region> {
        self.regions.iter()
    }
}

/// Caller-owned state a discovery run may update.
///
/// Updated only when a discovery succeeds; a failed run leaves it untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Placement {
    pub bounds: PlacementBounds,
    pub usable: CrashUsableRegions,
}
