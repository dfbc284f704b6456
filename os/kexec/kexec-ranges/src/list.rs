//! # Growable Region Lists
//!
//! The number of regions is only known once the device tree has been walked,
//! so every working list grows on demand. Growth is fallible: an allocation
//! failure aborts discovery instead of aborting the process.

use crate::region::Region;
use core::ops::Deref;
use core::slice;

#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
#[error("failed to grow region list to {requested} entries")]
pub struct AllocationError {
    pub requested: usize,
}

/// An ordered, exclusively owned sequence of [`Region`]s.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegionList {
    regions: Vec<Region>,
}

impl RegionList {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            regions: Vec::new(),
        }
    }

    /// Create an empty list able to hold `hint` regions without growing.
    ///
    /// # Errors
    /// Returns [`AllocationError`] if the backing storage cannot be allocated.
    pub fn with_capacity(hint: usize) -> Result<Self, AllocationError> {
        let mut list = Self::new();
        list.ensure_capacity(hint)?;
        Ok(list)
    }

    /// Grow the backing storage to hold at least `needed` regions.
    ///
    /// Capacity at least doubles on every growth step so that appending one
    /// region at a time stays amortized constant.
    ///
    /// # Errors
    /// Returns [`AllocationError`] if the storage cannot be grown. Existing
    /// contents are preserved either way.
    pub fn ensure_capacity(&mut self, needed: usize) -> Result<(), AllocationError> {
        let capacity = self.regions.capacity();
        if needed <= capacity {
            return Ok(());
        }

        let target = needed.max(capacity.saturating_mul(2));
        self.regions
            .try_reserve_exact(target - self.regions.len())
            .map_err(|_| AllocationError { requested: target })
    }

    /// Append a region, growing the list if it is full.
    ///
    /// # Errors
    /// Returns [`AllocationError`] if the list had to grow and could not.
    pub fn push(&mut self, region: Region) -> Result<(), AllocationError> {
        self.ensure_capacity(self.regions.len() + 1)?;
        self.regions.push(region);
        Ok(())
    }

    /// Sort ascending by start address. The sort is stable.
    pub fn sort_by_start(&mut self) {
        self.regions.sort_by_key(Region::start);
    }

    #[must_use]
    pub fn as_slice(&self) -> &[Region] {
        &self.regions
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.regions.capacity()
    }

    #[must_use]
    pub fn into_vec(self) -> Vec<Region> {
        self.regions
    }
}

impl Deref for RegionList {
    type Target = [Region];

    fn deref(&self) -> &Self::Target {
        &self.regions
    }
}

impl<'a> IntoIterator for &'a RegionList {
    type Item = &'a Region;
    type IntoIter = slice::Iter<'a, Region>;

    fn into_iter(self) -> Self::IntoIter {
        self.regions.iter()
    }
}

impl From<RegionList> for Vec<Region> {
    fn from(list: RegionList) -> Self {
        list.into_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_capacity_presizes() {
        let list = RegionList::with_capacity(8).unwrap();
        assert!(list.is_empty());
        assert!(list.capacity() >= 8);
    }

    #[test]
    fn push_grows_past_capacity() {
        let mut list = RegionList::with_capacity(1).unwrap();
        for i in 0..10 {
            list.push(Region::ram(i * 0x10, i * 0x10 + 0xf)).unwrap();
        }
        assert_eq!(list.len(), 10);
        assert!(list.capacity() >= 10);
        assert_eq!(list[9], Region::ram(0x90, 0x9f));
    }

    #[test]
    fn growth_doubles_or_meets_need() {
        let mut list = RegionList::with_capacity(4).unwrap();
        let before = list.capacity();
        list.ensure_capacity(before + 1).unwrap();
        assert!(list.capacity() >= before * 2);

        let before = list.capacity();
        list.ensure_capacity(before * 5).unwrap();
        assert!(list.capacity() >= before * 5);
    }

    #[test]
    fn ensure_capacity_preserves_contents() {
        let mut list = RegionList::new();
        list.push(Region::reserved(0, 0xfff)).unwrap();
        list.ensure_capacity(100).unwrap();
        assert_eq!(list.as_slice(), &[Region::reserved(0, 0xfff)]);
    }

    #[test]
    fn sort_is_stable() {
        let mut list = RegionList::new();
        list.push(Region::reserved(0x2000, 0x2fff)).unwrap();
        list.push(Region::reserved(0x1000, 0x10ff)).unwrap();
        list.push(Region::reserved(0x1000, 0x1fff)).unwrap();
        list.sort_by_start();
        assert_eq!(
            list.as_slice(),
            &[
                Region::reserved(0x1000, 0x10ff),
                Region::reserved(0x1000, 0x1fff),
                Region::reserved(0x2000, 0x2fff),
            ]
        );
    }

    #[test]
    fn oversized_request_fails_without_losing_data() {
        let mut list = RegionList::new();
        list.push(Region::ram(0, 1)).unwrap();
        let err = list.ensure_capacity(usize::MAX).unwrap_err();
        assert_eq!(err.requested, usize::MAX);
        assert_eq!(list.len(), 1);
    }
}
