//! # Physical Memory Regions

use core::fmt;

/// What a [`Region`] describes.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum RangeKind {
    /// RAM that may be written by the new kernel image.
    Ram,
    /// Memory already committed to the running kernel, firmware or boot data.
    ///
    /// Only used for working-list entries; never part of a discovery result.
    Reserved,
}

impl RangeKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ram => "RAM",
            Self::Reserved => "reserved",
        }
    }
}

impl fmt::Display for RangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A physical address range with an **inclusive** end.
///
/// It is guaranteed that `start <= end`.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct Region {
    start: u64,
    end: u64,
    kind: RangeKind,
}

impl Region {
    /// # Panics
    /// Panics if `start > end`. Use [`Region::try_new`] for untrusted input.
    #[must_use]
    #[inline]
    pub const fn new(start: u64, end: u64, kind: RangeKind) -> Self {
        assert!(start <= end, "Invalid region");
        Self { start, end, kind }
    }

    #[must_use]
    #[inline]
    pub const fn try_new(start: u64, end: u64, kind: RangeKind) -> Option<Self> {
        if start <= end {
            Some(Self { start, end, kind })
        } else {
            None
        }
    }

    #[must_use]
    #[inline]
    pub const fn ram(start: u64, end: u64) -> Self {
        Self::new(start, end, RangeKind::Ram)
    }

    #[must_use]
    #[inline]
    pub const fn reserved(start: u64, end: u64) -> Self {
        Self::new(start, end, RangeKind::Reserved)
    }

    #[must_use]
    #[inline]
    pub const fn start(&self) -> u64 {
        self.start
    }

    #[must_use]
    #[inline]
    pub const fn end(&self) -> u64 {
        self.end
    }

    #[must_use]
    #[inline]
    pub const fn kind(&self) -> RangeKind {
        self.kind
    }

    /// Number of bytes covered, saturating for the full 64-bit space.
    #[must_use]
    #[inline]
    pub const fn size(&self) -> u64 {
        (self.end - self.start).saturating_add(1)
    }

    #[must_use]
    #[inline]
    pub const fn contains(&self, address: u64) -> bool {
        self.start <= address && address <= self.end
    }

    /// Whether both regions share at least one address.
    #[must_use]
    #[inline]
    pub const fn overlaps(&self, other: &Self) -> bool {
        self.start <= other.end && other.start <= self.end
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}-{:016x} : {}", self.start, self.end, self.kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_is_inclusive() {
        assert_eq!(Region::ram(0, 0).size(), 1);
        assert_eq!(Region::ram(0x1000, 0x1fff).size(), 0x1000);
        assert_eq!(Region::ram(0, u64::MAX).size(), u64::MAX);
    }

    #[test]
    fn try_new_rejects_inverted() {
        assert!(Region::try_new(2, 1, RangeKind::Ram).is_none());
        assert_eq!(
            Region::try_new(1, 1, RangeKind::Reserved),
            Some(Region::reserved(1, 1))
        );
    }

    #[test]
    fn overlap_is_symmetric() {
        let a = Region::ram(0, 10);
        let b = Region::ram(10, 20);
        let c = Region::ram(11, 20);
        assert!(a.overlaps(&b) && b.overlaps(&a));
        assert!(!a.overlaps(&c) && !c.overlaps(&a));
        assert!(a.contains(10) && !a.contains(11));
    }

    #[test]
    fn display_matches_debug_dump_format() {
        let r = Region::ram(0x1000, 0xffff);
        assert_eq!(r.to_string(), "0000000000001000-000000000000ffff : RAM");
    }
}
