//! # Range Synthesis
//!
//! Turns the sorted exclusion list into the usable RAM ranges: every gap
//! between exclusions, clipped to the installed memory and the RMO.
//!
//! ```plain
//!   0                                          rmo_top      memory_max
//!   |###|.........|#####|##|.........|###|........|............|
//!       '- gap --'             '- gap -'  '- gap -'
//!                                                 ^ truncated, stop
//! ```
//!
//! Exclusions are consumed, never emitted. Overlapping exclusions are
//! coalesced by tracking the highest address covered so far.

use crate::list::{AllocationError, RegionList};
use crate::region::Region;
use log::{debug, warn};

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum Flow {
    Continue,
    Stop,
}

struct Emitter {
    output: RegionList,
    memory_max: u64,
    rmo_top: u64,
}

impl Emitter {
    /// Emit `[start, end]` clipped to the ceilings.
    fn emit(&mut self, start: u64, end: u64) -> Result<Flow, AllocationError> {
        if start >= self.rmo_top || start > self.memory_max {
            debug!("discarding range starting at {start:#x} above the ceiling");
            return Ok(Flow::Stop);
        }

        let end = end.min(self.memory_max);
        if end >= self.rmo_top {
            self.push(Region::ram(start, self.rmo_top))?;
            return Ok(Flow::Stop);
        }

        self.push(Region::ram(start, end))?;
        Ok(Flow::Continue)
    }

    fn push(&mut self, region: Region) -> Result<(), AllocationError> {
        debug!("{region}");
        self.output.push(region)
    }
}

/// Compute the usable ranges left over by `exclude`.
///
/// `exclude` must be sorted by start address. `base_start` is the lowest RAM
/// address and is only used when nothing is excluded at all.
///
/// # Errors
/// Returns [`AllocationError`] if the output list cannot grow.
pub fn synthesize(
    exclude: &[Region],
    base_start: u64,
    memory_max: u64,
    rmo_top: u64,
) -> Result<RegionList, AllocationError> {
    let mut emitter = Emitter {
        output: RegionList::with_capacity(exclude.len() + 1)?,
        memory_max,
        rmo_top,
    };

    let Some((first, rest)) = exclude.split_first() else {
        warn!("no exclusions found, offering all memory from {base_start:#x}");
        emitter.emit(base_start, memory_max)?;
        return Ok(emitter.output);
    };

    if first.start() != 0 && emitter.emit(0, first.start() - 1)? == Flow::Stop {
        return Ok(emitter.output);
    }

    let mut covered_end = first.end();
    for next in rest {
        // Everything up to the top of the address space is taken.
        let Some(gap_start) = covered_end.checked_add(1) else {
            return Ok(emitter.output);
        };
        if next.start() > gap_start && emitter.emit(gap_start, next.start() - 1)? == Flow::Stop {
            return Ok(emitter.output);
        }
        covered_end = covered_end.max(next.end());
    }

    if covered_end < memory_max {
        emitter.emit(covered_end + 1, memory_max)?;
    }
    Ok(emitter.output)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ranges(list: &RegionList) -> Vec<(u64, u64)> {
        list.iter().map(|r| (r.start(), r.end())).collect()
    }

    fn reserved(spans: &[(u64, u64)]) -> Vec<Region> {
        spans.iter().map(|&(s, e)| Region::reserved(s, e)).collect()
    }

    #[test]
    fn gap_straddling_rmo_is_truncated_and_last() {
        let exclude = reserved(&[(0, 0xfff), (0x10000, 0x1ffff)]);
        let output = synthesize(&exclude, 0, 0x3000_0000, 0x2000_0000).unwrap();
        assert_eq!(
            ranges(&output),
            [(0x1000, 0xffff), (0x20000, 0x2000_0000)]
        );
    }

    #[test]
    fn contiguous_exclusions_leave_no_gap() {
        let exclude = reserved(&[(0, 0xfff), (0x1000, 0x1fff)]);
        let output = synthesize(&exclude, 0, 0x2fff, 0x3fff).unwrap();
        assert_eq!(ranges(&output), [(0x2000, 0x2fff)]);
    }

    #[test]
    fn no_exclusions_yields_single_range() {
        let output = synthesize(&[], 0x1000, 0x8000_0000, 0x3000_0000).unwrap();
        assert_eq!(ranges(&output), [(0x1000, 0x3000_0000)]);

        let output = synthesize(&[], 0, 0x0fff_ffff, 0x3000_0000).unwrap();
        assert_eq!(ranges(&output), [(0, 0x0fff_ffff)]);
    }

    #[test]
    fn leading_gap_is_emitted() {
        let exclude = reserved(&[(0x1000, 0x1fff)]);
        let output = synthesize(&exclude, 0, 0x3fff, 0x10000).unwrap();
        assert_eq!(ranges(&output), [(0, 0xfff), (0x2000, 0x3fff)]);
    }

    #[test]
    fn overlapping_exclusions_are_coalesced() {
        let exclude = reserved(&[(0, 0x2fff), (0x1000, 0x1fff), (0x2800, 0x3fff)]);
        let output = synthesize(&exclude, 0, 0x5fff, 0x10000).unwrap();
        assert_eq!(ranges(&output), [(0x4000, 0x5fff)]);
    }

    #[test]
    fn ranges_at_or_above_rmo_are_dropped() {
        let exclude = reserved(&[(0, 0xfff), (0x2000, 0x2fff), (0x4000, 0x4fff)]);
        let output = synthesize(&exclude, 0, 0x8000, 0x2000).unwrap();
        assert_eq!(ranges(&output), [(0x1000, 0x1fff)]);
    }

    #[test]
    fn exclusion_reaching_top_of_address_space() {
        let exclude = reserved(&[(0x1000, u64::MAX), (0x2000, 0x2fff)]);
        let output = synthesize(&exclude, 0, u64::MAX, u64::MAX).unwrap();
        assert_eq!(ranges(&output), [(0, 0xfff)]);
    }

    /// Minimal linear congruential generator so the test stays deterministic.
    struct Lcg(u64);

    impl Lcg {
        fn below(&mut self, bound: u64) -> u64 {
            self.0 = self
                .0
                .wrapping_mul(6_364_136_223_846_793_005)
                .wrapping_add(1_442_695_040_888_963_407);
            (self.0 >> 33) % bound
        }
    }

    #[test]
    fn output_is_complement_of_exclusions() {
        const SPACE: u64 = 96;
        let mut rng = Lcg(0x5eed);

        for _ in 0..500 {
            let count = rng.below(6) + 1;
            let mut exclude: Vec<Region> = (0..count)
                .map(|_| {
                    let start = rng.below(SPACE);
                    let end = (start + rng.below(12)).min(SPACE - 1);
                    Region::reserved(start, end)
                })
                .collect();
            exclude.sort_by_key(Region::start);

            let memory_max = rng.below(SPACE);
            let rmo_top = rng.below(SPACE);
            let output = synthesize(&exclude, 0, memory_max, rmo_top).unwrap();

            for pair in output.windows(2) {
                assert!(pair[0].end() < pair[1].start(), "{output:?}");
            }

            let excluded = |a: u64| exclude.iter().any(|r| r.contains(a));
            let ceiling = memory_max.min(rmo_top);
            for a in 0..SPACE {
                let expected = a <= ceiling
                    && !excluded(a)
                    && !(a == rmo_top && (rmo_top == 0 || excluded(rmo_top - 1)));
                let actual = output.iter().any(|r| r.contains(a));
                assert_eq!(
                    expected, actual,
                    "address {a} with {exclude:?}, max {memory_max}, rmo {rmo_top}: {output:?}"
                );
            }
        }
    }
}
