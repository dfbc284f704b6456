//! # kexec Memory Range Discovery
//!
//! Before a new kernel image can be loaded into physical memory, kexec must
//! know which parts of RAM it may overwrite. This crate answers that question
//! for PowerPC systems booted with a device tree.
//!
//! ## Pipeline
//!
//! ```text
//!   DeviceTree ──► base collector ──► memory_max
//!        │
//!        └──────► exclusion collector ──► sorted exclusions, rmo_top,
//!                        │                crash window, RTAS area
//!                        ▼
//!                  range synthesizer ──► usable RAM ranges
//! ```
//!
//! 1. **Base ranges**: every `memory` node contributes its `reg` pairs. The
//!    highest end address becomes `memory_max`.
//! 2. **Exclusions**: the running kernel, the hash table, a retained initrd,
//!    RTAS and PCI TCE tables are carved out. Crash-capture runs also reserve
//!    a backup window below the crash kernel and narrow the caller's
//!    [`PlacementBounds`].
//! 3. **Synthesis**: the gaps between exclusions are emitted as RAM, clipped
//!    to `min(memory_max, rmo_top)`.
//!
//! ## Guarantees
//!
//! The returned ranges are sorted by start address, never overlap, are all
//! [`RangeKind::Ram`] and never end above `min(memory_max, rmo_top)`. Errors
//! never come with partial results, and the caller's [`Placement`] is only
//! updated by a run that succeeds.
//!
//! ## Usage
//!
//! ```rust
//! use kexec_devtree::SnapshotDeviceTree;
//! use kexec_ranges::{DiscoveryOptions, Placement, Region, discover_memory_ranges};
//!
//! let reg: Vec<u8> = [0u32, 0x2000_0000].iter().flat_map(|c| c.to_be_bytes()).collect();
//! let tree = SnapshotDeviceTree::new()
//!     .with_property("memory@0", "reg", reg)
//!     .with_property("chosen", "linux,kernel-end", 0x00ff_ffffu32.to_be_bytes());
//!
//! let mut placement = Placement::default();
//! let ranges = discover_memory_ranges(&tree, DiscoveryOptions::default(), &mut placement)?;
//! assert_eq!(ranges, [Region::ram(0x0100_0000, 0x2000_0000)]);
//! # Ok::<(), kexec_ranges::DiscoveryError>(())
//! ```

#![deny(unsafe_code)]

mod base;
mod crash;
mod discovery;
mod error;
mod exclude;
mod layout;
mod list;
mod reader;
mod region;
mod synth;

pub use base::{BaseRanges, collect_base_ranges, count_memory_nodes};
pub use crash::{CrashParameters, CrashUsableRegions, Placement, PlacementBounds};
pub use discovery::{Discovery, DiscoveryContext, DiscoveryOptions};
pub use error::DiscoveryError;
pub use exclude::{ExclusionCollector, Exclusions, RtasRegion};
pub use layout::{KDUMP_BACKUP_LIMIT, MIN_LIST_CAPACITY, RMO_CEILING};
pub use list::{AllocationError, RegionList};
pub use reader::{CellLayout, ReadError, RegPair, read_cell, read_reg, read_sized_cell};
pub use region::{RangeKind, Region};
pub use synth::synthesize;

use kexec_devtree::DeviceTree;

/// Discover the RAM ranges a new kernel image may be loaded into.
///
/// This is [`Discovery::run`] without the derived scalars.
///
/// # Errors
/// See [`DiscoveryError`].
pub fn discover_memory_ranges<T: DeviceTree>(
    tree: &T,
    options: DiscoveryOptions,
    placement: &mut Placement,
) -> Result<Vec<Region>, DiscoveryError> {
    Discovery::run(tree, options, placement).map(|discovery| discovery.ranges)
}
