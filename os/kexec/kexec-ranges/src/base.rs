//! # Base Range Collection
//!
//! Installed RAM as described by the `memory` nodes, before anything is
//! carved out of it.

use crate::error::DiscoveryError;
use crate::list::RegionList;
use crate::reader::{CellLayout, read_reg};
use crate::region::Region;
use kexec_devtree::{DeviceTree, NodeKind};
use log::{debug, info};

/// Sorted RAM regions plus the highest address they reach.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseRanges {
    pub regions: RegionList,
    pub memory_max: u64,
}

impl BaseRanges {
    /// Start of the lowest RAM region.
    #[must_use]
    pub fn first_start(&self) -> u64 {
        self.regions.first().map_or(0, Region::start)
    }
}

/// Number of memory nodes among `nodes`.
#[must_use]
pub fn count_memory_nodes(nodes: &[String]) -> usize {
    nodes
        .iter()
        .filter(|name| NodeKind::classify(name) == NodeKind::Memory)
        .count()
}

/// Collect one RAM region per `reg` pair of every memory node.
///
/// Regions span `[base, base + size]` and are sorted by start address.
///
/// # Errors
/// * [`DiscoveryError::NodeReadFailure`] / [`DiscoveryError::UnexpectedPropertySize`]
///   if a memory node's `reg` cannot be decoded.
/// * [`DiscoveryError::RegionOverflow`] if `base + size` does not fit 64 bits.
/// * [`DiscoveryError::NoMemoryNodes`] if no region was found at all.
/// * [`DiscoveryError::AllocationFailure`] if the list cannot grow.
pub fn collect_base_ranges<T: DeviceTree>(
    tree: &T,
    nodes: &[String],
    layout: Option<CellLayout>,
    capacity_hint: usize,
) -> Result<BaseRanges, DiscoveryError> {
    let mut regions = RegionList::with_capacity(capacity_hint)?;

    for node in nodes
        .iter()
        .filter(|name| NodeKind::classify(name) == NodeKind::Memory)
    {
        for pair in read_reg(tree, node, layout)? {
            let end = pair
                .base
                .checked_add(pair.size)
                .ok_or_else(|| DiscoveryError::RegionOverflow {
                    node: node.clone(),
                    start: pair.base,
                    size: pair.size,
                })?;

            let region = Region::ram(pair.base, end);
            debug!("{region}");
            regions.push(region)?;
        }
    }

    regions.sort_by_start();
    let memory_max = regions
        .last()
        .map(Region::end)
        .ok_or(DiscoveryError::NoMemoryNodes)?;

    info!(
        "found {} base memory ranges, memory_max = {memory_max:#x}",
        regions.len()
    );
    Ok(BaseRanges {
        regions,
        memory_max,
    })
}
