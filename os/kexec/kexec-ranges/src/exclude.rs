//! # Exclusion Collection
//!
//! Gathers the memory already spoken for by the running system:
//!
//! ```plain
//!   node      property                         exclusion
//!   --------  -------------------------------  ------------------------------
//!   chosen    linux,kernel-end                 [0, kernel_end]
//!             linux,crashkernel-{base,size}    backup window below crash_base
//!             linux,htab-{base,size}           [htab_base, htab_base + size]   (optional)
//!             linux,initrd-{start,end}         [initrd_start, initrd_end]      (on request)
//!   rtas      linux,rtas-base, rtas-size       [rtas_base, rtas_base + size]
//!   pci@*     linux,tce-{base,size}            [tce_base, tce_base + size]     (optional)
//!   memory*   reg                              (derives rmo_top)
//! ```
//!
//! Absent `htab` and `tce` properties mean the platform runs without a
//! hypervisor partition and are skipped. Every other listed property is
//! required once its node is present.

use crate::crash::{CrashParameters, Placement};
use crate::discovery::DiscoveryOptions;
use crate::error::DiscoveryError;
use crate::layout::{KDUMP_BACKUP_LIMIT, RMO_CEILING};
use crate::list::RegionList;
use crate::reader::{CellLayout, ReadError, RegPair, read_cell, read_reg, read_sized_cell};
use crate::region::{RangeKind, Region};
use kexec_devtree::{DeviceTree, NodeKind};
use log::{debug, trace, warn};

/// The firmware runtime services (RTAS) area.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct RtasRegion {
    pub base: u64,
    pub size: u64,
}

/// Everything the exclusion walk produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exclusions {
    /// Reserved regions, sorted by start address.
    pub regions: RegionList,
    pub rmo_top: u64,
    pub crash: Option<CrashParameters>,
    pub rtas: Option<RtasRegion>,
}

/// Walks the device tree nodes and records reserved regions.
///
/// Crash-capture side effects go to the borrowed [`Placement`]; the caller
/// decides whether to keep them.
pub struct ExclusionCollector<'a, T> {
    tree: &'a T,
    layout: Option<CellLayout>,
    options: DiscoveryOptions,
    placement: &'a mut Placement,
    regions: RegionList,
    rmo: Option<RegPair>,
    crash: Option<CrashParameters>,
    rtas: Option<RtasRegion>,
}

impl<'a, T: DeviceTree> ExclusionCollector<'a, T> {
    /// # Errors
    /// Returns [`DiscoveryError::AllocationFailure`] if the working list
    /// cannot be pre-sized to `capacity_hint`.
    pub fn new(
        tree: &'a T,
        layout: Option<CellLayout>,
        options: DiscoveryOptions,
        placement: &'a mut Placement,
        capacity_hint: usize,
    ) -> Result<Self, DiscoveryError> {
        Ok(Self {
            tree,
            layout,
            options,
            placement,
            regions: RegionList::with_capacity(capacity_hint)?,
            rmo: None,
            crash: None,
            rtas: None,
        })
    }

    /// Visit every node in `nodes` and return the sorted exclusions.
    ///
    /// # Errors
    /// Any failed required read, overflowing or inverted region, or failed
    /// list growth aborts the walk.
    pub fn collect(mut self, nodes: &[String]) -> Result<Exclusions, DiscoveryError> {
        for node in nodes {
            match NodeKind::classify(node) {
                NodeKind::Chosen => self.visit_chosen(node)?,
                NodeKind::Rtas => self.visit_rtas(node)?,
                NodeKind::Memory => self.visit_memory(node)?,
                NodeKind::Pci => self.visit_pci(node)?,
                NodeKind::Other => trace!("skipping node {node}"),
            }
        }

        let rmo = self.rmo.ok_or(DiscoveryError::NoMemoryNodes)?;
        let rmo_top = rmo.base.saturating_add(rmo.size).min(RMO_CEILING);
        debug!("rmo_top = {rmo_top:#x}");

        self.regions.sort_by_start();
        Ok(Exclusions {
            regions: self.regions,
            rmo_top,
            crash: self.crash,
            rtas: self.rtas,
        })
    }

    fn visit_chosen(&mut self, node: &str) -> Result<(), DiscoveryError> {
        let kernel_end = read_cell(self.tree, node, "linux,kernel-end")?;
        self.push(Region::reserved(0, kernel_end))?;

        if self.options.crash_capture {
            self.visit_crash_window(node)?;
        }

        match optional(read_cell(self.tree, node, "linux,htab-base"))? {
            Some(htab_base) => {
                let htab_size = read_cell(self.tree, node, "linux,htab-size")?;
                self.exclude(node, htab_base, htab_size)?;
            }
            None => debug!("{node}: no hash table, not running partitioned"),
        }

        if self.options.retain_boot_data {
            let start = read_sized_cell(self.tree, node, "linux,initrd-start")?;
            let end = read_sized_cell(self.tree, node, "linux,initrd-end")?;
            let region = Region::try_new(start, end, RangeKind::Reserved)
                .ok_or_else(|| DiscoveryError::InvertedRegion {
                    node: node.to_owned(),
                    start,
                    end,
                })?;
            self.push(region)?;
        }

        Ok(())
    }

    fn visit_crash_window(&mut self, node: &str) -> Result<(), DiscoveryError> {
        let crash = CrashParameters {
            base: read_cell(self.tree, node, "linux,crashkernel-base")?,
            size: read_cell(self.tree, node, "linux,crashkernel-size")?,
        };
        let limit = crash.limit().ok_or_else(|| DiscoveryError::RegionOverflow {
            node: node.to_owned(),
            start: crash.base,
            size: crash.size,
        })?;

        self.placement.bounds.narrow_to(crash.base, limit);
        self.placement.usable.add(0, limit)?;

        match crash.base.checked_sub(1) {
            Some(backup_end) => {
                let backup_start = crash.base.saturating_sub(KDUMP_BACKUP_LIMIT);
                self.push(Region::reserved(backup_start, backup_end))?;
            }
            None => warn!("{node}: crash kernel at address zero, no backup window"),
        }

        self.crash = Some(crash);
        Ok(())
    }

    fn visit_rtas(&mut self, node: &str) -> Result<(), DiscoveryError> {
        let rtas = RtasRegion {
            base: read_cell(self.tree, node, "linux,rtas-base")?,
            size: read_cell(self.tree, node, "rtas-size")?,
        };
        let end = self.exclude(node, rtas.base, rtas.size)?;
        if self.options.crash_capture {
            self.placement.usable.add(rtas.base, end)?;
        }

        self.rtas = Some(rtas);
        Ok(())
    }

    fn visit_memory(&mut self, node: &str) -> Result<(), DiscoveryError> {
        let pairs = read_reg(self.tree, node, self.layout)?;
        let Some(&first) = pairs.first() else {
            return Ok(());
        };

        // The RMO lives in the lowest memory node, whichever order nodes come in.
        if self.rmo.is_none_or(|current| first.base < current.base) {
            self.rmo = Some(first);
        }
        Ok(())
    }

    fn visit_pci(&mut self, node: &str) -> Result<(), DiscoveryError> {
        let Some(tce_base) = optional(read_cell(self.tree, node, "linux,tce-base"))? else {
            debug!("{node}: no TCE table, not running partitioned");
            return Ok(());
        };
        let tce_size = read_cell(self.tree, node, "linux,tce-size")?;

        let end = self.exclude(node, tce_base, tce_size)?;
        if self.options.crash_capture {
            self.placement.usable.add(tce_base, end)?;
        }
        Ok(())
    }

    /// Exclude `[base, base + size]` and return its end.
    fn exclude(&mut self, node: &str, base: u64, size: u64) -> Result<u64, DiscoveryError> {
        let end = base
            .checked_add(size)
            .ok_or_else(|| DiscoveryError::RegionOverflow {
                node: node.to_owned(),
                start: base,
                size,
            })?;
        self.push(Region::reserved(base, end))?;
        Ok(end)
    }

    fn push(&mut self, region: Region) -> Result<(), DiscoveryError> {
        debug!("exclude {region}");
        self.regions.push(region)?;
        Ok(())
    }
}

/// Turn a "not found" into `None`; every other error stays an error.
fn optional<V>(result: Result<V, ReadError>) -> Result<Option<V>, ReadError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}
