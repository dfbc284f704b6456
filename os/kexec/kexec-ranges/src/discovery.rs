//! # Discovery
//!
//! Runs the collectors and the synthesizer in order and owns all state of
//! one run. Nothing survives between runs; the only state written outside
//! the run is the caller's [`Placement`], and only on success.

use crate::base::{collect_base_ranges, count_memory_nodes};
use crate::crash::{CrashParameters, Placement};
use crate::error::DiscoveryError;
use crate::exclude::{ExclusionCollector, RtasRegion};
use crate::layout::MIN_LIST_CAPACITY;
use crate::reader::CellLayout;
use crate::region::Region;
use crate::synth::synthesize;
use kexec_devtree::DeviceTree;
use log::info;

/// What kind of kernel is being prepared.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct DiscoveryOptions {
    /// Preparing a dump-capture kernel after a crash.
    pub crash_capture: bool,
    /// Keep the current initrd in place for the next kernel.
    pub retain_boot_data: bool,
}

/// Scalars derived during one run.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct DiscoveryContext {
    /// Highest address of any installed RAM region.
    pub memory_max: u64,
    /// Upper bound of the real memory area.
    pub rmo_top: u64,
    /// The crash kernel window; only read on crash-capture runs.
    pub crash: Option<CrashParameters>,
    pub rtas: Option<RtasRegion>,
}

impl DiscoveryContext {
    /// The highest address any usable range may reach.
    #[must_use]
    pub fn ceiling(&self) -> u64 {
        self.memory_max.min(self.rmo_top)
    }
}

/// Outcome of a successful discovery.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Discovery {
    /// Usable RAM, sorted and non-overlapping.
    pub ranges: Vec<Region>,
    pub context: DiscoveryContext,
}

impl Discovery {
    /// Discover the usable memory ranges described by `tree`.
    ///
    /// On crash-capture runs `placement` is narrowed to the crash kernel
    /// window and receives the regions that stay readable for dumping. It is
    /// left unchanged when discovery fails.
    ///
    /// # Errors
    /// See [`DiscoveryError`]. No partial result is ever returned.
    pub fn run<T: DeviceTree>(
        tree: &T,
        options: DiscoveryOptions,
        placement: &mut Placement,
    ) -> Result<Self, DiscoveryError> {
        let nodes = tree.nodes().map_err(DiscoveryError::StoreUnavailable)?;
        let layout = CellLayout::from_root(tree)?;

        let capacity = (count_memory_nodes(&nodes) + usize::from(options.retain_boot_data))
            .max(MIN_LIST_CAPACITY);

        let base = collect_base_ranges(tree, &nodes, layout, capacity)?;

        let mut staged = placement.clone();
        let exclusions =
            ExclusionCollector::new(tree, layout, options, &mut staged, capacity)?
                .collect(&nodes)?;

        let output = synthesize(
            &exclusions.regions,
            base.first_start(),
            base.memory_max,
            exclusions.rmo_top,
        )?;

        *placement = staged;

        let context = DiscoveryContext {
            memory_max: base.memory_max,
            rmo_top: exclusions.rmo_top,
            crash: exclusions.crash,
            rtas: exclusions.rtas,
        };
        info!(
            "{} usable memory ranges below {:#x} ({} base, {} excluded)",
            output.len(),
            context.ceiling(),
            base.regions.len(),
            exclusions.regions.len()
        );

        Ok(Self {
            ranges: output.into_vec(),
            context,
        })
    }
}
