//! # Node Classification

use core::fmt;

/// The kinds of top-level nodes the range planner cares about.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum NodeKind {
    /// `memory` or `memory@<unit-address>`: installed RAM.
    Memory,
    /// `chosen`: boot parameters handed over by the running kernel.
    Chosen,
    /// `rtas`: the firmware run-time abstraction services region.
    Rtas,
    /// `pci@<unit-address>`: a host bridge, possibly with a DMA window.
    Pci,
    /// Anything else.
    Other,
}

impl NodeKind {
    /// Classify a top-level node by its name.
    ///
    /// Only exact names or names followed by a unit address match; `memoryx`
    /// is not a memory node.
    #[must_use]
    pub fn classify(name: &str) -> Self {
        let (base, unit) = match name.split_once('@') {
            Some((base, unit)) => (base, Some(unit)),
            None => (name, None),
        };

        match (base, unit) {
            ("memory", _) => Self::Memory,
            ("chosen", None) => Self::Chosen,
            ("rtas", None) => Self::Rtas,
            ("pci", Some(_)) => Self::Pci,
            _ => Self::Other,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Chosen => "chosen",
            Self::Rtas => "rtas",
            Self::Pci => "pci",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
