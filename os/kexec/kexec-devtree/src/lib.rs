//! # Device Tree Property Store
//!
//! This crate provides read-only access to the hardware description a running
//! Linux kernel exports under `/proc/device-tree`. It is the lowest layer of
//! the kexec memory range planner: everything the planner knows about installed
//! RAM and reserved regions is read through the [`DeviceTree`] trait defined
//! here.
//!
//! ## Overview
//!
//! The kernel exposes the flattened device tree as a directory hierarchy:
//!
//! ```text
//! /proc/device-tree/
//! ├── #address-cells            (optional, 4 bytes)
//! ├── #size-cells               (optional, 4 bytes)
//! ├── chosen/
//! │   ├── linux,kernel-end
//! │   ├── linux,crashkernel-base
//! │   ├── linux,crashkernel-size
//! │   ├── linux,htab-base       (absent on partitioned platforms)
//! │   ├── linux,htab-size
//! │   ├── linux,initrd-start    (4 or 8 bytes)
//! │   └── linux,initrd-end      (4 or 8 bytes)
//! ├── memory@0/
//! │   └── reg                   (one or more big-endian base/size pairs)
//! ├── rtas/
//! │   ├── linux,rtas-base
//! │   └── rtas-size
//! └── pci@800000020000000/
//!     ├── linux,tce-base        (absent on partitioned platforms)
//!     └── linux,tce-size
//! ```
//!
//! Every property is a file holding raw big-endian bytes. This crate does not
//! interpret the bytes; decoding is left to the consumer.
//!
//! ## Implementations
//!
//! * [`ProcDeviceTree`]: reads straight from a directory, by default
//!   [`DEFAULT_DEVICE_TREE_ROOT`]. Every directory iterator and file handle is
//!   scoped to a single call and closed on all paths.
//! * [`SnapshotDeviceTree`]: an in-memory copy. It can be assembled by hand
//!   (fixtures, tests) or captured from any other store with
//!   [`SnapshotDeviceTree::capture`], giving a view that stays consistent for a
//!   whole inspection pass.
//!
//! ## Usage
//!
//! ```rust
//! use kexec_devtree::{DeviceTree, NodeKind, SnapshotDeviceTree};
//!
//! let tree = SnapshotDeviceTree::new()
//!     .with_property("memory@0", "reg", [0u8, 0, 0, 0, 0x10, 0, 0, 0])
//!     .with_property("chosen", "linux,kernel-end", 0x0080_0000u32.to_be_bytes());
//!
//! let nodes = tree.nodes().expect("snapshot is always readable");
//! assert_eq!(nodes, ["chosen", "memory@0"]);
//! assert_eq!(NodeKind::classify("memory@0"), NodeKind::Memory);
//! assert_eq!(tree.property("chosen", "linux,kernel-end").unwrap().len(), 4);
//! ```

#![deny(unsafe_code)]

mod node;
mod proc_fs;
mod snapshot;

pub use node::NodeKind;
pub use proc_fs::ProcDeviceTree;
pub use snapshot::SnapshotDeviceTree;

/// Where a running kernel exports its device tree.
pub const DEFAULT_DEVICE_TREE_ROOT: &str = "/proc/device-tree";

/// Read-only access to a hierarchical hardware description.
///
/// Node names are the names of the direct children of the root, e.g. `chosen`
/// or `memory@0`. Properties are opaque byte strings.
pub trait DeviceTree {
    /// Names of all top-level nodes, sorted ascending.
    ///
    /// # Errors
    /// Returns [`StoreError::Unavailable`] if the root cannot be enumerated.
    fn nodes(&self) -> Result<Vec<String>, StoreError>;

    /// Names of all properties of `node`, sorted ascending.
    ///
    /// # Errors
    /// Returns [`StoreError::NotFound`] if the node does not exist, and
    /// [`StoreError::Io`] for any other failure.
    fn properties(&self, node: &str) -> Result<Vec<String>, StoreError>;

    /// The raw bytes of property `name` on node `node`.
    ///
    /// # Errors
    /// Returns [`StoreError::NotFound`] if the node or the property does not
    /// exist, and [`StoreError::Io`] for any other failure.
    fn property(&self, node: &str, name: &str) -> Result<Vec<u8>, StoreError>;

    /// The byte length of property `name` on node `node`, without reading it.
    ///
    /// # Errors
    /// Same as [`DeviceTree::property`].
    fn property_len(&self, node: &str, name: &str) -> Result<usize, StoreError>;

    /// The raw bytes of a property stored directly on the root node, such as
    /// `#address-cells`.
    ///
    /// # Errors
    /// Same as [`DeviceTree::property`].
    fn root_property(&self, name: &str) -> Result<Vec<u8>, StoreError>;
}

impl<T: DeviceTree + ?Sized> DeviceTree for &T {
    fn nodes(&self) -> Result<Vec<String>, StoreError> {
        (**self).nodes()
    }

    fn properties(&self, node: &str) -> Result<Vec<String>, StoreError> {
        (**self).properties(node)
    }

    fn property(&self, node: &str, name: &str) -> Result<Vec<u8>, StoreError> {
        (**self).property(node, name)
    }

    fn property_len(&self, node: &str, name: &str) -> Result<usize, StoreError> {
        (**self).property_len(node, name)
    }

    fn root_property(&self, name: &str) -> Result<Vec<u8>, StoreError> {
        (**self).root_property(name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("device tree root {path} is unavailable: {source}")]
    Unavailable {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{path} does not exist")]
    NotFound { path: String },
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl StoreError {
    /// Whether the error only signals absence of the node or property.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// The store path the error refers to.
    #[must_use]
    pub fn path(&self) -> &str {
        match self {
            Self::Unavailable { path, .. } | Self::NotFound { path } | Self::Io { path, .. } => {
                path
            }
        }
    }
}
