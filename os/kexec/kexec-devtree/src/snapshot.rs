//! # In-memory device tree snapshot

use crate::{DeviceTree, StoreError};
use log::debug;
use std::collections::BTreeMap;

/// Root properties worth carrying over when capturing another store.
const CAPTURED_ROOT_PROPERTIES: [&str; 2] = ["#address-cells", "#size-cells"];

/// An immutable-once-built, in-memory copy of a device tree.
///
/// Node and property names are kept in `BTreeMap`s, so enumeration is always
/// sorted and two snapshots of the same tree compare equal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotDeviceTree {
    root: BTreeMap<String, Vec<u8>>,
    nodes: BTreeMap<String, BTreeMap<String, Vec<u8>>>,
}

impl SnapshotDeviceTree {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy every node and property of `source` into memory.
    ///
    /// Only `#address-cells` and `#size-cells` are copied from the root node.
    ///
    /// # Errors
    /// Propagates the first error `source` reports, except for absent root
    /// properties, which are simply not copied.
    pub fn capture<T: DeviceTree>(source: &T) -> Result<Self, StoreError> {
        let mut snapshot = Self::new();

        for name in CAPTURED_ROOT_PROPERTIES {
            match source.root_property(name) {
                Ok(value) => snapshot.insert_root_property(name, value),
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e),
            }
        }

        for node in source.nodes()? {
            snapshot.insert_node(&node);
            for name in source.properties(&node)? {
                let value = source.property(&node, &name)?;
                snapshot.insert_property(&node, &name, value);
            }
        }

        debug!(
            "captured device tree snapshot with {} nodes",
            snapshot.nodes.len()
        );
        Ok(snapshot)
    }

    /// Builder-style variant of [`SnapshotDeviceTree::insert_property`].
    #[must_use]
    pub fn with_property(
        mut self,
        node: &str,
        name: &str,
        value: impl Into<Vec<u8>>,
    ) -> Self {
        self.insert_property(node, name, value);
        self
    }

    /// Builder-style variant of [`SnapshotDeviceTree::insert_root_property`].
    #[must_use]
    pub fn with_root_property(mut self, name: &str, value: impl Into<Vec<u8>>) -> Self {
        self.insert_root_property(name, value);
        self
    }

    /// Builder-style variant of [`SnapshotDeviceTree::insert_node`].
    #[must_use]
    pub fn with_node(mut self, node: &str) -> Self {
        self.insert_node(node);
        self
    }

    /// Create `node` without any properties, if it does not exist yet.
    pub fn insert_node(&mut self, node: &str) {
        self.nodes.entry(node.to_owned()).or_default();
    }

    /// Set property `name` on `node`, creating the node if necessary.
    pub fn insert_property(&mut self, node: &str, name: &str, value: impl Into<Vec<u8>>) {
        self.nodes
            .entry(node.to_owned())
            .or_default()
            .insert(name.to_owned(), value.into());
    }

    pub fn insert_root_property(&mut self, name: &str, value: impl Into<Vec<u8>>) {
        self.root.insert(name.to_owned(), value.into());
    }

    /// Remove a property, returning its previous value.
    pub fn remove_property(&mut self, node: &str, name: &str) -> Option<Vec<u8>> {
        self.nodes.get_mut(node)?.remove(name)
    }

    /// Remove a node together with all of its properties.
    pub fn remove_node(&mut self, node: &str) -> bool {
        self.nodes.remove(node).is_some()
    }

    fn lookup(&self, node: &str, name: &str) -> Result<&[u8], StoreError> {
        self.nodes
            .get(node)
            .and_then(|properties| properties.get(name))
            .map(Vec::as_slice)
            .ok_or_else(|| StoreError::NotFound {
                path: format!("/{node}/{name}"),
            })
    }
}

impl DeviceTree for SnapshotDeviceTree {
    fn nodes(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.nodes.keys().cloned().collect())
    }

    fn properties(&self, node: &str) -> Result<Vec<String>, StoreError> {
        self.nodes
            .get(node)
            .map(|properties| properties.keys().cloned().collect())
            .ok_or_else(|| StoreError::NotFound {
                path: format!("/{node}"),
            })
    }

    fn property(&self, node: &str, name: &str) -> Result<Vec<u8>, StoreError> {
        self.lookup(node, name).map(<[u8]>::to_vec)
    }

    fn property_len(&self, node: &str, name: &str) -> Result<usize, StoreError> {
        self.lookup(node, name).map(<[u8]>::len)
    }

    fn root_property(&self, name: &str) -> Result<Vec<u8>, StoreError> {
        self.root
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                path: format!("/{name}"),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SnapshotDeviceTree {
        SnapshotDeviceTree::new()
            .with_root_property("#address-cells", 2u32.to_be_bytes())
            .with_property("memory@0", "reg", [0u8; 16])
            .with_property("chosen", "linux,kernel-end", 0x80_0000u64.to_be_bytes())
            .with_node("cpus")
    }

    #[test]
    fn nodes_are_sorted() {
        let tree = sample();
        assert_eq!(tree.nodes().unwrap(), ["chosen", "cpus", "memory@0"]);
    }

    #[test]
    fn missing_property_is_not_found() {
        let tree = sample();
        let err = tree.property("chosen", "linux,htab-base").unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.path(), "/chosen/linux,htab-base");

        let err = tree.property("rtas", "rtas-size").unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn property_len_matches_value() {
        let tree = sample();
        assert_eq!(tree.property_len("memory@0", "reg").unwrap(), 16);
        assert_eq!(tree.property_len("chosen", "linux,kernel-end").unwrap(), 8);
    }

    #[test]
    fn empty_node_has_no_properties() {
        let tree = sample();
        assert!(tree.properties("cpus").unwrap().is_empty());
        assert!(tree.properties("nope").unwrap_err().is_not_found());
    }

    #[test]
    fn capture_copies_everything() {
        let tree = sample();
        let copy = SnapshotDeviceTree::capture(&tree).unwrap();
        assert_eq!(copy, tree);
    }

    #[test]
    fn remove_property_and_node() {
        let mut tree = sample();
        assert!(tree.remove_property("chosen", "linux,kernel-end").is_some());
        assert!(tree.remove_property("chosen", "linux,kernel-end").is_none());
        assert!(tree.remove_node("cpus"));
        assert_eq!(tree.nodes().unwrap(), ["chosen", "memory@0"]);
    }
}
