//! # Raw Region Reader
//!
//! Decodes numeric device tree properties. All values are big-endian; the
//! integer width is inferred from the number of bytes read:
//!
//! | property kind   | 4 bytes | 8 bytes       | 16 bytes      |
//! |-----------------|---------|---------------|---------------|
//! | single cell     | `u32`   | `u64`         | -             |
//! | `reg` pair      | -       | `u32` + `u32` | `u64` + `u64` |
//!
//! When the root node declares `#address-cells` and `#size-cells`, a `reg`
//! property is decoded with those cell counts instead and may hold several
//! pairs.

use kexec_devtree::{DeviceTree, StoreError};
use log::warn;

/// Size in bytes of one device tree cell.
const CELL_SIZE: usize = 4;

#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    #[error(transparent)]
    NotFound(StoreError),
    #[error(transparent)]
    Io(StoreError),
    #[error("{path}: unexpected property size of {len} bytes")]
    UnexpectedSize { path: String, len: usize },
}

impl ReadError {
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl From<StoreError> for ReadError {
    fn from(value: StoreError) -> Self {
        if value.is_not_found() {
            Self::NotFound(value)
        } else {
            Self::Io(value)
        }
    }
}

/// A decoded `(base, size)` pair of a `reg` property.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct RegPair {
    pub base: u64,
    pub size: u64,
}

/// Cell counts declared on the root node.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct CellLayout {
    pub address_cells: u32,
    pub size_cells: u32,
}

impl CellLayout {
    /// Read `#address-cells` and `#size-cells` from the root node.
    ///
    /// Returns `Ok(None)` when either property is absent or declares a cell
    /// count other than 1 or 2; `reg` widths are then inferred from length.
    ///
    /// # Errors
    /// Returns [`ReadError::Io`] if a present property cannot be read, and
    /// [`ReadError::UnexpectedSize`] if it is not exactly one cell long.
    pub fn from_root<T: DeviceTree>(tree: &T) -> Result<Option<Self>, ReadError> {
        let Some(address_cells) = read_root_cell(tree, "#address-cells")? else {
            return Ok(None);
        };
        let Some(size_cells) = read_root_cell(tree, "#size-cells")? else {
            return Ok(None);
        };

        let layout = Self {
            address_cells,
            size_cells,
        };
        if matches!(address_cells, 1 | 2) && matches!(size_cells, 1 | 2) {
            Ok(Some(layout))
        } else {
            warn!("ignoring unsupported root cell layout {layout:?}");
            Ok(None)
        }
    }

    const fn stride(self) -> usize {
        (self.address_cells + self.size_cells) as usize * CELL_SIZE
    }
}

fn read_root_cell<T: DeviceTree>(tree: &T, name: &str) -> Result<Option<u32>, ReadError> {
    let bytes = match tree.root_property(name) {
        Ok(bytes) => bytes,
        Err(e) if e.is_not_found() => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let cell: [u8; CELL_SIZE] = bytes
        .as_slice()
        .try_into()
        .map_err(|_| ReadError::UnexpectedSize {
            path: format!("/{name}"),
            len: bytes.len(),
        })?;
    Ok(Some(u32::from_be_bytes(cell)))
}

/// Decode a single 4- or 8-byte big-endian cell.
#[must_use]
pub fn decode_cell(bytes: &[u8]) -> Option<u64> {
    match bytes.len() {
        4 => {
            let cell: [u8; 4] = bytes.try_into().ok()?;
            Some(u64::from(u32::from_be_bytes(cell)))
        }
        8 => {
            let cell: [u8; 8] = bytes.try_into().ok()?;
            Some(u64::from_be_bytes(cell))
        }
        _ => None,
    }
}

/// Decode a single `reg` pair, inferring the width from the length.
#[must_use]
pub fn decode_reg_pair(bytes: &[u8]) -> Option<RegPair> {
    match bytes.len() {
        8 | 16 => {
            let (base, size) = bytes.split_at(bytes.len() / 2);
            Some(RegPair {
                base: decode_cell(base)?,
                size: decode_cell(size)?,
            })
        }
        _ => None,
    }
}

/// Decode every `reg` pair using explicit cell counts.
#[must_use]
pub fn decode_reg_pairs(bytes: &[u8], layout: CellLayout) -> Option<Vec<RegPair>> {
    let stride = layout.stride();
    if bytes.is_empty() || !bytes.len().is_multiple_of(stride) {
        return None;
    }

    let split = layout.address_cells as usize * CELL_SIZE;
    bytes
        .chunks_exact(stride)
        .map(|entry| {
            let (base, size) = entry.split_at(split);
            Some(RegPair {
                base: decode_cell(base)?,
                size: decode_cell(size)?,
            })
        })
        .collect()
}

/// Read a single numeric cell.
///
/// # Errors
/// [`ReadError::NotFound`] if absent, [`ReadError::Io`] on read failure,
/// [`ReadError::UnexpectedSize`] if the property is neither 4 nor 8 bytes long.
pub fn read_cell<T: DeviceTree>(tree: &T, node: &str, name: &str) -> Result<u64, ReadError> {
    let bytes = tree.property(node, name)?;
    decode_cell(&bytes).ok_or_else(|| unexpected_size(node, name, bytes.len()))
}

/// Read a single numeric cell whose width is taken from the stored length.
///
/// The length is queried first and the read must return exactly that many
/// bytes.
///
/// # Errors
/// Same as [`read_cell`]; additionally [`ReadError::UnexpectedSize`] if the
/// read returned a different number of bytes than the stored length.
pub fn read_sized_cell<T: DeviceTree>(
    tree: &T,
    node: &str,
    name: &str,
) -> Result<u64, ReadError> {
    let len = tree.property_len(node, name)?;
    if !matches!(len, 4 | 8) {
        return Err(unexpected_size(node, name, len));
    }

    let bytes = tree.property(node, name)?;
    if bytes.len() != len {
        return Err(unexpected_size(node, name, bytes.len()));
    }

    decode_cell(&bytes).ok_or_else(|| unexpected_size(node, name, len))
}

/// Read all `(base, size)` pairs of the `reg` property of `node`.
///
/// # Errors
/// [`ReadError::NotFound`] if absent, [`ReadError::Io`] on read failure,
/// [`ReadError::UnexpectedSize`] if the length fits no supported encoding.
pub fn read_reg<T: DeviceTree>(
    tree: &T,
    node: &str,
    layout: Option<CellLayout>,
) -> Result<Vec<RegPair>, ReadError> {
    let bytes = tree.property(node, "reg")?;
    let pairs = match layout {
        Some(layout) => decode_reg_pairs(&bytes, layout),
        None => decode_reg_pair(&bytes).map(|pair| vec![pair]),
    };
    pairs.ok_or_else(|| unexpected_size(node, "reg", bytes.len()))
}

fn unexpected_size(node: &str, name: &str, len: usize) -> ReadError {
    ReadError::UnexpectedSize {
        path: format!("/{node}/{name}"),
        len,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kexec_devtree::SnapshotDeviceTree;

    #[test]
    fn decodes_cells_big_endian() {
        assert_eq!(decode_cell(&[0x12, 0x34, 0x56, 0x78]), Some(0x1234_5678));
        assert_eq!(
            decode_cell(&[0, 0, 0, 1, 0, 0, 0, 2]),
            Some(0x0000_0001_0000_0002)
        );
        assert_eq!(decode_cell(&[0; 2]), None);
        assert_eq!(decode_cell(&[0; 16]), None);
    }

    #[test]
    fn infers_reg_pair_width() {
        let narrow = [0, 0, 0x10, 0, 0, 0, 0x20, 0];
        assert_eq!(
            decode_reg_pair(&narrow),
            Some(RegPair {
                base: 0x1000,
                size: 0x2000
            })
        );

        let mut wide = [0u8; 16];
        wide[..8].copy_from_slice(&0x1_0000_0000u64.to_be_bytes());
        wide[8..].copy_from_slice(&0x4000_0000u64.to_be_bytes());
        assert_eq!(
            decode_reg_pair(&wide),
            Some(RegPair {
                base: 0x1_0000_0000,
                size: 0x4000_0000
            })
        );

        assert_eq!(decode_reg_pair(&[0; 4]), None);
        assert_eq!(decode_reg_pair(&[0; 12]), None);
    }

    #[test]
    fn decodes_multiple_pairs_with_layout() {
        let layout = CellLayout {
            address_cells: 2,
            size_cells: 1,
        };
        let bytes = [
            0, 0, 0, 0, 0, 0, 0, 0, 0x10, 0, 0, 0, // 0x0 + 0x1000_0000
            0, 0, 0, 1, 0, 0, 0, 0, 0x20, 0, 0, 0, // 0x1_0000_0000 + 0x2000_0000
        ];
        assert_eq!(
            decode_reg_pairs(&bytes, layout),
            Some(vec![
                RegPair {
                    base: 0,
                    size: 0x1000_0000
                },
                RegPair {
                    base: 0x1_0000_0000,
                    size: 0x2000_0000
                },
            ])
        );
        assert_eq!(decode_reg_pairs(&bytes[..20], layout), None);
        assert_eq!(decode_reg_pairs(&[], layout), None);
    }

    #[test]
    fn reads_root_layout() {
        let tree = SnapshotDeviceTree::new()
            .with_root_property("#address-cells", 2u32.to_be_bytes())
            .with_root_property("#size-cells", 2u32.to_be_bytes());
        assert_eq!(
            CellLayout::from_root(&tree).unwrap(),
            Some(CellLayout {
                address_cells: 2,
                size_cells: 2
            })
        );

        let partial =
            SnapshotDeviceTree::new().with_root_property("#address-cells", 1u32.to_be_bytes());
        assert_eq!(CellLayout::from_root(&partial).unwrap(), None);

        let odd = SnapshotDeviceTree::new()
            .with_root_property("#address-cells", 3u32.to_be_bytes())
            .with_root_property("#size-cells", 1u32.to_be_bytes());
        assert_eq!(CellLayout::from_root(&odd).unwrap(), None);

        let malformed =
            SnapshotDeviceTree::new().with_root_property("#address-cells", [0u8, 2]);
        assert!(matches!(
            CellLayout::from_root(&malformed),
            Err(ReadError::UnexpectedSize { len: 2, .. })
        ));
    }

    #[test]
    fn read_cell_reports_not_found_and_size() {
        let tree = SnapshotDeviceTree::new()
            .with_property("chosen", "linux,kernel-end", [0u8; 3]);
        assert!(read_cell(&tree, "chosen", "linux,htab-base")
            .unwrap_err()
            .is_not_found());
        assert!(matches!(
            read_cell(&tree, "chosen", "linux,kernel-end"),
            Err(ReadError::UnexpectedSize { len: 3, .. })
        ));
    }

    #[test]
    fn read_sized_cell_accepts_both_widths() {
        let tree = SnapshotDeviceTree::new()
            .with_property("chosen", "linux,initrd-start", 0x0200_0000u32.to_be_bytes())
            .with_property("chosen", "linux,initrd-end", 0x0280_0000u64.to_be_bytes())
            .with_property("chosen", "linux,bogus", [0u8; 6]);

        assert_eq!(
            read_sized_cell(&tree, "chosen", "linux,initrd-start").unwrap(),
            0x0200_0000
        );
        assert_eq!(
            read_sized_cell(&tree, "chosen", "linux,initrd-end").unwrap(),
            0x0280_0000
        );
        assert!(matches!(
            read_sized_cell(&tree, "chosen", "linux,bogus"),
            Err(ReadError::UnexpectedSize { len: 6, .. })
        ));
    }
}
