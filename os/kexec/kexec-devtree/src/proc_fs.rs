//! # Filesystem-backed device tree

use crate::{DEFAULT_DEVICE_TREE_ROOT, DeviceTree, StoreError};
use log::trace;
use std::fs;
use std::io::{self, ErrorKind, Read};
use std::path::{Path, PathBuf};

/// A device tree read from a directory hierarchy such as `/proc/device-tree`.
///
/// Nothing is cached; every call goes to the filesystem. Wrap it in a
/// [`SnapshotDeviceTree`](crate::SnapshotDeviceTree) if several passes must
/// observe the same state.
#[derive(Debug, Clone)]
pub struct ProcDeviceTree {
    root: PathBuf,
}

impl ProcDeviceTree {
    /// Open the device tree exported by the running kernel.
    ///
    /// # Errors
    /// Returns [`StoreError::Unavailable`] if [`DEFAULT_DEVICE_TREE_ROOT`] is not a
    /// readable directory.
    pub fn open_default() -> Result<Self, StoreError> {
        Self::open(DEFAULT_DEVICE_TREE_ROOT)
    }

    /// Open a device tree rooted at `root`.
    ///
    /// # Errors
    /// Returns [`StoreError::Unavailable`] if `root` is not a readable directory.
    pub fn open(root: impl AsRef<Path>) -> Result<Self, StoreError> {
        let root = root.as_ref().to_path_buf();
        let unavailable = |source| StoreError::Unavailable {
            path: root.display().to_string(),
            source,
        };

        let metadata = fs::metadata(&root).map_err(unavailable)?;
        if !metadata.is_dir() {
            return Err(unavailable(io::Error::new(
                ErrorKind::NotADirectory,
                "not a directory",
            )));
        }

        // Probe once so a permission problem surfaces here rather than mid-pass.
        drop(fs::read_dir(&root).map_err(unavailable)?);

        Ok(Self { root })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn property_path(&self, node: &str, name: &str) -> Result<PathBuf, StoreError> {
        let mut path = self.root.clone();
        if !node.is_empty() {
            path.push(checked_component(node, &self.root)?);
        }
        path.push(checked_component(name, &self.root)?);
        Ok(path)
    }

    fn read_file(path: &Path) -> Result<Vec<u8>, StoreError> {
        trace!("reading {}", path.display());
        let mut file = fs::File::open(path).map_err(|e| map_io_error(path, e))?;
        let mut buf = Vec::new();
        file.read_to_end(&mut buf)
            .map_err(|e| map_io_error(path, e))?;
        Ok(buf)
    }
}

impl DeviceTree for ProcDeviceTree {
    fn nodes(&self) -> Result<Vec<String>, StoreError> {
        let unavailable = |source| StoreError::Unavailable {
            path: self.root.display().to_string(),
            source,
        };

        let mut nodes = Vec::new();
        for entry in fs::read_dir(&self.root).map_err(unavailable)? {
            let entry = entry.map_err(unavailable)?;
            if !entry.file_type().map_err(unavailable)?.is_dir() {
                continue;
            }

            // Device tree node names are ASCII; skip anything that is not.
            match entry.file_name().into_string() {
                Ok(name) => nodes.push(name),
                Err(name) => trace!("skipping non-UTF-8 node {}", name.display()),
            }
        }

        nodes.sort_unstable();
        Ok(nodes)
    }

    fn properties(&self, node: &str) -> Result<Vec<String>, StoreError> {
        let dir = self.root.join(checked_component(node, &self.root)?);
        let mut names = Vec::new();
        for entry in fs::read_dir(&dir).map_err(|e| map_io_error(&dir, e))? {
            let entry = entry.map_err(|e| map_io_error(&dir, e))?;
            let file_type = entry.file_type().map_err(|e| map_io_error(&dir, e))?;
            if !file_type.is_file() {
                continue;
            }
            if let Ok(name) = entry.file_name().into_string() {
                names.push(name);
            }
        }

        names.sort_unstable();
        Ok(names)
    }

    fn property(&self, node: &str, name: &str) -> Result<Vec<u8>, StoreError> {
        let path = self.property_path(node, name)?;
        Self::read_file(&path)
    }

    fn property_len(&self, node: &str, name: &str) -> Result<usize, StoreError> {
        let path = self.property_path(node, name)?;
        let metadata = fs::metadata(&path).map_err(|e| map_io_error(&path, e))?;
        usize::try_from(metadata.len()).map_err(|_| StoreError::Io {
            path: path.display().to_string(),
            source: io::Error::new(ErrorKind::FileTooLarge, "property too large"),
        })
    }

    fn root_property(&self, name: &str) -> Result<Vec<u8>, StoreError> {
        self.property("", name)
    }
}

/// Reject names that would escape the node directory.
fn checked_component<'a>(component: &'a str, root: &Path) -> Result<&'a str, StoreError> {
    if component.is_empty() || component == "." || component == ".." || component.contains('/')
    {
        return Err(StoreError::NotFound {
            path: root.join(component).display().to_string(),
        });
    }
    Ok(component)
}

fn map_io_error(path: &Path, source: io::Error) -> StoreError {
    let path = path.display().to_string();
    if source.kind() == ErrorKind::NotFound {
        StoreError::NotFound { path }
    } else {
        StoreError::Io { path, source }
    }
}
