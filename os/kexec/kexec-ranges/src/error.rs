use crate::list::AllocationError;
use crate::reader::ReadError;
use kexec_devtree::StoreError;

/// Everything that can abort a memory range discovery.
///
/// None of these are retried: the device tree is a snapshot and reading it
/// again cannot turn a missing or malformed property into a valid one.
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error("device tree is unavailable")]
    StoreUnavailable(#[source] StoreError),
    #[error("failed to read required property {path}")]
    NodeReadFailure {
        path: String,
        #[source]
        source: StoreError,
    },
    #[error("property {path} has an unexpected size of {len} bytes")]
    UnexpectedPropertySize { path: String, len: usize },
    #[error("no memory nodes found in the device tree")]
    NoMemoryNodes,
    #[error("memory range allocation failure")]
    AllocationFailure(#[from] AllocationError),
    #[error("{node}: region {start:#x}+{size:#x} exceeds the address space")]
    RegionOverflow { node: String, start: u64, size: u64 },
    #[error("{node}: region end {end:#x} lies below its start {start:#x}")]
    InvertedRegion { node: String, start: u64, end: u64 },
}

impl From<ReadError> for DiscoveryError {
    fn from(value: ReadError) -> Self {
        match value {
            ReadError::NotFound(source) | ReadError::Io(source) => match source {
                StoreError::Unavailable { .. } => Self::StoreUnavailable(source),
                source => Self::NodeReadFailure {
                    path: source.path().to_owned(),
                    source,
                },
            },
            ReadError::UnexpectedSize { path, len } => Self::UnexpectedPropertySize { path, len },
        }
    }
}
