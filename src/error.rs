//! Errors reported by memory regions.

use crate::backing::AllocFailure;
use crate::config::ConfigError;
use thiserror::Error;

/// A resize which could not be satisfied.
///
/// A failed resize leaves the region exactly as it was: same size, same
/// buffer contents, same view generation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GrowthError {
    /// The request exceeds the ceiling of the region. Retrying is pointless.
    #[error("requested {requested} bytes, but the region is limited to {max} bytes")]
    RequestExceedsMax { requested: u64, max: u64 },
    /// The backing allocator rejected every target size tried.
    #[error(
        "could not grow region from {current} to {requested} bytes: \
         {attempts} allocation attempts failed"
    )]
    AllocationFailed {
        requested: u64,
        current: u64,
        attempts: u32,
    },
}

impl GrowthError {
    /// Requested region size in bytes.
    pub fn requested(&self) -> u64 {
        match *self {
            Self::RequestExceedsMax { requested, .. } | Self::AllocationFailed { requested, .. } => {
                requested
            }
        }
    }

    /// Returns `true` if a later attempt to grow may succeed, e.g. after
    /// memory was released elsewhere.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::AllocationFailed { .. })
    }
}

/// Could not create a memory region.
#[derive(Debug, Clone, Error)]
pub enum CreateError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(#[from] ConfigError),
    #[error("could not allocate the initial buffer")]
    Allocation(#[source] AllocFailure),
}
