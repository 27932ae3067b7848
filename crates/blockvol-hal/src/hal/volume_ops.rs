//! Remote volume provider operations (cloud block storage attach/detach).

use crate::HalResult;
use std::path::PathBuf;

/// Trait for the remote attach/detach API.
///
/// No real implementation lives in this crate; the cloud integration provides one.
pub trait VolumeOps {
    /// Attach `volume_id` to this host and return the device path it will appear at.
    fn attach_disk(&self, volume_id: &str, read_only: bool) -> HalResult<PathBuf>;

    /// Detach `volume_id` from this host.
    fn detach_disk(&self, volume_id: &str) -> HalResult<()>;
}
