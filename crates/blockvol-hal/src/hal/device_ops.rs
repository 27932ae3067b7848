//! Device node probing.

use crate::HalResult;
use std::path::Path;

/// Trait for checking whether a device node exists on the host.
pub trait DeviceOps {
    /// Returns `Ok(false)` when the node does not exist (yet).
    ///
    /// Any other failure (permissions, I/O) is an error, not "absent".
    fn device_present(&self, device: &Path) -> HalResult<bool>;
}
