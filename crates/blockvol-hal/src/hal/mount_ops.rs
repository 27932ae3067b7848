//! Mount operations trait.

use crate::HalResult;
use std::path::Path;

/// Trait for mounting and unmounting filesystems.
pub trait MountOps {
    /// Mount a device to a target path.
    ///
    /// # Arguments
    /// * `device` - Device path (e.g., `/dev/xvdf`)
    /// * `target` - Mount point path
    /// * `fstype` - Optional filesystem type (e.g., `"ext4"`)
    /// * `options` - Mount flags and data
    fn mount_device(
        &self,
        device: &Path,
        target: &Path,
        fstype: Option<&str>,
        options: &MountOptions,
    ) -> HalResult<()>;

    /// Unmount a filesystem.
    fn unmount(&self, target: &Path, flags: UnmountFlags) -> HalResult<()>;

    /// Check if a path is currently a mount point.
    fn is_mounted(&self, path: &Path) -> HalResult<bool>;
}

/// Mount options and flags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MountOptions {
    /// Mount the filesystem read-only.
    pub read_only: bool,
    /// Filesystem-specific data as a comma-separated string (e.g., "noatime,discard")
    pub options: Option<String>,
}

impl MountOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read_only() -> Self {
        Self {
            read_only: true,
            options: None,
        }
    }

    pub fn with_options(mut self, options: impl Into<String>) -> Self {
        let options = options.into();
        self.options = if options.is_empty() {
            None
        } else {
            Some(options)
        };
        self
    }
}

/// Flags for unmounting. The default is a plain unmount.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UnmountFlags {
    /// Force unmount even if busy (MNT_FORCE).
    pub force: bool,
    /// Detach lazily (MNT_DETACH).
    pub lazy: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_options_string_is_dropped() {
        let opts = MountOptions::new().with_options("");
        assert_eq!(opts.options, None);

        let opts = MountOptions::read_only().with_options("noatime");
        assert!(opts.read_only);
        assert_eq!(opts.options.as_deref(), Some("noatime"));
    }
}
