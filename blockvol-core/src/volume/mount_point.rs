//! Global mount directory management.
//!
//! The mount table is the only record that a volume is mounted; nothing is cached here, so a
//! restarted process sees exactly what the kernel reports.

use crate::{HalError, VolumeError, VolumeResult};
use blockvol_hal::MountOps;
use std::fs::{self, DirBuilder};
use std::io;
use std::os::unix::fs::DirBuilderExt;
use std::path::Path;

/// Owner-only rwx.
pub const GLOBAL_DIR_MODE: u32 = 0o700;

/// What [`MountPointManager::ensure_global_dir`] found at the global path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlobalDir {
    pub already_mounted: bool,
    /// The directory did not exist and was created by this call.
    pub created: bool,
}

pub struct MountPointManager<'a, M: MountOps + ?Sized> {
    mounter: &'a M,
}

impl<'a, M: MountOps + ?Sized> MountPointManager<'a, M> {
    pub fn new(mounter: &'a M) -> Self {
        Self { mounter }
    }

    /// Make sure `path` exists as a directory and report whether it is already a mount point.
    ///
    /// A freshly created directory is never mounted, so the mount table is only consulted
    /// for pre-existing paths. Only a directory reported as `created` may be removed again
    /// by the caller on failure.
    pub fn ensure_global_dir(&self, path: &Path) -> VolumeResult<GlobalDir> {
        match fs::metadata(path) {
            Ok(meta) if meta.is_dir() => {
                let already_mounted = self.mounter.is_mounted(path).map_err(|cause| {
                    VolumeError::MountPointQueryFailed {
                        path: path.to_path_buf(),
                        cause,
                    }
                })?;
                Ok(GlobalDir {
                    already_mounted,
                    created: false,
                })
            }
            Ok(_) => Err(VolumeError::DirectoryCreateFailed {
                path: path.to_path_buf(),
                cause: io::Error::new(
                    io::ErrorKind::AlreadyExists,
                    "path exists and is not a directory",
                ),
            }),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                DirBuilder::new()
                    .recursive(true)
                    .mode(GLOBAL_DIR_MODE)
                    .create(path)
                    .map_err(|cause| VolumeError::DirectoryCreateFailed {
                        path: path.to_path_buf(),
                        cause,
                    })?;
                log::debug!("created global mount dir {}", path.display());
                Ok(GlobalDir {
                    already_mounted: false,
                    created: true,
                })
            }
            Err(err) => Err(VolumeError::MountPointQueryFailed {
                path: path.to_path_buf(),
                cause: HalError::Io(err),
            }),
        }
    }
}

/// Remove an (empty) global mount directory.
///
/// Uses `remove_dir`, never a recursive delete: a non-empty directory means something is
/// still mounted or was written underneath and must not be discarded.
pub fn remove_global_dir(path: &Path) -> io::Result<()> {
    fs::remove_dir(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use blockvol_hal::{FailPoint, FakeHal, Operation};
    use std::os::unix::fs::PermissionsExt;
    use tempfile::tempdir;

    #[test]
    fn creates_missing_dir_owner_only() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("mounts/vol-1");
        let hal = FakeHal::new();

        let state = MountPointManager::new(&hal).ensure_global_dir(&path).unwrap();

        assert!(!state.already_mounted);
        assert!(state.created);
        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, GLOBAL_DIR_MODE);
        // New directories are never queried against the mount table.
        assert!(!hal.has_operation(|op| matches!(op, Operation::IsMounted { .. })));
    }

    #[test]
    fn existing_dir_reports_mount_state() {
        let dir = tempdir().unwrap();
        let hal = FakeHal::new();
        let manager = MountPointManager::new(&hal);

        let state = manager.ensure_global_dir(dir.path()).unwrap();
        assert!(!state.already_mounted);
        assert!(!state.created);
        hal.set_mounted(dir.path());
        assert!(manager.ensure_global_dir(dir.path()).unwrap().already_mounted);
    }

    #[test]
    fn query_failure_is_surfaced() {
        let dir = tempdir().unwrap();
        let hal = FakeHal::new();
        hal.fail_at(FailPoint::IsMounted);

        let err = MountPointManager::new(&hal)
            .ensure_global_dir(dir.path())
            .unwrap_err();
        assert!(matches!(err, VolumeError::MountPointQueryFailed { .. }));
    }

    #[test]
    fn file_in_the_way_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("vol-1");
        fs::write(&path, b"").unwrap();
        let hal = FakeHal::new();

        let err = MountPointManager::new(&hal)
            .ensure_global_dir(&path)
            .unwrap_err();
        assert!(matches!(err, VolumeError::DirectoryCreateFailed { .. }));
    }

    #[test]
    fn remove_refuses_non_empty_dir() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("vol-1");
        fs::create_dir(&path).unwrap();
        fs::write(path.join("data"), b"x").unwrap();

        assert!(remove_global_dir(&path).is_err());
        fs::remove_file(path.join("data")).unwrap();
        remove_global_dir(&path).unwrap();
        assert!(!path.exists());
    }
}
