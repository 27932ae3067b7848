use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub type HalResult<T> = Result<T, HalError>;
pub type VolumeResult<T> = Result<T, VolumeError>;

/// Failures reported by a capability backend (real or fake).
#[derive(Error, Debug)]
pub enum HalError {
    #[error("Device or mount point is busy")]
    Busy,

    #[error("Permission denied")]
    PermissionDenied,

    #[error("Command not found: {0}")]
    CommandNotFound(String),

    #[error("Command failed: {program} (exit={code:?}): {output}")]
    CommandFailed {
        program: String,
        code: Option<i32>,
        output: String,
    },

    #[error("Command timed out: {program} after {timeout_secs}s")]
    CommandTimeout { program: String, timeout_secs: u64 },

    #[error("Volume provider error: {0}")]
    Provider(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("nix errno: {0}")]
    Nix(#[from] nix::errno::Errno),

    #[error("{0}")]
    Other(String),
}

/// Terminal outcome of one attach or detach step.
#[derive(Error, Debug)]
pub enum VolumeError {
    #[error("Invalid volume: {0}")]
    InvalidVolume(String),

    #[error("Attach of volume {volume_id} failed: {cause}")]
    AttachFailed {
        volume_id: String,
        #[source]
        cause: HalError,
    },

    #[error("Could not attach disk: timeout after {attempts} attempts ({})", .device.display())]
    AttachTimeout { device: PathBuf, attempts: u32 },

    #[error("Failed to probe device {}: {cause}", .device.display())]
    DeviceProbeFailed {
        device: PathBuf,
        #[source]
        cause: HalError,
    },

    #[error("Failed to query mount point {}: {cause}", .path.display())]
    MountPointQueryFailed {
        path: PathBuf,
        #[source]
        cause: HalError,
    },

    #[error("Failed to create directory {}: {cause}", .path.display())]
    DirectoryCreateFailed {
        path: PathBuf,
        #[source]
        cause: io::Error,
    },

    #[error("Failed to format/mount {} at {}: {cause}", .device.display(), .target.display())]
    FormatOrMountFailed {
        device: PathBuf,
        target: PathBuf,
        /// Combined stdout and stderr of the helper, empty for direct mounts.
        output: String,
        #[source]
        cause: HalError,
    },

    #[error("Failed to unmount {}: {cause}", .path.display())]
    UnmountFailed {
        path: PathBuf,
        #[source]
        cause: HalError,
    },

    #[error("Failed to remove directory {}: {cause}", .path.display())]
    RemoveDirFailed {
        path: PathBuf,
        #[source]
        cause: io::Error,
    },

    #[error("Detach of volume {volume_id} failed: {cause}")]
    DetachFailed {
        volume_id: String,
        #[source]
        cause: HalError,
    },
}

impl VolumeError {
    /// True for errors where retrying the whole sequence later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            VolumeError::AttachFailed { .. }
                | VolumeError::AttachTimeout { .. }
                | VolumeError::DetachFailed { .. }
        )
    }
}
