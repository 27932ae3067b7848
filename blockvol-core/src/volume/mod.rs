//! Volume identity and the attach/mount lifecycle.

pub mod device_waiter;
pub mod format_mounter;
pub mod lifecycle;
pub mod locks;
pub mod mount_point;

use crate::{VolumeError, VolumeResult};
use std::ffi::OsString;
use std::fmt;
use std::path::{Component, Path, PathBuf};

/// One logical attach target.
///
/// Fields are private so a handle cannot change once a sequence holds it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeHandle {
    volume_id: String,
    partition: Option<String>,
    read_only: bool,
    fs_type: String,
}

impl VolumeHandle {
    pub fn new(volume_id: impl Into<String>) -> VolumeResult<Self> {
        let volume_id = volume_id.into();
        validate_volume_id(&volume_id)?;
        Ok(Self {
            volume_id,
            partition: None,
            read_only: false,
            fs_type: String::new(),
        })
    }

    /// Suffix appended to the attached device path (e.g. `"1"` for `/dev/xvdf1`).
    pub fn with_partition(mut self, partition: impl Into<String>) -> VolumeResult<Self> {
        let partition = partition.into();
        if partition.contains('/') || partition.contains('\0') {
            return Err(VolumeError::InvalidVolume(format!(
                "partition suffix {:?} must not contain '/' or NUL",
                partition
            )));
        }
        self.partition = if partition.is_empty() {
            None
        } else {
            Some(partition)
        };
        Ok(self)
    }

    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    /// Empty means "whatever the format helper defaults to".
    pub fn with_fs_type(mut self, fs_type: impl Into<String>) -> Self {
        self.fs_type = fs_type.into();
        self
    }

    pub fn volume_id(&self) -> &str {
        &self.volume_id
    }

    pub fn partition(&self) -> Option<&str> {
        self.partition.as_deref()
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn fs_type(&self) -> &str {
        &self.fs_type
    }

    /// Device path for this handle given the path the provider attached the disk at.
    pub fn device_path(&self, attached: &Path) -> PathBuf {
        match &self.partition {
            Some(partition) => {
                let mut raw: OsString = attached.as_os_str().to_os_string();
                raw.push(partition);
                PathBuf::from(raw)
            }
            None => attached.to_path_buf(),
        }
    }
}

fn volume_id_to_relative(volume_id: &str) -> String {
    // aws://us-east-1a/vol-1 -> aws/us-east-1a/vol-1
    volume_id.replace("://", "/")
}

fn validate_volume_id(volume_id: &str) -> VolumeResult<()> {
    if volume_id.trim().is_empty() {
        return Err(VolumeError::InvalidVolume(
            "volume id must not be empty".to_string(),
        ));
    }
    if volume_id.contains('\0') {
        return Err(VolumeError::InvalidVolume(format!(
            "volume id {:?} contains NUL",
            volume_id
        )));
    }
    let relative = volume_id_to_relative(volume_id);
    let escapes = Path::new(&relative)
        .components()
        .any(|c| !matches!(c, Component::Normal(_)));
    if escapes {
        return Err(VolumeError::InvalidVolume(format!(
            "volume id {:?} does not map to a path below the plugin directory",
            volume_id
        )));
    }
    Ok(())
}

/// The single host-local mount point shared by every consumer of a volume.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GlobalMountPath(PathBuf);

impl GlobalMountPath {
    /// `<plugin_dir>/mounts/<volume id, "://" flattened to "/">`.
    pub fn for_volume(plugin_dir: &Path, volume_id: &str) -> Self {
        Self(
            plugin_dir
                .join("mounts")
                .join(volume_id_to_relative(volume_id)),
        )
    }

    pub fn as_path(&self) -> &Path {
        &self.0
    }
}

impl AsRef<Path> for GlobalMountPath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl fmt::Display for GlobalMountPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}
