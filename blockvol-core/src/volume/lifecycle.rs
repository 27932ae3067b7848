//! Attach+mount and unmount+detach sequences.
//!
//! Attach: provider attach → wait for device → ensure global dir → format/mount.
//! Detach: unmount → remove global dir → provider detach.
//!
//! Both sequences stop at the first failing step and return that step's error. The only
//! error that is logged and dropped is the cleanup of the global directory after a failed
//! mount, because the mount error is the one the caller needs. That cleanup only touches a
//! directory the same attach created.

use super::device_waiter::DeviceWaiter;
use super::format_mounter::{FormatHelper, FormatMounter};
use super::mount_point::{remove_global_dir, MountPointManager};
use super::{GlobalMountPath, VolumeHandle};
use crate::clock::{Clock, SystemClock};
use crate::config::LifecycleConfig;
use crate::{HalError, VolumeError, VolumeResult};
use blockvol_hal::{HostHal, UnmountFlags, VolumeOps};
use std::fs;
use std::io;
use std::path::PathBuf;

/// Result of a successful attach.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachOutcome {
    /// Device node the volume is reachable at (partition suffix included).
    pub device: PathBuf,
    pub global_path: GlobalMountPath,
    /// The global path was already a mount point, so nothing was mounted by this call.
    pub already_mounted: bool,
}

pub struct VolumeLifecycleManager<P, H, C = SystemClock>
where
    P: VolumeOps,
    H: HostHal,
    C: Clock,
{
    provider: P,
    hal: H,
    clock: C,
    config: LifecycleConfig,
    helper: FormatHelper,
}

impl<P: VolumeOps, H: HostHal> VolumeLifecycleManager<P, H, SystemClock> {
    pub fn new(provider: P, hal: H, config: LifecycleConfig) -> Self {
        Self::with_clock(provider, hal, SystemClock, config)
    }
}

impl<P: VolumeOps, H: HostHal, C: Clock> VolumeLifecycleManager<P, H, C> {
    pub fn with_clock(provider: P, hal: H, clock: C, config: LifecycleConfig) -> Self {
        let helper = config.format_helper();
        Self {
            provider,
            hal,
            clock,
            config,
            helper,
        }
    }

    pub fn config(&self) -> &LifecycleConfig {
        &self.config
    }

    pub fn global_path(&self, handle: &VolumeHandle) -> GlobalMountPath {
        GlobalMountPath::for_volume(&self.config.plugin_dir, handle.volume_id())
    }

    /// Attach `handle` to this host and mount it at its global path.
    ///
    /// Calling this again for a volume that is already mounted is a no-op at the mount step.
    pub fn attach(&self, handle: &VolumeHandle) -> VolumeResult<AttachOutcome> {
        let volume_id = handle.volume_id();
        let global_path = self.global_path(handle);

        log::info!(
            "attaching volume {} (read_only: {})",
            volume_id,
            handle.is_read_only()
        );
        let attached = self
            .provider
            .attach_disk(volume_id, handle.is_read_only())
            .map_err(|cause| {
                log::warn!("attach of volume {} failed: {}", volume_id, cause);
                VolumeError::AttachFailed {
                    volume_id: volume_id.to_string(),
                    cause,
                }
            })?;
        let device = handle.device_path(&attached);

        let state = DeviceWaiter::new(&self.hal, &self.clock, self.config.device_poll)
            .wait_for_device(&device)?;

        let dir = MountPointManager::new(&self.hal).ensure_global_dir(global_path.as_path())?;
        let already_mounted = dir.already_mounted;
        if already_mounted {
            log::info!(
                "volume {} already mounted at {}; skipping mount",
                volume_id,
                global_path
            );
            return Ok(AttachOutcome {
                device: state.device_path,
                global_path,
                already_mounted,
            });
        }

        let fs_type = self.config.resolve_fs_type(handle.fs_type());
        let mounter = FormatMounter::new(&self.hal, &self.helper);
        if let Err(err) = mounter.mount(
            &state.device_path,
            global_path.as_path(),
            fs_type,
            handle.is_read_only(),
            "",
        ) {
            if !dir.created {
                log::debug!("leaving pre-existing {} in place", global_path);
            } else if let Err(cleanup) = remove_global_dir(global_path.as_path()) {
                log::warn!(
                    "failed to remove {} after mount failure: {}",
                    global_path,
                    cleanup
                );
            }
            return Err(err);
        }

        log::info!(
            "volume {} mounted: {} -> {}",
            volume_id,
            state.device_path.display(),
            global_path
        );
        Ok(AttachOutcome {
            device: state.device_path,
            global_path,
            already_mounted,
        })
    }

    /// Unmount the global path of `handle` and detach the volume from this host.
    pub fn detach(&self, handle: &VolumeHandle) -> VolumeResult<()> {
        let volume_id = handle.volume_id();
        let global_path = self.global_path(handle);

        // The global mount should be the only one.
        if let Err(cause) = self
            .hal
            .unmount(global_path.as_path(), UnmountFlags::default())
        {
            log::warn!(
                "error unmounting {} (volume {}): {}",
                global_path,
                volume_id,
                cause
            );
            return Err(VolumeError::UnmountFailed {
                path: global_path.as_path().to_path_buf(),
                cause,
            });
        }

        if let Err(cause) = remove_global_dir(global_path.as_path()) {
            log::warn!(
                "error removing dir {} (volume {}): {}",
                global_path,
                volume_id,
                cause
            );
            return Err(VolumeError::RemoveDirFailed {
                path: global_path.as_path().to_path_buf(),
                cause,
            });
        }

        if let Err(cause) = self.provider.detach_disk(volume_id) {
            log::warn!("error detaching volume {}: {}", volume_id, cause);
            return Err(VolumeError::DetachFailed {
                volume_id: volume_id.to_string(),
                cause,
            });
        }

        log::info!("volume {} detached", volume_id);
        Ok(())
    }

    /// Whether the global path of `handle` is currently a mount point, straight from the OS.
    pub fn is_mounted(&self, handle: &VolumeHandle) -> VolumeResult<bool> {
        let global_path = self.global_path(handle);
        match fs::metadata(global_path.as_path()) {
            Ok(_) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(err) => {
                return Err(VolumeError::MountPointQueryFailed {
                    path: global_path.as_path().to_path_buf(),
                    cause: HalError::Io(err),
                })
            }
        }
        self.hal
            .is_mounted(global_path.as_path())
            .map_err(|cause| VolumeError::MountPointQueryFailed {
                path: global_path.as_path().to_path_buf(),
                cause,
            })
    }
}
