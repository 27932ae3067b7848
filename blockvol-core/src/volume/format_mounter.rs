//! Format-on-first-use mounting.
//!
//! Writable mounts go through an external helper that probes the device, formats it if it has
//! no filesystem yet and then mounts it. Read-only mounts skip the helper entirely and go
//! straight to the underlying [`MountOps`], so a read-only volume is never written to.

use crate::{HalError, VolumeError, VolumeResult};
use blockvol_hal::hal::process_ops::combined_output;
use blockvol_hal::{MountOps, MountOptions, ProcessOps};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_FORMAT_HELPER: &str = "/usr/share/google/safe_format_and_mount";
/// Filesystem the helper creates unless told otherwise with `-m`.
pub const DEFAULT_FS_TYPE: &str = "ext4";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatHelper {
    pub program: String,
    pub timeout: Duration,
}

impl Default for FormatHelper {
    fn default() -> Self {
        Self {
            program: DEFAULT_FORMAT_HELPER.to_string(),
            timeout: Duration::from_secs(10 * 60),
        }
    }
}

impl FormatHelper {
    /// `[-m mkfs.<fs_type>] <source> <target>`
    pub fn args(&self, source: &Path, target: &Path, fs_type: &str) -> Vec<String> {
        let mut args = Vec::new();
        if !fs_type.is_empty() && fs_type != DEFAULT_FS_TYPE {
            args.push("-m".to_string());
            args.push(format!("mkfs.{}", fs_type));
        }
        args.push(source.display().to_string());
        args.push(target.display().to_string());
        args
    }
}

/// Wraps a mount backend with the format-and-mount helper.
pub struct FormatMounter<'a, H: MountOps + ProcessOps + ?Sized> {
    hal: &'a H,
    helper: &'a FormatHelper,
}

impl<'a, H: MountOps + ProcessOps + ?Sized> FormatMounter<'a, H> {
    pub fn new(hal: &'a H, helper: &'a FormatHelper) -> Self {
        Self { hal, helper }
    }

    pub fn mount(
        &self,
        source: &Path,
        target: &Path,
        fs_type: &str,
        read_only: bool,
        options: &str,
    ) -> VolumeResult<()> {
        if read_only {
            let fstype = if fs_type.is_empty() {
                None
            } else {
                Some(fs_type)
            };
            let opts = MountOptions::read_only().with_options(options);
            return self
                .hal
                .mount_device(source, target, fstype, &opts)
                .map_err(|cause| VolumeError::FormatOrMountFailed {
                    device: source.to_path_buf(),
                    target: target.to_path_buf(),
                    output: String::new(),
                    cause,
                });
        }

        if !options.is_empty() {
            log::debug!(
                "{} does not take mount options; ignoring {:?}",
                self.helper.program,
                options
            );
        }

        let args = self.helper.args(source, target, fs_type);
        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        log::debug!("exec-ing: {} {:?}", self.helper.program, args);

        let output = self
            .hal
            .command_output(&self.helper.program, &arg_refs, self.helper.timeout)
            .map_err(|cause| VolumeError::FormatOrMountFailed {
                device: source.to_path_buf(),
                target: target.to_path_buf(),
                output: String::new(),
                cause,
            })?;

        if !output.status.success() {
            let text = combined_output(&output);
            log::warn!(
                "error running {} (exit={:?})\n{}",
                self.helper.program,
                output.status.code(),
                text
            );
            return Err(VolumeError::FormatOrMountFailed {
                device: source.to_path_buf(),
                target: target.to_path_buf(),
                output: text.clone(),
                cause: HalError::CommandFailed {
                    program: self.helper.program.clone(),
                    code: output.status.code(),
                    output: text,
                },
            });
        }

        Ok(())
    }
}
