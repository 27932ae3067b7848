//! Linux HAL implementation using real system calls.

use super::{DeviceOps, MountOps, MountOptions, ProcessOps, UnmountFlags};
use crate::procfs::mountinfo::{find_mount, parse_mountinfo};
use crate::{HalError, HalResult};
use nix::mount::{MntFlags, MsFlags};
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use std::time::Duration;
use wait_timeout::ChildExt;

const DEFAULT_MOUNTINFO: &str = "/proc/self/mountinfo";

/// Real HAL implementation for Linux systems.
#[derive(Debug, Clone)]
pub struct LinuxHal {
    mountinfo_path: PathBuf,
}

impl Default for LinuxHal {
    fn default() -> Self {
        Self::new()
    }
}

impl LinuxHal {
    pub fn new() -> Self {
        Self {
            mountinfo_path: PathBuf::from(DEFAULT_MOUNTINFO),
        }
    }

    /// Read the mount table from `path` instead of `/proc/self/mountinfo`.
    pub fn with_mountinfo(path: impl Into<PathBuf>) -> Self {
        Self {
            mountinfo_path: path.into(),
        }
    }
}

fn map_command_err(program: &str, err: std::io::Error) -> HalError {
    if err.kind() == std::io::ErrorKind::NotFound {
        return HalError::CommandNotFound(program.to_string());
    }
    HalError::Io(err)
}

fn output_with_timeout(program: &str, cmd: &mut Command, timeout: Duration) -> HalResult<Output> {
    // Avoid commands hanging waiting for input.
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    let mut child = cmd.spawn().map_err(|e| map_command_err(program, e))?;

    let mut stdout = child.stdout.take();
    let mut stderr = child.stderr.take();

    // Drain pipes concurrently to avoid deadlocks on large output.
    let stdout_handle = std::thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut out) = stdout.take() {
            let _ = out.read_to_end(&mut buf);
        }
        buf
    });
    let stderr_handle = std::thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut err) = stderr.take() {
            let _ = err.read_to_end(&mut buf);
        }
        buf
    });

    let status = match child.wait_timeout(timeout).map_err(HalError::Io)? {
        Some(status) => status,
        None => {
            let _ = child.kill();
            let _ = child.wait();
            let _ = stdout_handle.join();
            let _ = stderr_handle.join();
            return Err(HalError::CommandTimeout {
                program: program.to_string(),
                timeout_secs: timeout.as_secs(),
            });
        }
    };

    let stdout = stdout_handle.join().unwrap_or_default();
    let stderr = stderr_handle.join().unwrap_or_default();
    Ok(Output {
        status,
        stdout,
        stderr,
    })
}

fn map_nix_err(err: nix::errno::Errno) -> HalError {
    use nix::errno::Errno;
    match err {
        Errno::EBUSY => HalError::Busy,
        Errno::EACCES | Errno::EPERM => HalError::PermissionDenied,
        other => HalError::Nix(other),
    }
}

fn unmount_flags(flags: UnmountFlags) -> MntFlags {
    let mut out = MntFlags::empty();
    if flags.force {
        out |= MntFlags::MNT_FORCE;
    }
    if flags.lazy {
        out |= MntFlags::MNT_DETACH;
    }
    out
}

impl MountOps for LinuxHal {
    fn mount_device(
        &self,
        device: &Path,
        target: &Path,
        fstype: Option<&str>,
        options: &MountOptions,
    ) -> HalResult<()> {
        let mut flags = MsFlags::empty();
        if options.read_only {
            flags |= MsFlags::MS_RDONLY;
        }
        let data = options.options.as_deref();

        log::debug!(
            "mount {} -> {} (type: {:?}, flags: {:?})",
            device.display(),
            target.display(),
            fstype,
            flags
        );
        nix::mount::mount(Some(device), target, fstype, flags, data).map_err(map_nix_err)?;

        Ok(())
    }

    fn unmount(&self, target: &Path, flags: UnmountFlags) -> HalResult<()> {
        log::debug!("unmount {} ({:?})", target.display(), flags);
        nix::mount::umount2(target, unmount_flags(flags)).map_err(map_nix_err)?;
        Ok(())
    }

    fn is_mounted(&self, path: &Path) -> HalResult<bool> {
        let content = fs::read_to_string(&self.mountinfo_path)?;
        let entries = parse_mountinfo(&content);
        match find_mount(path, &entries) {
            Some(entry) => {
                log::debug!(
                    "{} is mounted from {} ({})",
                    path.display(),
                    entry.source,
                    entry.fstype
                );
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

impl DeviceOps for LinuxHal {
    fn device_present(&self, device: &Path) -> HalResult<bool> {
        match fs::metadata(device) {
            Ok(_) => Ok(true),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(HalError::Io(err)),
        }
    }
}

impl ProcessOps for LinuxHal {
    fn command_output(
        &self,
        program: &str,
        args: &[&str],
        timeout: Duration,
    ) -> HalResult<Output> {
        let mut cmd = Command::new(program);
        cmd.args(args);
        output_with_timeout(program, &mut cmd, timeout)
    }
}
