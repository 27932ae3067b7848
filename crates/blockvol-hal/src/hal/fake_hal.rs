//! Fake HAL implementation for testing.
//!
//! This implementation records all operations without executing them,
//! allowing for CI-safe testing without root privileges or real hardware.

use super::{DeviceOps, MountOps, MountOptions, ProcessOps, UnmountFlags, VolumeOps};
use crate::{HalError, HalResult};
use std::collections::{HashMap, HashSet};
#[cfg(unix)]
use std::os::unix::process::ExitStatusExt;
use std::path::{Path, PathBuf};
use std::process::Output;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Operation records for testing and verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    AttachDisk {
        volume_id: String,
        read_only: bool,
    },
    DetachDisk {
        volume_id: String,
    },
    Mount {
        device: PathBuf,
        target: PathBuf,
        fstype: Option<String>,
        read_only: bool,
    },
    Unmount {
        target: PathBuf,
    },
    IsMounted {
        path: PathBuf,
    },
    DeviceProbe {
        device: PathBuf,
    },
    Command {
        program: String,
        args: Vec<String>,
        timeout_secs: u64,
    },
}

/// Operations that can be forced to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailPoint {
    Attach,
    Detach,
    Mount,
    Unmount,
    IsMounted,
    DeviceProbe,
    Command,
}

/// Canned result for an external command.
#[derive(Debug, Clone, Default)]
pub struct FakeCommandResult {
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl FakeCommandResult {
    pub fn failure(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            code,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }
}

/// Shared state for FakeHal operations.
#[derive(Debug, Clone, Default)]
struct FakeHalState {
    /// All operations that were recorded
    operations: Vec<Operation>,
    /// Currently mounted paths
    mounted_paths: HashSet<PathBuf>,
    /// Device path returned by attach, per volume
    attach_devices: HashMap<String, PathBuf>,
    /// Known device nodes and how many probes still miss before they appear
    devices: HashMap<PathBuf, u32>,
    /// Canned command results keyed by program
    command_results: HashMap<String, FakeCommandResult>,
    failures: HashSet<FailPoint>,
}

/// Fake HAL implementation that records operations without executing them.
///
/// This is designed for testing and CI environments where real system
/// operations would fail or be dangerous.
#[derive(Debug, Clone, Default)]
pub struct FakeHal {
    state: Arc<Mutex<FakeHalState>>,
}

impl FakeHal {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(FakeHalState::default())),
        }
    }

    /// Get all recorded operations.
    pub fn operations(&self) -> Vec<Operation> {
        self.state.lock().unwrap().operations.clone()
    }

    /// Get the number of operations recorded.
    pub fn operation_count(&self) -> usize {
        self.state.lock().unwrap().operations.len()
    }

    /// Check if a specific operation was recorded.
    pub fn has_operation(&self, check: impl Fn(&Operation) -> bool) -> bool {
        self.state.lock().unwrap().operations.iter().any(check)
    }

    /// Count recorded operations matching `check`.
    pub fn count_operations(&self, check: impl Fn(&Operation) -> bool) -> usize {
        self.state
            .lock()
            .unwrap()
            .operations
            .iter()
            .filter(|op| check(op))
            .count()
    }

    /// Clear all recorded operations and simulated state.
    pub fn clear(&self) {
        *self.state.lock().unwrap() = FakeHalState::default();
    }

    /// Make `attach_disk(volume_id, ..)` return `device`.
    pub fn set_attach_device(&self, volume_id: impl Into<String>, device: impl Into<PathBuf>) {
        self.state
            .lock()
            .unwrap()
            .attach_devices
            .insert(volume_id.into(), device.into());
    }

    /// Register a device node that is present on the first probe.
    pub fn add_device(&self, device: impl Into<PathBuf>) {
        self.add_device_after_probes(device, 0);
    }

    /// Register a device node that is missing for the first `misses` probes.
    pub fn add_device_after_probes(&self, device: impl Into<PathBuf>, misses: u32) {
        self.state
            .lock()
            .unwrap()
            .devices
            .insert(device.into(), misses);
    }

    /// Mark `path` as an active mount point.
    pub fn set_mounted(&self, path: impl Into<PathBuf>) {
        self.state.lock().unwrap().mounted_paths.insert(path.into());
    }

    pub fn set_command_result(&self, program: impl Into<String>, result: FakeCommandResult) {
        self.state
            .lock()
            .unwrap()
            .command_results
            .insert(program.into(), result);
    }

    /// Force every subsequent call at `point` to fail.
    pub fn fail_at(&self, point: FailPoint) {
        self.state.lock().unwrap().failures.insert(point);
    }

    fn check_failure(&self, point: FailPoint) -> HalResult<()> {
        if self.state.lock().unwrap().failures.contains(&point) {
            log::info!("FAKE HAL: injected {:?} failure", point);
            return Err(HalError::Other(format!("injected {:?} failure", point)));
        }
        Ok(())
    }

    fn record_operation(&self, op: Operation) {
        self.state.lock().unwrap().operations.push(op);
    }
}

impl VolumeOps for FakeHal {
    fn attach_disk(&self, volume_id: &str, read_only: bool) -> HalResult<PathBuf> {
        log::info!("FAKE HAL: attach {} (read_only: {})", volume_id, read_only);
        self.record_operation(Operation::AttachDisk {
            volume_id: volume_id.to_string(),
            read_only,
        });
        self.check_failure(FailPoint::Attach)?;

        self.state
            .lock()
            .unwrap()
            .attach_devices
            .get(volume_id)
            .cloned()
            .ok_or_else(|| HalError::Provider(format!("unknown volume {}", volume_id)))
    }

    fn detach_disk(&self, volume_id: &str) -> HalResult<()> {
        log::info!("FAKE HAL: detach {}", volume_id);
        self.record_operation(Operation::DetachDisk {
            volume_id: volume_id.to_string(),
        });
        self.check_failure(FailPoint::Detach)
    }
}

impl DeviceOps for FakeHal {
    fn device_present(&self, device: &Path) -> HalResult<bool> {
        self.record_operation(Operation::DeviceProbe {
            device: device.to_path_buf(),
        });
        self.check_failure(FailPoint::DeviceProbe)?;

        let mut state = self.state.lock().unwrap();
        let present = match state.devices.get_mut(device) {
            Some(0) => true,
            Some(misses) => {
                *misses -= 1;
                false
            }
            None => false,
        };
        log::info!(
            "FAKE HAL: device_present({}) = {}",
            device.display(),
            present
        );
        Ok(present)
    }
}

impl ProcessOps for FakeHal {
    fn command_output(
        &self,
        program: &str,
        args: &[&str],
        timeout: Duration,
    ) -> HalResult<Output> {
        log::info!("FAKE HAL: exec {} {:?}", program, args);
        self.record_operation(Operation::Command {
            program: program.to_string(),
            args: args.iter().map(|s| s.to_string()).collect(),
            timeout_secs: timeout.as_secs(),
        });
        if self.state.lock().unwrap().failures.contains(&FailPoint::Command) {
            return Err(HalError::CommandNotFound(program.to_string()));
        }

        let result = self
            .state
            .lock()
            .unwrap()
            .command_results
            .get(program)
            .cloned()
            .unwrap_or_default();

        #[cfg(unix)]
        let status = std::process::ExitStatus::from_raw((result.code & 0xff) << 8);
        #[cfg(not(unix))]
        let status = std::process::Command::new("true").status().unwrap();

        Ok(Output {
            status,
            stdout: result.stdout.into_bytes(),
            stderr: result.stderr.into_bytes(),
        })
    }
}

impl MountOps for FakeHal {
    fn mount_device(
        &self,
        device: &Path,
        target: &Path,
        fstype: Option<&str>,
        options: &MountOptions,
    ) -> HalResult<()> {
        log::info!(
            "FAKE HAL: mount {} -> {} (type: {:?}, ro: {})",
            device.display(),
            target.display(),
            fstype,
            options.read_only
        );

        self.record_operation(Operation::Mount {
            device: device.to_path_buf(),
            target: target.to_path_buf(),
            fstype: fstype.map(String::from),
            read_only: options.read_only,
        });
        self.check_failure(FailPoint::Mount)?;
        self.set_mounted(target);

        Ok(())
    }

    fn unmount(&self, target: &Path, _flags: UnmountFlags) -> HalResult<()> {
        log::info!("FAKE HAL: unmount {}", target.display());

        self.record_operation(Operation::Unmount {
            target: target.to_path_buf(),
        });
        self.check_failure(FailPoint::Unmount)?;
        self.state.lock().unwrap().mounted_paths.remove(target);

        Ok(())
    }

    fn is_mounted(&self, path: &Path) -> HalResult<bool> {
        self.record_operation(Operation::IsMounted {
            path: path.to_path_buf(),
        });
        self.check_failure(FailPoint::IsMounted)?;
        let is_mounted = self.state.lock().unwrap().mounted_paths.contains(path);
        log::info!("FAKE HAL: is_mounted({}) = {}", path.display(), is_mounted);
        Ok(is_mounted)
    }
}
