//! Wait for a device node to show up after the provider attached a disk.

use crate::clock::Clock;
use crate::{VolumeError, VolumeResult};
use blockvol_hal::DeviceOps;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// How often and how many times to probe for a device node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PollPolicy {
    pub attempts: u32,
    pub interval_ms: u64,
}

impl Default for PollPolicy {
    /// 10 probes, one second apart.
    fn default() -> Self {
        Self {
            attempts: 10,
            interval_ms: 1000,
        }
    }
}

impl PollPolicy {
    pub fn new(attempts: u32, interval: Duration) -> Self {
        Self {
            attempts,
            interval_ms: u64::try_from(interval.as_millis()).unwrap_or(u64::MAX),
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// A device node observed on the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceState {
    pub device_path: PathBuf,
    pub present: bool,
}

pub struct DeviceWaiter<'a, D: DeviceOps + ?Sized, C: Clock + ?Sized> {
    devices: &'a D,
    clock: &'a C,
    policy: PollPolicy,
}

impl<'a, D: DeviceOps + ?Sized, C: Clock + ?Sized> DeviceWaiter<'a, D, C> {
    pub fn new(devices: &'a D, clock: &'a C, policy: PollPolicy) -> Self {
        Self {
            devices,
            clock,
            policy,
        }
    }

    /// Probe for `device` until it exists or the attempt budget runs out.
    ///
    /// A probe error other than "not found" aborts immediately with `DeviceProbeFailed`.
    /// Running out of attempts yields `AttachTimeout`. No sleep follows the last probe.
    pub fn wait_for_device(&self, device: &Path) -> VolumeResult<DeviceState> {
        let attempts = self.policy.attempts.max(1);
        let mut tries = 0;
        loop {
            let present = self.devices.device_present(device).map_err(|cause| {
                VolumeError::DeviceProbeFailed {
                    device: device.to_path_buf(),
                    cause,
                }
            })?;
            tries += 1;
            if present {
                log::debug!("device {} present after {} probe(s)", device.display(), tries);
                return Ok(DeviceState {
                    device_path: device.to_path_buf(),
                    present,
                });
            }
            if tries >= attempts {
                log::warn!(
                    "device {} did not appear after {} probe(s)",
                    device.display(),
                    tries
                );
                return Err(VolumeError::AttachTimeout {
                    device: device.to_path_buf(),
                    attempts: tries,
                });
            }
            self.clock.sleep(self.policy.interval());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FakeClock;
    use blockvol_hal::{FailPoint, FakeHal, Operation};

    fn probes(hal: &FakeHal) -> usize {
        hal.count_operations(|op| matches!(op, Operation::DeviceProbe { .. }))
    }

    #[test]
    fn present_device_needs_no_sleep() {
        let hal = FakeHal::new();
        let clock = FakeClock::new();
        hal.add_device("/dev/xvdf");

        let state = DeviceWaiter::new(&hal, &clock, PollPolicy::default())
            .wait_for_device(Path::new("/dev/xvdf"))
            .unwrap();

        assert!(state.present);
        assert_eq!(probes(&hal), 1);
        assert_eq!(clock.sleep_count(), 0);
    }

    #[test]
    fn device_appearing_on_third_probe() {
        let hal = FakeHal::new();
        let clock = FakeClock::new();
        hal.add_device_after_probes("/dev/xvdf", 2);

        DeviceWaiter::new(&hal, &clock, PollPolicy::default())
            .wait_for_device(Path::new("/dev/xvdf"))
            .unwrap();

        assert_eq!(probes(&hal), 3);
        assert_eq!(clock.sleep_count(), 2);
        assert_eq!(clock.total_slept(), Duration::from_secs(2));
    }

    #[test]
    fn times_out_after_exactly_n_probes() {
        let hal = FakeHal::new();
        let clock = FakeClock::new();

        let err = DeviceWaiter::new(&hal, &clock, PollPolicy::default())
            .wait_for_device(Path::new("/dev/xvdf"))
            .unwrap_err();

        match err {
            VolumeError::AttachTimeout { device, attempts } => {
                assert_eq!(device, PathBuf::from("/dev/xvdf"));
                assert_eq!(attempts, 10);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(probes(&hal), 10);
        assert_eq!(clock.sleep_count(), 9);
    }

    #[test]
    fn device_on_last_allowed_probe_succeeds() {
        let hal = FakeHal::new();
        let clock = FakeClock::new();
        hal.add_device_after_probes("/dev/xvdf", 2);

        let policy = PollPolicy::new(3, Duration::from_millis(10));
        assert!(DeviceWaiter::new(&hal, &clock, policy)
            .wait_for_device(Path::new("/dev/xvdf"))
            .is_ok());
    }

    #[test]
    fn probe_errors_are_not_retried() {
        let hal = FakeHal::new();
        let clock = FakeClock::new();
        hal.fail_at(FailPoint::DeviceProbe);

        let err = DeviceWaiter::new(&hal, &clock, PollPolicy::default())
            .wait_for_device(Path::new("/dev/xvdf"))
            .unwrap_err();

        assert!(matches!(err, VolumeError::DeviceProbeFailed { .. }));
        assert_eq!(probes(&hal), 1);
        assert_eq!(clock.sleep_count(), 0);
    }

    #[test]
    fn zero_attempts_still_probes_once() {
        let hal = FakeHal::new();
        let clock = FakeClock::new();
        hal.add_device("/dev/xvdf");

        let policy = PollPolicy::new(0, Duration::from_secs(1));
        assert!(DeviceWaiter::new(&hal, &clock, policy)
            .wait_for_device(Path::new("/dev/xvdf"))
            .is_ok());
    }

    #[test]
    fn oversized_interval_saturates() {
        assert_eq!(PollPolicy::new(1, Duration::MAX).interval_ms, u64::MAX);
        assert_eq!(PollPolicy::new(1, Duration::from_millis(250)).interval_ms, 250);
    }
}
