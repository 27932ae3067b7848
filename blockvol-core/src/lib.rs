//! blockvol core library.
//!
//! `blockvol-core` drives the attach → wait → mount and unmount → detach sequences for remote
//! block-storage volumes. Every host interaction goes through `blockvol-hal`, so the whole
//! workflow runs unchanged against `FakeHal` in tests.

pub mod clock;
pub mod config;
pub mod logging;
pub mod volume;

pub use blockvol_error::{HalError, HalResult, VolumeError, VolumeResult};
pub use clock::{Clock, FakeClock, SystemClock};
pub use config::LifecycleConfig;
pub use volume::device_waiter::{DeviceState, DeviceWaiter, PollPolicy};
pub use volume::format_mounter::{FormatHelper, FormatMounter};
pub use volume::lifecycle::{AttachOutcome, VolumeLifecycleManager};
pub use volume::locks::VolumeLocks;
pub use volume::mount_point::MountPointManager;
pub use volume::{GlobalMountPath, VolumeHandle};
