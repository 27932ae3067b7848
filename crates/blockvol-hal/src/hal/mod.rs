//! HAL trait definitions and implementations.
//!
//! This module defines the core traits for host operations and provides
//! both real (LinuxHal) and fake (FakeHal) implementations.

pub mod device_ops;
pub mod fake_hal;
pub mod linux_hal;
pub mod mount_ops;
pub mod process_ops;
pub mod volume_ops;

pub use device_ops::DeviceOps;
pub use fake_hal::{FailPoint, FakeCommandResult, FakeHal, Operation};
pub use linux_hal::LinuxHal;
pub use mount_ops::{MountOps, MountOptions, UnmountFlags};
pub use process_ops::ProcessOps;
pub use volume_ops::VolumeOps;

/// Local host capabilities needed to mount an attached volume.
pub trait HostHal: MountOps + DeviceOps + ProcessOps + Send + Sync {}

/// Automatically implement HostHal for any type implementing all required traits.
impl<T> HostHal for T where T: MountOps + DeviceOps + ProcessOps + Send + Sync {}
