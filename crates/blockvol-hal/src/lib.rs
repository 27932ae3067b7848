//! blockvol Hardware Abstraction Layer (HAL).
//!
//! Everything that touches the host (mount table, device nodes, external processes, the remote
//! volume provider) goes through the traits in [`hal`], so the attach/detach workflow can be
//! exercised against [`FakeHal`] without root privileges or real hardware.

pub mod hal;
pub mod procfs;

pub use blockvol_error::{HalError, HalResult};
pub use hal::*;
