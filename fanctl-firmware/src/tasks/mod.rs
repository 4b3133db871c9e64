//! Embassy async tasks
//!
//! Each task runs independently and communicates via channels/signals.

pub mod fs;
pub mod identity;
pub mod sensors;

pub use fs::{fs_task, FlashBlocks};
pub use identity::identity_task;
pub use sensors::{sensor_task, SensorBus};
