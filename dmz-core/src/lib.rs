// vim: tw=80
//! Zoned device abstraction layer for dm-zoned tools
//!
//! Concatenates regular and zoned block devices into one zoned address space,
//! validates their zone topology, and provides metadata block I/O on top of
//! it.

pub mod backend;
pub mod composite;
pub mod config;
pub mod disk;
mod io;
pub mod mount;
pub mod safety;
pub mod signature;
pub mod sysfs;
pub mod topology;
pub mod translate;
pub mod types;
pub mod util;
pub mod zone;

pub use crate::backend::{BackendDevice, DeviceKind, Geometry};
pub use crate::composite::CompositeDevice;
pub use crate::config::Config;
pub use crate::safety::{Operation, SafetyGuard};
pub use crate::sysfs::HolderId;
pub use crate::types::*;
pub use crate::util::*;
pub use crate::zone::{Zone, ZoneCond, ZoneType};
