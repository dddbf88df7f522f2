//! Platform service abstractions.
//!
//! Commands and the dispatcher never touch the OS for introspection
//! directly; they go through these traits so tests can swap in mocks.

mod services;

pub use services::{
    DesktopPlatform, DeviceInfo, MemoryInfo, RootService, SystemInfoService, TimeService,
    Timestamp,
};
