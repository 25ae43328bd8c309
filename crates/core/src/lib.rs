pub mod boot;
pub mod capabilities;
pub mod document;
pub mod error;
pub mod host;
pub mod policy;
pub mod types;

pub use boot::{
    KernelArg, KernelCmdline, LinuxBootConfig, LinuxBootMode, LinuxBootParams, PlatformParams,
    WindowsBootConfig, WindowsBootParams,
};
pub use capabilities::{GuestPlatformSupport, HostCapabilities, MemoryBackingSupport};
pub use document::ComputeSystemDocument;
pub use error::{Error, Result};
pub use host::{HostComputeService, HostSystem, SystemProperties};
pub use policy::select;
pub use types::{GuestPlatform, MIB, MemoryBackingPreference, MemoryBackingStrategy, ResourceLimits};
