mod cmdline;
mod config;
mod params;

pub use cmdline::{KernelArg, KernelCmdline};
pub use config::{LinuxBootConfig, LinuxBootMode, WindowsBootConfig};
pub use params::{LinuxBootParams, PlatformParams, WindowsBootParams};
