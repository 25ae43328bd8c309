//! Guest platform adapters.
//!
//! Each adapter turns resolved resources and a memory backing strategy into
//! the boot parameters its guest platform needs. Adapters never downgrade a
//! strategy: one the host cannot realize for the platform is an error.

mod linux;
mod windows;

pub use linux::LinuxAdapter;
pub use windows::WindowsAdapter;

use uvm_core::{
    Error, GuestPlatform, MIB, MemoryBackingStrategy, MemoryBackingSupport, PlatformParams,
    ResourceLimits, Result,
};

/// Per-platform sizing defaults and limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlatformDefaults {
    pub processor_count: u32,
    pub memory_mb: u64,
    /// Smallest non-zero memory limit the guest can boot with.
    pub min_memory_bytes: u64,
}

impl PlatformDefaults {
    pub const LINUX: PlatformDefaults = PlatformDefaults {
        processor_count: 2,
        memory_mb: 1024,
        min_memory_bytes: 256 * MIB,
    };

    pub const WINDOWS: PlatformDefaults = PlatformDefaults {
        processor_count: 2,
        memory_mb: 1024,
        min_memory_bytes: 512 * MIB,
    };
}

pub trait PlatformAdapter: Send + Sync {
    fn platform(&self) -> GuestPlatform;

    fn defaults(&self) -> PlatformDefaults;

    fn describe_boot(
        &self,
        resources: &ResourceLimits,
        backing: MemoryBackingStrategy,
        support: &MemoryBackingSupport,
    ) -> Result<PlatformParams>;
}

fn ensure_supported(
    platform: GuestPlatform,
    backing: MemoryBackingStrategy,
    support: &MemoryBackingSupport,
) -> Result<()> {
    if support.supports(backing) {
        Ok(())
    } else {
        Err(Error::UnsupportedConfiguration {
            platform,
            strategy: backing,
        })
    }
}
