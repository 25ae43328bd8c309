use crate::builder::UvmBuilder;
use crate::platform::{LinuxAdapter, WindowsAdapter};
use uvm_core::{LinuxBootConfig, WindowsBootConfig};

/// Entry point for configuring utility VMs.
///
/// The boot configuration picks the guest platform; the returned builder sets
/// resources and memory backing preferences.
///
/// # Example
///
/// ```rust,no_run
/// use uvm::{Uvm, WindowsBootConfig, HostCapabilities, MemoryBackingStrategy};
///
/// # fn example() -> uvm::Result<()> {
/// let config = Uvm::windows(WindowsBootConfig::new("C:\\layers\\base\\UtilityVM"))
///     .memory_mb(1024)
///     .allow_overcommit(false)
///     .configuration(&HostCapabilities::all())?;
///
/// assert_eq!(config.backing(), MemoryBackingStrategy::PhysicallyBacked);
/// # Ok(())
/// # }
/// ```
pub struct Uvm;

impl Uvm {
    /// Creates a builder for a Linux utility VM.
    pub fn linux(boot: LinuxBootConfig) -> UvmBuilder<LinuxAdapter> {
        UvmBuilder::new(LinuxAdapter::new(boot))
    }

    /// Creates a builder for a Windows utility VM.
    pub fn windows(boot: WindowsBootConfig) -> UvmBuilder<WindowsAdapter> {
        UvmBuilder::new(WindowsAdapter::new(boot))
    }
}
