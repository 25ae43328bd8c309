use crate::configuration::VmConfiguration;
use crate::handle::UtilityVm;
use crate::platform::PlatformAdapter;
use std::sync::Arc;
use uvm_core::{
    HostCapabilities, HostComputeService, MIB, MemoryBackingPreference, ResourceLimits, Result,
};

/// Builder for configuring utility VMs.
///
/// Use [`Uvm::linux`](crate::Uvm::linux) or [`Uvm::windows`](crate::Uvm::windows)
/// to get one.
///
/// # Example
///
/// ```rust,no_run
/// # use std::sync::Arc;
/// # use std::time::Duration;
/// # use uvm::{Uvm, LinuxBootConfig, HostComputeService};
/// # async fn example(host: Arc<dyn HostComputeService>) -> uvm::Result<()> {
/// let vm = Uvm::linux(LinuxBootConfig::new("./kernel", "./initrd.img"))
///     .cpus(2)
///     .memory_mb(512)
///     .allow_overcommit(false)
///     .build(host)?;
///
/// vm.create().await?;
/// vm.start(Duration::from_secs(30)).await?;
/// vm.close().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct UvmBuilder<A: PlatformAdapter> {
    adapter: A,
    id: Option<String>,
    cpus: u32,
    memory_bytes: u64,
    preference: MemoryBackingPreference,
}

impl<A: PlatformAdapter> UvmBuilder<A> {
    pub fn new(adapter: A) -> Self {
        Self {
            adapter,
            id: None,
            cpus: 0,
            memory_bytes: 0,
            preference: MemoryBackingPreference::default(),
        }
    }

    /// Sets the VM id. When never set, a unique `uvm-<uuid>` id is generated.
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Sets the number of virtual processors. Zero uses the platform default.
    pub fn cpus(mut self, count: u32) -> Self {
        self.cpus = count;
        self
    }

    /// Sets the memory limit in bytes. Zero uses the platform default.
    pub fn memory_bytes(mut self, bytes: u64) -> Self {
        self.memory_bytes = bytes;
        self
    }

    pub fn memory_mb(self, mb: u64) -> Self {
        self.memory_bytes(mb.saturating_mul(MIB))
    }

    pub fn allow_overcommit(mut self, allow: bool) -> Self {
        self.preference.allow_overcommit = Some(allow);
        self
    }

    pub fn enable_deferred_commit(mut self, enable: bool) -> Self {
        self.preference.enable_deferred_commit = Some(enable);
        self
    }

    /// Replaces both memory backing preferences at once.
    pub fn preference(mut self, preference: MemoryBackingPreference) -> Self {
        self.preference = preference;
        self
    }

    /// Validates everything against `capabilities` without touching a host.
    pub fn configuration(&self, capabilities: &HostCapabilities) -> Result<VmConfiguration> {
        let id = match &self.id {
            Some(id) => id.clone(),
            None => generate_id(),
        };

        VmConfiguration::build(
            &id,
            self.adapter.platform(),
            ResourceLimits::new(self.cpus, self.memory_bytes),
            self.preference,
            &self.adapter,
            capabilities,
        )
    }

    /// Validates against the host's capabilities and returns a VM in the
    /// `Constructed` state. Nothing is allocated until
    /// [`UtilityVm::create`].
    pub fn build(self, host: Arc<dyn HostComputeService>) -> Result<UtilityVm> {
        let configuration = self.configuration(host.capabilities())?;
        Ok(UtilityVm::construct(configuration, host))
    }
}

fn generate_id() -> String {
    format!("uvm-{}", uuid::Uuid::new_v4())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{LinuxAdapter, WindowsAdapter};
    use uvm_core::{
        Error, GuestPlatform, LinuxBootConfig, MemoryBackingStrategy, WindowsBootConfig,
    };

    fn linux_builder() -> UvmBuilder<LinuxAdapter> {
        UvmBuilder::new(LinuxAdapter::new(LinuxBootConfig::new(
            "/boot/kernel",
            "/boot/initrd.img",
        )))
    }

    fn windows_builder() -> UvmBuilder<WindowsAdapter> {
        UvmBuilder::new(WindowsAdapter::new(WindowsBootConfig::new(
            "C:\\layers\\base\\UtilityVM",
        )))
    }

    mod ids {
        use super::*;

        #[test]
        fn explicit_id_is_kept() {
            let config = linux_builder()
                .id("uvm-explicit")
                .configuration(&HostCapabilities::all())
                .unwrap();
            assert_eq!(config.id(), "uvm-explicit");
        }

        #[test]
        fn generated_ids_are_unique() {
            let builder = linux_builder();
            let a = builder.configuration(&HostCapabilities::all()).unwrap();
            let b = builder.configuration(&HostCapabilities::all()).unwrap();
            assert!(a.id().starts_with("uvm-"));
            assert_ne!(a.id(), b.id());
        }

        #[test]
        fn explicit_empty_id_is_invalid() {
            let err = linux_builder()
                .id("")
                .configuration(&HostCapabilities::all())
                .unwrap_err();
            assert!(matches!(err, Error::InvalidSpec(_)));
        }
    }

    mod memory_backing {
        use super::*;

        #[test]
        fn defaults_to_virtual_overcommit() {
            let config = windows_builder()
                .configuration(&HostCapabilities::all())
                .unwrap();
            assert_eq!(config.guest_platform(), GuestPlatform::Windows);
            assert_eq!(config.backing(), MemoryBackingStrategy::VirtualOvercommit);
        }

        #[test]
        fn deferred_commit_refines_overcommit() {
            let config = linux_builder()
                .allow_overcommit(true)
                .enable_deferred_commit(true)
                .configuration(&HostCapabilities::all())
                .unwrap();
            assert_eq!(
                config.backing(),
                MemoryBackingStrategy::VirtualDeferredCommit
            );
        }

        #[test]
        fn disallowing_overcommit_wins() {
            let config = linux_builder()
                .allow_overcommit(false)
                .enable_deferred_commit(true)
                .configuration(&HostCapabilities::all())
                .unwrap();
            assert_eq!(config.backing(), MemoryBackingStrategy::PhysicallyBacked);
        }

        #[test]
        fn preference_replaces_individual_settings() {
            let config = linux_builder()
                .allow_overcommit(false)
                .preference(MemoryBackingPreference::new(None, Some(true)))
                .configuration(&HostCapabilities::all())
                .unwrap();
            assert_eq!(
                config.backing(),
                MemoryBackingStrategy::VirtualDeferredCommit
            );
        }
    }

    mod resources {
        use super::*;

        #[test]
        fn memory_mb_converts_to_bytes() {
            let config = linux_builder()
                .memory_mb(512)
                .configuration(&HostCapabilities::all())
                .unwrap();
            assert_eq!(config.resources().memory_limit_bytes(), 512 * MIB);
            assert_eq!(config.memory_size_mb(), 512);
        }

        #[test]
        fn cpus_within_limit() {
            let mut caps = HostCapabilities::all();
            caps.max_cpus = Some(8);
            let config = linux_builder().cpus(4).configuration(&caps).unwrap();
            assert_eq!(config.processor_count(), 4);
        }

        #[test]
        fn cpus_exceed_limit() {
            let mut caps = HostCapabilities::all();
            caps.max_cpus = Some(8);
            let err = linux_builder().cpus(16).configuration(&caps).unwrap_err();
            assert!(matches!(err, Error::InvalidSpec(msg) if msg.contains("16 CPUs")));
        }

        #[test]
        fn windows_memory_below_floor() {
            let err = windows_builder()
                .memory_mb(256)
                .configuration(&HostCapabilities::all())
                .unwrap_err();
            assert!(err.is_validation());
        }
    }
}
