use super::{PlatformAdapter, PlatformDefaults, ensure_supported};
use uvm_core::{
    GuestPlatform, KernelCmdline, LinuxBootConfig, LinuxBootParams, MemoryBackingStrategy,
    MemoryBackingSupport, PlatformParams, ResourceLimits, Result,
};

/// Adapter for Linux utility VMs booted from a kernel and initrd.
#[derive(Debug, Clone)]
pub struct LinuxAdapter {
    boot: LinuxBootConfig,
}

impl LinuxAdapter {
    pub fn new(boot: LinuxBootConfig) -> Self {
        Self { boot }
    }

    pub fn boot(&self) -> &LinuxBootConfig {
        &self.boot
    }
}

impl PlatformAdapter for LinuxAdapter {
    fn platform(&self) -> GuestPlatform {
        GuestPlatform::Linux
    }

    fn defaults(&self) -> PlatformDefaults {
        PlatformDefaults::LINUX
    }

    fn describe_boot(
        &self,
        resources: &ResourceLimits,
        backing: MemoryBackingStrategy,
        support: &MemoryBackingSupport,
    ) -> Result<PlatformParams> {
        self.boot.validate()?;
        ensure_supported(GuestPlatform::Linux, backing, support)?;

        let cpus = resources.effective_cpu_count(self.defaults().processor_count);
        let mut cmdline = KernelCmdline::utility_vm_defaults(cpus);
        cmdline.extend_raw(&self.boot.kernel_args);

        Ok(PlatformParams::Linux(LinuxBootParams {
            kernel: self.boot.kernel.clone(),
            initrd: self.boot.initrd.clone(),
            boot_mode: self.boot.boot_mode,
            kernel_cmdline: cmdline.build(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uvm_core::{Error, LinuxBootMode};

    fn adapter() -> LinuxAdapter {
        LinuxAdapter::new(LinuxBootConfig::new("/boot/kernel", "/boot/initrd.img"))
    }

    fn linux_params(params: PlatformParams) -> LinuxBootParams {
        match params {
            PlatformParams::Linux(p) => p,
            other => panic!("expected linux params, got {other:?}"),
        }
    }

    #[test]
    fn cmdline_pins_requested_cpus() {
        let params = adapter()
            .describe_boot(
                &ResourceLimits::new(4, 0),
                MemoryBackingStrategy::VirtualOvercommit,
                &MemoryBackingSupport::all(),
            )
            .unwrap();
        let params = linux_params(params);
        assert!(params.kernel_cmdline.contains("nr_cpus=4"));
        assert_eq!(params.boot_mode, LinuxBootMode::KernelDirect);
    }

    #[test]
    fn cmdline_uses_default_cpus_when_unset() {
        let params = adapter()
            .describe_boot(
                &ResourceLimits::default(),
                MemoryBackingStrategy::VirtualOvercommit,
                &MemoryBackingSupport::all(),
            )
            .unwrap();
        assert!(linux_params(params).kernel_cmdline.contains("nr_cpus=2"));
    }

    #[test]
    fn caller_kernel_args_override_defaults() {
        let adapter = LinuxAdapter::new(
            LinuxBootConfig::new("/boot/kernel", "/boot/initrd.img")
                .with_kernel_arg("pci=on")
                .with_kernel_arg("debug"),
        );
        let params = adapter
            .describe_boot(
                &ResourceLimits::default(),
                MemoryBackingStrategy::PhysicallyBacked,
                &MemoryBackingSupport::all(),
            )
            .unwrap();
        let cmdline = linux_params(params).kernel_cmdline;
        assert!(cmdline.contains("pci=on"));
        assert!(!cmdline.contains("pci=off"));
        assert!(cmdline.ends_with("debug"));
    }

    #[test]
    fn unsupported_deferred_commit_is_rejected() {
        let support = MemoryBackingSupport {
            virtual_deferred_commit: false,
            ..MemoryBackingSupport::all()
        };
        let err = adapter()
            .describe_boot(
                &ResourceLimits::default(),
                MemoryBackingStrategy::VirtualDeferredCommit,
                &support,
            )
            .unwrap_err();
        assert!(matches!(
            err,
            Error::UnsupportedConfiguration {
                platform: GuestPlatform::Linux,
                strategy: MemoryBackingStrategy::VirtualDeferredCommit,
            }
        ));
    }

    #[test]
    fn empty_initrd_is_invalid() {
        let adapter = LinuxAdapter::new(LinuxBootConfig::new("/boot/kernel", ""));
        let err = adapter
            .describe_boot(
                &ResourceLimits::default(),
                MemoryBackingStrategy::VirtualOvercommit,
                &MemoryBackingSupport::all(),
            )
            .unwrap_err();
        assert!(matches!(err, Error::InvalidSpec(_)));
    }
}
