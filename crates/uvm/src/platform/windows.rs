use super::{PlatformAdapter, PlatformDefaults, ensure_supported};
use uvm_core::{
    GuestPlatform, MemoryBackingStrategy, MemoryBackingSupport, PlatformParams, ResourceLimits,
    Result, WindowsBootConfig, WindowsBootParams,
};

/// Adapter for Windows utility VMs booted from a container base layer.
#[derive(Debug, Clone)]
pub struct WindowsAdapter {
    boot: WindowsBootConfig,
}

impl WindowsAdapter {
    pub fn new(boot: WindowsBootConfig) -> Self {
        Self { boot }
    }

    pub fn boot(&self) -> &WindowsBootConfig {
        &self.boot
    }
}

impl PlatformAdapter for WindowsAdapter {
    fn platform(&self) -> GuestPlatform {
        GuestPlatform::Windows
    }

    fn defaults(&self) -> PlatformDefaults {
        PlatformDefaults::WINDOWS
    }

    fn describe_boot(
        &self,
        _resources: &ResourceLimits,
        backing: MemoryBackingStrategy,
        support: &MemoryBackingSupport,
    ) -> Result<PlatformParams> {
        self.boot.validate()?;
        ensure_supported(GuestPlatform::Windows, backing, support)?;

        // Direct file mapping maps host file pages into guest memory, which
        // physically backed memory cannot do.
        Ok(PlatformParams::Windows(WindowsBootParams {
            base_layer: self.boot.base_layer.clone(),
            scratch: self.boot.scratch.clone(),
            vsmb_direct_map: !backing.is_physically_backed(),
        }))
    }
}
