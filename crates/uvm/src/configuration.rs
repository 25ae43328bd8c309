//! Assembly of a complete, validated utility VM configuration.

use crate::platform::{PlatformAdapter, PlatformDefaults};
use std::path::Path;
use uvm_core::document::{
    Chipset, ComputeTopology, Devices, LinuxKernelDirect, Memory, Processor, SCHEMA_VERSION, Uefi,
    UefiBootEntry, VirtualMachine, VirtualSmb, VirtualSmbShare,
};
use uvm_core::{
    ComputeSystemDocument, Error, GuestPlatform, HostCapabilities, LinuxBootMode, LinuxBootParams,
    MemoryBackingPreference, MemoryBackingStrategy, PlatformParams, ResourceLimits, Result,
    WindowsBootParams,
};

const OWNER: &str = "uvm";
const UEFI_DEVICE_TYPE: &str = "VmbFs";
const WINDOWS_BOOT_MANAGER: &str = "\\EFI\\Microsoft\\Boot\\bootmgfw.efi";
const OS_SHARE_NAME: &str = "os";

/// Immutable configuration of one utility VM.
///
/// Only [`VmConfiguration::build`] produces one, so holding a value means it
/// already passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VmConfiguration {
    id: String,
    guest_platform: GuestPlatform,
    resources: ResourceLimits,
    backing: MemoryBackingStrategy,
    defaults: PlatformDefaults,
    platform_params: PlatformParams,
}

impl VmConfiguration {
    /// Validates the caller's inputs, resolves the memory backing strategy and
    /// asks the adapter for the platform's boot parameters.
    pub fn build(
        id: &str,
        guest_platform: GuestPlatform,
        resources: ResourceLimits,
        preference: MemoryBackingPreference,
        adapter: &dyn PlatformAdapter,
        capabilities: &HostCapabilities,
    ) -> Result<Self> {
        if id.trim().is_empty() {
            return Err(Error::InvalidSpec("utility VM id must not be empty".into()));
        }

        if adapter.platform() != guest_platform {
            return Err(Error::InvalidSpec(format!(
                "{} adapter cannot configure a {} guest",
                adapter.platform(),
                guest_platform
            )));
        }

        if !capabilities.supports_platform(guest_platform) {
            return Err(Error::InvalidSpec(format!(
                "host does not support {guest_platform} guests"
            )));
        }

        let defaults = adapter.defaults();
        Self::validate_resources(&resources, &defaults, guest_platform, capabilities)?;

        let backing = uvm_core::select(preference, guest_platform);
        let platform_params = adapter.describe_boot(
            &resources,
            backing,
            capabilities.memory_support(guest_platform),
        )?;

        tracing::debug!(
            id,
            platform = %guest_platform,
            strategy = %backing,
            "utility VM configuration built"
        );

        Ok(Self {
            id: id.to_string(),
            guest_platform,
            resources,
            backing,
            defaults,
            platform_params,
        })
    }

    fn validate_resources(
        resources: &ResourceLimits,
        defaults: &PlatformDefaults,
        platform: GuestPlatform,
        capabilities: &HostCapabilities,
    ) -> Result<()> {
        let memory = resources.memory_limit_bytes();
        if memory != 0 && memory < defaults.min_memory_bytes {
            return Err(Error::InvalidSpec(format!(
                "memory limit of {memory} bytes is below the {platform} minimum of {} bytes",
                defaults.min_memory_bytes
            )));
        }

        if let Some(max) = capabilities.max_cpus {
            let cpus = resources.effective_cpu_count(defaults.processor_count);
            if cpus > max {
                return Err(Error::InvalidSpec(format!(
                    "requested {cpus} CPUs but host supports at most {max}"
                )));
            }
        }

        if let Some(max) = capabilities.max_memory_bytes {
            if memory > max {
                return Err(Error::InvalidSpec(format!(
                    "requested {memory} bytes of memory but host supports at most {max}"
                )));
            }
        }

        Ok(())
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn guest_platform(&self) -> GuestPlatform {
        self.guest_platform
    }

    pub fn resources(&self) -> &ResourceLimits {
        &self.resources
    }

    pub fn backing(&self) -> MemoryBackingStrategy {
        self.backing
    }

    pub fn platform_params(&self) -> &PlatformParams {
        &self.platform_params
    }

    pub fn processor_count(&self) -> u32 {
        self.resources
            .effective_cpu_count(self.defaults.processor_count)
    }

    pub fn memory_size_mb(&self) -> u64 {
        self.resources.memory_size_mb(self.defaults.memory_mb)
    }

    /// Renders the document the host compute service creates the VM from.
    pub fn to_document(&self) -> ComputeSystemDocument {
        let (chipset, devices) = match &self.platform_params {
            PlatformParams::Linux(params) => (linux_chipset(params), Devices::default()),
            PlatformParams::Windows(params) => (windows_chipset(), windows_devices(params)),
        };

        ComputeSystemDocument {
            owner: OWNER.to_string(),
            schema_version: SCHEMA_VERSION,
            virtual_machine: VirtualMachine {
                guest_platform: self.guest_platform,
                chipset,
                compute_topology: ComputeTopology {
                    memory: Memory::new(self.memory_size_mb(), self.backing),
                    processor: Processor {
                        count: self.processor_count(),
                    },
                },
                devices,
            },
        }
    }
}

fn linux_chipset(params: &LinuxBootParams) -> Chipset {
    match params.boot_mode {
        LinuxBootMode::KernelDirect => Chipset {
            linux_kernel_direct: Some(LinuxKernelDirect {
                kernel_file_path: params.kernel.display().to_string(),
                init_rd_path: params.initrd.display().to_string(),
                kernel_cmd_line: params.kernel_cmdline.clone(),
            }),
            uefi: None,
        },
        LinuxBootMode::Uefi => Chipset {
            linux_kernel_direct: None,
            uefi: Some(Uefi {
                boot_this: UefiBootEntry {
                    device_type: UEFI_DEVICE_TYPE.to_string(),
                    device_path: format!("\\{}", file_name(&params.kernel)),
                    optional_data: Some(format!(
                        "initrd=\\{} {}",
                        file_name(&params.initrd),
                        params.kernel_cmdline
                    )),
                },
            }),
        },
    }
}

fn windows_chipset() -> Chipset {
    Chipset {
        linux_kernel_direct: None,
        uefi: Some(Uefi {
            boot_this: UefiBootEntry {
                device_type: UEFI_DEVICE_TYPE.to_string(),
                device_path: WINDOWS_BOOT_MANAGER.to_string(),
                optional_data: None,
            },
        }),
    }
}

fn windows_devices(params: &WindowsBootParams) -> Devices {
    Devices {
        virtual_smb: Some(VirtualSmb {
            direct_file_mapping: params.vsmb_direct_map,
            shares: vec![VirtualSmbShare {
                name: OS_SHARE_NAME.to_string(),
                path: windows_join(&params.base_layer, "Files"),
                read_only: true,
            }],
        }),
        scratch_disk: params
            .scratch
            .as_ref()
            .map(|path| path.display().to_string()),
    }
}

/// Joins with the guest's separator so the share path is the same
/// whichever host built the document.
fn windows_join(base: &Path, child: &str) -> String {
    let base = base.display().to_string();
    format!("{}\\{child}", base.trim_end_matches(['\\', '/']))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
