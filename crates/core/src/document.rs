//! Configuration document handed to the host compute service.
//!
//! Field names follow the host's PascalCase schema. Only the parts a utility
//! VM needs are modelled; absent optional parts are omitted on the wire.

use crate::types::{GuestPlatform, MemoryBackingStrategy};
use serde::{Deserialize, Serialize};

pub const SCHEMA_VERSION: SchemaVersion = SchemaVersion { major: 2, minor: 1 };

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ComputeSystemDocument {
    pub owner: String,
    pub schema_version: SchemaVersion,
    pub virtual_machine: VirtualMachine,
}

impl ComputeSystemDocument {
    pub fn memory_backing(&self) -> Option<MemoryBackingStrategy> {
        self.virtual_machine.compute_topology.memory.strategy()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SchemaVersion {
    pub major: u32,
    pub minor: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct VirtualMachine {
    pub guest_platform: GuestPlatform,
    pub chipset: Chipset,
    pub compute_topology: ComputeTopology,
    pub devices: Devices,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Chipset {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linux_kernel_direct: Option<LinuxKernelDirect>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uefi: Option<Uefi>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LinuxKernelDirect {
    pub kernel_file_path: String,
    pub init_rd_path: String,
    pub kernel_cmd_line: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Uefi {
    pub boot_this: UefiBootEntry,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UefiBootEntry {
    pub device_type: String,
    pub device_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optional_data: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ComputeTopology {
    pub memory: Memory,
    pub processor: Processor,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Memory {
    #[serde(rename = "SizeInMB")]
    pub size_in_mb: u64,
    pub allow_overcommit: bool,
    pub enable_deferred_commit: bool,
}

impl Memory {
    pub fn new(size_in_mb: u64, backing: MemoryBackingStrategy) -> Self {
        Self {
            size_in_mb,
            allow_overcommit: backing.allows_overcommit(),
            enable_deferred_commit: backing.uses_deferred_commit(),
        }
    }

    /// Decodes the flag pair back into a strategy. Deferred commit without
    /// overcommit has no strategy and yields `None`.
    pub fn strategy(&self) -> Option<MemoryBackingStrategy> {
        match (self.allow_overcommit, self.enable_deferred_commit) {
            (true, false) => Some(MemoryBackingStrategy::VirtualOvercommit),
            (true, true) => Some(MemoryBackingStrategy::VirtualDeferredCommit),
            (false, false) => Some(MemoryBackingStrategy::PhysicallyBacked),
            (false, true) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Processor {
    pub count: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Devices {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub virtual_smb: Option<VirtualSmb>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scratch_disk: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct VirtualSmb {
    pub direct_file_mapping: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub shares: Vec<VirtualSmbShare>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct VirtualSmbShare {
    pub name: String,
    pub path: String,
    pub read_only: bool,
}
