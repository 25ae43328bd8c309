mod memory;

pub use memory::{MemoryBackingPreference, MemoryBackingStrategy};

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const MIB: u64 = 1024 * 1024;

/// Operating system running inside the utility VM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GuestPlatform {
    Linux,
    Windows,
}

impl GuestPlatform {
    pub fn name(&self) -> &'static str {
        match self {
            GuestPlatform::Linux => "linux",
            GuestPlatform::Windows => "windows",
        }
    }
}

impl fmt::Display for GuestPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for GuestPlatform {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "linux" | "lcow" => Ok(GuestPlatform::Linux),
            "windows" | "wcow" => Ok(GuestPlatform::Windows),
            other => Err(Error::InvalidSpec(format!(
                "unrecognized guest platform '{other}'"
            ))),
        }
    }
}

/// Normalized CPU and memory limits. Zero means "use the host default".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceLimits {
    cpu_count: u32,
    memory_limit_bytes: u64,
}

impl ResourceLimits {
    pub fn new(cpu_count: u32, memory_limit_bytes: u64) -> Self {
        Self {
            cpu_count,
            memory_limit_bytes,
        }
    }

    pub fn cpu_count(&self) -> u32 {
        self.cpu_count
    }

    pub fn memory_limit_bytes(&self) -> u64 {
        self.memory_limit_bytes
    }

    pub fn effective_cpu_count(&self, default: u32) -> u32 {
        if self.cpu_count == 0 {
            default
        } else {
            self.cpu_count
        }
    }

    /// Guest memory in MiB, rounded up to the 2 MiB granularity the host
    /// allocates in.
    pub fn memory_size_mb(&self, default_mb: u64) -> u64 {
        if self.memory_limit_bytes == 0 {
            return default_mb;
        }
        let mb = self.memory_limit_bytes.div_ceil(MIB);
        mb + mb % 2
    }
}
