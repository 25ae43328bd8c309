//! File-based utility VM options.
//!
//! ```toml
//! id = "uvm-build-1"
//! guest_platform = "linux"
//! cpus = 2
//! memory_mb = 512
//! allow_overcommit = false
//!
//! [linux]
//! kernel = "/var/lib/uvm/kernel"
//! initrd = "/var/lib/uvm/initrd.img"
//! kernel_args = ["debug"]
//! ```

use crate::config::Uvm;
use crate::configuration::VmConfiguration;
use serde::Deserialize;
use std::path::Path;
use uvm_core::{
    Error, GuestPlatform, HostCapabilities, LinuxBootConfig, MIB, MemoryBackingPreference,
    Result, WindowsBootConfig,
};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UvmOptions {
    pub id: Option<String>,
    /// `linux`/`lcow` or `windows`/`wcow`.
    pub guest_platform: String,
    #[serde(default)]
    pub cpus: u32,
    pub memory_mb: Option<u64>,
    pub memory_bytes: Option<u64>,
    pub allow_overcommit: Option<bool>,
    pub enable_deferred_commit: Option<bool>,
    pub linux: Option<LinuxBootConfig>,
    pub windows: Option<WindowsBootConfig>,
}

impl UvmOptions {
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str(contents).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        tracing::debug!(path = %path.display(), "loaded utility VM options");
        toml::from_str(&contents).map_err(|e| Error::Config(format!("{}: {e}", path.display())))
    }

    pub fn preference(&self) -> MemoryBackingPreference {
        MemoryBackingPreference::new(self.allow_overcommit, self.enable_deferred_commit)
    }

    fn memory_limit_bytes(&self) -> Result<u64> {
        match (self.memory_mb, self.memory_bytes) {
            (Some(_), Some(_)) => Err(Error::Config(
                "set either memory_mb or memory_bytes, not both".into(),
            )),
            (Some(mb), None) => Ok(mb.saturating_mul(MIB)),
            (None, Some(bytes)) => Ok(bytes),
            (None, None) => Ok(0),
        }
    }

    /// Validates the options against `capabilities` and resolves the memory
    /// backing strategy.
    pub fn configuration(&self, capabilities: &HostCapabilities) -> Result<VmConfiguration> {
        let platform: GuestPlatform = self.guest_platform.parse()?;
        let memory = self.memory_limit_bytes()?;

        match platform {
            GuestPlatform::Linux => {
                let boot = self.linux.clone().ok_or_else(|| {
                    Error::Config("linux guests need a [linux] section".into())
                })?;
                let mut builder = Uvm::linux(boot)
                    .cpus(self.cpus)
                    .memory_bytes(memory)
                    .preference(self.preference());
                if let Some(id) = &self.id {
                    builder = builder.id(id);
                }
                builder.configuration(capabilities)
            }
            GuestPlatform::Windows => {
                let boot = self.windows.clone().ok_or_else(|| {
                    Error::Config("windows guests need a [windows] section".into())
                })?;
                let mut builder = Uvm::windows(boot)
                    .cpus(self.cpus)
                    .memory_bytes(memory)
                    .preference(self.preference());
                if let Some(id) = &self.id {
                    builder = builder.id(id);
                }
                builder.configuration(capabilities)
            }
        }
    }
}
