use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// How a Linux utility VM is booted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LinuxBootMode {
    /// The host loads kernel and initrd directly, skipping firmware.
    #[default]
    KernelDirect,
    /// UEFI firmware loads the kernel from the boot files share.
    Uefi,
}

/// Boot inputs for a Linux utility VM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinuxBootConfig {
    pub kernel: PathBuf,
    pub initrd: PathBuf,
    #[serde(default)]
    pub boot_mode: LinuxBootMode,
    /// Extra kernel arguments, applied after the utility VM defaults.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub kernel_args: Vec<String>,
}

impl LinuxBootConfig {
    pub fn new(kernel: impl Into<PathBuf>, initrd: impl Into<PathBuf>) -> Self {
        Self {
            kernel: kernel.into(),
            initrd: initrd.into(),
            boot_mode: LinuxBootMode::default(),
            kernel_args: Vec::new(),
        }
    }

    pub fn with_boot_mode(mut self, mode: LinuxBootMode) -> Self {
        self.boot_mode = mode;
        self
    }

    pub fn with_kernel_arg(mut self, arg: impl Into<String>) -> Self {
        self.kernel_args.push(arg.into());
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.kernel.as_os_str().is_empty() {
            return Err(Error::InvalidSpec("linux kernel path is empty".into()));
        }
        if self.initrd.as_os_str().is_empty() {
            return Err(Error::InvalidSpec("linux initrd path is empty".into()));
        }
        Ok(())
    }
}

/// Boot inputs for a Windows utility VM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowsBootConfig {
    /// Directory holding the utility VM image of the container base layer.
    pub base_layer: PathBuf,
    /// Scratch disk for the utility VM, if the caller manages one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scratch: Option<PathBuf>,
}

impl WindowsBootConfig {
    pub fn new(base_layer: impl Into<PathBuf>) -> Self {
        Self {
            base_layer: base_layer.into(),
            scratch: None,
        }
    }

    pub fn with_scratch(mut self, scratch: impl Into<PathBuf>) -> Self {
        self.scratch = Some(scratch.into());
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.base_layer.as_os_str().is_empty() {
            return Err(Error::InvalidSpec("windows base layer path is empty".into()));
        }
        Ok(())
    }
}
