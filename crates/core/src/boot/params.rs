use super::LinuxBootMode;
use crate::types::GuestPlatform;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinuxBootParams {
    pub kernel: PathBuf,
    pub initrd: PathBuf,
    pub boot_mode: LinuxBootMode,
    pub kernel_cmdline: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowsBootParams {
    pub base_layer: PathBuf,
    pub scratch: Option<PathBuf>,
    /// Whether VSMB shares may map files directly into guest memory. Only
    /// possible when guest memory is virtualized.
    pub vsmb_direct_map: bool,
}

/// Guest-platform specific part of a utility VM configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "platform", rename_all = "lowercase")]
pub enum PlatformParams {
    Linux(LinuxBootParams),
    Windows(WindowsBootParams),
}

impl PlatformParams {
    pub fn platform(&self) -> GuestPlatform {
        match self {
            PlatformParams::Linux(_) => GuestPlatform::Linux,
            PlatformParams::Windows(_) => GuestPlatform::Windows,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_report_their_platform() {
        let linux = PlatformParams::Linux(LinuxBootParams {
            kernel: "/k".into(),
            initrd: "/i".into(),
            boot_mode: LinuxBootMode::KernelDirect,
            kernel_cmdline: "quiet".into(),
        });
        assert_eq!(linux.platform(), GuestPlatform::Linux);

        let windows = PlatformParams::Windows(WindowsBootParams {
            base_layer: "C:\\base".into(),
            scratch: None,
            vsmb_direct_map: true,
        });
        assert_eq!(windows.platform(), GuestPlatform::Windows);
    }

    #[test]
    fn params_are_tagged_by_platform() {
        let windows = PlatformParams::Windows(WindowsBootParams {
            base_layer: "C:\\base".into(),
            scratch: None,
            vsmb_direct_map: false,
        });
        let json = serde_json::to_value(&windows).unwrap();
        assert_eq!(json["platform"], "windows");
        assert_eq!(json["vsmb_direct_map"], false);
    }
}
