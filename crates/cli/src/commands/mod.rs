pub mod capabilities;
pub mod check;
pub mod plan;
pub mod version;

use clap::ValueEnum;
use uvm::HostCapabilities;

/// Host capability set to validate against. Nothing here queries a real host.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum CapabilityProfile {
    /// Every platform and memory backing strategy.
    #[default]
    All,
    /// A host whose guests cannot negotiate deferred commit.
    NoDeferredCommit,
}

impl CapabilityProfile {
    pub fn capabilities(self) -> HostCapabilities {
        let mut caps = HostCapabilities::all();
        if self == CapabilityProfile::NoDeferredCommit {
            caps.linux_memory.virtual_deferred_commit = false;
            caps.windows_memory.virtual_deferred_commit = false;
        }
        caps
    }
}
