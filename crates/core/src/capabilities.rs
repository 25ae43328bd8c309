use crate::types::{GuestPlatform, MemoryBackingStrategy};
use serde::Serialize;

#[derive(Debug, Clone, Default, Serialize)]
pub struct GuestPlatformSupport {
    pub linux: bool,
    pub windows: bool,
}

/// Memory backing strategies a host can realize for one guest platform.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MemoryBackingSupport {
    pub virtual_overcommit: bool,
    /// The guest agent exposes the channel deferred commit is negotiated over.
    pub virtual_deferred_commit: bool,
    pub physically_backed: bool,
}

impl MemoryBackingSupport {
    pub fn all() -> Self {
        Self {
            virtual_overcommit: true,
            virtual_deferred_commit: true,
            physically_backed: true,
        }
    }

    pub fn supports(&self, strategy: MemoryBackingStrategy) -> bool {
        match strategy {
            MemoryBackingStrategy::VirtualOvercommit => self.virtual_overcommit,
            MemoryBackingStrategy::VirtualDeferredCommit => self.virtual_deferred_commit,
            MemoryBackingStrategy::PhysicallyBacked => self.physically_backed,
        }
    }
}

/// Capabilities advertised by a host compute service.
///
/// The caller is expected to have checked the host build before asking for
/// these; the core only consumes them.
#[derive(Debug, Clone, Default, Serialize)]
pub struct HostCapabilities {
    pub guest_platforms: GuestPlatformSupport,
    pub linux_memory: MemoryBackingSupport,
    pub windows_memory: MemoryBackingSupport,
    /// Maximum vCPUs per utility VM. None means no known limit.
    pub max_cpus: Option<u32>,
    /// Maximum guest memory in bytes. None means no known limit.
    pub max_memory_bytes: Option<u64>,
}

impl HostCapabilities {
    pub fn all() -> Self {
        Self {
            guest_platforms: GuestPlatformSupport {
                linux: true,
                windows: true,
            },
            linux_memory: MemoryBackingSupport::all(),
            windows_memory: MemoryBackingSupport::all(),
            max_cpus: None,
            max_memory_bytes: None,
        }
    }

    pub fn supports_platform(&self, platform: GuestPlatform) -> bool {
        match platform {
            GuestPlatform::Linux => self.guest_platforms.linux,
            GuestPlatform::Windows => self.guest_platforms.windows,
        }
    }

    pub fn memory_support(&self, platform: GuestPlatform) -> &MemoryBackingSupport {
        match platform {
            GuestPlatform::Linux => &self.linux_memory,
            GuestPlatform::Windows => &self.windows_memory,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_supports_nothing() {
        let caps = HostCapabilities::default();
        assert!(!caps.supports_platform(GuestPlatform::Linux));
        for strategy in MemoryBackingStrategy::ALL {
            assert!(!caps.memory_support(GuestPlatform::Windows).supports(strategy));
        }
    }

    #[test]
    fn all_supports_everything() {
        let caps = HostCapabilities::all();
        for platform in [GuestPlatform::Linux, GuestPlatform::Windows] {
            assert!(caps.supports_platform(platform));
            for strategy in MemoryBackingStrategy::ALL {
                assert!(caps.memory_support(platform).supports(strategy));
            }
        }
        assert!(caps.max_cpus.is_none());
    }

    #[test]
    fn memory_support_is_per_platform() {
        let mut caps = HostCapabilities::all();
        caps.windows_memory.virtual_deferred_commit = false;
        assert!(
            caps.memory_support(GuestPlatform::Linux)
                .supports(MemoryBackingStrategy::VirtualDeferredCommit)
        );
        assert!(
            !caps
                .memory_support(GuestPlatform::Windows)
                .supports(MemoryBackingStrategy::VirtualDeferredCommit)
        );
    }
}
