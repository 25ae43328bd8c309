use serde::{Deserialize, Serialize};
use std::fmt;

/// Caller preferences for how guest memory is backed.
///
/// `None` means the caller expressed no preference and the default applies,
/// which is not the same as `Some(false)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryBackingPreference {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_overcommit: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_deferred_commit: Option<bool>,
}

impl MemoryBackingPreference {
    pub fn new(allow_overcommit: Option<bool>, enable_deferred_commit: Option<bool>) -> Self {
        Self {
            allow_overcommit,
            enable_deferred_commit,
        }
    }

    pub fn with_allow_overcommit(mut self, allow: bool) -> Self {
        self.allow_overcommit = Some(allow);
        self
    }

    pub fn with_deferred_commit(mut self, enable: bool) -> Self {
        self.enable_deferred_commit = Some(enable);
        self
    }
}

/// How the host provisions guest memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MemoryBackingStrategy {
    /// Virtualized memory the host may overcommit.
    VirtualOvercommit,
    /// Virtualized, overcommittable memory whose physical pages are committed
    /// lazily in coordination with the guest.
    VirtualDeferredCommit,
    /// Guest memory mapped to dedicated host physical memory.
    PhysicallyBacked,
}

impl MemoryBackingStrategy {
    pub const ALL: [MemoryBackingStrategy; 3] = [
        MemoryBackingStrategy::VirtualOvercommit,
        MemoryBackingStrategy::VirtualDeferredCommit,
        MemoryBackingStrategy::PhysicallyBacked,
    ];

    pub fn allows_overcommit(&self) -> bool {
        !self.is_physically_backed()
    }

    pub fn uses_deferred_commit(&self) -> bool {
        matches!(self, MemoryBackingStrategy::VirtualDeferredCommit)
    }

    pub fn is_physically_backed(&self) -> bool {
        matches!(self, MemoryBackingStrategy::PhysicallyBacked)
    }

    pub fn name(&self) -> &'static str {
        match self {
            MemoryBackingStrategy::VirtualOvercommit => "virtual-overcommit",
            MemoryBackingStrategy::VirtualDeferredCommit => "virtual-deferred-commit",
            MemoryBackingStrategy::PhysicallyBacked => "physically-backed",
        }
    }
}

impl fmt::Display for MemoryBackingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
