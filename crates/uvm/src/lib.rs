//! Memory backing selection and lifecycle control for container utility VMs.
//!
//! A utility VM is the lightweight VM a container host runs isolated
//! containers in. This crate resolves how its memory is backed from the
//! caller's preferences, renders the document the host compute service
//! creates it from, and drives it through create, start and close without
//! ever leaking a host-side system.
//!
//! # Quick Start
//!
//! All configuration starts with [`Uvm`]:
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use uvm::{HostComputeService, LinuxBootConfig, MemoryBackingStrategy, Uvm};
//!
//! # async fn example(host: Arc<dyn HostComputeService>) -> uvm::Result<()> {
//! let vm = Uvm::linux(LinuxBootConfig::new("./kernel", "./initrd.img"))
//!     .memory_mb(512)
//!     .allow_overcommit(true)
//!     .enable_deferred_commit(true)
//!     .build(host)?;
//!
//! assert_eq!(vm.backing(), MemoryBackingStrategy::VirtualDeferredCommit);
//!
//! vm.create().await?;
//! vm.start(Duration::from_secs(30)).await?;
//! vm.close().await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Memory backing
//!
//! | `allow_overcommit` | `enable_deferred_commit` | strategy                  |
//! |--------------------|--------------------------|---------------------------|
//! | unset / `true`     | unset / `false`          | `VirtualOvercommit`       |
//! | unset / `true`     | `true`                   | `VirtualDeferredCommit`   |
//! | `false`            | anything                 | `PhysicallyBacked`        |

mod builder;
mod config;
mod configuration;
mod handle;
mod options;
pub mod platform;
mod release;

#[cfg(feature = "test-utils")]
pub mod test_utils;

// ============================================================================
// Core API
// ============================================================================

pub use builder::UvmBuilder;
pub use config::Uvm;
pub use configuration::VmConfiguration;
pub use handle::{UtilityVm, UvmState};
pub use options::UvmOptions;

pub use uvm_core::{
    GuestPlatform, MemoryBackingPreference, MemoryBackingStrategy, ResourceLimits, select,
};

// Boot configuration
pub use uvm_core::{LinuxBootConfig, LinuxBootMode, WindowsBootConfig};

// Errors
pub use uvm_core::{Error, Result};

// ============================================================================
// Host boundary
// ============================================================================

pub use uvm_core::{
    ComputeSystemDocument, GuestPlatformSupport, HostCapabilities, HostComputeService,
    HostSystem, MemoryBackingSupport, SystemProperties,
};

/// Rendered host document types.
pub mod document {
    pub use uvm_core::document::*;
}

// Re-export for cancelling `UtilityVm::start_with_cancel`.
pub use tokio_util::sync::CancellationToken;
