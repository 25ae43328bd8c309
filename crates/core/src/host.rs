use crate::capabilities::HostCapabilities;
use crate::document::ComputeSystemDocument;
use crate::error::Result;
use crate::types::MemoryBackingStrategy;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

/// What the host reports about a compute system it created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemProperties {
    pub id: String,
    pub processor_count: u32,
    pub memory_size_mb: u64,
    pub memory_backing: MemoryBackingStrategy,
}

/// Host-side representation of one utility VM.
///
/// Exactly one owner holds the box; it is never cloned.
#[async_trait]
pub trait HostSystem: Send + Sync {
    fn id(&self) -> &str;
    async fn properties(&self) -> Result<SystemProperties>;
    /// Powers the system on and resolves once the guest signals readiness.
    /// The host gives up on its own once `deadline` passes.
    async fn start(&self, deadline: Instant) -> Result<()>;
    /// Terminates the system and releases everything tied to it. Safe to call
    /// on a system that is already gone.
    async fn close(&self) -> Result<()>;
}

/// The host compute service utility VMs are allocated from.
#[async_trait]
pub trait HostComputeService: Send + Sync {
    fn name(&self) -> &'static str;
    fn capabilities(&self) -> &HostCapabilities;
    /// Allocates a powered-off compute system named `id`. Ids must be unique
    /// among live systems.
    async fn create(
        &self,
        id: &str,
        document: &ComputeSystemDocument,
    ) -> Result<Box<dyn HostSystem>>;
}
