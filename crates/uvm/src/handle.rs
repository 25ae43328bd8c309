//! Utility VM lifecycle controller.
//!
//! A [`UtilityVm`] owns its configuration and, once created, the host system
//! backing it. It moves through
//!
//! ```text
//! Constructed -> Created -> Starting -> Running -> Closing -> Closed
//! ```
//!
//! with `Failed` reachable from any non-terminal state. Transitions on one
//! instance are serialized; separate instances are fully independent.
//!
//! # Cleanup
//!
//! A failed [`create`](UtilityVm::create) or [`start`](UtilityVm::start)
//! releases whatever host system it obtained before returning, so callers never
//! have to close after a failure. [`close`](UtilityVm::close) is idempotent and
//! may be called any number of times, in any state.

use crate::configuration::VmConfiguration;
use crate::release::{ReleaseGuard, release};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uvm_core::{
    Error, GuestPlatform, HostComputeService, HostSystem, MemoryBackingStrategy, ResourceLimits,
    Result,
};

const STATE_CONSTRUCTED: u8 = 0;
const STATE_CREATED: u8 = 1;
const STATE_STARTING: u8 = 2;
const STATE_RUNNING: u8 = 3;
const STATE_CLOSING: u8 = 4;
const STATE_CLOSED: u8 = 5;
const STATE_FAILED: u8 = 6;

/// Lifecycle state of a utility VM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UvmState {
    /// Configuration built, nothing allocated on the host.
    Constructed,
    /// Host system allocated but powered off.
    Created,
    /// Powered on, waiting for the guest to signal readiness.
    Starting,
    Running,
    Closing,
    Closed,
    /// A transition failed; the host system has been released.
    Failed,
}

impl UvmState {
    pub fn name(&self) -> &'static str {
        match self {
            UvmState::Constructed => "constructed",
            UvmState::Created => "created",
            UvmState::Starting => "starting",
            UvmState::Running => "running",
            UvmState::Closing => "closing",
            UvmState::Closed => "closed",
            UvmState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, UvmState::Closed | UvmState::Failed)
    }

    pub(crate) fn as_u8(self) -> u8 {
        match self {
            UvmState::Constructed => STATE_CONSTRUCTED,
            UvmState::Created => STATE_CREATED,
            UvmState::Starting => STATE_STARTING,
            UvmState::Running => STATE_RUNNING,
            UvmState::Closing => STATE_CLOSING,
            UvmState::Closed => STATE_CLOSED,
            UvmState::Failed => STATE_FAILED,
        }
    }

    pub(crate) fn from_u8(val: u8) -> Self {
        match val {
            STATE_CONSTRUCTED => UvmState::Constructed,
            STATE_CREATED => UvmState::Created,
            STATE_STARTING => UvmState::Starting,
            STATE_RUNNING => UvmState::Running,
            STATE_CLOSING => UvmState::Closing,
            STATE_CLOSED => UvmState::Closed,
            _ => UvmState::Failed,
        }
    }
}

impl fmt::Display for UvmState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

struct Inner {
    system: Option<Box<dyn HostSystem>>,
}

/// A utility VM and the host resources it owns.
///
/// Built by [`UvmBuilder::build`](crate::UvmBuilder::build) or
/// [`UtilityVm::construct`]. Dropping an instance that still owns a host
/// system releases it in the background; prefer calling [`close`](Self::close).
pub struct UtilityVm {
    configuration: VmConfiguration,
    host: Arc<dyn HostComputeService>,
    state: Arc<AtomicU8>,
    inner: Mutex<Inner>,
}

impl UtilityVm {
    /// Wraps an already validated configuration. Nothing is allocated until
    /// [`create`](Self::create).
    pub fn construct(configuration: VmConfiguration, host: Arc<dyn HostComputeService>) -> Self {
        tracing::debug!(
            id = configuration.id(),
            host = host.name(),
            "utility VM constructed"
        );
        Self {
            configuration,
            host,
            state: Arc::new(AtomicU8::new(STATE_CONSTRUCTED)),
            inner: Mutex::new(Inner { system: None }),
        }
    }

    /// Allocates the host-side compute system.
    ///
    /// On failure the VM is `Failed` and nothing is left allocated on the host.
    pub async fn create(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;
        self.expect_state(UvmState::Created, UvmState::Constructed, "create")?;

        let id = self.id();
        let document = self.configuration.to_document();
        tracing::info!(
            id,
            platform = %self.configuration.guest_platform(),
            strategy = %self.configuration.backing(),
            cpus = self.configuration.processor_count(),
            memory_mb = self.configuration.memory_size_mb(),
            "creating utility VM"
        );

        let system = match self.host.create(id, &document).await {
            Ok(system) => system,
            Err(e) => {
                self.set_state(UvmState::Failed);
                tracing::error!(id, error = %e, "host rejected utility VM");
                return Err(Error::CreateFailed {
                    id: id.to_string(),
                    reason: e.to_string(),
                });
            }
        };

        let guard = ReleaseGuard::new(id, system, Arc::clone(&self.state));
        if let Err(e) = self.verify(guard.system()).await {
            tracing::error!(id, error = %e, "created system does not match configuration");
            if let Err(close_err) = guard.release().await {
                tracing::warn!(id, error = %close_err, "failed to release partially created system");
            }
            self.set_state(UvmState::Failed);
            return Err(Error::CreateFailed {
                id: id.to_string(),
                reason: e.to_string(),
            });
        }

        inner.system = Some(guard.disarm());
        self.set_state(UvmState::Created);
        tracing::info!(id, "utility VM created");
        Ok(())
    }

    async fn verify(&self, system: &dyn HostSystem) -> Result<()> {
        let props = system.properties().await?;
        let expected_cpus = self.configuration.processor_count();
        let expected_mb = self.configuration.memory_size_mb();
        let expected_backing = self.configuration.backing();

        if props.processor_count != expected_cpus {
            return Err(Error::Hypervisor(format!(
                "host allocated {} processors, expected {expected_cpus}",
                props.processor_count
            )));
        }
        if props.memory_size_mb != expected_mb {
            return Err(Error::Hypervisor(format!(
                "host allocated {} MB, expected {expected_mb} MB",
                props.memory_size_mb
            )));
        }
        if props.memory_backing != expected_backing {
            return Err(Error::Hypervisor(format!(
                "host applied {} memory backing, expected {expected_backing}",
                props.memory_backing
            )));
        }
        Ok(())
    }

    /// Powers the VM on and waits up to `timeout` for the guest to be ready.
    pub async fn start(&self, timeout: Duration) -> Result<()> {
        self.start_with_cancel(timeout, CancellationToken::new())
            .await
    }

    /// Like [`start`](Self::start), but also gives up when `cancel` fires.
    ///
    /// Any failure, timeout or cancellation releases the host system before
    /// returning and leaves the VM `Failed`. Dropping the returned future
    /// mid-start does the same in the background.
    pub async fn start_with_cancel(
        &self,
        timeout: Duration,
        cancel: CancellationToken,
    ) -> Result<()> {
        let mut inner = self.inner.lock().await;
        self.expect_state(UvmState::Running, UvmState::Created, "start")?;

        let id = self.id();
        let system = inner.system.take().ok_or_else(|| Error::InvalidState {
            id: id.to_string(),
            operation: "start",
            state: UvmState::Created.name(),
        })?;
        let guard = ReleaseGuard::new(id, system, Arc::clone(&self.state));

        self.set_state(UvmState::Starting);
        tracing::info!(id, timeout = ?timeout, "starting utility VM");

        let deadline = Instant::now() + timeout;
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Error::Cancelled { id: id.to_string() }),
            result = tokio::time::timeout_at(deadline, guard.system().start(deadline)) => {
                match result {
                    Ok(Ok(())) => Ok(()),
                    // The host enforces the same deadline and may give up first.
                    Ok(Err(_)) if Instant::now() >= deadline => Err(Error::StartTimeout {
                        id: id.to_string(),
                        timeout,
                    }),
                    Ok(Err(e)) => Err(Error::StartFailed {
                        id: id.to_string(),
                        reason: e.to_string(),
                    }),
                    Err(_) => Err(Error::StartTimeout {
                        id: id.to_string(),
                        timeout,
                    }),
                }
            }
        };

        match outcome {
            Ok(()) => {
                inner.system = Some(guard.disarm());
                self.set_state(UvmState::Running);
                tracing::info!(id, "utility VM running");
                Ok(())
            }
            Err(err) => {
                tracing::warn!(id, error = %err, "start failed, releasing host system");
                if let Err(close_err) = guard.release().await {
                    tracing::warn!(id, error = %close_err, "failed to release system after start failure");
                }
                self.set_state(UvmState::Failed);
                Err(err)
            }
        }
    }

    /// Tears the VM down and releases its host system.
    ///
    /// Idempotent: closing a `Closed` or `Failed` VM succeeds without touching
    /// the host. A host release error is returned as
    /// [`Error::CloseFailed`], but the VM is still considered `Closed`.
    pub async fn close(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let id = self.id();

        match self.state() {
            UvmState::Closed => return Ok(()),
            UvmState::Failed => {
                if let Some(system) = inner.system.take() {
                    if let Err(e) = release(id, system).await {
                        tracing::warn!(id, error = %e, "best-effort release of failed VM failed");
                    }
                }
                return Ok(());
            }
            _ => {}
        }

        let Some(system) = inner.system.take() else {
            self.set_state(UvmState::Closed);
            return Ok(());
        };

        self.set_state(UvmState::Closing);
        let result = release(id, system).await;
        self.set_state(UvmState::Closed);

        match &result {
            Ok(()) => tracing::info!(id, "utility VM closed"),
            Err(e) => tracing::error!(id, error = %e, "host system may be leaked"),
        }
        result
    }

    pub fn id(&self) -> &str {
        self.configuration.id()
    }

    /// Current state. Does not wait for an in-flight transition.
    pub fn state(&self) -> UvmState {
        UvmState::from_u8(self.state.load(Ordering::SeqCst))
    }

    pub fn backing(&self) -> MemoryBackingStrategy {
        self.configuration.backing()
    }

    pub fn guest_platform(&self) -> GuestPlatform {
        self.configuration.guest_platform()
    }

    pub fn resources(&self) -> &ResourceLimits {
        self.configuration.resources()
    }

    pub fn configuration(&self) -> &VmConfiguration {
        &self.configuration
    }

    fn set_state(&self, state: UvmState) {
        self.state.store(state.as_u8(), Ordering::SeqCst);
    }

    /// Checks that `operation` may run from the current state.
    fn expect_state(
        &self,
        target: UvmState,
        required: UvmState,
        operation: &'static str,
    ) -> Result<()> {
        let current = self.state();
        if current == required {
            return Ok(());
        }
        tracing::debug!(id = self.id(), %current, %target, operation, "rejected transition");
        Err(Error::InvalidState {
            id: self.id().to_string(),
            operation,
            state: current.name(),
        })
    }
}

impl Drop for UtilityVm {
    fn drop(&mut self) {
        if let Some(system) = self.inner.get_mut().system.take() {
            drop(ReleaseGuard::new(
                self.configuration.id(),
                system,
                Arc::clone(&self.state),
            ));
        }
    }
}

impl fmt::Debug for UtilityVm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UtilityVm")
            .field("id", &self.id())
            .field("state", &self.state())
            .field("backing", &self.backing())
            .finish()
    }
}
