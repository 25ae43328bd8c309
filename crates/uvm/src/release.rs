//! The single release path for host systems.
//!
//! [`release`] consumes the host system box, so a system can be released at
//! most once. [`ReleaseGuard`] holds a system across a transition and, if the
//! transition is abandoned (future dropped, panic), releases it in the
//! background and marks the VM failed.

use crate::handle::UvmState;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use uvm_core::{Error, HostSystem, Result};

pub(crate) async fn release(id: &str, system: Box<dyn HostSystem>) -> Result<()> {
    tracing::debug!(id, "releasing host system");
    system.close().await.map_err(|e| Error::CloseFailed {
        id: id.to_string(),
        reason: e.to_string(),
    })
}

pub(crate) struct ReleaseGuard {
    id: String,
    system: Option<Box<dyn HostSystem>>,
    state: Arc<AtomicU8>,
}

impl ReleaseGuard {
    pub(crate) fn new(id: &str, system: Box<dyn HostSystem>, state: Arc<AtomicU8>) -> Self {
        Self {
            id: id.to_string(),
            system: Some(system),
            state,
        }
    }

    pub(crate) fn system(&self) -> &dyn HostSystem {
        self.system.as_deref().expect("ReleaseGuard system taken")
    }

    /// Hands the system back to its owner; nothing is released.
    pub(crate) fn disarm(mut self) -> Box<dyn HostSystem> {
        self.system.take().expect("ReleaseGuard system taken")
    }

    pub(crate) async fn release(mut self) -> Result<()> {
        let system = self.system.take().expect("ReleaseGuard system taken");
        release(&self.id, system).await
    }
}

impl Drop for ReleaseGuard {
    fn drop(&mut self) {
        let Some(system) = self.system.take() else {
            return;
        };

        self.state.store(UvmState::Failed.as_u8(), Ordering::SeqCst);

        let id = self.id.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                tracing::warn!(id = %id, "host system abandoned; releasing in background");
                runtime.spawn(async move {
                    if let Err(e) = release(&id, system).await {
                        tracing::error!(id = %id, error = %e, "background release failed");
                    }
                });
            }
            Err(_) => {
                tracing::error!(id = %id, "no async runtime to release host system; it is leaked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;
    use tokio::time::Instant;
    use uvm_core::{MemoryBackingStrategy, SystemProperties};

    struct CountingSystem {
        closes: Arc<AtomicUsize>,
        fail_close: bool,
    }

    #[async_trait]
    impl HostSystem for CountingSystem {
        fn id(&self) -> &str {
            "counting"
        }

        async fn properties(&self) -> Result<SystemProperties> {
            Ok(SystemProperties {
                id: "counting".into(),
                processor_count: 1,
                memory_size_mb: 512,
                memory_backing: MemoryBackingStrategy::VirtualOvercommit,
            })
        }

        async fn start(&self, _deadline: Instant) -> Result<()> {
            Ok(())
        }

        async fn close(&self) -> Result<()> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            if self.fail_close {
                Err(Error::Hypervisor("handle is gone".into()))
            } else {
                Ok(())
            }
        }
    }

    fn guard(closes: &Arc<AtomicUsize>, state: &Arc<AtomicU8>) -> ReleaseGuard {
        let system = CountingSystem {
            closes: Arc::clone(closes),
            fail_close: false,
        };
        ReleaseGuard::new("uvm-test", Box::new(system), Arc::clone(state))
    }

    #[tokio::test]
    async fn release_closes_once() {
        let closes = Arc::new(AtomicUsize::new(0));
        let state = Arc::new(AtomicU8::new(UvmState::Created.as_u8()));
        guard(&closes, &state).release().await.unwrap();
        assert_eq!(closes.load(Ordering::SeqCst), 1);
        assert_eq!(UvmState::from_u8(state.load(Ordering::SeqCst)), UvmState::Created);
    }

    #[tokio::test]
    async fn disarm_keeps_system_alive() {
        let closes = Arc::new(AtomicUsize::new(0));
        let state = Arc::new(AtomicU8::new(UvmState::Created.as_u8()));
        let system = guard(&closes, &state).disarm();
        tokio::task::yield_now().await;
        assert_eq!(closes.load(Ordering::SeqCst), 0);
        drop(system);
    }

    #[tokio::test]
    async fn dropped_guard_releases_in_background() {
        let closes = Arc::new(AtomicUsize::new(0));
        let state = Arc::new(AtomicU8::new(UvmState::Starting.as_u8()));
        drop(guard(&closes, &state));

        assert_eq!(UvmState::from_u8(state.load(Ordering::SeqCst)), UvmState::Failed);
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn close_error_becomes_close_failed() {
        let closes = Arc::new(AtomicUsize::new(0));
        let system = CountingSystem {
            closes: Arc::clone(&closes),
            fail_close: true,
        };
        let err = release("uvm-test", Box::new(system)).await.unwrap_err();
        assert!(matches!(err, Error::CloseFailed { id, reason } if id == "uvm-test" && reason.contains("gone")));
    }
}
