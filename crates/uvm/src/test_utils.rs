//! In-memory host compute service for tests.
//!
//! [`FakeHostService`] creates [`HostSystem`]s that only record what happens
//! to them. Failures, hangs and panics can be injected at each host call, and
//! counters expose how many systems were created, started and closed so tests
//! can check that nothing leaks.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;
use uvm_core::{
    ComputeSystemDocument, Error, HostCapabilities, HostComputeService, HostSystem, Result,
    SystemProperties,
};

/// Host call at which the fake misbehaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailurePoint {
    /// `create` returns an error.
    Create,
    /// `properties` returns an error.
    Properties,
    /// `properties` reports one more processor than requested.
    PropertiesMismatch,
    /// `start` returns an error.
    Start,
    /// `start` never resolves.
    StartHang,
    /// `start` waits out its deadline and then reports an error, like a host
    /// that enforces the deadline itself.
    StartDeadline,
    /// `start` panics.
    StartPanic,
    /// `close` returns an error and leaves the system allocated.
    Close,
}

#[derive(Debug, Clone, Default)]
struct Faults {
    failures: HashSet<FailurePoint>,
    start_delay: Duration,
    operation_delay: Duration,
}

impl Faults {
    fn fails_at(&self, point: FailurePoint) -> bool {
        self.failures.contains(&point)
    }
}

#[derive(Debug, Default)]
struct Stats {
    create_calls: AtomicUsize,
    properties_calls: AtomicUsize,
    start_calls: AtomicUsize,
    close_calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    /// Live system ids and the physical memory they pin, in MiB.
    live: Mutex<HashMap<String, u64>>,
    last_document: Mutex<Option<ComputeSystemDocument>>,
}

impl Stats {
    fn enter(self: &Arc<Self>) -> InFlight {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        InFlight(Arc::clone(self))
    }
}

struct InFlight(Arc<Stats>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Host compute service that keeps everything in memory.
///
/// ```rust
/// # use std::sync::Arc;
/// # use uvm::test_utils::{FailurePoint, FakeHostService};
/// let host = Arc::new(FakeHostService::new().fail_at(FailurePoint::Start));
/// assert_eq!(host.create_calls(), 0);
/// ```
#[derive(Debug)]
pub struct FakeHostService {
    capabilities: HostCapabilities,
    faults: Faults,
    physical_memory_limit_mb: Option<u64>,
    stats: Arc<Stats>,
}

impl Default for FakeHostService {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeHostService {
    pub fn new() -> Self {
        Self {
            capabilities: HostCapabilities::all(),
            faults: Faults::default(),
            physical_memory_limit_mb: None,
            stats: Arc::new(Stats::default()),
        }
    }

    pub fn with_capabilities(mut self, capabilities: HostCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn fail_at(mut self, point: FailurePoint) -> Self {
        self.faults.failures.insert(point);
        self
    }

    /// Time `start` takes before the guest reports ready.
    pub fn with_start_delay(mut self, delay: Duration) -> Self {
        self.faults.start_delay = delay;
        self
    }

    /// Time every other host call takes.
    pub fn with_operation_delay(mut self, delay: Duration) -> Self {
        self.faults.operation_delay = delay;
        self
    }

    /// Caps the memory all live physically backed systems may pin together.
    pub fn with_physical_memory_limit_mb(mut self, limit: u64) -> Self {
        self.physical_memory_limit_mb = Some(limit);
        self
    }

    pub fn create_calls(&self) -> usize {
        self.stats.create_calls.load(Ordering::SeqCst)
    }

    pub fn properties_calls(&self) -> usize {
        self.stats.properties_calls.load(Ordering::SeqCst)
    }

    pub fn start_calls(&self) -> usize {
        self.stats.start_calls.load(Ordering::SeqCst)
    }

    pub fn close_calls(&self) -> usize {
        self.stats.close_calls.load(Ordering::SeqCst)
    }

    /// Total host calls of any kind.
    pub fn total_calls(&self) -> usize {
        self.create_calls() + self.properties_calls() + self.start_calls() + self.close_calls()
    }

    /// Systems created and not yet successfully closed.
    pub fn live_systems(&self) -> usize {
        lock(&self.stats.live).len()
    }

    pub fn is_live(&self, id: &str) -> bool {
        lock(&self.stats.live).contains_key(id)
    }

    /// Highest number of host calls that were ever in progress at once.
    pub fn max_concurrent_calls(&self) -> usize {
        self.stats.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn last_document(&self) -> Option<ComputeSystemDocument> {
        lock(&self.stats.last_document).clone()
    }

    async fn delay(&self) {
        if !self.faults.operation_delay.is_zero() {
            tokio::time::sleep(self.faults.operation_delay).await;
        }
    }
}

#[async_trait]
impl HostComputeService for FakeHostService {
    fn name(&self) -> &'static str {
        "fake"
    }

    fn capabilities(&self) -> &HostCapabilities {
        &self.capabilities
    }

    async fn create(
        &self,
        id: &str,
        document: &ComputeSystemDocument,
    ) -> Result<Box<dyn HostSystem>> {
        self.stats.create_calls.fetch_add(1, Ordering::SeqCst);
        let _in_flight = self.stats.enter();
        *lock(&self.stats.last_document) = Some(document.clone());
        self.delay().await;

        if self.faults.fails_at(FailurePoint::Create) {
            return Err(Error::Hypervisor("injected create failure".into()));
        }

        let backing = document.memory_backing().ok_or_else(|| {
            Error::Hypervisor("memory flags do not describe a backing strategy".into())
        })?;
        let topology = &document.virtual_machine.compute_topology;
        let pinned_mb = if backing.is_physically_backed() {
            topology.memory.size_in_mb
        } else {
            0
        };

        {
            let mut live = lock(&self.stats.live);
            if live.contains_key(id) {
                return Err(Error::Hypervisor(format!(
                    "a compute system named '{id}' already exists"
                )));
            }
            if let Some(limit) = self.physical_memory_limit_mb {
                let pinned: u64 = live.values().sum();
                if pinned + pinned_mb > limit {
                    return Err(Error::Hypervisor(format!(
                        "insufficient physical memory: {pinned_mb} MB requested, {} MB available",
                        limit.saturating_sub(pinned)
                    )));
                }
            }
            live.insert(id.to_string(), pinned_mb);
        }

        Ok(Box::new(FakeSystem {
            properties: SystemProperties {
                id: id.to_string(),
                processor_count: topology.processor.count,
                memory_size_mb: topology.memory.size_in_mb,
                memory_backing: backing,
            },
            faults: self.faults.clone(),
            stats: Arc::clone(&self.stats),
            closed: AtomicBool::new(false),
        }))
    }
}

struct FakeSystem {
    properties: SystemProperties,
    faults: Faults,
    stats: Arc<Stats>,
    closed: AtomicBool,
}

impl FakeSystem {
    async fn delay(&self) {
        if !self.faults.operation_delay.is_zero() {
            tokio::time::sleep(self.faults.operation_delay).await;
        }
    }
}

#[async_trait]
impl HostSystem for FakeSystem {
    fn id(&self) -> &str {
        &self.properties.id
    }

    async fn properties(&self) -> Result<SystemProperties> {
        self.stats.properties_calls.fetch_add(1, Ordering::SeqCst);
        let _in_flight = self.stats.enter();
        self.delay().await;

        if self.faults.fails_at(FailurePoint::Properties) {
            return Err(Error::Hypervisor("injected properties failure".into()));
        }

        let mut properties = self.properties.clone();
        if self.faults.fails_at(FailurePoint::PropertiesMismatch) {
            properties.processor_count += 1;
        }
        Ok(properties)
    }

    async fn start(&self, deadline: Instant) -> Result<()> {
        self.stats.start_calls.fetch_add(1, Ordering::SeqCst);
        let _in_flight = self.stats.enter();

        if self.faults.fails_at(FailurePoint::StartPanic) {
            panic!("injected start panic for '{}'", self.properties.id);
        }
        if self.faults.fails_at(FailurePoint::StartDeadline) {
            tokio::time::sleep_until(deadline).await;
            return Err(Error::Hypervisor("deadline exceeded waiting for guest".into()));
        }
        if self.faults.fails_at(FailurePoint::StartHang) {
            std::future::pending::<()>().await;
        }
        if !self.faults.start_delay.is_zero() {
            tokio::time::sleep(self.faults.start_delay).await;
        }
        if Instant::now() > deadline {
            return Err(Error::Hypervisor("guest missed its start deadline".into()));
        }
        if self.faults.fails_at(FailurePoint::Start) {
            return Err(Error::Hypervisor("injected start failure".into()));
        }
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.stats.close_calls.fetch_add(1, Ordering::SeqCst);
        let _in_flight = self.stats.enter();
        self.delay().await;

        if self.faults.fails_at(FailurePoint::Close) {
            return Err(Error::Hypervisor("injected close failure".into()));
        }
        if !self.closed.swap(true, Ordering::SeqCst) {
            lock(&self.stats.live).remove(&self.properties.id);
        }
        Ok(())
    }
}
