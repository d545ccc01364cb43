//! Quota accounting and admission control.

use std::fmt;
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use hashbrown::HashMap;
use parking_lot::Mutex;
use scan_history::BoundedHistory;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{GovernorConfig, GovernorError, GovernorResult, ResourceQuota, RetryPolicy};

/// A tracked counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    /// Working memory in bytes.
    Memory,
    /// Persistent storage in bytes.
    Storage,
    /// Transfer volume in bytes.
    Bandwidth,
    /// Concurrently running tasks.
    ConcurrentTasks,
}

impl ResourceKind {
    /// Admission check order.
    pub const CHECK_ORDER: [Self; 4] = [
        Self::Memory,
        Self::Storage,
        Self::Bandwidth,
        Self::ConcurrentTasks,
    ];
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Memory => "memory",
            Self::Storage => "storage",
            Self::Bandwidth => "bandwidth",
            Self::ConcurrentTasks => "concurrent tasks",
        })
    }
}

/// Counter values, used both for current usage and for requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResourceUsage {
    /// Memory bytes.
    pub memory: u64,
    /// Storage bytes.
    pub storage: u64,
    /// Bandwidth bytes in the current activity window.
    pub bandwidth: u64,
    /// Held task slots.
    pub tasks: u64,
}

impl ResourceUsage {
    /// Value of one counter.
    #[must_use]
    pub const fn get(&self, kind: ResourceKind) -> u64 {
        match kind {
            ResourceKind::Memory => self.memory,
            ResourceKind::Storage => self.storage,
            ResourceKind::Bandwidth => self.bandwidth,
            ResourceKind::ConcurrentTasks => self.tasks,
        }
    }

    fn limit(quota: &ResourceQuota, kind: ResourceKind) -> u64 {
        match kind {
            ResourceKind::Memory => quota.memory_bytes,
            ResourceKind::Storage => quota.storage_bytes,
            ResourceKind::Bandwidth => quota.bandwidth_bytes,
            ResourceKind::ConcurrentTasks => quota.concurrent_tasks,
        }
    }
}

/// Amounts requested in one admission.
///
/// # Example
///
/// ```
/// use scan_governor::ResourceRequest;
///
/// let request = ResourceRequest::new().memory(1 << 20).bandwidth(4096).tasks(1);
/// assert_eq!(request.amounts().tasks, 1);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResourceRequest {
    amounts: ResourceUsage,
}

impl ResourceRequest {
    /// Empty request.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            amounts: ResourceUsage {
                memory: 0,
                storage: 0,
                bandwidth: 0,
                tasks: 0,
            },
        }
    }

    /// Sets memory bytes.
    #[must_use]
    pub const fn memory(mut self, bytes: u64) -> Self {
        self.amounts.memory = bytes;
        self
    }

    /// Sets storage bytes.
    #[must_use]
    pub const fn storage(mut self, bytes: u64) -> Self {
        self.amounts.storage = bytes;
        self
    }

    /// Sets bandwidth bytes.
    #[must_use]
    pub const fn bandwidth(mut self, bytes: u64) -> Self {
        self.amounts.bandwidth = bytes;
        self
    }

    /// Sets task slots.
    #[must_use]
    pub const fn tasks(mut self, count: u64) -> Self {
        self.amounts.tasks = count;
        self
    }

    /// Requested amounts.
    #[must_use]
    pub const fn amounts(&self) -> ResourceUsage {
        self.amounts
    }
}

/// What caused a usage sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsageEvent {
    /// A lease was granted.
    Acquired,
    /// A lease was returned.
    Released,
    /// Storage was freed.
    StorageReleased,
    /// Idle bandwidth was reset.
    BandwidthReset,
    /// Stale task slots were reclaimed.
    Reclaimed,
}

/// Usage snapshot taken after every change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsageSample {
    /// When the change happened.
    pub at: Instant,
    /// What changed.
    pub event: UsageEvent,
    /// Usage after the change.
    pub usage: ResourceUsage,
}

#[derive(Debug)]
struct LeaseRecord {
    memory: u64,
    tasks: u64,
    acquired_at: Instant,
    tasks_reclaimed: bool,
}

#[derive(Debug)]
struct State {
    usage: ResourceUsage,
    last_bandwidth_activity: Option<Instant>,
    leases: HashMap<u64, LeaseRecord>,
    next_lease: u64,
    history: BoundedHistory<UsageSample>,
}

impl State {
    fn sample(&mut self, at: Instant, event: UsageEvent) {
        self.history.push(UsageSample {
            at,
            event,
            usage: self.usage,
        });
    }

    fn reset_idle_bandwidth(&mut self, now: Instant, idle: std::time::Duration) -> bool {
        let Some(last) = self.last_bandwidth_activity else {
            return false;
        };
        if self.usage.bandwidth == 0 || now.saturating_duration_since(last) < idle {
            return false;
        }
        self.usage.bandwidth = 0;
        self.last_bandwidth_activity = None;
        self.sample(now, UsageEvent::BandwidthReset);
        true
    }
}

#[derive(Debug)]
pub(crate) struct Inner {
    config: GovernorConfig,
    state: Mutex<State>,
}

impl Inner {
    fn release(&self, lease_id: u64) {
        let mut state = self.state.lock();
        let Some(record) = state.leases.remove(&lease_id) else {
            return;
        };
        state.usage.memory = state.usage.memory.saturating_sub(record.memory);
        if !record.tasks_reclaimed {
            state.usage.tasks = state.usage.tasks.saturating_sub(record.tasks);
        }
        state.sample(Instant::now(), UsageEvent::Released);
        debug!(lease = lease_id, memory = record.memory, tasks = record.tasks, "lease released");
    }
}

/// Shared resource governor. Cloning yields another handle to the same counters.
#[derive(Debug, Clone)]
pub struct ResourceGovernor {
    pub(crate) inner: Arc<Inner>,
}

impl ResourceGovernor {
    /// Creates a governor with zeroed counters.
    #[must_use]
    pub fn new(config: GovernorConfig) -> Self {
        let history = BoundedHistory::new(config.history_capacity);
        Self {
            inner: Arc::new(Inner {
                config,
                state: Mutex::new(State {
                    usage: ResourceUsage::default(),
                    last_bandwidth_activity: None,
                    leases: HashMap::new(),
                    next_lease: 0,
                    history,
                }),
            }),
        }
    }

    /// Configuration in effect.
    #[must_use]
    pub fn config(&self) -> &GovernorConfig {
        &self.inner.config
    }

    /// Current usage.
    #[must_use]
    pub fn usage(&self) -> ResourceUsage {
        self.inner.state.lock().usage
    }

    /// Remaining headroom per counter.
    #[must_use]
    pub fn available(&self) -> ResourceUsage {
        let usage = self.usage();
        let quota = &self.inner.config.quota;
        ResourceUsage {
            memory: quota.memory_bytes.saturating_sub(usage.memory),
            storage: quota.storage_bytes.saturating_sub(usage.storage),
            bandwidth: quota.bandwidth_bytes.saturating_sub(usage.bandwidth),
            tasks: quota.concurrent_tasks.saturating_sub(usage.tasks),
        }
    }

    /// Number of outstanding leases.
    #[must_use]
    pub fn active_leases(&self) -> usize {
        self.inner.state.lock().leases.len()
    }

    /// Recent usage samples, oldest first.
    #[must_use]
    pub fn history(&self) -> Vec<UsageSample> {
        self.inner.state.lock().history.snapshot()
    }

    /// Admits `request` if every counter stays within quota.
    ///
    /// # Errors
    ///
    /// Returns [`GovernorError::ResourceExhausted`] for the first counter (in
    /// [`ResourceKind::CHECK_ORDER`]) that would overflow. Nothing is charged.
    pub fn try_acquire(&self, request: ResourceRequest) -> GovernorResult<ResourceLease> {
        self.try_acquire_at(request, Instant::now())
    }

    /// [`try_acquire`](Self::try_acquire) with an explicit clock reading.
    ///
    /// # Errors
    ///
    /// See [`try_acquire`](Self::try_acquire).
    pub fn try_acquire_at(
        &self,
        request: ResourceRequest,
        now: Instant,
    ) -> GovernorResult<ResourceLease> {
        let config = &self.inner.config;
        let amounts = request.amounts();
        let mut state = self.inner.state.lock();

        state.reset_idle_bandwidth(now, config.bandwidth_idle_reset());

        for kind in ResourceKind::CHECK_ORDER {
            let requested = amounts.get(kind);
            let available =
                ResourceUsage::limit(&config.quota, kind).saturating_sub(state.usage.get(kind));
            if requested > available {
                warn!(%kind, requested, available, "resource admission refused");
                return Err(GovernorError::exhausted(kind, requested, available));
            }
        }

        state.usage.memory += amounts.memory;
        state.usage.storage += amounts.storage;
        state.usage.bandwidth += amounts.bandwidth;
        state.usage.tasks += amounts.tasks;
        if amounts.bandwidth > 0 {
            state.last_bandwidth_activity = Some(now);
        }

        let id = state.next_lease;
        state.next_lease += 1;
        state.leases.insert(
            id,
            LeaseRecord {
                memory: amounts.memory,
                tasks: amounts.tasks,
                acquired_at: now,
                tasks_reclaimed: false,
            },
        );
        state.sample(now, UsageEvent::Acquired);
        debug!(lease = id, memory = amounts.memory, tasks = amounts.tasks, "lease granted");

        Ok(ResourceLease {
            id,
            amounts,
            inner: Some(Arc::clone(&self.inner)),
        })
    }

    /// Admits `request`, retrying with exponential backoff while exhausted.
    ///
    /// # Errors
    ///
    /// Returns the error of the first attempt once all retries are spent.
    pub fn acquire_with_retry(
        &self,
        request: ResourceRequest,
        policy: &RetryPolicy,
    ) -> GovernorResult<ResourceLease> {
        let original = match self.try_acquire(request) {
            Ok(lease) => return Ok(lease),
            Err(err) => err,
        };

        for attempt in 0..policy.max_retries {
            let delay = policy.delay(attempt);
            debug!(attempt, delay_ms = delay.as_millis() as u64, "retrying admission");
            thread::sleep(delay);
            if let Ok(lease) = self.try_acquire(request) {
                return Ok(lease);
            }
        }

        warn!(retries = policy.max_retries, error = %original, "admission retries exhausted");
        Err(original)
    }

    /// Frees persisted storage.
    pub fn release_storage(&self, bytes: u64) {
        let mut state = self.inner.state.lock();
        state.usage.storage = state.usage.storage.saturating_sub(bytes);
        state.sample(Instant::now(), UsageEvent::StorageReleased);
    }

    /// Runs the periodic sweep now.
    pub fn reclaim(&self) -> u64 {
        self.reclaim_at(Instant::now())
    }

    /// Resets idle bandwidth and reclaims task slots from stale leases.
    ///
    /// Returns the number of reclaimed task slots.
    pub fn reclaim_at(&self, now: Instant) -> u64 {
        let config = &self.inner.config;
        let stale_after = config.stale_task_after();
        let mut state = self.inner.state.lock();

        let bandwidth_reset = state.reset_idle_bandwidth(now, config.bandwidth_idle_reset());

        let mut reclaimed = 0;
        for record in state.leases.values_mut() {
            if !record.tasks_reclaimed
                && now.saturating_duration_since(record.acquired_at) >= stale_after
            {
                record.tasks_reclaimed = true;
                reclaimed += record.tasks;
            }
        }
        if reclaimed > 0 {
            state.usage.tasks = state.usage.tasks.saturating_sub(reclaimed);
            state.sample(now, UsageEvent::Reclaimed);
        }

        if reclaimed > 0 || bandwidth_reset {
            info!(reclaimed_tasks = reclaimed, bandwidth_reset, "resources reclaimed");
        }
        reclaimed
    }
}

/// Memory and task slots held for one unit of work.
///
/// Dropping the lease returns them. Storage and bandwidth are not returned.
#[derive(Debug)]
#[must_use = "dropping a lease releases its resources immediately"]
pub struct ResourceLease {
    id: u64,
    amounts: ResourceUsage,
    inner: Option<Arc<Inner>>,
}

impl ResourceLease {
    /// Amounts charged when the lease was granted.
    #[must_use]
    pub const fn amounts(&self) -> ResourceUsage {
        self.amounts
    }

    /// Releases the lease now.
    pub fn release(mut self) {
        self.release_inner();
    }

    fn release_inner(&mut self) {
        if let Some(inner) = self.inner.take() {
            inner.release(self.id);
        }
    }
}

impl Drop for ResourceLease {
    fn drop(&mut self) {
        self.release_inner();
    }
}
