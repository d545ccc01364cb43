//! The interruption and recovery manager.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, SystemTime};

use crossbeam_channel::{select, Receiver, Sender};
use hashbrown::HashMap;
use parking_lot::Mutex;
use scan_history::{BoundedHistory, KeyedHistory};
use scan_types::{AuditSink, Matrix4, MeshFragment, ScanId, SecureStorage, Timestamp};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{
    classify, InterruptionType, MonitorEvent, NoopTarget, RecoveryConfig, RecoveryContext,
    RecoveryError, RecoveryPoint, RecoveryResult, RecoveryStrategy, RecoveryTarget,
};

/// Successful recovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryReport {
    /// Scan recovered.
    pub scan: ScanId,
    /// Interruption handled.
    pub interruption: InterruptionType,
    /// Strategy that ran.
    pub strategy: RecoveryStrategy,
    /// Time the execute step took.
    pub duration: Duration,
    /// Recovery point handed to the strategy.
    pub restored_point: Option<String>,
}

/// How an interruption ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InterruptionOutcome {
    /// The bound strategy succeeded.
    Recovered {
        /// Strategy that ran.
        strategy: RecoveryStrategy,
        /// Execute step duration.
        duration: Duration,
    },
    /// Nothing was bound to the interruption type.
    NoStrategy,
    /// The bound strategy failed.
    Failed {
        /// Strategy that ran.
        strategy: RecoveryStrategy,
        /// Failing step and cause.
        cause: String,
    },
}

/// One handled interruption.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterruptionRecord {
    /// Scan interrupted.
    pub scan: ScanId,
    /// Classified interruption.
    pub interruption: InterruptionType,
    /// Triggering event, when it came through a monitor.
    pub event: Option<MonitorEvent>,
    /// Wall-clock time handled.
    pub occurred_at: SystemTime,
    /// Outcome.
    pub outcome: InterruptionOutcome,
}

#[derive(Debug)]
struct MonitorState {
    started: SystemTime,
    interruptions: u32,
    stop: Option<Sender<()>>,
}

impl MonitorState {
    fn signal_stop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.try_send(());
        }
    }
}

struct Shared {
    config: RecoveryConfig,
    target: Arc<dyn RecoveryTarget>,
    storage: Option<Arc<dyn SecureStorage>>,
    audit: Option<Arc<dyn AuditSink>>,
    strategies: Mutex<HashMap<InterruptionType, RecoveryStrategy>>,
    monitors: Mutex<HashMap<ScanId, MonitorState>>,
    points: Mutex<KeyedHistory<ScanId, RecoveryPoint>>,
    history: Mutex<BoundedHistory<InterruptionRecord>>,
}

/// Watches scans for interruptions and runs the bound recovery strategy.
///
/// Each monitored scan has one monitor. Events arrive either through the
/// [`MonitorHandle`] returned by [`start_monitoring`](Self::start_monitoring),
/// which processes them on its own thread, or synchronously through
/// [`handle_event`](Self::handle_event). Every interruption is recorded,
/// whatever the outcome, and a failed or unhandled interruption never ends
/// the monitor.
///
/// # Example
///
/// ```
/// use scan_recovery::{MonitorEvent, RecoveryError, RecoveryManager, SystemSignal, InterruptionType};
/// use scan_types::ScanId;
///
/// let manager = RecoveryManager::default();
/// let _monitor = manager.start_monitoring(ScanId(1));
///
/// manager.unregister_strategy(InterruptionType::MemoryWarning);
/// let err = manager
///     .handle_event(ScanId(1), &MonitorEvent::System(SystemSignal::MemoryPressure))
///     .unwrap_err();
/// assert!(matches!(err, RecoveryError::NoStrategy { .. }));
/// assert!(manager.is_monitoring(ScanId(1)));
/// ```
pub struct RecoveryManager {
    shared: Arc<Shared>,
}

impl Default for RecoveryManager {
    fn default() -> Self {
        Self::new(RecoveryConfig::default(), Arc::new(NoopTarget))
    }
}

impl std::fmt::Debug for RecoveryManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecoveryManager")
            .field("config", &self.shared.config)
            .field("monitors", &self.shared.monitors.lock().len())
            .field("strategies", &self.shared.strategies.lock().len())
            .finish_non_exhaustive()
    }
}

impl RecoveryManager {
    /// Creates a manager with the default strategy bindings.
    #[must_use]
    pub fn new(config: RecoveryConfig, target: Arc<dyn RecoveryTarget>) -> Self {
        Self::build(config, target, None, None)
    }

    /// Creates a manager that backs recovery points up to `storage` and
    /// audits backup failures to `audit`.
    #[must_use]
    pub fn with_storage(
        config: RecoveryConfig,
        target: Arc<dyn RecoveryTarget>,
        storage: Arc<dyn SecureStorage>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self::build(config, target, Some(storage), Some(audit))
    }

    fn build(
        config: RecoveryConfig,
        target: Arc<dyn RecoveryTarget>,
        storage: Option<Arc<dyn SecureStorage>>,
        audit: Option<Arc<dyn AuditSink>>,
    ) -> Self {
        let strategies = InterruptionType::ALL
            .iter()
            .map(|&t| (t, RecoveryStrategy::default_for(t)))
            .collect();
        Self {
            shared: Arc::new(Shared {
                config,
                target,
                storage,
                audit,
                strategies: Mutex::new(strategies),
                monitors: Mutex::new(HashMap::new()),
                points: Mutex::new(KeyedHistory::new(config.max_recovery_points)),
                history: Mutex::new(BoundedHistory::new(config.history_capacity)),
            }),
        }
    }

    /// Configuration in use.
    #[must_use]
    pub fn config(&self) -> &RecoveryConfig {
        &self.shared.config
    }

    /// Binds `strategy` to `interruption`. Returns the previous binding.
    pub fn register_strategy(
        &self,
        interruption: InterruptionType,
        strategy: RecoveryStrategy,
    ) -> Option<RecoveryStrategy> {
        self.shared.strategies.lock().insert(interruption, strategy)
    }

    /// Removes the binding for `interruption`. Returns it if there was one.
    pub fn unregister_strategy(&self, interruption: InterruptionType) -> Option<RecoveryStrategy> {
        self.shared.strategies.lock().remove(&interruption)
    }

    /// Strategy currently bound to `interruption`.
    #[must_use]
    pub fn strategy_for(&self, interruption: InterruptionType) -> Option<RecoveryStrategy> {
        self.shared.strategies.lock().get(&interruption).copied()
    }

    /// Starts a monitor for `scan` with its own event thread.
    ///
    /// A scan has at most one monitor; starting again replaces the previous
    /// one, whose thread stops.
    pub fn start_monitoring(&self, scan: ScanId) -> MonitorHandle {
        let (event_tx, event_rx) = crossbeam_channel::unbounded::<MonitorEvent>();
        let (outcome_tx, outcome_rx) = crossbeam_channel::unbounded();
        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(1);

        {
            let mut monitors = self.shared.monitors.lock();
            let previous = monitors.insert(
                scan,
                MonitorState {
                    started: SystemTime::now(),
                    interruptions: 0,
                    stop: Some(stop_tx.clone()),
                },
            );
            if let Some(mut previous) = previous {
                previous.signal_stop();
                info!(%scan, "replacing existing monitor");
            }
        }

        let shared = Arc::clone(&self.shared);
        let thread = thread::Builder::new()
            .name(format!("recovery-{scan}"))
            .spawn(move || monitor_loop(&shared, scan, &event_rx, &stop_rx, &outcome_tx));
        let thread = match thread {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!(%scan, error = %e, "monitor thread failed to start; use handle_event");
                None
            }
        };

        info!(%scan, "monitoring started");
        MonitorHandle {
            scan,
            events: event_tx,
            outcomes: outcome_rx,
            stop: Some(stop_tx),
            thread,
        }
    }

    /// Whether `scan` has an active monitor.
    #[must_use]
    pub fn is_monitoring(&self, scan: ScanId) -> bool {
        self.shared.monitors.lock().contains_key(&scan)
    }

    /// Scans with an active monitor.
    #[must_use]
    pub fn monitored_scans(&self) -> Vec<ScanId> {
        self.shared.monitors.lock().keys().copied().collect()
    }

    /// Interruptions handled for `scan` since its monitor started.
    #[must_use]
    pub fn interruption_count(&self, scan: ScanId) -> Option<u32> {
        self.shared.monitors.lock().get(&scan).map(|m| m.interruptions)
    }

    /// Stops the monitor for `scan`. Returns `false` if there was none.
    pub fn stop_monitoring(&self, scan: ScanId) -> bool {
        let removed = self.shared.monitors.lock().remove(&scan);
        match removed {
            Some(mut state) => {
                state.signal_stop();
                let uptime = state.started.elapsed().unwrap_or_default();
                info!(
                    %scan,
                    interruptions = state.interruptions,
                    uptime_s = uptime.as_secs_f64(),
                    "monitoring stopped"
                );
                true
            }
            None => false,
        }
    }

    /// Classifies `event` and recovers if it is an interruption.
    ///
    /// Returns `Ok(None)` for events that are not interruptions.
    ///
    /// # Errors
    ///
    /// - [`RecoveryError::NotMonitored`] if `scan` has no monitor
    /// - [`RecoveryError::NoStrategy`] if nothing is bound to the interruption
    /// - [`RecoveryError::RecoveryFailed`] if the strategy failed
    pub fn handle_event(&self, scan: ScanId, event: &MonitorEvent) -> RecoveryResult<Option<RecoveryReport>> {
        self.shared.handle_event(scan, event)
    }

    /// Recovers `scan` from `interruption` directly.
    ///
    /// # Errors
    ///
    /// Same as [`handle_event`](Self::handle_event).
    pub fn handle_interruption(
        &self,
        scan: ScanId,
        interruption: InterruptionType,
    ) -> RecoveryResult<RecoveryReport> {
        self.shared.recover(scan, interruption, None)
    }

    /// Interruption records across all scans, oldest first.
    #[must_use]
    pub fn interruption_history(&self) -> Vec<InterruptionRecord> {
        self.shared.history.lock().snapshot()
    }

    /// Stores a recovery point, evicting the scan's oldest beyond the cap,
    /// and backs it up to secure storage when configured.
    pub fn create_recovery_point(
        &self,
        scan: ScanId,
        name: impl Into<String>,
        timestamp: Timestamp,
        camera_pose: Matrix4<f64>,
        fragments: Vec<MeshFragment>,
    ) -> RecoveryPoint {
        let point = RecoveryPoint::new(scan, name, timestamp, camera_pose, fragments);
        let evicted = self.shared.points.lock().record(scan, point.clone());
        if let Some(old) = &evicted {
            self.shared.delete_backup(scan, &old.name);
        }
        self.shared.backup(&point);
        debug!(
            %scan,
            name = %point.name,
            fragments = point.fragments.len(),
            vertices = point.vertex_count(),
            evicted = evicted.is_some(),
            "recovery point created"
        );
        point
    }

    /// Recovery points of `scan`, oldest first.
    #[must_use]
    pub fn recovery_points(&self, scan: ScanId) -> Vec<RecoveryPoint> {
        self.shared.points.lock().snapshot(&scan)
    }

    /// Restores the latest recovery point, or the one named `name`.
    ///
    /// Points no longer in memory are looked up in secure storage by name.
    ///
    /// # Errors
    ///
    /// Returns [`RecoveryError::RecoveryPointNotFound`] if no point matches.
    pub fn restore_recovery_point(&self, scan: ScanId, name: Option<&str>) -> RecoveryResult<RecoveryPoint> {
        let found = {
            let points = self.shared.points.lock();
            match name {
                None => points.latest(&scan).cloned(),
                Some(name) => points
                    .get(&scan)
                    .and_then(|h| h.iter().rev().find(|p| p.name == name).cloned()),
            }
        };
        let found = found.or_else(|| name.and_then(|n| self.shared.load_backup(scan, n)));
        match found {
            Some(point) => {
                info!(%scan, name = %point.name, "recovery point restored");
                Ok(point)
            }
            None => Err(RecoveryError::RecoveryPointNotFound {
                scan,
                name: name.map(str::to_string),
            }),
        }
    }

    /// Drops every recovery point of `scan` along with its backups.
    /// Returns how many were dropped.
    pub fn clear_recovery_points(&self, scan: ScanId) -> usize {
        let removed = self.shared.points.lock().remove(&scan).unwrap_or_default();
        for point in &removed {
            self.shared.delete_backup(scan, &point.name);
        }
        removed.len()
    }
}

impl Drop for RecoveryManager {
    fn drop(&mut self) {
        for state in self.shared.monitors.lock().values_mut() {
            state.signal_stop();
        }
    }
}

impl Shared {
    fn handle_event(&self, scan: ScanId, event: &MonitorEvent) -> RecoveryResult<Option<RecoveryReport>> {
        if !self.monitors.lock().contains_key(&scan) {
            return Err(RecoveryError::NotMonitored { scan });
        }
        let Some(interruption) = classify(event) else {
            debug!(%scan, ?event, "event is not an interruption");
            return Ok(None);
        };
        self.recover(scan, interruption, Some(event.clone())).map(Some)
    }

    fn recover(
        &self,
        scan: ScanId,
        interruption: InterruptionType,
        event: Option<MonitorEvent>,
    ) -> RecoveryResult<RecoveryReport> {
        {
            let mut monitors = self.monitors.lock();
            let state = monitors
                .get_mut(&scan)
                .ok_or(RecoveryError::NotMonitored { scan })?;
            state.interruptions += 1;
        }

        let Some(strategy) = self.strategies.lock().get(&interruption).copied() else {
            warn!(%scan, %interruption, "no recovery strategy bound");
            self.record(scan, interruption, event, InterruptionOutcome::NoStrategy);
            return Err(RecoveryError::NoStrategy { interruption });
        };

        let point = self.points.lock().latest(&scan).cloned();
        let ctx = RecoveryContext {
            scan,
            interruption,
            point: point.as_ref(),
            target: self.target.as_ref(),
        };
        info!(%scan, %interruption, %strategy, "recovering");

        match strategy.run(&ctx) {
            Ok(duration) => {
                info!(
                    %scan,
                    %interruption,
                    %strategy,
                    duration_ms = duration.as_secs_f64() * 1e3,
                    "recovered"
                );
                self.record(
                    scan,
                    interruption,
                    event,
                    InterruptionOutcome::Recovered { strategy, duration },
                );
                Ok(RecoveryReport {
                    scan,
                    interruption,
                    strategy,
                    duration,
                    restored_point: point.map(|p| p.name),
                })
            }
            Err(cause) => {
                warn!(%scan, %interruption, %strategy, %cause, "recovery failed");
                self.record(
                    scan,
                    interruption,
                    event,
                    InterruptionOutcome::Failed {
                        strategy,
                        cause: cause.clone(),
                    },
                );
                Err(RecoveryError::RecoveryFailed { interruption, cause })
            }
        }
    }

    fn record(
        &self,
        scan: ScanId,
        interruption: InterruptionType,
        event: Option<MonitorEvent>,
        outcome: InterruptionOutcome,
    ) {
        self.history.lock().push(InterruptionRecord {
            scan,
            interruption,
            event,
            occurred_at: SystemTime::now(),
            outcome,
        });
    }

    fn backup(&self, point: &RecoveryPoint) {
        if !self.config.backup_recovery_points {
            return;
        }
        let Some(storage) = &self.storage else {
            return;
        };
        let result = serde_json::to_vec(point)
            .map_err(|e| e.to_string())
            .and_then(|bytes| {
                storage
                    .store(&RecoveryPoint::storage_key(point.scan, &point.name), &bytes)
                    .map_err(|e| e.to_string())
            });
        if let Err(reason) = result {
            warn!(scan = %point.scan, name = %point.name, %reason, "recovery point backup failed");
            self.audit(
                "recovery.backup_failed",
                &format!("scan={} point={} reason={reason}", point.scan, point.name),
            );
        }
    }

    fn load_backup(&self, scan: ScanId, name: &str) -> Option<RecoveryPoint> {
        let storage = self.storage.as_ref()?;
        match storage.load(&RecoveryPoint::storage_key(scan, name)) {
            Ok(Some(bytes)) => match serde_json::from_slice(&bytes) {
                Ok(point) => Some(point),
                Err(e) => {
                    warn!(%scan, name, error = %e, "recovery point backup is corrupt");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!(%scan, name, error = %e, "recovery point backup unavailable");
                self.audit(
                    "recovery.restore_failed",
                    &format!("scan={scan} point={name} reason={e}"),
                );
                None
            }
        }
    }

    fn delete_backup(&self, scan: ScanId, name: &str) {
        let Some(storage) = &self.storage else {
            return;
        };
        if let Err(e) = storage.delete(&RecoveryPoint::storage_key(scan, name)) {
            debug!(%scan, name, error = %e, "stale backup not deleted");
        }
    }

    fn audit(&self, event: &str, detail: &str) {
        if let Some(audit) = &self.audit {
            if let Err(e) = audit.record(event, detail) {
                warn!(event, error = %e, "audit record failed");
            }
        }
    }
}

fn monitor_loop(
    shared: &Shared,
    scan: ScanId,
    events: &Receiver<MonitorEvent>,
    stop: &Receiver<()>,
    outcomes: &Sender<RecoveryResult<RecoveryReport>>,
) {
    debug!(%scan, "monitor thread running");
    loop {
        select! {
            recv(stop) -> _ => break,
            recv(events) -> msg => {
                let Ok(event) = msg else { break };
                match shared.handle_event(scan, &event) {
                    Ok(None) => {}
                    Ok(Some(report)) => {
                        let _ = outcomes.send(Ok(report));
                    }
                    Err(RecoveryError::NotMonitored { .. }) => break,
                    Err(e) => {
                        let _ = outcomes.send(Err(e));
                    }
                }
            }
        }
    }
    debug!(%scan, "monitor thread exiting");
}

/// Handle to a running monitor.
///
/// Dropping the handle stops the monitor thread but leaves the scan
/// registered; [`RecoveryManager::stop_monitoring`] ends the monitor itself.
pub struct MonitorHandle {
    scan: ScanId,
    events: Sender<MonitorEvent>,
    outcomes: Receiver<RecoveryResult<RecoveryReport>>,
    stop: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for MonitorHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MonitorHandle")
            .field("scan", &self.scan)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

impl MonitorHandle {
    /// Scan this monitor watches.
    #[must_use]
    pub const fn scan(&self) -> ScanId {
        self.scan
    }

    /// Queues an event for the monitor thread. Returns `false` once the
    /// thread has stopped.
    pub fn send(&self, event: MonitorEvent) -> bool {
        self.is_running() && self.events.send(event).is_ok()
    }

    /// A sender other event sources can hold.
    #[must_use]
    pub fn sender(&self) -> Sender<MonitorEvent> {
        self.events.clone()
    }

    /// Outcomes of interruptions the thread handled, in order.
    #[must_use]
    pub const fn outcomes(&self) -> &Receiver<RecoveryResult<RecoveryReport>> {
        &self.outcomes
    }

    /// Whether the monitor thread is still running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Stops the thread and waits for it.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.try_send(());
        }
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for MonitorHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}
