//! Outward-facing collaborator seams.
//!
//! The pipeline never talks to a concrete dashboard, audit transport or
//! keychain. It calls these traits, and the embedding application supplies
//! implementations. The in-memory versions here back tests and headless runs.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::{
    CollaboratorError, CollaboratorResult, ConditionDelta, ContextId, EnvironmentSnapshot,
    QualityParameters, RequirementLevel, ScanId,
};

/// Fire-and-forget analytics events.
pub trait AnalyticsSink: Send + Sync {
    /// Tracks an event with string properties. Must not block.
    fn track(&self, event: &str, properties: &[(&str, String)]);
}

/// Durable audit trail for security-relevant events.
pub trait AuditSink: Send + Sync {
    /// Records an audit event.
    ///
    /// # Errors
    ///
    /// Returns an error if the record could not be persisted.
    fn record(&self, event: &str, detail: &str) -> CollaboratorResult<()>;
}

/// Key-value storage that encrypts at rest.
pub trait SecureStorage: Send + Sync {
    /// Stores `data` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unavailable or refuses the write.
    fn store(&self, key: &str, data: &[u8]) -> CollaboratorResult<()>;

    /// Loads the value under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unavailable.
    fn load(&self, key: &str) -> CollaboratorResult<Option<Vec<u8>>>;

    /// Deletes the value under `key`. Deleting a missing key succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unavailable.
    fn delete(&self, key: &str) -> CollaboratorResult<()>;
}

/// Quality-control feedback loop fed by calibration and environment analysis.
pub trait QualityFeedback: Send + Sync {
    /// New quality parameters for a scan.
    fn apply_quality_parameters(&self, scan: ScanId, params: &QualityParameters);

    /// A significant environment change was observed.
    fn conditions_changed(&self, scan: ScanId, delta: &ConditionDelta) {
        let _ = (scan, delta);
    }
}

/// An analyzer that opens its own context when a verification session begins.
pub trait ScanSessionHook: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Opens a context for `scan`.
    ///
    /// # Errors
    ///
    /// Returns an error if the analyzer cannot start.
    fn open(
        &self,
        scan: ScanId,
        level: RequirementLevel,
        snapshot: &EnvironmentSnapshot,
    ) -> CollaboratorResult<ContextId>;

    /// Closes a context opened by [`open`](Self::open). Idempotent.
    fn close(&self, context: ContextId);
}

/// Analytics sink that drops everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopAnalytics;

impl AnalyticsSink for NoopAnalytics {
    fn track(&self, _event: &str, _properties: &[(&str, String)]) {}
}

/// A tracked analytics event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalyticsEvent {
    /// Event name.
    pub name: String,
    /// Properties as owned key/value pairs.
    pub properties: Vec<(String, String)>,
}

/// Analytics sink that keeps events in memory.
#[derive(Debug, Default)]
pub struct MemoryAnalytics {
    events: Mutex<Vec<AnalyticsEvent>>,
}

impl MemoryAnalytics {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of tracked events.
    #[must_use]
    pub fn events(&self) -> Vec<AnalyticsEvent> {
        self.events.lock().clone()
    }

    /// Number of events with the given name.
    #[must_use]
    pub fn count(&self, name: &str) -> usize {
        self.events.lock().iter().filter(|e| e.name == name).count()
    }
}

impl AnalyticsSink for MemoryAnalytics {
    fn track(&self, event: &str, properties: &[(&str, String)]) {
        self.events.lock().push(AnalyticsEvent {
            name: event.to_string(),
            properties: properties
                .iter()
                .map(|(k, v)| ((*k).to_string(), v.clone()))
                .collect(),
        });
    }
}

/// An audit record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditRecord {
    /// Event name.
    pub event: String,
    /// Free-form detail.
    pub detail: String,
}

/// Audit sink that keeps records in memory.
#[derive(Debug, Default)]
pub struct MemoryAuditLog {
    records: Mutex<Vec<AuditRecord>>,
}

impl MemoryAuditLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of recorded entries.
    #[must_use]
    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().clone()
    }
}

impl AuditSink for MemoryAuditLog {
    fn record(&self, event: &str, detail: &str) -> CollaboratorResult<()> {
        self.records.lock().push(AuditRecord {
            event: event.to_string(),
            detail: detail.to_string(),
        });
        Ok(())
    }
}

/// In-memory secure storage with a switch to simulate an unavailable store.
#[derive(Debug)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, Vec<u8>>>,
    available: Mutex<bool>,
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            available: Mutex::new(true),
        }
    }
}

impl MemoryStorage {
    /// Creates an empty, available store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes subsequent calls succeed or fail.
    pub fn set_available(&self, available: bool) {
        *self.available.lock() = available;
    }

    /// Stored keys, sorted.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.lock().keys().cloned().collect();
        keys.sort();
        keys
    }

    fn check(&self) -> CollaboratorResult<()> {
        if *self.available.lock() {
            Ok(())
        } else {
            Err(CollaboratorError::unavailable("secure storage offline"))
        }
    }
}

impl SecureStorage for MemoryStorage {
    fn store(&self, key: &str, data: &[u8]) -> CollaboratorResult<()> {
        self.check()?;
        self.entries.lock().insert(key.to_string(), data.to_vec());
        Ok(())
    }

    fn load(&self, key: &str) -> CollaboratorResult<Option<Vec<u8>>> {
        self.check()?;
        Ok(self.entries.lock().get(key).cloned())
    }

    fn delete(&self, key: &str) -> CollaboratorResult<()> {
        self.check()?;
        self.entries.lock().remove(key);
        Ok(())
    }
}

/// Quality feedback receiver that remembers what it was told.
#[derive(Debug, Default)]
pub struct RecordingFeedback {
    parameters: Mutex<Vec<(ScanId, QualityParameters)>>,
    deltas: Mutex<Vec<(ScanId, ConditionDelta)>>,
}

impl RecordingFeedback {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Parameters received so far.
    #[must_use]
    pub fn parameters(&self) -> Vec<(ScanId, QualityParameters)> {
        self.parameters.lock().clone()
    }

    /// Condition deltas received so far.
    #[must_use]
    pub fn deltas(&self) -> Vec<(ScanId, ConditionDelta)> {
        self.deltas.lock().clone()
    }
}

impl QualityFeedback for RecordingFeedback {
    fn apply_quality_parameters(&self, scan: ScanId, params: &QualityParameters) {
        self.parameters.lock().push((scan, *params));
    }

    fn conditions_changed(&self, scan: ScanId, delta: &ConditionDelta) {
        self.deltas.lock().push((scan, *delta));
    }
}
