//! Interruption handling and recovery for scan sessions.
//!
//! A [`RecoveryManager`] keeps one monitor per active scan. Monitors observe
//! session signals (paused, resumed, failed) and system signals (thermal,
//! memory pressure, backgrounding, connectivity), classify them with
//! [`classify`] and run the [`RecoveryStrategy`] bound to the resulting
//! [`InterruptionType`]:
//!
//! | Interruption | Default strategy | Steps (pre / execute / post) |
//! |--------------|------------------|------------------------------|
//! | session interrupted, tracking lost | `ar_session` | pause / reset tracking, resume from latest point / - |
//! | thermal throttling | `thermal` | pause / reduce workload / resume |
//! | memory warning | `memory` | - / release memory / - |
//! | system background | `background` | save state / pause / - |
//! | network loss | `network` | - / reconnect / - |
//!
//! Strategies drive the capture stack through the [`RecoveryTarget`] trait.
//! Every interruption is recorded in a 50-entry history whatever the
//! outcome, and neither a missing strategy nor a failed one ends the monitor.
//!
//! Callers also create [`RecoveryPoint`]s (five per scan, oldest evicted),
//! optionally backed up as JSON to secure storage.

// Safety: Deny unwrap/expect in library code. Tests may use them (workspace warns).
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![warn(missing_docs)]
#![warn(clippy::all)]

mod config;
mod error;
mod event;
mod manager;
mod point;
mod strategy;

pub use config::RecoveryConfig;
pub use error::{RecoveryError, RecoveryResult};
pub use event::{classify, InterruptionType, MonitorEvent, SessionSignal, SystemSignal, ThermalState};
pub use manager::{
    InterruptionOutcome, InterruptionRecord, MonitorHandle, RecoveryManager, RecoveryReport,
};
pub use point::RecoveryPoint;
pub use strategy::{NoopTarget, RecoveryContext, RecoveryStrategy, RecoveryTarget, StepOutcome};
