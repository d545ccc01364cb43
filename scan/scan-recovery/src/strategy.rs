//! Recovery strategies and the collaborator they drive.
//!
//! Every strategy runs three ordered steps. Pre-recovery prepares the
//! session, execute does the work and reports success with its duration,
//! and post-recovery confirms the session is consistent again. The first
//! failing step ends the run with a cause naming the step.

use std::fmt;
use std::time::{Duration, Instant};

use scan_types::{CollaboratorResult, ScanId};
use serde::{Deserialize, Serialize};

use crate::{InterruptionType, RecoveryPoint};

/// The capture stack as seen by recovery strategies.
///
/// Every method defaults to a successful no-op so implementations only
/// override what their platform supports.
pub trait RecoveryTarget: Send + Sync {
    /// Stops frame delivery.
    ///
    /// # Errors
    ///
    /// Returns an error if the capture session cannot be paused.
    fn pause_capture(&self, scan: ScanId) -> CollaboratorResult<()> {
        let _ = scan;
        Ok(())
    }

    /// Restarts frame delivery, optionally from a checkpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be restarted.
    fn resume_capture(&self, scan: ScanId, from: Option<&RecoveryPoint>) -> CollaboratorResult<()> {
        let _ = (scan, from);
        Ok(())
    }

    /// Resets world tracking.
    ///
    /// # Errors
    ///
    /// Returns an error if the tracker cannot be reset.
    fn reset_tracking(&self, scan: ScanId) -> CollaboratorResult<()> {
        let _ = scan;
        Ok(())
    }

    /// Lowers frame rate and processing load.
    ///
    /// # Errors
    ///
    /// Returns an error if the load cannot be reduced.
    fn reduce_workload(&self, scan: ScanId) -> CollaboratorResult<()> {
        let _ = scan;
        Ok(())
    }

    /// Drops caches. Returns the bytes freed.
    ///
    /// # Errors
    ///
    /// Returns an error if nothing could be released.
    fn release_memory(&self, scan: ScanId) -> CollaboratorResult<u64> {
        let _ = scan;
        Ok(0)
    }

    /// Persists in-flight state before suspension.
    ///
    /// # Errors
    ///
    /// Returns an error if the state cannot be saved.
    fn save_state(&self, scan: ScanId, point: Option<&RecoveryPoint>) -> CollaboratorResult<()> {
        let _ = (scan, point);
        Ok(())
    }

    /// Re-establishes network connections.
    ///
    /// # Errors
    ///
    /// Returns an error if the network is still unreachable.
    fn reconnect(&self, scan: ScanId) -> CollaboratorResult<()> {
        let _ = scan;
        Ok(())
    }

    /// Whether the session is consistent after recovery.
    fn is_consistent(&self, scan: ScanId) -> bool {
        let _ = scan;
        true
    }
}

/// Target that accepts every step.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTarget;

impl RecoveryTarget for NoopTarget {}

/// What a strategy runs against.
#[derive(Clone, Copy)]
pub struct RecoveryContext<'a> {
    /// Scan being recovered.
    pub scan: ScanId,
    /// Interruption being handled.
    pub interruption: InterruptionType,
    /// Most recent recovery point, if any.
    pub point: Option<&'a RecoveryPoint>,
    /// Capture stack.
    pub target: &'a dyn RecoveryTarget,
}

/// Result of the execute step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepOutcome {
    /// Whether the step did its job.
    pub success: bool,
    /// Time spent.
    pub duration: Duration,
    /// Failure cause when `success` is false.
    pub cause: Option<String>,
}

impl StepOutcome {
    fn timed(start: Instant, result: CollaboratorResult<()>) -> Self {
        let duration = start.elapsed();
        match result {
            Ok(()) => Self {
                success: true,
                duration,
                cause: None,
            },
            Err(e) => Self {
                success: false,
                duration,
                cause: Some(e.to_string()),
            },
        }
    }
}

/// Closed set of recovery strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryStrategy {
    /// Pause, reset tracking, resume from the latest point.
    ArSession,
    /// Pause and shed load, then resume.
    Thermal,
    /// Release caches.
    Memory,
    /// Save state and pause until foregrounded.
    Background,
    /// Reconnect.
    Network,
}

impl RecoveryStrategy {
    /// Strategy bound to `interruption` out of the box.
    #[must_use]
    pub const fn default_for(interruption: InterruptionType) -> Self {
        match interruption {
            InterruptionType::SessionInterrupted | InterruptionType::TrackingLost => Self::ArSession,
            InterruptionType::ThermalThrottling => Self::Thermal,
            InterruptionType::MemoryWarning => Self::Memory,
            InterruptionType::SystemBackground => Self::Background,
            InterruptionType::NetworkLoss => Self::Network,
        }
    }

    /// Prepares the session for recovery.
    ///
    /// # Errors
    ///
    /// Returns the collaborator error of the first failing call.
    pub fn pre_recovery(self, ctx: &RecoveryContext<'_>) -> CollaboratorResult<()> {
        match self {
            Self::ArSession | Self::Thermal => ctx.target.pause_capture(ctx.scan),
            Self::Background => ctx.target.save_state(ctx.scan, ctx.point),
            Self::Memory | Self::Network => Ok(()),
        }
    }

    /// Performs the recovery work.
    pub fn execute(self, ctx: &RecoveryContext<'_>) -> StepOutcome {
        let start = Instant::now();
        let result = match self {
            Self::ArSession => ctx
                .target
                .reset_tracking(ctx.scan)
                .and_then(|()| ctx.target.resume_capture(ctx.scan, ctx.point)),
            Self::Thermal => ctx.target.reduce_workload(ctx.scan),
            Self::Memory => ctx.target.release_memory(ctx.scan).map(|_| ()),
            Self::Background => ctx.target.pause_capture(ctx.scan),
            Self::Network => ctx.target.reconnect(ctx.scan),
        };
        StepOutcome::timed(start, result)
    }

    /// Confirms the session is usable again.
    ///
    /// # Errors
    ///
    /// Returns the collaborator error of a failing call.
    pub fn post_recovery(self, ctx: &RecoveryContext<'_>) -> CollaboratorResult<()> {
        match self {
            Self::Thermal => ctx.target.resume_capture(ctx.scan, None),
            Self::ArSession | Self::Memory | Self::Background | Self::Network => Ok(()),
        }
    }

    /// Runs all three steps. Returns the execute duration, or the cause of
    /// the first failure prefixed with the failing step.
    ///
    /// # Errors
    ///
    /// Returns a cause string when a step fails or the session is left
    /// inconsistent.
    pub fn run(self, ctx: &RecoveryContext<'_>) -> Result<Duration, String> {
        self.pre_recovery(ctx)
            .map_err(|e| format!("pre-recovery: {e}"))?;
        let outcome = self.execute(ctx);
        if !outcome.success {
            let cause = outcome.cause.unwrap_or_else(|| "unknown".to_string());
            return Err(format!("execute: {cause}"));
        }
        self.post_recovery(ctx)
            .map_err(|e| format!("post-recovery: {e}"))?;
        if !ctx.target.is_consistent(ctx.scan) {
            return Err("post-recovery: session state is inconsistent".to_string());
        }
        Ok(outcome.duration)
    }

    /// Short name for logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ArSession => "ar_session",
            Self::Thermal => "thermal",
            Self::Memory => "memory",
            Self::Background => "background",
            Self::Network => "network",
        }
    }
}

impl fmt::Display for RecoveryStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use scan_types::CollaboratorError;

    #[derive(Default)]
    struct Script {
        calls: Mutex<Vec<&'static str>>,
        fail: Option<&'static str>,
        inconsistent: bool,
    }

    impl Script {
        fn call(&self, name: &'static str) -> CollaboratorResult<()> {
            self.calls.lock().push(name);
            if self.fail == Some(name) {
                Err(CollaboratorError::unavailable(format!("{name} refused")))
            } else {
                Ok(())
            }
        }
    }

    impl RecoveryTarget for Script {
        fn pause_capture(&self, _: ScanId) -> CollaboratorResult<()> {
            self.call("pause")
        }
        fn resume_capture(&self, _: ScanId, _: Option<&RecoveryPoint>) -> CollaboratorResult<()> {
            self.call("resume")
        }
        fn reset_tracking(&self, _: ScanId) -> CollaboratorResult<()> {
            self.call("reset")
        }
        fn reduce_workload(&self, _: ScanId) -> CollaboratorResult<()> {
            self.call("reduce")
        }
        fn is_consistent(&self, _: ScanId) -> bool {
            !self.inconsistent
        }
    }

    fn ctx(target: &dyn RecoveryTarget) -> RecoveryContext<'_> {
        RecoveryContext {
            scan: ScanId(1),
            interruption: InterruptionType::TrackingLost,
            point: None,
            target,
        }
    }

    #[test]
    fn every_interruption_has_a_default() {
        for interruption in InterruptionType::ALL {
            let _ = RecoveryStrategy::default_for(interruption);
        }
        assert_eq!(
            RecoveryStrategy::default_for(InterruptionType::MemoryWarning),
            RecoveryStrategy::Memory
        );
    }

    #[test]
    fn steps_run_in_order() {
        let script = Script::default();
        RecoveryStrategy::ArSession.run(&ctx(&script)).unwrap();
        assert_eq!(*script.calls.lock(), vec!["pause", "reset", "resume"]);

        let script = Script::default();
        RecoveryStrategy::Thermal.run(&ctx(&script)).unwrap();
        assert_eq!(*script.calls.lock(), vec!["pause", "reduce", "resume"]);
    }

    #[test]
    fn failing_execute_stops_the_run() {
        let script = Script {
            fail: Some("reset"),
            ..Script::default()
        };
        let cause = RecoveryStrategy::ArSession.run(&ctx(&script)).unwrap_err();
        assert!(cause.starts_with("execute:"));
        assert!(cause.contains("reset refused"));
        assert_eq!(*script.calls.lock(), vec!["pause", "reset"]);
    }

    #[test]
    fn failing_pre_step_names_the_step() {
        let script = Script {
            fail: Some("pause"),
            ..Script::default()
        };
        let cause = RecoveryStrategy::Thermal.run(&ctx(&script)).unwrap_err();
        assert!(cause.starts_with("pre-recovery:"));
    }

    #[test]
    fn inconsistent_state_fails_post_recovery() {
        let script = Script {
            inconsistent: true,
            ..Script::default()
        };
        let cause = RecoveryStrategy::Network.run(&ctx(&script)).unwrap_err();
        assert!(cause.contains("inconsistent"));
    }

    #[test]
    fn execute_reports_failure_without_panicking() {
        let script = Script {
            fail: Some("reduce"),
            ..Script::default()
        };
        let outcome = RecoveryStrategy::Thermal.execute(&ctx(&script));
        assert!(!outcome.success);
        assert!(outcome.cause.is_some());
    }
}
