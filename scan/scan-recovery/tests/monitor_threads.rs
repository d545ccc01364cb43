//! Monitors running on their own threads.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use proptest::prelude::*;
use scan_recovery::{
    InterruptionOutcome, InterruptionType, MonitorEvent, RecoveryConfig, RecoveryError,
    RecoveryManager, RecoveryStrategy, RecoveryTarget, SessionSignal, SystemSignal, ThermalState,
};
use scan_types::{CollaboratorResult, Matrix4, ScanId, Timestamp};

#[derive(Default)]
struct CountingTarget {
    pauses: AtomicU32,
}

impl RecoveryTarget for CountingTarget {
    fn pause_capture(&self, _: ScanId) -> CollaboratorResult<()> {
        self.pauses.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

const WAIT: Duration = Duration::from_secs(5);

#[test]
fn monitor_thread_recovers_queued_events() {
    let target = Arc::new(CountingTarget::default());
    let manager = RecoveryManager::new(RecoveryConfig::default(), target.clone());
    let monitor = manager.start_monitoring(ScanId(1));

    assert!(monitor.send(MonitorEvent::Session(SessionSignal::Paused)));
    assert!(monitor.send(MonitorEvent::Session(SessionSignal::Resumed)));
    assert!(monitor.send(MonitorEvent::System(SystemSignal::Thermal(ThermalState::Critical))));

    let first = monitor.outcomes().recv_timeout(WAIT).unwrap().unwrap();
    assert_eq!(first.interruption, InterruptionType::SessionInterrupted);
    assert_eq!(first.strategy, RecoveryStrategy::ArSession);
    let second = monitor.outcomes().recv_timeout(WAIT).unwrap().unwrap();
    assert_eq!(second.interruption, InterruptionType::ThermalThrottling);

    assert_eq!(target.pauses.load(Ordering::SeqCst), 2);
    assert_eq!(manager.interruption_history().len(), 2);
    monitor.stop();
}

#[test]
fn unbound_interruption_is_reported_and_monitor_keeps_running() {
    let manager = RecoveryManager::default();
    manager.unregister_strategy(InterruptionType::MemoryWarning);
    let monitor = manager.start_monitoring(ScanId(2));

    monitor.send(MonitorEvent::System(SystemSignal::MemoryPressure));
    let outcome = monitor.outcomes().recv_timeout(WAIT).unwrap();
    assert_eq!(
        outcome,
        Err(RecoveryError::NoStrategy {
            interruption: InterruptionType::MemoryWarning
        })
    );
    assert!(manager.is_monitoring(ScanId(2)));
    assert!(monitor.is_running());

    monitor.send(MonitorEvent::System(SystemSignal::ConnectivityLost));
    let outcome = monitor.outcomes().recv_timeout(WAIT).unwrap();
    assert!(outcome.is_ok());
}

#[test]
fn stopping_the_monitor_ends_its_thread() {
    let manager = RecoveryManager::default();
    let monitor = manager.start_monitoring(ScanId(3));
    let sender = monitor.sender();
    assert!(manager.stop_monitoring(ScanId(3)));

    let deadline = std::time::Instant::now() + WAIT;
    while monitor.is_running() && std::time::Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(5));
    }
    assert!(!monitor.is_running());
    assert!(!monitor.send(MonitorEvent::Session(SessionSignal::Paused)));
    drop(sender);
}

#[test]
fn restarting_replaces_the_monitor() {
    let manager = RecoveryManager::default();
    let old = manager.start_monitoring(ScanId(4));
    let new = manager.start_monitoring(ScanId(4));
    assert_eq!(manager.monitored_scans(), vec![ScanId(4)]);

    let deadline = std::time::Instant::now() + WAIT;
    while old.is_running() && std::time::Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(5));
    }
    assert!(!old.is_running());
    assert!(new.is_running());
}

#[test]
fn every_outcome_is_recorded() {
    let manager = RecoveryManager::default();
    let _monitor = manager.start_monitoring(ScanId(5));
    manager.unregister_strategy(InterruptionType::NetworkLoss);
    manager.handle_interruption(ScanId(5), InterruptionType::MemoryWarning).unwrap();
    let _ = manager.handle_interruption(ScanId(5), InterruptionType::NetworkLoss);

    let outcomes: Vec<_> = manager
        .interruption_history()
        .into_iter()
        .map(|r| r.outcome)
        .collect();
    assert!(matches!(outcomes[0], InterruptionOutcome::Recovered { .. }));
    assert_eq!(outcomes[1], InterruptionOutcome::NoStrategy);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn recovery_points_never_exceed_cap(count in 0usize..20) {
        let manager = RecoveryManager::default();
        for i in 0..count {
            manager.create_recovery_point(
                ScanId(1),
                format!("p{i}"),
                Timestamp::from_secs(0.0),
                Matrix4::identity(),
                Vec::new(),
            );
        }
        let points = manager.recovery_points(ScanId(1));
        prop_assert_eq!(points.len(), count.min(5));
        if let Some(last) = points.last() {
            prop_assert_eq!(&last.name, &format!("p{}", count - 1));
        }
    }
}
