//! Monitor events and the interruption classification table.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Signals from the capture session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionSignal {
    /// The session stopped delivering frames.
    Paused,
    /// The session resumed.
    Resumed,
    /// The session failed with a reason.
    Failed(String),
}

/// Device thermal state, coolest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ThermalState {
    /// Normal.
    Nominal,
    /// Slightly elevated.
    Fair,
    /// Performance is being reduced.
    Serious,
    /// Work must be shed immediately.
    Critical,
}

/// Signals from the operating system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SystemSignal {
    /// Thermal state changed.
    Thermal(ThermalState),
    /// The system asked the process to free memory.
    MemoryPressure,
    /// The app moved to the background.
    Backgrounded,
    /// The app returned to the foreground.
    Foregrounded,
    /// Network connectivity dropped.
    ConnectivityLost,
    /// Network connectivity came back.
    ConnectivityRestored,
}

/// Anything a monitor observes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MonitorEvent {
    /// From the capture session.
    Session(SessionSignal),
    /// From the operating system.
    System(SystemSignal),
}

/// Kinds of interruption a strategy can be bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterruptionType {
    /// Capture session paused.
    SessionInterrupted,
    /// Capture session failed and tracking is gone.
    TrackingLost,
    /// Critical thermal state.
    ThermalThrottling,
    /// Memory pressure.
    MemoryWarning,
    /// App backgrounded.
    SystemBackground,
    /// Connectivity lost.
    NetworkLoss,
}

impl InterruptionType {
    /// Every interruption type.
    pub const ALL: [Self; 6] = [
        Self::SessionInterrupted,
        Self::TrackingLost,
        Self::ThermalThrottling,
        Self::MemoryWarning,
        Self::SystemBackground,
        Self::NetworkLoss,
    ];

    /// Human-readable name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SessionInterrupted => "session interrupted",
            Self::TrackingLost => "tracking lost",
            Self::ThermalThrottling => "thermal throttling",
            Self::MemoryWarning => "memory warning",
            Self::SystemBackground => "system background",
            Self::NetworkLoss => "network loss",
        }
    }
}

impl fmt::Display for InterruptionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Maps an event to the interruption it represents.
///
/// | Event | Interruption |
/// |-------|--------------|
/// | session paused | session interrupted |
/// | session failed | tracking lost |
/// | thermal critical | thermal throttling |
/// | memory pressure | memory warning |
/// | backgrounded | system background |
/// | connectivity lost | network loss |
///
/// Resumptions and non-critical thermal states are not interruptions.
#[must_use]
pub const fn classify(event: &MonitorEvent) -> Option<InterruptionType> {
    match event {
        MonitorEvent::Session(SessionSignal::Paused) => Some(InterruptionType::SessionInterrupted),
        MonitorEvent::Session(SessionSignal::Failed(_)) => Some(InterruptionType::TrackingLost),
        MonitorEvent::System(SystemSignal::Thermal(ThermalState::Critical)) => {
            Some(InterruptionType::ThermalThrottling)
        }
        MonitorEvent::System(SystemSignal::MemoryPressure) => Some(InterruptionType::MemoryWarning),
        MonitorEvent::System(SystemSignal::Backgrounded) => Some(InterruptionType::SystemBackground),
        MonitorEvent::System(SystemSignal::ConnectivityLost) => Some(InterruptionType::NetworkLoss),
        MonitorEvent::Session(SessionSignal::Resumed)
        | MonitorEvent::System(
            SystemSignal::Thermal(_) | SystemSignal::Foregrounded | SystemSignal::ConnectivityRestored,
        ) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_table() {
        let cases = [
            (MonitorEvent::Session(SessionSignal::Paused), Some(InterruptionType::SessionInterrupted)),
            (
                MonitorEvent::Session(SessionSignal::Failed("camera lost".into())),
                Some(InterruptionType::TrackingLost),
            ),
            (
                MonitorEvent::System(SystemSignal::Thermal(ThermalState::Critical)),
                Some(InterruptionType::ThermalThrottling),
            ),
            (MonitorEvent::System(SystemSignal::MemoryPressure), Some(InterruptionType::MemoryWarning)),
            (MonitorEvent::System(SystemSignal::Backgrounded), Some(InterruptionType::SystemBackground)),
            (MonitorEvent::System(SystemSignal::ConnectivityLost), Some(InterruptionType::NetworkLoss)),
        ];
        for (event, expected) in cases {
            assert_eq!(classify(&event), expected, "{event:?}");
        }
    }

    #[test]
    fn recoveries_and_mild_heat_are_ignored() {
        for event in [
            MonitorEvent::Session(SessionSignal::Resumed),
            MonitorEvent::System(SystemSignal::Thermal(ThermalState::Serious)),
            MonitorEvent::System(SystemSignal::Thermal(ThermalState::Nominal)),
            MonitorEvent::System(SystemSignal::Foregrounded),
            MonitorEvent::System(SystemSignal::ConnectivityRestored),
        ] {
            assert_eq!(classify(&event), None);
        }
    }
}
