//! Capture-clock timestamps.

use serde::{Deserialize, Serialize};

/// A point in time on the capture clock, in seconds.
///
/// The capture loop stamps every frame and fragment. Analyzers only ever
/// compare these against each other, never against wall time.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
pub struct Timestamp(f64);

impl Timestamp {
    /// Creates a timestamp from seconds.
    #[must_use]
    pub const fn from_secs(secs: f64) -> Self {
        Self(secs)
    }

    /// Returns the timestamp in seconds.
    #[must_use]
    pub const fn as_secs(self) -> f64 {
        self.0
    }

    /// Seconds elapsed since `earlier` (negative if `earlier` is later).
    #[must_use]
    pub fn seconds_since(self, earlier: Self) -> f64 {
        self.0 - earlier.0
    }

    /// Returns this timestamp shifted by `secs`.
    #[must_use]
    pub fn offset(self, secs: f64) -> Self {
        Self(self.0 + secs)
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.3}s", self.0)
    }
}
