//! Ordinal severity shared by validation issues, collisions and guidance.

use serde::{Deserialize, Serialize};

/// Severity of an issue or hazard.
///
/// The ordering is total and fixed: `Low < Medium < High < Critical`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub enum Severity {
    /// Cosmetic or informational.
    #[default]
    Low,
    /// Degrades the result but the data is still usable.
    Medium,
    /// The data should not be trusted.
    High,
    /// Unusable data or an immediate hazard.
    Critical,
}

impl Severity {
    /// All severities in ascending order.
    pub const ALL: [Self; 4] = [Self::Low, Self::Medium, Self::High, Self::Critical];

    /// Human-readable name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    /// Returns true for `High` and `Critical`.
    #[must_use]
    pub fn is_blocking(self) -> bool {
        self >= Self::High
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
