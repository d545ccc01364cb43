//! Requirement levels shared by accuracy verification and environment analysis.

use std::fmt;

use serde::{Deserialize, Serialize};

/// How demanding a capture is. Stricter levels demand higher minimums.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum RequirementLevel {
    /// Previews and consumer captures.
    Basic,
    /// General clinical documentation.
    #[default]
    Standard,
    /// Treatment planning.
    Professional,
    /// Medical records and measurement.
    Medical,
}

impl RequirementLevel {
    /// All levels, least strict first.
    pub const ALL: [Self; 4] = [
        Self::Basic,
        Self::Standard,
        Self::Professional,
        Self::Medical,
    ];

    /// Lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Standard => "standard",
            Self::Professional => "professional",
            Self::Medical => "medical",
        }
    }
}

impl fmt::Display for RequirementLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
