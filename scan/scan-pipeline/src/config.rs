//! Pipeline configuration.

use scan_accuracy::AccuracyConfig;
use scan_calibration::{CalibrationConfig, EnvironmentConfig};
use scan_collision::CollisionSettings;
use scan_governor::{GovernorConfig, ResourceQuota};
use scan_optimize::{OptimizerConfig, QualityTier};
use scan_recovery::RecoveryConfig;
use scan_validate::ValidationConfig;
use serde::{Deserialize, Serialize};

use crate::PipelineResult;

/// Settings for every component, loadable as one JSON document.
///
/// Missing sections fall back to their defaults, so `{}` is a valid config.
///
/// # Example
///
/// ```
/// use scan_optimize::QualityTier;
/// use scan_pipeline::PipelineConfig;
///
/// let config = PipelineConfig::from_json(r#"{ "tier": "low", "optimizer": { "vertex_ceiling": 500 } }"#).unwrap();
/// assert_eq!(config.tier, QualityTier::Low);
/// assert_eq!(config.optimizer.vertex_ceiling, 500);
/// assert_eq!(config.recovery.max_recovery_points, 5);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Mesh validator.
    pub validation: ValidationConfig,
    /// Accuracy verifier.
    pub accuracy: AccuracyConfig,
    /// Collision detector.
    pub collision: CollisionSettings,
    /// Environment analyzer.
    pub environment: EnvironmentConfig,
    /// Calibration manager.
    pub calibration: CalibrationConfig,
    /// Mesh optimizer.
    pub optimizer: OptimizerConfig,
    /// Resource governor.
    pub governor: GovernorConfig,
    /// Recovery manager.
    pub recovery: RecoveryConfig,
    /// Tier accepted fragments are optimized at.
    pub tier: QualityTier,
    /// Working memory charged per frame vertex on admission.
    pub bytes_per_vertex: u64,
    /// Run the governor's background reclaimer.
    pub spawn_reclaimer: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            validation: ValidationConfig::default(),
            accuracy: AccuracyConfig::default(),
            collision: CollisionSettings::default(),
            environment: EnvironmentConfig::default(),
            calibration: CalibrationConfig::default(),
            optimizer: OptimizerConfig::default(),
            governor: GovernorConfig::default(),
            recovery: RecoveryConfig::default(),
            tier: QualityTier::High,
            bytes_per_vertex: 64,
            spawn_reclaimer: true,
        }
    }
}

impl PipelineConfig {
    /// Preset for devices with little memory: constrained quota, low tier.
    #[must_use]
    pub fn constrained() -> Self {
        Self {
            governor: GovernorConfig::default().with_quota(ResourceQuota::constrained()),
            tier: QualityTier::Low,
            ..Self::default()
        }
    }

    /// Preset for tests and batch tools: no background threads.
    #[must_use]
    pub fn headless() -> Self {
        Self {
            spawn_reclaimer: false,
            ..Self::default()
        }
    }

    /// Sets the optimization tier.
    #[must_use]
    pub const fn with_tier(mut self, tier: QualityTier) -> Self {
        self.tier = tier;
        self
    }

    /// Sets the governor configuration.
    #[must_use]
    pub fn with_governor(mut self, governor: GovernorConfig) -> Self {
        self.governor = governor;
        self
    }

    /// Parses a JSON document.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Config`](crate::PipelineError::Config) for
    /// malformed JSON or mistyped fields.
    pub fn from_json(json: &str) -> PipelineResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serializes to pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Config`](crate::PipelineError::Config) if a
    /// value cannot be represented, such as a non-finite float.
    pub fn to_json(&self) -> PipelineResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_is_default() {
        let config = PipelineConfig::from_json("{}").unwrap();
        assert_eq!(config, PipelineConfig::default());
    }

    #[test]
    fn json_roundtrip_keeps_presets() {
        let config = PipelineConfig::constrained();
        let back = PipelineConfig::from_json(&config.to_json().unwrap()).unwrap();
        assert_eq!(back, config);
        assert_eq!(back.governor.quota, ResourceQuota::constrained());
    }

    #[test]
    fn mistyped_field_is_rejected() {
        let err = PipelineConfig::from_json(r#"{ "bytes_per_vertex": "many" }"#).unwrap_err();
        assert!(err.to_string().starts_with("invalid pipeline configuration"));
    }
}
