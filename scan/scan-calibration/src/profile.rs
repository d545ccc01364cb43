//! Calibration parameter sets and per-environment profiles.

use std::fmt;
use std::time::SystemTime;

use scan_types::{QualityParameters, RequirementLevel};
use serde::{Deserialize, Serialize};

/// Clinical setting a scan is taken in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvironmentType {
    /// Hospital and dermatology scans.
    Medical,
    /// Dental clinics.
    Dental,
    /// Research labs.
    Research,
}

impl EnvironmentType {
    /// All environment types.
    pub const ALL: [Self; 3] = [Self::Medical, Self::Dental, Self::Research];

    /// Lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Medical => "medical",
            Self::Dental => "dental",
            Self::Research => "research",
        }
    }

    /// Requirement level scans in this environment are held to.
    #[must_use]
    pub const fn requirement_level(self) -> RequirementLevel {
        match self {
            Self::Medical => RequirementLevel::Medical,
            Self::Dental => RequirementLevel::Professional,
            Self::Research => RequirementLevel::Standard,
        }
    }
}

impl fmt::Display for EnvironmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Capture-side settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScanningParameters {
    /// Vertices per m² the capture should aim for.
    pub target_vertex_density: f64,
    /// Maximum device speed the operator is guided to (m/s).
    pub max_linear_speed: f64,
    /// Interval between captured frames (ms).
    pub capture_interval_ms: f64,
    /// Exposure bias in EV.
    pub exposure_bias: f64,
}

/// Filter settings for depth processing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProcessingParameters {
    /// Bilateral filter spatial sigma (m).
    pub spatial_sigma: f64,
    /// Bilateral filter range sigma (m).
    pub range_sigma: f64,
    /// Minimum vertex confidence kept by the filter.
    pub confidence_threshold: f64,
    /// Weight given to sharp features during smoothing.
    pub feature_weight: f64,
}

/// The scanning/processing/quality triple applied per calibration step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationParameters {
    /// Capture settings.
    pub scanning: ScanningParameters,
    /// Processing settings.
    pub processing: ProcessingParameters,
    /// Quality-control thresholds.
    pub quality: QualityParameters,
}

impl CalibrationParameters {
    /// Seeded defaults for an environment.
    #[must_use]
    pub const fn seeded(environment: EnvironmentType) -> Self {
        match environment {
            EnvironmentType::Medical => Self {
                scanning: ScanningParameters {
                    target_vertex_density: 5_000.0,
                    max_linear_speed: 0.1,
                    capture_interval_ms: 33.0,
                    exposure_bias: 0.0,
                },
                processing: ProcessingParameters {
                    spatial_sigma: 0.002,
                    range_sigma: 0.001,
                    confidence_threshold: 0.7,
                    feature_weight: 1.5,
                },
                quality: QualityParameters {
                    min_vertex_density: 5_000.0,
                    min_confidence: 0.7,
                    max_noise_level: 0.1,
                    min_surface_completeness: 0.9,
                },
            },
            EnvironmentType::Dental => Self {
                scanning: ScanningParameters {
                    target_vertex_density: 4_000.0,
                    max_linear_speed: 0.08,
                    capture_interval_ms: 33.0,
                    exposure_bias: 0.0,
                },
                processing: ProcessingParameters {
                    spatial_sigma: 0.0015,
                    range_sigma: 0.001,
                    confidence_threshold: 0.75,
                    feature_weight: 1.8,
                },
                quality: QualityParameters {
                    min_vertex_density: 4_000.0,
                    min_confidence: 0.75,
                    max_noise_level: 0.08,
                    min_surface_completeness: 0.9,
                },
            },
            EnvironmentType::Research => Self {
                scanning: ScanningParameters {
                    target_vertex_density: 1_500.0,
                    max_linear_speed: 0.25,
                    capture_interval_ms: 66.0,
                    exposure_bias: 0.0,
                },
                processing: ProcessingParameters {
                    spatial_sigma: 0.004,
                    range_sigma: 0.002,
                    confidence_threshold: 0.5,
                    feature_weight: 1.0,
                },
                quality: QualityParameters {
                    min_vertex_density: 1_500.0,
                    min_confidence: 0.5,
                    max_noise_level: 0.2,
                    min_surface_completeness: 0.7,
                },
            },
        }
    }

    /// Moves every field `t` of the way toward `target`.
    #[must_use]
    pub fn blend(&self, target: &Self, t: f64) -> Self {
        let t = t.clamp(0.0, 1.0);
        let mix = |a: f64, b: f64| a.mul_add(1.0 - t, b * t);
        #[allow(clippy::cast_possible_truncation)]
        let mix32 = |a: f32, b: f32| mix(f64::from(a), f64::from(b)) as f32;
        Self {
            scanning: ScanningParameters {
                target_vertex_density: mix(
                    self.scanning.target_vertex_density,
                    target.scanning.target_vertex_density,
                ),
                max_linear_speed: mix(self.scanning.max_linear_speed, target.scanning.max_linear_speed),
                capture_interval_ms: mix(
                    self.scanning.capture_interval_ms,
                    target.scanning.capture_interval_ms,
                ),
                exposure_bias: mix(self.scanning.exposure_bias, target.scanning.exposure_bias),
            },
            processing: ProcessingParameters {
                spatial_sigma: mix(self.processing.spatial_sigma, target.processing.spatial_sigma),
                range_sigma: mix(self.processing.range_sigma, target.processing.range_sigma),
                confidence_threshold: mix(
                    self.processing.confidence_threshold,
                    target.processing.confidence_threshold,
                ),
                feature_weight: mix(self.processing.feature_weight, target.processing.feature_weight),
            },
            quality: QualityParameters {
                min_vertex_density: mix(self.quality.min_vertex_density, target.quality.min_vertex_density),
                min_confidence: mix32(self.quality.min_confidence, target.quality.min_confidence),
                max_noise_level: mix(self.quality.max_noise_level, target.quality.max_noise_level),
                min_surface_completeness: mix(
                    self.quality.min_surface_completeness,
                    target.quality.min_surface_completeness,
                ),
            },
        }
    }
}

/// Learned calibration state for one environment type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentProfile {
    /// Environment this profile belongs to.
    pub environment: EnvironmentType,
    /// Baseline parameters new sessions start from.
    pub baseline: CalibrationParameters,
    /// Completed calibration sessions folded into the baseline.
    pub sessions_completed: u32,
    /// Best accuracy seen so far.
    pub best_accuracy: f64,
    /// When the profile last changed.
    pub updated: Option<SystemTime>,
}

impl EnvironmentProfile {
    /// Fresh profile with the seeded baseline.
    #[must_use]
    pub const fn seeded(environment: EnvironmentType) -> Self {
        Self {
            environment,
            baseline: CalibrationParameters::seeded(environment),
            sessions_completed: 0,
            best_accuracy: 0.0,
            updated: None,
        }
    }
}
