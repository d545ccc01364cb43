//! Acceptable environment ranges per requirement level.

use scan_types::RequirementLevel;
use serde::{Deserialize, Serialize};

/// Limits each condition axis is validated against.
///
/// Stricter levels narrow every range.
///
/// ```
/// use scan_calibration::EnvironmentThresholds;
/// use scan_types::RequirementLevel;
///
/// let basic = EnvironmentThresholds::for_level(RequirementLevel::Basic);
/// let medical = EnvironmentThresholds::for_level(RequirementLevel::Medical);
/// assert!(medical.min_light > basic.min_light);
/// assert!(medical.max_linear_speed < basic.max_linear_speed);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentThresholds {
    /// Minimum ambient light (lux).
    pub min_light: f64,
    /// Maximum ambient light (lux).
    pub max_light: f64,
    /// Minimum color temperature (K).
    pub min_color_temperature: f64,
    /// Maximum color temperature (K).
    pub max_color_temperature: f64,
    /// Maximum linear speed (m/s).
    pub max_linear_speed: f64,
    /// Maximum angular speed (rad/s).
    pub max_angular_speed: f64,
    /// Maximum blur (rad per exposure).
    pub max_blur: f64,
    /// Maximum reflectivity proxy.
    pub max_reflectivity: f64,
    /// Minimum feature points per mesh vertex.
    pub min_texture: f64,
    /// Maximum surface roughness (rad).
    pub max_roughness: f64,
    /// Minimum subject distance (m).
    pub min_distance: f64,
    /// Maximum subject distance (m).
    pub max_distance: f64,
    /// Minimum clearance to the nearest plane (m).
    pub min_clearance: f64,
}

impl Default for EnvironmentThresholds {
    fn default() -> Self {
        Self::for_level(RequirementLevel::Standard)
    }
}

impl EnvironmentThresholds {
    /// Preset for a requirement level.
    #[must_use]
    pub const fn for_level(level: RequirementLevel) -> Self {
        match level {
            RequirementLevel::Basic => Self {
                min_light: 200.0,
                max_light: 20_000.0,
                min_color_temperature: 2_500.0,
                max_color_temperature: 8_000.0,
                max_linear_speed: 0.5,
                max_angular_speed: 1.0,
                max_blur: 0.05,
                max_reflectivity: 0.9,
                min_texture: 0.1,
                max_roughness: 1.0,
                min_distance: 0.15,
                max_distance: 1.5,
                min_clearance: 0.1,
            },
            RequirementLevel::Standard => Self {
                min_light: 300.0,
                max_light: 10_000.0,
                min_color_temperature: 3_000.0,
                max_color_temperature: 7_500.0,
                max_linear_speed: 0.3,
                max_angular_speed: 0.6,
                max_blur: 0.03,
                max_reflectivity: 0.8,
                min_texture: 0.2,
                max_roughness: 0.8,
                min_distance: 0.2,
                max_distance: 1.0,
                min_clearance: 0.15,
            },
            RequirementLevel::Professional => Self {
                min_light: 500.0,
                max_light: 8_000.0,
                min_color_temperature: 3_500.0,
                max_color_temperature: 7_000.0,
                max_linear_speed: 0.2,
                max_angular_speed: 0.4,
                max_blur: 0.02,
                max_reflectivity: 0.7,
                min_texture: 0.3,
                max_roughness: 0.6,
                min_distance: 0.25,
                max_distance: 0.8,
                min_clearance: 0.2,
            },
            RequirementLevel::Medical => Self {
                min_light: 700.0,
                max_light: 5_000.0,
                min_color_temperature: 4_000.0,
                max_color_temperature: 6_500.0,
                max_linear_speed: 0.1,
                max_angular_speed: 0.25,
                max_blur: 0.01,
                max_reflectivity: 0.6,
                min_texture: 0.4,
                max_roughness: 0.5,
                min_distance: 0.3,
                max_distance: 0.6,
                min_clearance: 0.25,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_tighten_monotonically() {
        let presets: Vec<_> = RequirementLevel::ALL
            .iter()
            .map(|&l| EnvironmentThresholds::for_level(l))
            .collect();
        for pair in presets.windows(2) {
            let (loose, strict) = (&pair[0], &pair[1]);
            assert!(strict.min_light > loose.min_light);
            assert!(strict.max_light < loose.max_light);
            assert!(strict.max_blur < loose.max_blur);
            assert!(strict.min_texture > loose.min_texture);
            assert!(strict.max_distance - strict.min_distance < loose.max_distance - loose.min_distance);
        }
    }
}
