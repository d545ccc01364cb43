//! Triangle shape and surface roughness.

use scan_types::MeshFragment;

use super::Prepared;
use crate::issue::{CheckOutcome, ValidationIssue};
use crate::ValidationConfig;

/// `4√3·A / Σl²`: 1 for an equilateral triangle, 0 for a degenerate one.
pub(crate) fn triangle_quality(fragment: &MeshFragment, face: &[u32; 3]) -> f64 {
    let Some([a, b, c]) = fragment.triangle(face) else {
        return 0.0;
    };
    let sum_sq = (b - a).norm_squared() + (c - b).norm_squared() + (a - c).norm_squared();
    if sum_sq <= 0.0 {
        return 0.0;
    }
    let area = scan_types::triangle_area(&a, &b, &c);
    (4.0 * 3.0_f64.sqrt() * area / sum_sq).clamp(0.0, 1.0)
}

/// Mean angle between the normals of faces sharing an edge.
pub(crate) fn surface_roughness(fragment: &MeshFragment, prepared: &Prepared) -> f64 {
    let normals: Vec<_> = prepared
        .faces
        .iter()
        .map(|f| fragment.face_normal(f))
        .collect();

    let (sum, count) = prepared
        .adjacency
        .interior_edges()
        .filter_map(|(a, b)| {
            let na = normals.get(a.face).copied().flatten()?;
            let nb = normals.get(b.face).copied().flatten()?;
            Some(na.dot(&nb).clamp(-1.0, 1.0).acos())
        })
        .fold((0.0, 0_usize), |(s, n), angle| (s + angle, n + 1));

    if count == 0 {
        0.0
    } else {
        #[allow(clippy::cast_precision_loss)]
        let count = count as f64;
        sum / count
    }
}

pub(crate) fn check_quality(
    fragment: &MeshFragment,
    prepared: &Prepared,
    config: &ValidationConfig,
) -> CheckOutcome {
    let mut issues = Vec::new();

    if !prepared.faces.is_empty() {
        let poor = prepared
            .faces
            .iter()
            .filter(|f| triangle_quality(fragment, f) < config.min_triangle_quality)
            .count();
        #[allow(clippy::cast_precision_loss)]
        let share = poor as f64 / prepared.faces.len() as f64;
        if share > config.poor_quality_ratio {
            issues.push(ValidationIssue::PoorTriangleQuality { count: poor });
        }
    }

    let roughness = surface_roughness(fragment, prepared);
    if roughness > config.max_roughness {
        issues.push(ValidationIssue::ExcessiveRoughness { value: roughness });
    }

    CheckOutcome::from_issues(issues)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checks::fixtures::grid;
    use approx::assert_relative_eq;
    use scan_types::{FragmentId, Point3, Timestamp};

    #[test]
    fn equilateral_quality_is_one() {
        let fragment = MeshFragment::new(
            FragmentId(1),
            Timestamp::default(),
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(0.5, 3.0_f64.sqrt() / 2.0, 0.0),
            ],
            vec![[0, 1, 2]],
        );
        assert_relative_eq!(triangle_quality(&fragment, &[0, 1, 2]), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn flat_grid_is_smooth_and_well_shaped() {
        let fragment = grid(4, 0.01);
        let config = ValidationConfig::default();
        let prepared = Prepared::new(&fragment, &config);
        assert_relative_eq!(surface_roughness(&fragment, &prepared), 0.0, epsilon = 1e-6);
        assert!(check_quality(&fragment, &prepared, &config).issues.is_empty());
    }

    #[test]
    fn slivers_are_poor_quality() {
        let fragment = MeshFragment::new(
            FragmentId(1),
            Timestamp::default(),
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(0.5, 0.01, 0.0),
            ],
            vec![[0, 1, 2]],
        );
        let config = ValidationConfig::default();
        let outcome = check_quality(&fragment, &Prepared::new(&fragment, &config), &config);
        assert_eq!(
            outcome.issues,
            vec![ValidationIssue::PoorTriangleQuality { count: 1 }]
        );
    }

    #[test]
    fn zigzag_surface_is_rough() {
        let mut fragment = grid(4, 0.01);
        for (i, v) in fragment.vertices.iter_mut().enumerate() {
            v.z = if i % 2 == 0 { 0.0 } else { 0.03 };
        }
        let config = ValidationConfig::default();
        let prepared = Prepared::new(&fragment, &config);
        assert!(surface_roughness(&fragment, &prepared) > config.max_roughness);
        assert!(check_quality(&fragment, &prepared, &config)
            .issues
            .iter()
            .any(|i| matches!(i, ValidationIssue::ExcessiveRoughness { .. })));
    }
}
