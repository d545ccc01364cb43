//! Degenerate faces, vertex density and self-intersection.

use scan_types::MeshFragment;
use tracing::debug;

use super::Prepared;
use crate::intersect::{IndexedTriangle, count_intersecting_pairs};
use crate::issue::{CheckOutcome, ValidationIssue};
use crate::{ValidateError, ValidateResult, ValidationConfig};

pub(crate) fn check_geometry(
    fragment: &MeshFragment,
    prepared: &Prepared,
    config: &ValidationConfig,
) -> ValidateResult<CheckOutcome> {
    ensure_well_formed(fragment)?;
    let mut issues = Vec::new();

    let degenerate = fragment
        .well_formed_faces()
        .filter(|(_, f)| fragment.face_area(f) < config.degenerate_area_threshold)
        .count();
    if degenerate > 0 {
        issues.push(ValidationIssue::DegenerateTriangles { count: degenerate });
    }

    // Without measurable surface only the degenerate faces are reported.
    let density = vertex_density(
        fragment,
        config.min_confidence,
        config.degenerate_area_threshold,
    );
    if let Some(density) = density.filter(|&d| d < config.min_vertex_density) {
        issues.push(ValidationIssue::LowVertexDensity { value: density });
    }

    let triangles: Vec<IndexedTriangle> = prepared
        .faces
        .iter()
        .filter_map(|f| {
            fragment.triangle(f).map(|points| IndexedTriangle {
                indices: *f,
                points,
            })
        })
        .collect();
    let intersecting = count_intersecting_pairs(&triangles, config.intersection_epsilon);
    if intersecting > 0 {
        issues.push(ValidationIssue::IntersectingTriangles {
            count: intersecting,
        });
    }

    debug!(degenerate, ?density, intersecting, "geometry checked");
    Ok(CheckOutcome::from_issues(issues))
}

fn ensure_well_formed(fragment: &MeshFragment) -> ValidateResult<()> {
    if let Some(i) = fragment
        .vertices
        .iter()
        .position(|p| !(p.x.is_finite() && p.y.is_finite() && p.z.is_finite()))
    {
        return Err(ValidateError::malformed(
            fragment.id,
            format!("vertex {i} is not finite"),
        ));
    }
    if !fragment.normals.is_empty() && fragment.normals.len() != fragment.vertices.len() {
        return Err(ValidateError::malformed(
            fragment.id,
            format!(
                "{} normals for {} vertices",
                fragment.normals.len(),
                fragment.vertices.len()
            ),
        ));
    }
    if !fragment.confidence.is_empty() && fragment.confidence.len() != fragment.vertices.len() {
        return Err(ValidateError::malformed(
            fragment.id,
            format!(
                "{} confidence values for {} vertices",
                fragment.confidence.len(),
                fragment.vertices.len()
            ),
        ));
    }
    Ok(())
}

/// Sufficiently confident vertices per square meter of non-degenerate surface.
///
/// Only faces of at least `min_face_area` contribute area or vertices.
/// Returns `None` when no such face exists.
pub(crate) fn vertex_density(
    fragment: &MeshFragment,
    min_confidence: f32,
    min_face_area: f64,
) -> Option<f64> {
    let mut area = 0.0;
    let mut referenced = vec![false; fragment.vertices.len()];
    for (_, face) in fragment.well_formed_faces() {
        let face_area = fragment.face_area(face);
        if face_area < min_face_area {
            continue;
        }
        area += face_area;
        for &v in face {
            referenced[v as usize] = true;
        }
    }
    if area <= 0.0 {
        return None;
    }
    let counted = referenced
        .iter()
        .enumerate()
        .filter(|&(i, &r)| {
            r && fragment
                .confidence
                .get(i)
                .map_or(true, |&c| c >= min_confidence)
        })
        .count();
    #[allow(clippy::cast_precision_loss)]
    let counted = counted as f64;
    Some(counted / area)
}
