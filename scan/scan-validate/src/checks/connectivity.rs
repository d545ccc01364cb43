//! Unreferenced vertices and broken index triples.

use scan_types::MeshFragment;

use crate::issue::{CheckOutcome, ValidationIssue};

pub(crate) fn check_connectivity(fragment: &MeshFragment) -> CheckOutcome {
    let mut issues = Vec::new();

    let disconnected = fragment.vertex_count() - fragment.referenced_vertex_count();
    if disconnected > 0 {
        issues.push(ValidationIssue::DisconnectedVertices {
            count: disconnected,
        });
    }

    let invalid = fragment
        .faces
        .iter()
        .filter(|f| !fragment.is_well_formed(f))
        .count();
    if invalid > 0 {
        issues.push(ValidationIssue::InvalidFaceConnectivity { faces: invalid });
    }

    CheckOutcome::from_issues(issues)
}
