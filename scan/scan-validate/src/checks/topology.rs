//! Manifoldness, holes and winding consistency.

use tracing::debug;

use super::Prepared;
use crate::issue::{CheckOutcome, ValidationIssue};

pub(crate) fn check_topology(prepared: &Prepared) -> CheckOutcome {
    let adjacency = &prepared.adjacency;
    let mut issues = Vec::new();

    let non_manifold = adjacency.non_manifold_edge_count();
    if non_manifold > 0 {
        issues.push(ValidationIssue::NonManifoldEdges {
            count: non_manifold,
        });
    }

    // An open patch always has one outer rim; only extra loops are holes.
    let (loops, open_components) = adjacency.boundary_loops();
    let holes = loops.saturating_sub(open_components);
    if holes > 0 {
        issues.push(ValidationIssue::Holes { count: holes });
    }

    let inconsistent = adjacency.inconsistent_edge_count();
    if inconsistent > 0 {
        issues.push(ValidationIssue::InconsistentOrientation {
            edges: inconsistent,
        });
    }

    debug!(
        faces = prepared.faces.len(),
        non_manifold, holes, inconsistent, "topology checked"
    );
    CheckOutcome::from_issues(issues)
}
