//! The four independent sub-checks.
//!
//! Each check reads the fragment and a shared, immutable [`Prepared`] view and
//! returns its own [`CheckOutcome`]. None of them mutates shared state.

mod connectivity;
mod geometry;
mod quality;
mod topology;

pub(crate) use connectivity::check_connectivity;
pub(crate) use geometry::check_geometry;
pub(crate) use quality::check_quality;
pub(crate) use topology::check_topology;

use scan_types::MeshFragment;

use crate::adjacency::FaceAdjacency;
use crate::ValidationConfig;

/// Faces usable for topology and shape analysis, with their adjacency.
///
/// Malformed faces (out-of-range or repeated indices) and degenerate faces
/// are excluded.
#[derive(Debug, Clone, Default)]
pub(crate) struct Prepared {
    pub faces: Vec<[u32; 3]>,
    pub adjacency: FaceAdjacency,
}

impl Prepared {
    pub fn new(fragment: &MeshFragment, config: &ValidationConfig) -> Self {
        let faces: Vec<[u32; 3]> = fragment
            .well_formed_faces()
            .filter(|(_, f)| fragment.face_area(f) >= config.degenerate_area_threshold)
            .map(|(_, f)| *f)
            .collect();
        let adjacency = FaceAdjacency::build(&faces);
        Self { faces, adjacency }
    }
}
