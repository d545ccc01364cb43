//! The mesh quality validator service.

use hashbrown::HashMap;
use parking_lot::Mutex;
use rayon::prelude::*;
use scan_history::KeyedHistory;
use scan_types::{ConditionDelta, MeshFragment, QualityFeedback, QualityParameters, ScanId};
use tracing::{debug, info};

use crate::checks::{Prepared, check_connectivity, check_geometry, check_quality, check_topology};
use crate::sequence::{SequenceValidation, check_pair};
use crate::{ValidateResult, ValidationConfig, ValidationResult};

/// Which scan a validation belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ValidationContext {
    /// Owning scan. Results are kept per scan.
    pub scan: ScanId,
}

impl ValidationContext {
    /// Context for `scan`.
    #[must_use]
    pub const fn new(scan: ScanId) -> Self {
        Self { scan }
    }
}

/// Validates fragments and keeps the last results per scan.
///
/// The four sub-checks of a fragment run in parallel; the validator's own
/// state (history and per-scan overrides) sits behind exclusive locks.
///
/// # Example
///
/// ```
/// use scan_types::{FragmentId, MeshFragment, Point3, ScanId, Timestamp};
/// use scan_validate::{MeshValidator, ValidationConfig, ValidationContext};
///
/// let validator = MeshValidator::new(ValidationConfig::lenient());
/// let fragment = MeshFragment::new(
///     FragmentId(1),
///     Timestamp::from_secs(0.0),
///     vec![
///         Point3::new(0.0, 0.0, 0.0),
///         Point3::new(0.01, 0.0, 0.0),
///         Point3::new(0.0, 0.01, 0.0),
///     ],
///     vec![[0, 1, 2]],
/// );
///
/// let result = validator
///     .validate(&fragment, &ValidationContext::new(ScanId(1)))
///     .unwrap();
/// assert!(result.is_valid);
/// ```
#[derive(Debug)]
pub struct MeshValidator {
    config: ValidationConfig,
    history: Mutex<KeyedHistory<ScanId, ValidationResult>>,
    overrides: Mutex<HashMap<ScanId, QualityParameters>>,
}

impl Default for MeshValidator {
    fn default() -> Self {
        Self::new(ValidationConfig::default())
    }
}

impl MeshValidator {
    /// Creates a validator.
    #[must_use]
    pub fn new(config: ValidationConfig) -> Self {
        Self {
            history: Mutex::new(KeyedHistory::new(config.history_capacity)),
            overrides: Mutex::new(HashMap::new()),
            config,
        }
    }

    /// Base configuration.
    #[must_use]
    pub const fn config(&self) -> &ValidationConfig {
        &self.config
    }

    /// Configuration for `scan`, with any quality-control override applied.
    #[must_use]
    pub fn effective_config(&self, scan: ScanId) -> ValidationConfig {
        match self.overrides.lock().get(&scan) {
            Some(params) => self.config.with_quality(params),
            None => self.config,
        }
    }

    /// Validates one fragment and records the result.
    ///
    /// # Errors
    ///
    /// Returns [`crate::ValidateError::MalformedFragment`] if the fragment's
    /// arrays cannot be interpreted. Poor geometry is reported as issues.
    pub fn validate(
        &self,
        fragment: &MeshFragment,
        context: &ValidationContext,
    ) -> ValidateResult<ValidationResult> {
        let result = self.evaluate(fragment, context)?;
        self.record(context.scan, &result);
        Ok(result)
    }

    /// Validates one fragment without touching the history.
    ///
    /// Pair with [`record_results`](Self::record_results) when a batch must
    /// only be recorded once every member has validated.
    ///
    /// # Errors
    ///
    /// Same as [`validate`](Self::validate).
    pub fn evaluate(
        &self,
        fragment: &MeshFragment,
        context: &ValidationContext,
    ) -> ValidateResult<ValidationResult> {
        evaluate(fragment, &self.effective_config(context.scan))
    }

    /// Appends results from [`evaluate`](Self::evaluate) to the scan's history.
    pub fn record_results(&self, scan: ScanId, results: &[ValidationResult]) {
        let mut history = self.history.lock();
        for result in results {
            history.record(scan, result.clone());
        }
    }

    /// Validates every fragment in parallel, then checks coherence between
    /// consecutive fragments.
    ///
    /// # Errors
    ///
    /// Fails if any fragment fails to validate; nothing is recorded then.
    pub fn validate_sequence(
        &self,
        fragments: &[MeshFragment],
        context: &ValidationContext,
    ) -> ValidateResult<SequenceValidation> {
        let config = self.effective_config(context.scan);

        let results = fragments
            .par_iter()
            .map(|f| evaluate(f, &config))
            .collect::<ValidateResult<Vec<_>>>()?;

        let issues: Vec<_> = fragments
            .par_windows(2)
            .enumerate()
            .flat_map_iter(|(i, pair)| check_pair(i + 1, &pair[0], &pair[1], &config.sequence))
            .collect();

        self.record_results(context.scan, &results);

        let validation = SequenceValidation::new(results, issues);
        info!(
            scan = %context.scan,
            fragments = fragments.len(),
            sequence_issues = validation.issues.len(),
            valid = validation.is_valid,
            "sequence validated"
        );
        Ok(validation)
    }

    /// Last results for `scan`, oldest first.
    #[must_use]
    pub fn validation_history(&self, scan: ScanId) -> Vec<ValidationResult> {
        self.history.lock().snapshot(&scan)
    }

    /// Drops history and overrides for a finished scan.
    pub fn clear_scan(&self, scan: ScanId) {
        self.history.lock().remove(&scan);
        self.overrides.lock().remove(&scan);
    }

    fn record(&self, scan: ScanId, result: &ValidationResult) {
        self.history.lock().record(scan, result.clone());
    }
}

impl QualityFeedback for MeshValidator {
    fn apply_quality_parameters(&self, scan: ScanId, params: &QualityParameters) {
        debug!(
            %scan,
            min_vertex_density = params.min_vertex_density,
            min_confidence = params.min_confidence,
            "quality parameters applied"
        );
        self.overrides.lock().insert(scan, *params);
    }

    fn conditions_changed(&self, scan: ScanId, delta: &ConditionDelta) {
        debug!(%scan, max_delta = delta.max(), "environment changed");
    }
}

/// Runs the four checks concurrently and combines them.
fn evaluate(fragment: &MeshFragment, config: &ValidationConfig) -> ValidateResult<ValidationResult> {
    let prepared = Prepared::new(fragment, config);

    let ((topology, geometry), (connectivity, quality)) = rayon::join(
        || {
            rayon::join(
                || check_topology(&prepared),
                || check_geometry(fragment, &prepared, config),
            )
        },
        || {
            rayon::join(
                || check_connectivity(fragment),
                || check_quality(fragment, &prepared, config),
            )
        },
    );

    let result = ValidationResult::combine(
        fragment.id,
        fragment.timestamp,
        [topology, geometry?, connectivity, quality],
    );
    if !result.issues.is_empty() {
        debug!(
            fragment = fragment.id.0,
            issues = result.issues.len(),
            confidence = result.confidence,
            valid = result.is_valid,
            "fragment has issues"
        );
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checks::fixtures::grid;
    use crate::{SequenceIssue, ValidateError, ValidationIssue};
    use scan_types::{Point3, Severity, Timestamp};

    fn ctx() -> ValidationContext {
        ValidationContext::new(ScanId(7))
    }

    /// 3×3 grid plus one collinear face and three stray vertices.
    fn degenerate_with_strays() -> MeshFragment {
        let mut fragment = grid(3, 0.01);
        fragment.faces.push([0, 1, 2]);
        fragment.vertices.extend([
            Point3::new(0.1, 0.1, 0.1),
            Point3::new(0.2, 0.1, 0.1),
            Point3::new(0.3, 0.1, 0.1),
        ]);
        fragment
    }

    #[test]
    fn clean_grid_is_valid() {
        let validator = MeshValidator::default();
        let result = validator.validate(&grid(4, 0.01), &ctx()).unwrap();
        assert!(result.is_valid);
        assert!(result.issues.is_empty());
        assert_eq!(result.confidence, 1.0);
    }

    #[test]
    fn degenerate_triangle_and_disconnected_vertices() {
        let validator = MeshValidator::default();
        let result = validator.validate(&degenerate_with_strays(), &ctx()).unwrap();

        assert_eq!(
            result.issues,
            vec![
                ValidationIssue::DegenerateTriangles { count: 1 },
                ValidationIssue::DisconnectedVertices { count: 3 },
            ]
        );
        assert_eq!(result.issues[0].severity(), Severity::High);
        assert_eq!(result.issues[1].severity(), Severity::Medium);
        assert!(!result.is_valid);
        assert!((result.confidence - (1.0 + 0.7 + 0.85 + 1.0) / 4.0).abs() < 1e-12);
        assert_eq!(result.recommendations.len(), 2);
    }

    #[test]
    fn lone_degenerate_triangle_with_strays() {
        let fragment = MeshFragment::new(
            scan_types::FragmentId(2),
            Timestamp::from_secs(0.0),
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(0.01, 0.0, 0.0),
                Point3::new(0.02, 0.0, 0.0),
                Point3::new(0.1, 0.1, 0.1),
                Point3::new(0.2, 0.1, 0.1),
                Point3::new(0.3, 0.1, 0.1),
            ],
            vec![[0, 1, 2]],
        );
        let result = MeshValidator::default().validate(&fragment, &ctx()).unwrap();
        assert_eq!(
            result.issues,
            vec![
                ValidationIssue::DegenerateTriangles { count: 1 },
                ValidationIssue::DisconnectedVertices { count: 3 },
            ]
        );
        assert!(!result.is_valid);
    }

    #[test]
    fn malformed_fragment_fails_whole_call() {
        let validator = MeshValidator::default();
        let mut fragment = grid(3, 0.01);
        fragment.vertices[0].z = f64::INFINITY;
        assert!(matches!(
            validator.validate(&fragment, &ctx()),
            Err(ValidateError::MalformedFragment { .. })
        ));
        assert!(validator.validation_history(ScanId(7)).is_empty());
    }

    #[test]
    fn evaluate_leaves_history_to_the_caller() {
        let validator = MeshValidator::default();
        let result = validator.evaluate(&grid(3, 0.01), &ctx()).unwrap();
        assert!(validator.validation_history(ScanId(7)).is_empty());

        validator.record_results(ScanId(7), &[result.clone(), result]);
        assert_eq!(validator.validation_history(ScanId(7)).len(), 2);
    }

    #[test]
    fn history_keeps_last_ten() {
        let validator = MeshValidator::default();
        for i in 0..15 {
            let mut fragment = grid(2, 0.01);
            fragment.id = scan_types::FragmentId(i);
            validator.validate(&fragment, &ctx()).unwrap();
        }
        let history = validator.validation_history(ScanId(7));
        assert_eq!(history.len(), 10);
        assert_eq!(history[0].fragment.0, 5);
        assert_eq!(history[9].fragment.0, 14);
        assert!(validator.validation_history(ScanId(8)).is_empty());
    }

    #[test]
    fn quality_override_changes_density_threshold() {
        let validator = MeshValidator::default();
        let fragment = grid(3, 0.01);
        assert!(validator.validate(&fragment, &ctx()).unwrap().issues.is_empty());

        validator.apply_quality_parameters(
            ScanId(7),
            &QualityParameters {
                min_vertex_density: 1.0e6,
                ..QualityParameters::default()
            },
        );
        let result = validator.validate(&fragment, &ctx()).unwrap();
        assert!(matches!(
            result.issues[..],
            [ValidationIssue::LowVertexDensity { .. }]
        ));

        validator.clear_scan(ScanId(7));
        assert!(validator.validate(&fragment, &ctx()).unwrap().issues.is_empty());
    }

    #[test]
    fn sequence_is_invalid_on_gap_or_bad_fragment() {
        let validator = MeshValidator::default();
        let mut a = grid(3, 0.01);
        a.timestamp = Timestamp::from_secs(0.0);
        let mut b = grid(3, 0.01);
        b.timestamp = Timestamp::from_secs(0.1);
        let mut c = grid(3, 0.01);
        c.timestamp = Timestamp::from_secs(5.0);

        let ok = validator
            .validate_sequence(&[a.clone(), b.clone()], &ctx())
            .unwrap();
        assert!(ok.is_valid);
        assert_eq!(ok.results.len(), 2);

        let gap = validator
            .validate_sequence(&[a.clone(), b.clone(), c], &ctx())
            .unwrap();
        assert!(!gap.is_valid);
        assert!(matches!(
            gap.issues[..],
            [SequenceIssue::TemporalGap { index: 2, .. }]
        ));

        let mut bad = degenerate_with_strays();
        bad.timestamp = Timestamp::from_secs(0.2);
        let mixed = validator.validate_sequence(&[a, b, bad], &ctx()).unwrap();
        assert!(mixed.issues.is_empty());
        assert!(!mixed.is_valid);
    }

    #[test]
    fn empty_sequence_is_valid() {
        let validator = MeshValidator::default();
        let seq = validator.validate_sequence(&[], &ctx()).unwrap();
        assert!(seq.is_valid);
        assert_eq!(seq.mean_confidence(), 1.0);
    }
}
