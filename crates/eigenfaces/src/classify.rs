//! Open-set nearest-neighbor classification over a trained subspace.
//!
//! A query passes two gates before it is assigned a gallery identity. The
//! reconstruction gate rejects samples the subspace cannot express at all;
//! the confidence gate rejects samples whose nearest enrolled neighbor is
//! still too far, meaning an unenrolled person. Either gate is disabled by
//! leaving its threshold unset, and a disabled pair turns the classifier
//! into plain closed-set nearest neighbor.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::metric::Metric;
use crate::subspace::{train, Subspace, TrainError};

// ── Configuration ────────────────────────────────────────────────────────

/// Configuration for open-set query classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifyConfig {
    /// Neighbor metric over subspace coordinates.
    /// Default: [`ClassifyConfig::DEFAULT_METRIC`].
    #[serde(default = "ClassifyConfig::default_metric")]
    pub metric: Metric,
    /// Ceiling on the reconstruction error, which is always the ambient L2
    /// distance regardless of `metric`. `None` disables the gate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reconstruction_threshold: Option<f64>,
    /// Gate on the best neighbor score: a distance ceiling for `l2`/`l1`,
    /// a floor on the similarity `1 - score` for `cosine`. `None` disables
    /// the gate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence_threshold: Option<f64>,
}

impl ClassifyConfig {
    pub const DEFAULT_METRIC: Metric = Metric::L2;

    fn default_metric() -> Metric {
        Self::DEFAULT_METRIC
    }
}

impl Default for ClassifyConfig {
    fn default() -> Self {
        Self {
            metric: Self::DEFAULT_METRIC,
            reconstruction_threshold: None,
            confidence_threshold: None,
        }
    }
}

// ── Decision types ───────────────────────────────────────────────────────

/// Outcome of one query: an enrolled class label or the open-set rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Prediction {
    Known(usize),
    Unknown,
}

impl Prediction {
    pub const fn is_known(self) -> bool {
        matches!(self, Self::Known(_))
    }

    /// The class label, when known.
    pub const fn label(self) -> Option<usize> {
        match self {
            Self::Known(label) => Some(label),
            Self::Unknown => None,
        }
    }
}

/// Stable reject code for an open-set rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    ReconstructionTooHigh,
    ConfidenceTooLow,
}

impl RejectReason {
    pub const fn code(self) -> &'static str {
        match self {
            Self::ReconstructionTooHigh => "reconstruction_too_high",
            Self::ConfidenceTooLow => "confidence_too_low",
        }
    }
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// Structured context attached to a rejection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RejectContext {
    ReconstructionTooHigh {
        observed_error: f64,
        max_allowed_error: f64,
    },
    ConfidenceTooLow {
        metric: Metric,
        observed_score: f64,
        threshold: f64,
    },
}

/// Per-query decision with full diagnostics.
///
/// `reconstruction_error` is measured for every query, gated or not; the
/// neighbor fields are populated whenever scoring ran, including when the
/// confidence gate then rejected the query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryDecision {
    pub prediction: Prediction,
    /// Ambient L2 distance between the query and its subspace reconstruction.
    pub reconstruction_error: f64,
    /// Gallery column of the nearest neighbor.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub best_index: Option<usize>,
    /// Class label of the nearest neighbor.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub best_label: Option<usize>,
    /// Score of the nearest neighbor under the configured metric.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub best_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reject_reason: Option<RejectReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reject_context: Option<RejectContext>,
}

// ── Errors ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum FitError {
    /// One label per training vector is required.
    LabelCountMismatch { vectors: usize, labels: usize },
    /// Identification against fewer than two classes is vacuous.
    TooFewClasses { needed: usize, got: usize },
    Train(TrainError),
}

impl std::fmt::Display for FitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LabelCountMismatch { vectors, labels } => write!(
                f,
                "label count mismatch: {} vectors but {} labels",
                vectors, labels
            ),
            Self::TooFewClasses { needed, got } => {
                write!(f, "too few distinct classes: need {}, got {}", needed, got)
            }
            Self::Train(e) => write!(f, "subspace training failed: {}", e),
        }
    }
}

impl std::error::Error for FitError {}

impl From<TrainError> for FitError {
    fn from(e: TrainError) -> Self {
        Self::Train(e)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum QueryError {
    /// The query length does not match the trained sample dimension.
    DimensionMismatch { expected: usize, got: usize },
}

impl std::fmt::Display for QueryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DimensionMismatch { expected, got } => {
                write!(f, "query has dimension {}, expected {}", got, expected)
            }
        }
    }
}

impl std::error::Error for QueryError {}

// ── Classifier ───────────────────────────────────────────────────────────

/// A trained open-set classifier: the subspace plus the projected gallery.
#[derive(Debug, Clone)]
pub struct Classifier {
    config: ClassifyConfig,
    subspace: Subspace,
    /// One projected gallery sample per column (`rank x n_gallery`).
    gallery: DMatrix<f64>,
    labels: Vec<usize>,
}

impl Classifier {
    /// Train the subspace on `vectors` and enroll all of them as the gallery.
    ///
    /// `labels[i]` names the class of `vectors[i]`. At least two distinct
    /// labels are required; against a single class every accepted query
    /// would trivially answer that class.
    pub fn fit(
        vectors: &[DVector<f64>],
        labels: &[usize],
        energy: f64,
        config: ClassifyConfig,
    ) -> Result<Self, FitError> {
        if vectors.len() != labels.len() {
            return Err(FitError::LabelCountMismatch {
                vectors: vectors.len(),
                labels: labels.len(),
            });
        }
        let mut distinct = labels.to_vec();
        distinct.sort_unstable();
        distinct.dedup();
        if distinct.len() < 2 {
            return Err(FitError::TooFewClasses {
                needed: 2,
                got: distinct.len(),
            });
        }

        let subspace = train(vectors, energy)?;
        let projected: Vec<DVector<f64>> =
            vectors.iter().map(|v| subspace.project(v)).collect();
        let gallery = DMatrix::from_columns(&projected);

        Ok(Self {
            config,
            subspace,
            gallery,
            labels: labels.to_vec(),
        })
    }

    pub fn config(&self) -> &ClassifyConfig {
        &self.config
    }

    /// Mutable access for threshold sweeps. The subspace and gallery stay
    /// as trained.
    pub fn config_mut(&mut self) -> &mut ClassifyConfig {
        &mut self.config
    }

    pub fn subspace(&self) -> &Subspace {
        &self.subspace
    }

    /// Retained subspace rank.
    pub fn rank(&self) -> usize {
        self.subspace.rank()
    }

    /// Number of enrolled gallery samples.
    pub fn n_gallery(&self) -> usize {
        self.labels.len()
    }

    /// Classify one query vector against the enrolled gallery.
    pub fn classify(&self, query: &DVector<f64>) -> Result<QueryDecision, QueryError> {
        if query.len() != self.subspace.dim() {
            return Err(QueryError::DimensionMismatch {
                expected: self.subspace.dim(),
                got: query.len(),
            });
        }

        let coordinates = self.subspace.project(query);
        let reconstruction = self.subspace.reconstruct(&coordinates);
        let reconstruction_error = (query - reconstruction).norm();

        if let Some(max_allowed) = self.config.reconstruction_threshold {
            if reconstruction_error > max_allowed {
                return Ok(QueryDecision {
                    prediction: Prediction::Unknown,
                    reconstruction_error,
                    best_index: None,
                    best_label: None,
                    best_score: None,
                    reject_reason: Some(RejectReason::ReconstructionTooHigh),
                    reject_context: Some(RejectContext::ReconstructionTooHigh {
                        observed_error: reconstruction_error,
                        max_allowed_error: max_allowed,
                    }),
                });
            }
        }

        let scores = self.config.metric.scores(&self.gallery, &coordinates);
        // Strict `<` keeps the first of tied neighbors.
        let mut best_index = 0usize;
        for (i, &score) in scores.iter().enumerate().skip(1) {
            if score < scores[best_index] {
                best_index = i;
            }
        }
        let best_score = scores[best_index];
        let best_label = self.labels[best_index];

        if let Some(threshold) = self.config.confidence_threshold {
            if !self.config.metric.accepts(best_score, threshold) {
                return Ok(QueryDecision {
                    prediction: Prediction::Unknown,
                    reconstruction_error,
                    best_index: Some(best_index),
                    best_label: Some(best_label),
                    best_score: Some(best_score),
                    reject_reason: Some(RejectReason::ConfidenceTooLow),
                    reject_context: Some(RejectContext::ConfidenceTooLow {
                        metric: self.config.metric,
                        observed_score: best_score,
                        threshold,
                    }),
                });
            }
        }

        Ok(QueryDecision {
            prediction: Prediction::Known(best_label),
            reconstruction_error,
            best_index: Some(best_index),
            best_label: Some(best_label),
            best_score: Some(best_score),
            reject_reason: None,
            reject_context: None,
        })
    }
}

// ── Tests ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::make_gallery;
    use approx::assert_abs_diff_eq;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn defaults_are_stable() {
        let config = ClassifyConfig::default();
        assert_eq!(config.metric, Metric::L2);
        assert_eq!(config.reconstruction_threshold, None);
        assert_eq!(config.confidence_threshold, None);
    }

    #[test]
    fn config_deserializes_with_missing_fields() {
        let config: ClassifyConfig = serde_json::from_str("{}").expect("empty config");
        assert_eq!(config, ClassifyConfig::default());

        let config: ClassifyConfig =
            serde_json::from_str(r#"{"metric": "cosine", "confidence_threshold": 0.8}"#)
                .expect("partial config");
        assert_eq!(config.metric, Metric::Cosine);
        assert_eq!(config.confidence_threshold, Some(0.8));
        assert_eq!(config.reconstruction_threshold, None);
    }

    #[test]
    fn prediction_helpers_and_serialization() {
        assert!(Prediction::Known(3).is_known());
        assert_eq!(Prediction::Known(3).label(), Some(3));
        assert_eq!(Prediction::Unknown.label(), None);

        assert_eq!(
            serde_json::to_string(&Prediction::Known(3)).expect("serialize"),
            "{\"known\":3}"
        );
        assert_eq!(
            serde_json::to_string(&Prediction::Unknown).expect("serialize"),
            "\"unknown\""
        );
        let back: Prediction = serde_json::from_str("{\"known\":7}").expect("deserialize");
        assert_eq!(back, Prediction::Known(7));
    }

    #[test]
    fn reject_reasons_serialize_stably() {
        assert_eq!(
            RejectReason::ReconstructionTooHigh.code(),
            "reconstruction_too_high"
        );
        assert_eq!(
            serde_json::to_string(&RejectReason::ConfidenceTooLow).expect("serialize"),
            "\"confidence_too_low\""
        );

        let context = RejectContext::ConfidenceTooLow {
            metric: Metric::Cosine,
            observed_score: 0.4,
            threshold: 0.8,
        };
        let json = serde_json::to_string(&context).expect("serialize");
        assert!(json.contains("\"kind\":\"confidence_too_low\""));
        assert!(json.contains("\"metric\":\"cosine\""));
    }

    #[test]
    fn fit_rejects_mismatched_labels_and_single_class() {
        let (vectors, labels) = make_gallery(2, 4, 32, 0.05, 3);
        assert!(matches!(
            Classifier::fit(
                &vectors,
                &labels[..labels.len() - 1],
                0.9,
                ClassifyConfig::default()
            ),
            Err(FitError::LabelCountMismatch { .. })
        ));

        let single = vec![0usize; vectors.len()];
        assert!(matches!(
            Classifier::fit(&vectors, &single, 0.9, ClassifyConfig::default()),
            Err(FitError::TooFewClasses { needed: 2, got: 1 })
        ));
    }

    #[test]
    fn fit_propagates_training_errors() {
        let (vectors, labels) = make_gallery(2, 4, 32, 0.05, 3);
        assert!(matches!(
            Classifier::fit(&vectors, &labels, 0.0, ClassifyConfig::default()),
            Err(FitError::Train(TrainError::EnergyOutOfRange { .. }))
        ));
    }

    #[test]
    fn gallery_samples_classify_to_their_own_class() {
        let (vectors, labels) = make_gallery(3, 6, 64, 0.03, 5);
        let classifier =
            Classifier::fit(&vectors, &labels, 0.95, ClassifyConfig::default()).expect("fit");

        for (vector, &label) in vectors.iter().zip(&labels) {
            let decision = classifier.classify(vector).expect("classify");
            assert_eq!(decision.prediction, Prediction::Known(label));
            assert!(decision.reject_reason.is_none());
            // An enrolled vector projects onto its own gallery column.
            assert_eq!(decision.best_score, Some(0.0));
        }

        // Same query, same answer.
        let first = classifier.classify(&vectors[0]).expect("classify");
        let second = classifier.classify(&vectors[0]).expect("classify");
        assert_eq!(first.prediction, second.prediction);
        assert_eq!(first.best_score, second.best_score);
    }

    #[test]
    fn ties_resolve_to_the_first_gallery_entry() {
        let base = DVector::from_fn(32, |i, _| (i as f64) / 32.0);
        let other = DVector::from_fn(32, |i, _| 1.0 - (i as f64) / 32.0);
        let vectors = vec![base.clone(), base.clone(), other.clone(), other];
        let labels = vec![0, 1, 2, 2];
        let classifier =
            Classifier::fit(&vectors, &labels, 1.0, ClassifyConfig::default()).expect("fit");

        // Both copies of `base` project identically; the first column wins.
        let decision = classifier.classify(&base).expect("classify");
        assert_eq!(decision.best_index, Some(0));
        assert_eq!(decision.prediction, Prediction::Known(0));
    }

    #[test]
    fn reconstruction_gate_rejects_far_from_subspace_queries() {
        let (vectors, labels) = make_gallery(3, 6, 64, 0.03, 9);
        let classifier =
            Classifier::fit(&vectors, &labels, 0.9, ClassifyConfig::default()).expect("fit");

        let mut rng = StdRng::seed_from_u64(31);
        let query = DVector::from_fn(64, |_, _| rng.gen_range(0.0..1.0));
        let free = classifier.classify(&query).expect("classify");
        assert!(free.reconstruction_error > 0.0);

        let mut gated = classifier.clone();
        gated.config_mut().reconstruction_threshold = Some(free.reconstruction_error / 2.0);
        let decision = gated.classify(&query).expect("classify");
        assert_eq!(decision.prediction, Prediction::Unknown);
        assert_eq!(
            decision.reject_reason,
            Some(RejectReason::ReconstructionTooHigh)
        );
        assert!(decision.best_score.is_none());
        match decision.reject_context {
            Some(RejectContext::ReconstructionTooHigh {
                observed_error,
                max_allowed_error,
            }) => assert!(observed_error > max_allowed_error),
            other => panic!("unexpected context: {:?}", other),
        }

        gated.config_mut().reconstruction_threshold = Some(free.reconstruction_error * 2.0);
        let decision = gated.classify(&query).expect("classify");
        assert!(decision.reject_reason.is_none());
        assert!(decision.prediction.is_known());
    }

    #[test]
    fn reconstruction_gate_stays_euclidean_under_other_metrics() {
        // Gallery confined to the e0/e1 plane, so the subspace is too.
        let dim = 8;
        let mut vectors = Vec::new();
        for axis in [0usize, 1] {
            for scale in [2.0, 4.0] {
                let mut v = DVector::zeros(dim);
                v[axis] = scale;
                vectors.push(v);
            }
        }
        let labels = vec![0, 0, 1, 1];

        for metric in [Metric::Cosine, Metric::L1] {
            let config = ClassifyConfig {
                metric,
                reconstruction_threshold: Some(0.5),
                confidence_threshold: None,
            };
            let classifier = Classifier::fit(&vectors, &labels, 0.9, config).expect("fit");

            // In-plane query: the gate passes and the neighbor metric answers.
            let decision = classifier.classify(&vectors[0]).expect("classify");
            assert!(decision.reconstruction_error < 0.5);
            assert_eq!(decision.prediction, Prediction::Known(0));

            // Same enrolled direction plus an out-of-plane component. The gate
            // measures the Euclidean residual, even though the neighbor metric
            // scores this direction as a near-perfect match.
            let mut outside = vectors[0].clone();
            outside[5] = 3.0;
            let decision = classifier.classify(&outside).expect("classify");
            assert_abs_diff_eq!(decision.reconstruction_error, 3.0, epsilon = 1e-9);
            assert_eq!(decision.prediction, Prediction::Unknown);
            assert_eq!(
                decision.reject_reason,
                Some(RejectReason::ReconstructionTooHigh)
            );
            assert!(decision.best_score.is_none());
        }
    }

    #[test]
    fn confidence_gate_rejects_distant_neighbors() {
        let (vectors, labels) = make_gallery(3, 6, 64, 0.03, 17);
        let classifier =
            Classifier::fit(&vectors, &labels, 0.95, ClassifyConfig::default()).expect("fit");

        let mut rng = StdRng::seed_from_u64(47);
        let query = DVector::from_fn(64, |_, _| rng.gen_range(0.0..1.0));
        let free = classifier.classify(&query).expect("classify");
        let best = free.best_score.expect("scores ran");
        assert!(best > 0.0);

        let mut gated = classifier.clone();
        gated.config_mut().confidence_threshold = Some(best / 2.0);
        let decision = gated.classify(&query).expect("classify");
        assert_eq!(decision.prediction, Prediction::Unknown);
        assert_eq!(decision.reject_reason, Some(RejectReason::ConfidenceTooLow));
        assert_eq!(decision.best_score, Some(best));

        gated.config_mut().confidence_threshold = Some(best * 2.0);
        let decision = gated.classify(&query).expect("classify");
        assert!(decision.prediction.is_known());
    }

    #[test]
    fn cosine_confidence_threshold_is_a_similarity_floor() {
        let (vectors, labels) = make_gallery(3, 6, 64, 0.03, 23);
        let config = ClassifyConfig {
            metric: Metric::Cosine,
            reconstruction_threshold: None,
            confidence_threshold: None,
        };
        let classifier = Classifier::fit(&vectors, &labels, 0.95, config).expect("fit");

        let decision = classifier.classify(&vectors[0]).expect("classify");
        let best = decision.best_score.expect("scores ran");
        let similarity = 1.0 - best;

        let mut gated = classifier.clone();
        gated.config_mut().confidence_threshold = Some(similarity - 0.1);
        let decision = gated.classify(&vectors[0]).expect("classify");
        assert!(decision.prediction.is_known());

        gated.config_mut().confidence_threshold = Some(similarity + 0.1);
        let decision = gated.classify(&vectors[0]).expect("classify");
        assert_eq!(decision.reject_reason, Some(RejectReason::ConfidenceTooLow));
    }

    #[test]
    fn tightening_the_confidence_gate_never_accepts_more() {
        let (vectors, labels) = make_gallery(4, 5, 64, 0.08, 29);
        let mut classifier =
            Classifier::fit(&vectors, &labels, 0.95, ClassifyConfig::default()).expect("fit");

        let mut rng = StdRng::seed_from_u64(53);
        let queries: Vec<DVector<f64>> = (0..10)
            .map(|_| DVector::from_fn(64, |_, _| rng.gen_range(0.0..1.0)))
            .collect();

        let mut previous = 0usize;
        for threshold in [2.0, 1.0, 0.5, 0.1, 0.0] {
            classifier.config_mut().confidence_threshold = Some(threshold);
            let unknown = queries
                .iter()
                .map(|q| classifier.classify(q).expect("classify"))
                .filter(|d| d.prediction == Prediction::Unknown)
                .count();
            assert!(
                unknown >= previous,
                "unknown count dropped from {} to {} at threshold {}",
                previous,
                unknown,
                threshold
            );
            previous = unknown;
        }
    }

    #[test]
    fn classify_rejects_wrong_dimension() {
        let (vectors, labels) = make_gallery(2, 4, 32, 0.05, 41);
        let classifier =
            Classifier::fit(&vectors, &labels, 0.9, ClassifyConfig::default()).expect("fit");
        let query = DVector::from_element(16, 0.5);
        assert!(matches!(
            classifier.classify(&query),
            Err(QueryError::DimensionMismatch {
                expected: 32,
                got: 16
            })
        ));
    }
}
