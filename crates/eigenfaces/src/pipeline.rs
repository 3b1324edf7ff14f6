//! Evaluation orchestration: dataset + split + parameters in, JSON-ready
//! reports out.
//!
//! A single run trains one classifier and scores the test side. A sweep
//! walks a Cartesian parameter grid; the subspace depends only on the
//! training set and the energy, so it is fitted once per energy and the
//! metric/threshold cells reuse it.

use nalgebra::DVector;
use serde::{Deserialize, Serialize};

use crate::classify::{
    Classifier, ClassifyConfig, FitError, Prediction, QueryDecision, QueryError, RejectReason,
};
use crate::dataset::Dataset;
use crate::eval::evaluate;
use crate::metric::Metric;
use crate::split::Split;

// ── Run parameters ───────────────────────────────────────────────────────

/// Parameters for one evaluation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunParams {
    /// Spectrum energy retained by the subspace.
    /// Default: [`RunParams::DEFAULT_ENERGY`].
    #[serde(default = "RunParams::default_energy")]
    pub energy: f64,
    /// Neighbor metric. Default: [`RunParams::DEFAULT_METRIC`].
    #[serde(default = "RunParams::default_metric")]
    pub metric: Metric,
    /// Reconstruction-error ceiling; `None` disables the gate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reconstruction_threshold: Option<f64>,
    /// Confidence gate on the best score; `None` disables the gate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence_threshold: Option<f64>,
}

impl RunParams {
    pub const DEFAULT_ENERGY: f64 = 0.9;
    pub const DEFAULT_METRIC: Metric = Metric::L2;

    fn default_energy() -> f64 {
        Self::DEFAULT_ENERGY
    }

    fn default_metric() -> Metric {
        Self::DEFAULT_METRIC
    }

    /// The classification slice of the parameters.
    pub fn classify_config(&self) -> ClassifyConfig {
        ClassifyConfig {
            metric: self.metric,
            reconstruction_threshold: self.reconstruction_threshold,
            confidence_threshold: self.confidence_threshold,
        }
    }
}

impl Default for RunParams {
    fn default() -> Self {
        Self {
            energy: Self::DEFAULT_ENERGY,
            metric: Self::DEFAULT_METRIC,
            reconstruction_threshold: None,
            confidence_threshold: None,
        }
    }
}

// ── Reports ──────────────────────────────────────────────────────────────

/// One test query in the report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRecord {
    /// True class name.
    pub truth: String,
    /// Predicted class name; absent when the query was rejected.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub predicted: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reject_reason: Option<RejectReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub best_score: Option<f64>,
    pub reconstruction_error: f64,
}

/// Serializable result of one evaluation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub params: RunParams,
    /// Realized subspace rank.
    pub rank: usize,
    /// Share of the spectrum mass the rank captures.
    pub explained_energy: f64,
    pub n_train: usize,
    pub n_test: usize,
    pub n_unknown: usize,
    pub accuracy: f64,
    pub macro_f1: f64,
    pub queries: Vec<QueryRecord>,
}

/// One grid cell of a sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepRecord {
    pub energy: f64,
    pub metric: Metric,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reconstruction_threshold: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence_threshold: Option<f64>,
    pub rank: usize,
    pub accuracy: f64,
    pub macro_f1: f64,
    pub n_unknown: usize,
}

/// All sweep cells plus the shared split sizes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepReport {
    pub n_train: usize,
    pub n_test: usize,
    pub records: Vec<SweepRecord>,
}

impl SweepReport {
    /// Record with the highest macro-F1.
    pub fn best(&self) -> Option<&SweepRecord> {
        self.records
            .iter()
            .max_by(|a, b| a.macro_f1.total_cmp(&b.macro_f1))
    }
}

/// Cartesian parameter grid for [`run_sweep`].
#[derive(Debug, Clone)]
pub struct SweepGrid {
    pub energies: Vec<f64>,
    pub metrics: Vec<Metric>,
    /// `None` entries sweep the disabled-gate case.
    pub reconstruction_thresholds: Vec<Option<f64>>,
    pub confidence_thresholds: Vec<Option<f64>>,
}

impl Default for SweepGrid {
    fn default() -> Self {
        Self {
            energies: vec![RunParams::DEFAULT_ENERGY],
            metrics: vec![RunParams::DEFAULT_METRIC],
            reconstruction_thresholds: vec![None],
            confidence_thresholds: vec![None],
        }
    }
}

// ── Errors ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum RunError {
    Fit(FitError),
    Query(QueryError),
}

impl std::fmt::Display for RunError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fit(e) => write!(f, "classifier fit failed: {}", e),
            Self::Query(e) => write!(f, "query classification failed: {}", e),
        }
    }
}

impl std::error::Error for RunError {}

impl From<FitError> for RunError {
    fn from(e: FitError) -> Self {
        Self::Fit(e)
    }
}

impl From<QueryError> for RunError {
    fn from(e: QueryError) -> Self {
        Self::Query(e)
    }
}

// ── Orchestration ────────────────────────────────────────────────────────

fn gather(dataset: &Dataset, indices: &[usize]) -> (Vec<DVector<f64>>, Vec<usize>) {
    let vectors = indices
        .iter()
        .map(|&i| dataset.samples[i].vector.clone())
        .collect();
    let labels = indices.iter().map(|&i| dataset.samples[i].class).collect();
    (vectors, labels)
}

fn classify_queries(
    classifier: &Classifier,
    dataset: &Dataset,
    test: &[usize],
) -> Result<(Vec<Prediction>, Vec<Prediction>, Vec<QueryDecision>), RunError> {
    let mut truths = Vec::with_capacity(test.len());
    let mut predictions = Vec::with_capacity(test.len());
    let mut decisions = Vec::with_capacity(test.len());
    for &i in test {
        let sample = &dataset.samples[i];
        let decision = classifier.classify(&sample.vector)?;
        truths.push(Prediction::Known(sample.class));
        predictions.push(decision.prediction);
        decisions.push(decision);
    }
    Ok((truths, predictions, decisions))
}

/// Train on the split's train side and classify every test query.
pub fn run_evaluation(
    dataset: &Dataset,
    split: &Split,
    params: &RunParams,
) -> Result<RunReport, RunError> {
    let (vectors, labels) = gather(dataset, &split.train);
    let classifier = Classifier::fit(&vectors, &labels, params.energy, params.classify_config())?;
    tracing::info!(
        rank = classifier.rank(),
        n_train = split.train.len(),
        n_test = split.test.len(),
        "subspace trained"
    );

    let (truths, predictions, decisions) = classify_queries(&classifier, dataset, &split.test)?;
    let evaluation = evaluate(&truths, &predictions);

    let queries = split
        .test
        .iter()
        .zip(&decisions)
        .map(|(&i, decision)| QueryRecord {
            truth: dataset.classes[dataset.samples[i].class].clone(),
            predicted: decision
                .prediction
                .label()
                .map(|label| dataset.classes[label].clone()),
            reject_reason: decision.reject_reason,
            best_score: decision.best_score,
            reconstruction_error: decision.reconstruction_error,
        })
        .collect();

    Ok(RunReport {
        params: params.clone(),
        rank: classifier.rank(),
        explained_energy: classifier.subspace().explained_energy(),
        n_train: split.train.len(),
        n_test: split.test.len(),
        n_unknown: evaluation.n_unknown,
        accuracy: evaluation.accuracy,
        macro_f1: evaluation.macro_f1,
        queries,
    })
}

/// Evaluate every cell of `grid` on a fixed split.
///
/// The classifier is fitted once per energy; the metric and threshold cells
/// of that energy reuse the fitted subspace and gallery.
pub fn run_sweep(
    dataset: &Dataset,
    split: &Split,
    grid: &SweepGrid,
) -> Result<SweepReport, RunError> {
    let (vectors, labels) = gather(dataset, &split.train);

    let mut records = Vec::new();
    for &energy in &grid.energies {
        let mut classifier = Classifier::fit(&vectors, &labels, energy, ClassifyConfig::default())?;
        tracing::info!(energy, rank = classifier.rank(), "subspace trained for sweep");

        for &metric in &grid.metrics {
            for &reconstruction_threshold in &grid.reconstruction_thresholds {
                for &confidence_threshold in &grid.confidence_thresholds {
                    *classifier.config_mut() = ClassifyConfig {
                        metric,
                        reconstruction_threshold,
                        confidence_threshold,
                    };
                    let (truths, predictions, _) =
                        classify_queries(&classifier, dataset, &split.test)?;
                    let evaluation = evaluate(&truths, &predictions);
                    records.push(SweepRecord {
                        energy,
                        metric,
                        reconstruction_threshold,
                        confidence_threshold,
                        rank: classifier.rank(),
                        accuracy: evaluation.accuracy,
                        macro_f1: evaluation.macro_f1,
                        n_unknown: evaluation.n_unknown,
                    });
                }
            }
        }
    }

    Ok(SweepReport {
        n_train: split.train.len(),
        n_test: split.test.len(),
        records,
    })
}

// ── Tests ────────────────────────────────────────────────────────────────
