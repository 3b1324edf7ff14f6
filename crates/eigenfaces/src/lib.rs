//! eigenfaces — open-set face identification over an eigenface subspace.
//!
//! Images are flattened to `[0, 1]` intensity vectors and identified against
//! an enrolled gallery. The pipeline stages are:
//!
//! 1. **Dataset** – directory gallery loading: grayscale, resize, flatten.
//! 2. **Split** – seeded stratified train/test partition.
//! 3. **Subspace** – mean + thin-SVD basis with energy-driven rank selection.
//! 4. **Metric** – L2 / L1 / cosine dissimilarity over subspace coordinates.
//! 5. **Classify** – two-gate open-set nearest neighbor: a reconstruction
//!    gate for non-face-like queries, a confidence gate for unenrolled faces.
//! 6. **Eval** – accuracy and macro-F1 with `Unknown` as a first-class label.
//!
//! [`run_evaluation`] and [`run_sweep`] tie the stages into single runs and
//! parameter sweeps with JSON-serializable reports.
//!
//! # Public API
//! - [`Classifier`] with [`ClassifyConfig`] as the primary entry point
//! - [`train`] / [`Subspace`] for direct subspace work
//! - [`run_evaluation`] / [`run_sweep`] for batch evaluation
//! - [`load_directory`] / [`stratified_split`] for data handling

mod classify;
mod dataset;
mod eval;
mod metric;
mod pipeline;
mod split;
mod subspace;

#[cfg(test)]
pub(crate) mod test_utils;

pub use classify::{
    Classifier, ClassifyConfig, FitError, Prediction, QueryDecision, QueryError, RejectContext,
    RejectReason,
};
pub use dataset::{load_directory, vector_from_image, Dataset, DatasetConfig, DatasetError, Sample};
pub use eval::{evaluate, Evaluation};
pub use metric::{InvalidMetricError, Metric};
pub use pipeline::{
    run_evaluation, run_sweep, QueryRecord, RunError, RunParams, RunReport, SweepGrid, SweepRecord,
    SweepReport,
};
pub use split::{stratified_split, Split, SplitConfig, SplitError};
pub use subspace::{train, Subspace, TrainError};
