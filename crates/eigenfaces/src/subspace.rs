//! Eigenface subspace training: mean vector + thin-SVD basis with
//! energy-driven rank selection.
//!
//! The centered training matrix (one sample per column) is decomposed with a
//! thin SVD and only the left singular vectors are kept. The retained rank is
//! the smallest prefix of the descending spectrum whose cumulative normalized
//! singular-value mass reaches the requested energy, capped at
//! `min(dim, n_samples - 1)` because centering removes one degree of freedom.
//! A fully collapsed spectrum (identical samples) falls back to rank 1
//! instead of failing.

use nalgebra::{DMatrix, DVector};

// ── Error type ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum TrainError {
    /// Energy must lie in `(0, 1]`.
    EnergyOutOfRange { got: f64 },
    TooFewSamples { needed: usize, got: usize },
    /// Samples must carry at least one dimension.
    ZeroDimension,
    /// Sample at `index` does not match the dimension of the first sample.
    DimensionMismatch {
        expected: usize,
        got: usize,
        index: usize,
    },
    NumericalFailure(String),
}

impl std::fmt::Display for TrainError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EnergyOutOfRange { got } => {
                write!(f, "energy must be in (0, 1], got {}", got)
            }
            Self::TooFewSamples { needed, got } => {
                write!(f, "too few training samples: need {}, got {}", needed, got)
            }
            Self::ZeroDimension => f.write_str("training samples have zero dimension"),
            Self::DimensionMismatch {
                expected,
                got,
                index,
            } => write!(
                f,
                "sample {} has dimension {}, expected {}",
                index, got, expected
            ),
            Self::NumericalFailure(msg) => write!(f, "numerical failure: {}", msg),
        }
    }
}

impl std::error::Error for TrainError {}

// ── Subspace ─────────────────────────────────────────────────────────────

/// A trained eigenface subspace: the gallery mean and an orthonormal basis
/// of the top principal directions.
///
/// Immutable after training; one instance belongs to one (training set,
/// energy) pair and is shared read-only by every classification that uses it.
#[derive(Debug, Clone)]
pub struct Subspace {
    mean: DVector<f64>,
    basis: DMatrix<f64>,
    singular_values: DVector<f64>,
}

impl Subspace {
    /// Per-dimension mean of the training samples.
    pub fn mean(&self) -> &DVector<f64> {
        &self.mean
    }

    /// Orthonormal basis, one retained principal direction per column.
    pub fn basis(&self) -> &DMatrix<f64> {
        &self.basis
    }

    /// Full singular-value spectrum of the centered training matrix,
    /// descending.
    pub fn singular_values(&self) -> &DVector<f64> {
        &self.singular_values
    }

    /// Number of retained principal directions.
    pub fn rank(&self) -> usize {
        self.basis.ncols()
    }

    /// Ambient sample dimension.
    pub fn dim(&self) -> usize {
        self.basis.nrows()
    }

    /// Share of the spectrum mass captured by the retained rank.
    pub fn explained_energy(&self) -> f64 {
        let total: f64 = self.singular_values.iter().sum();
        if total > 0.0 {
            self.singular_values.iter().take(self.rank()).sum::<f64>() / total
        } else {
            1.0
        }
    }

    /// Coordinates of a centered sample in the subspace.
    ///
    /// `sample` must have length [`dim`](Self::dim).
    pub fn project(&self, sample: &DVector<f64>) -> DVector<f64> {
        self.basis.tr_mul(&(sample - &self.mean))
    }

    /// Map subspace coordinates back to the ambient space.
    pub fn reconstruct(&self, coordinates: &DVector<f64>) -> DVector<f64> {
        &self.basis * coordinates + &self.mean
    }

    /// L2 distance between a sample and its reconstruction from the subspace.
    ///
    /// Always Euclidean, independent of any neighbor metric: it measures how
    /// well the subspace explains the sample at all.
    pub fn reconstruction_error(&self, sample: &DVector<f64>) -> f64 {
        let coordinates = self.project(sample);
        (sample - self.reconstruct(&coordinates)).norm()
    }
}

// ── Training ─────────────────────────────────────────────────────────────

/// Smallest prefix of the descending spectrum whose cumulative normalized
/// sum reaches `energy`; the first index to reach it wins ties. Returns 1
/// when the spectrum carries no mass at all.
fn select_rank(ordered: &[f64], energy: f64, max_rank: usize) -> usize {
    let total: f64 = ordered.iter().sum();
    if !(total > 1e-12) {
        return 1;
    }
    let mut cumulative = 0.0;
    for (i, sv) in ordered.iter().enumerate() {
        cumulative += sv;
        if cumulative / total >= energy {
            return (i + 1).min(max_rank);
        }
    }
    max_rank
}

/// Train a subspace from uniform-dimension samples.
///
/// Centers the samples, runs a thin SVD keeping left singular vectors only,
/// and retains the smallest rank whose cumulative normalized singular-value
/// sum reaches `energy`.
///
/// Errors on `energy` outside `(0, 1]`, fewer than 2 samples, zero-dimension
/// samples, or inconsistent sample dimensions. `energy = 1.0` selects the
/// maximal attainable rank.
pub fn train(samples: &[DVector<f64>], energy: f64) -> Result<Subspace, TrainError> {
    if !(energy > 0.0 && energy <= 1.0) {
        return Err(TrainError::EnergyOutOfRange { got: energy });
    }
    let n = samples.len();
    if n < 2 {
        return Err(TrainError::TooFewSamples { needed: 2, got: n });
    }
    let dim = samples[0].len();
    if dim == 0 {
        return Err(TrainError::ZeroDimension);
    }
    for (index, sample) in samples.iter().enumerate() {
        if sample.len() != dim {
            return Err(TrainError::DimensionMismatch {
                expected: dim,
                got: sample.len(),
                index,
            });
        }
    }

    let matrix = DMatrix::from_columns(samples);
    let mean = matrix.column_mean();

    let mut centered = matrix;
    for mut column in centered.column_iter_mut() {
        column -= &mean;
    }

    let svd = centered
        .try_svd(true, false, f64::EPSILON, 0)
        .ok_or_else(|| {
            TrainError::NumericalFailure("singular value decomposition did not converge".into())
        })?;
    let u = svd
        .u
        .ok_or_else(|| TrainError::NumericalFailure("left singular vectors unavailable".into()))?;
    let sv = svd.singular_values;

    // Descending spectrum order; centering caps the usable rank at n - 1.
    let mut order: Vec<usize> = (0..sv.len()).collect();
    order.sort_by(|&a, &b| sv[b].total_cmp(&sv[a]));
    let ordered: Vec<f64> = order.iter().map(|&i| sv[i]).collect();
    let max_rank = sv.len().min(n - 1).max(1);

    let rank = select_rank(&ordered, energy, max_rank);

    let mut basis = DMatrix::zeros(dim, rank);
    for (j, &idx) in order.iter().take(rank).enumerate() {
        basis.set_column(j, &u.column(idx));
    }

    Ok(Subspace {
        mean,
        basis,
        singular_values: DVector::from_vec(ordered),
    })
}

// ── Tests ────────────────────────────────────────────────────────────────
