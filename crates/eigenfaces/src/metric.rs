//! Neighbor dissimilarity metrics over subspace coordinates.
//!
//! All scoring happens in projected coordinates only; the ambient image
//! space is never consulted here. Lower scores always mean closer, including
//! for the cosine metric, which is expressed as the dissimilarity
//! `1 - cos(angle)` in `[0, 2]`.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

// ── Error type ───────────────────────────────────────────────────────────

/// A metric name outside the recognized set. No default is substituted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidMetricError {
    pub name: String,
}

impl std::fmt::Display for InvalidMetricError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "unknown distance metric {:?} (expected one of: l2, cosine, l1)",
            self.name
        )
    }
}

impl std::error::Error for InvalidMetricError {}

// ── Metric ───────────────────────────────────────────────────────────────

/// Dissimilarity metric for nearest-neighbor search in the subspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    /// Euclidean distance.
    L2,
    /// Sum of absolute coordinate differences.
    L1,
    /// `1 - cos(angle)` between the vectors; a zero-norm operand scores 1.
    Cosine,
}

impl Metric {
    /// Stable lowercase name, matching the parseable set.
    pub const fn name(self) -> &'static str {
        match self {
            Self::L2 => "l2",
            Self::L1 => "l1",
            Self::Cosine => "cosine",
        }
    }

    /// Dissimilarity between the query coordinates and every column of
    /// `projections` (one gallery projection per column).
    ///
    /// `query` must have length `projections.nrows()`.
    pub fn scores(self, projections: &DMatrix<f64>, query: &DVector<f64>) -> Vec<f64> {
        let n = projections.ncols();
        let k = projections.nrows();
        let mut out = Vec::with_capacity(n);
        match self {
            Self::L2 => {
                for j in 0..n {
                    let mut acc = 0.0;
                    for i in 0..k {
                        let d = projections[(i, j)] - query[i];
                        acc += d * d;
                    }
                    out.push(acc.sqrt());
                }
            }
            Self::L1 => {
                for j in 0..n {
                    let mut acc = 0.0;
                    for i in 0..k {
                        acc += (projections[(i, j)] - query[i]).abs();
                    }
                    out.push(acc);
                }
            }
            Self::Cosine => {
                let query_norm = query.norm();
                for j in 0..n {
                    let mut dot = 0.0;
                    let mut sq = 0.0;
                    for i in 0..k {
                        let c = projections[(i, j)];
                        dot += c * query[i];
                        sq += c * c;
                    }
                    let denom = query_norm * sq.sqrt();
                    out.push(if denom > 0.0 { 1.0 - dot / denom } else { 1.0 });
                }
            }
        }
        out
    }

    /// Confidence gate for the best (lowest) score.
    ///
    /// For `L2`/`L1` the threshold is a distance ceiling; for `Cosine` it is
    /// a floor on the similarity `1 - score`.
    pub fn accepts(self, best_score: f64, threshold: f64) -> bool {
        match self {
            Self::L2 | Self::L1 => best_score <= threshold,
            Self::Cosine => 1.0 - best_score >= threshold,
        }
    }
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for Metric {
    type Err = InvalidMetricError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "l2" => Ok(Self::L2),
            "l1" => Ok(Self::L1),
            "cosine" => Ok(Self::Cosine),
            _ => Err(InvalidMetricError { name: s.to_owned() }),
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn two_column_gallery() -> DMatrix<f64> {
        // Column 0: (1, 0), column 1: (0, 2).
        DMatrix::from_column_slice(2, 2, &[1.0, 0.0, 0.0, 2.0])
    }

    #[test]
    fn l2_scores_are_euclidean() {
        let gallery = two_column_gallery();
        let query = DVector::from_column_slice(&[1.0, 0.0]);
        let scores = Metric::L2.scores(&gallery, &query);
        assert_abs_diff_eq!(scores[0], 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(scores[1], 5.0f64.sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn l1_scores_sum_absolute_differences() {
        let gallery = two_column_gallery();
        let query = DVector::from_column_slice(&[-1.0, 1.0]);
        let scores = Metric::L1.scores(&gallery, &query);
        assert_abs_diff_eq!(scores[0], 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(scores[1], 2.0, epsilon = 1e-12);
    }

    #[test]
    fn cosine_scores_span_the_dissimilarity_range() {
        let gallery = DMatrix::from_column_slice(2, 3, &[1.0, 0.0, 0.0, 3.0, -2.0, 0.0]);
        let query = DVector::from_column_slice(&[1.0, 0.0]);
        let scores = Metric::Cosine.scores(&gallery, &query);
        // Aligned, orthogonal, opposite.
        assert_abs_diff_eq!(scores[0], 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(scores[1], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(scores[2], 2.0, epsilon = 1e-12);
    }

    #[test]
    fn cosine_zero_norm_operand_scores_one() {
        let gallery = DMatrix::from_column_slice(2, 2, &[0.0, 0.0, 1.0, 1.0]);
        let query = DVector::from_column_slice(&[1.0, 0.0]);
        let scores = Metric::Cosine.scores(&gallery, &query);
        assert_abs_diff_eq!(scores[0], 1.0, epsilon = 1e-12);

        let zero_query = DVector::from_column_slice(&[0.0, 0.0]);
        let scores = Metric::Cosine.scores(&gallery, &zero_query);
        assert_abs_diff_eq!(scores[1], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn accepts_is_a_ceiling_for_distances_and_a_floor_for_similarity() {
        assert!(Metric::L2.accepts(0.4, 0.5));
        assert!(!Metric::L2.accepts(0.6, 0.5));
        assert!(Metric::L1.accepts(0.5, 0.5));

        // Cosine score 0.1 means similarity 0.9.
        assert!(Metric::Cosine.accepts(0.1, 0.85));
        assert!(!Metric::Cosine.accepts(0.1, 0.95));
    }

    #[test]
    fn parses_the_recognized_names_only() {
        assert_eq!("l2".parse::<Metric>(), Ok(Metric::L2));
        assert_eq!("L1".parse::<Metric>(), Ok(Metric::L1));
        assert_eq!(" cosine ".parse::<Metric>(), Ok(Metric::Cosine));

        let err = "chebyshev".parse::<Metric>().unwrap_err();
        assert_eq!(err.name, "chebyshev");
        let err = "".parse::<Metric>().unwrap_err();
        assert_eq!(err.name, "");
    }

    #[test]
    fn metric_serialization_is_stable() {
        assert_eq!(Metric::L2.to_string(), "l2");
        assert_eq!(
            serde_json::to_string(&Metric::Cosine).expect("serialize metric"),
            "\"cosine\""
        );
        let back: Metric = serde_json::from_str("\"l1\"").expect("deserialize metric");
        assert_eq!(back, Metric::L1);
    }
}
