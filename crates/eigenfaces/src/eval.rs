//! Aggregate scoring of open-set predictions.
//!
//! `Unknown` is a first-class answer throughout: it counts as a miss when
//! the truth names an identity, as a hit when the truth itself is `Unknown`
//! (an impostor query), and as one more label in the macro-F1 average.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::classify::Prediction;

/// Aggregate quality of a prediction batch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    /// Share of exact truth/prediction matches.
    pub accuracy: f64,
    /// Unweighted mean F1 over every label seen in truth or predictions.
    pub macro_f1: f64,
    pub n_queries: usize,
    /// Number of `Unknown` predictions.
    pub n_unknown: usize,
}

#[derive(Debug, Clone, Copy, Default)]
struct Tally {
    true_pos: usize,
    false_pos: usize,
    false_neg: usize,
}

impl Tally {
    /// Zero-division-safe F1: a label with empty precision or recall
    /// denominators scores 0.
    fn f1(self) -> f64 {
        let predicted = self.true_pos + self.false_pos;
        let actual = self.true_pos + self.false_neg;
        let precision = if predicted > 0 {
            self.true_pos as f64 / predicted as f64
        } else {
            0.0
        };
        let recall = if actual > 0 {
            self.true_pos as f64 / actual as f64
        } else {
            0.0
        };
        if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        }
    }
}

/// Score `predictions` against `truth`, pairwise.
///
/// Both slices must have the same length. Empty input yields all-zero
/// scores.
pub fn evaluate(truth: &[Prediction], predictions: &[Prediction]) -> Evaluation {
    debug_assert_eq!(truth.len(), predictions.len());

    let n_queries = truth.len().min(predictions.len());
    if n_queries == 0 {
        return Evaluation {
            accuracy: 0.0,
            macro_f1: 0.0,
            n_queries: 0,
            n_unknown: 0,
        };
    }

    // Keyed in label order so the macro-F1 sum is reproducible bit-for-bit.
    let mut tallies: BTreeMap<Prediction, Tally> = BTreeMap::new();
    let mut n_correct = 0usize;
    let mut n_unknown = 0usize;
    for (&t, &p) in truth.iter().zip(predictions) {
        if p == Prediction::Unknown {
            n_unknown += 1;
        }
        if t == p {
            n_correct += 1;
            tallies.entry(t).or_default().true_pos += 1;
        } else {
            tallies.entry(p).or_default().false_pos += 1;
            tallies.entry(t).or_default().false_neg += 1;
        }
    }

    let f1_sum: f64 = tallies.values().map(|t| t.f1()).sum();
    Evaluation {
        accuracy: n_correct as f64 / n_queries as f64,
        macro_f1: f1_sum / tallies.len() as f64,
        n_queries,
        n_unknown,
    }
}

// ── Tests ────────────────────────────────────────────────────────────────
