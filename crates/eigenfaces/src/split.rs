//! Seeded stratified train/test splitting.
//!
//! Every class is split independently at the same fraction, so the test
//! side sees each surviving identity. All randomness comes from the
//! configured seed; equal seeds on equal data give equal splits.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::dataset::Dataset;

// ── Configuration ────────────────────────────────────────────────────────

/// Configuration for the stratified split.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitConfig {
    /// Per-class fraction routed to the test side, strictly inside (0, 1).
    /// Default: [`SplitConfig::DEFAULT_TEST_FRACTION`].
    #[serde(default = "SplitConfig::default_test_fraction")]
    pub test_fraction: f64,
    /// Shuffle seed.
    /// Default: [`SplitConfig::DEFAULT_SEED`].
    #[serde(default = "SplitConfig::default_seed")]
    pub seed: u64,
}

impl SplitConfig {
    pub const DEFAULT_TEST_FRACTION: f64 = 0.25;
    pub const DEFAULT_SEED: u64 = 0;

    fn default_test_fraction() -> f64 {
        Self::DEFAULT_TEST_FRACTION
    }

    fn default_seed() -> u64 {
        Self::DEFAULT_SEED
    }
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            test_fraction: Self::DEFAULT_TEST_FRACTION,
            seed: Self::DEFAULT_SEED,
        }
    }
}

// ── Split types ──────────────────────────────────────────────────────────

/// Sample indices split into two sides, each sorted ascending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Split {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SplitError {
    /// `test_fraction` must lie strictly inside (0, 1).
    FractionOutOfRange { got: f64 },
    EmptyDataset,
}

impl std::fmt::Display for SplitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FractionOutOfRange { got } => {
                write!(f, "test fraction must be in (0, 1), got {}", got)
            }
            Self::EmptyDataset => f.write_str("cannot split an empty dataset"),
        }
    }
}

impl std::error::Error for SplitError {}

// ── Splitting ────────────────────────────────────────────────────────────

/// Split every class independently at `config.test_fraction`.
///
/// A class with two or more samples keeps at least one on each side; a
/// single-sample class stays entirely in train.
pub fn stratified_split(dataset: &Dataset, config: &SplitConfig) -> Result<Split, SplitError> {
    if !(config.test_fraction > 0.0 && config.test_fraction < 1.0) {
        return Err(SplitError::FractionOutOfRange {
            got: config.test_fraction,
        });
    }
    if dataset.samples.is_empty() {
        return Err(SplitError::EmptyDataset);
    }

    let max_class = dataset.samples.iter().map(|s| s.class).max().unwrap_or(0);
    let mut by_class: Vec<Vec<usize>> = vec![Vec::new(); dataset.classes.len().max(max_class + 1)];
    for (i, sample) in dataset.samples.iter().enumerate() {
        by_class[sample.class].push(i);
    }

    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut train = Vec::new();
    let mut test = Vec::new();
    for mut indices in by_class {
        if indices.is_empty() {
            continue;
        }
        indices.shuffle(&mut rng);
        let n = indices.len();
        if n < 2 {
            train.extend_from_slice(&indices);
            continue;
        }
        let n_test = (((n as f64) * config.test_fraction).round() as usize).clamp(1, n - 1);
        test.extend_from_slice(&indices[..n_test]);
        train.extend_from_slice(&indices[n_test..]);
    }

    train.sort_unstable();
    test.sort_unstable();
    Ok(Split { train, test })
}

// ── Tests ────────────────────────────────────────────────────────────────
