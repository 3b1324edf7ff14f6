//! Seeded synthetic galleries shared across unit tests.

use nalgebra::DVector;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::dataset::{Dataset, Sample};

/// Smooth per-class prototype in `[0.1, 0.9]`, distinct across classes.
pub(crate) fn class_prototype(class: usize, dim: usize) -> DVector<f64> {
    DVector::from_fn(dim, |i, _| {
        let x = i as f64 / dim as f64;
        let phase = (class + 1) as f64 * std::f64::consts::PI * x;
        0.5 + 0.4 * phase.sin()
    })
}

/// Noisy samples around per-class prototypes, one label per sample.
pub(crate) fn make_gallery(
    n_classes: usize,
    per_class: usize,
    dim: usize,
    noise: f64,
    seed: u64,
) -> (Vec<DVector<f64>>, Vec<usize>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut vectors = Vec::with_capacity(n_classes * per_class);
    let mut labels = Vec::with_capacity(n_classes * per_class);
    for class in 0..n_classes {
        let prototype = class_prototype(class, dim);
        for _ in 0..per_class {
            let sample = if noise > 0.0 {
                &prototype + DVector::from_fn(dim, |_, _| rng.gen_range(-noise..noise))
            } else {
                prototype.clone()
            };
            vectors.push(sample);
            labels.push(class);
        }
    }
    (vectors, labels)
}

/// In-memory dataset with named classes, built from [`make_gallery`].
pub(crate) fn make_dataset(
    n_classes: usize,
    per_class: usize,
    dim: usize,
    noise: f64,
    seed: u64,
) -> Dataset {
    let (vectors, labels) = make_gallery(n_classes, per_class, dim, noise, seed);
    let samples = vectors
        .into_iter()
        .zip(labels)
        .map(|(vector, class)| Sample { vector, class })
        .collect();
    Dataset {
        classes: (0..n_classes).map(|c| format!("person_{:02}", c)).collect(),
        dim,
        samples,
    }
}
