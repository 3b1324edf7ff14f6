use criterion::{black_box, criterion_group, criterion_main, Criterion};
use nalgebra::{DMatrix, DVector};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use eigenfaces::{Classifier, ClassifyConfig, Metric};

fn make_vectors(
    n_classes: usize,
    per_class: usize,
    dim: usize,
    seed: u64,
) -> (Vec<DVector<f64>>, Vec<usize>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut vectors = Vec::with_capacity(n_classes * per_class);
    let mut labels = Vec::with_capacity(n_classes * per_class);
    for class in 0..n_classes {
        let prototype = DVector::from_fn(dim, |i, _| {
            let x = i as f64 / dim as f64;
            0.5 + 0.4 * ((class + 1) as f64 * std::f64::consts::PI * x).sin()
        });
        for _ in 0..per_class {
            vectors.push(&prototype + DVector::from_fn(dim, |_, _| rng.gen_range(-0.05..0.05)));
            labels.push(class);
        }
    }
    (vectors, labels)
}

fn bench_train(c: &mut Criterion) {
    let (vectors, _) = make_vectors(5, 8, 1024, 7);
    c.bench_function("train_1024d_40n", |b| {
        b.iter(|| {
            let subspace = eigenfaces::train(black_box(&vectors), black_box(0.95))
                .expect("deterministic fixture should always train");
            black_box(subspace.rank())
        })
    });
}

fn bench_scores(c: &mut Criterion) {
    let k = 32usize;
    let n = 400usize;
    let mut rng = StdRng::seed_from_u64(11);
    let projections = DMatrix::from_fn(k, n, |_, _| rng.gen_range(-1.0..1.0));
    let query = DVector::from_fn(k, |_, _| rng.gen_range(-1.0..1.0));

    for metric in [Metric::L2, Metric::L1, Metric::Cosine] {
        c.bench_function(&format!("scores_{}_32k_400n", metric), |b| {
            b.iter(|| black_box(metric.scores(black_box(&projections), black_box(&query))))
        });
    }
}

fn bench_classify(c: &mut Criterion) {
    let (vectors, labels) = make_vectors(5, 8, 1024, 21);
    let classifier = Classifier::fit(&vectors, &labels, 0.95, ClassifyConfig::default())
        .expect("deterministic fixture should always fit");
    let mut rng = StdRng::seed_from_u64(33);
    let query = DVector::from_fn(1024, |_, _| rng.gen_range(0.0..1.0));

    c.bench_function("classify_1024d_40n", |b| {
        b.iter(|| {
            let decision = classifier
                .classify(black_box(&query))
                .expect("dimensions match by construction");
            black_box(decision.prediction)
        })
    });
}

criterion_group!(hotpaths, bench_train, bench_scores, bench_classify);
criterion_main!(hotpaths);
