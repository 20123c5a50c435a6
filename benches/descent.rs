//! Benchmarks for the descent core.
//!
//! Covers the two hot paths: raw metric kernels and the full build loop.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use descent::nnd::{build, BuildParams};
use descent::{Metric, NNGraph, PriorityKind};
use rand::prelude::*;

fn random_data(n: usize, dim: usize, seed: u64) -> Vec<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n * dim).map(|_| rng.gen::<f32>() * 2.0 - 1.0).collect()
}

/// A shifted-ring init graph with true distances.
fn ring_init(data: &[f32], dim: usize, k: usize, metric: Metric) -> NNGraph {
    let n = data.len() / dim;
    let mut idx = Vec::with_capacity(n * k);
    let mut dist = Vec::with_capacity(n * k);
    for i in 0..n {
        for slot in 0..k {
            let j = (i + (slot + 1) * 7) % n;
            idx.push(j);
            dist.push(metric.distance(&data[i * dim..(i + 1) * dim], &data[j * dim..(j + 1) * dim]));
        }
    }
    NNGraph::from_parts(idx, dist, n, k).unwrap()
}

fn bench_metrics(c: &mut Criterion) {
    let mut group = c.benchmark_group("metric");
    for dim in [32, 128, 512] {
        let a = random_data(1, dim, 1);
        let b = random_data(1, dim, 2);
        group.throughput(Throughput::Elements(dim as u64));
        for (name, metric) in [
            ("euclidean", Metric::Euclidean),
            ("l2", Metric::SquaredEuclidean),
            ("cosine", Metric::Cosine),
            ("manhattan", Metric::Manhattan),
        ] {
            group.bench_with_input(BenchmarkId::new(name, dim), &dim, |bencher, _| {
                bencher.iter(|| black_box(metric.distance(black_box(&a), black_box(&b))));
            });
        }
    }
    group.finish();
}

fn bench_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("nnd_build");
    group.sample_size(10);
    for n in [500usize, 2000] {
        let dim = 16;
        let k = 10;
        let data = random_data(n, dim, 42);
        let init = ring_init(&data, dim, k, Metric::SquaredEuclidean);
        for parallel in [false, true] {
            let label = if parallel { "parallel" } else { "serial" };
            let params = BuildParams {
                max_candidates: 10,
                n_iters: 5,
                priority: PriorityKind::RandomSample,
                parallel,
                ..BuildParams::default()
            };
            group.bench_with_input(BenchmarkId::new(label, n), &n, |bencher, _| {
                bencher.iter(|| {
                    build(
                        black_box(&data),
                        dim,
                        Metric::SquaredEuclidean,
                        black_box(&init),
                        &params,
                    )
                    .unwrap()
                });
            });
        }
    }
    group.finish();
}

criterion_group!(benches, bench_metrics, bench_build);
criterion_main!(benches);
