//! Factorization and application benchmarks
//!
//! Usage:
//!   cargo bench --bench factor

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

use ilur::prelude::*;
use ilur::config::LevelCriterion;

fn banded(n: usize, half_band: usize) -> CsrMatrix {
    let mut trip = Vec::new();
    for i in 0..n {
        trip.push((i, i, 2.0 * half_band as f64 + 1.0));
        for off in 1..=half_band {
            if i + off < n {
                let v = -1.0 / off as f64;
                trip.push((i, i + off, v));
                trip.push((i + off, i, v));
            }
        }
    }
    CsrMatrix::from_triplets(n, n, &trip).unwrap()
}

fn keep_all() -> IluConfig {
    let mut cfg = IluConfig::default();
    cfg.threshold = 1000.0;
    cfg.level_criterion = LevelCriterion::Disabled;
    cfg
}

fn bench_compute(c: &mut Criterion) {
    let mut group = c.benchmark_group("compute");
    for &n in &[100usize, 400] {
        let a = banded(n, 3);
        group.bench_with_input(BenchmarkId::new("keep_all", n), &a, |b, a| {
            b.iter(|| MultilevelIlu::compute(black_box(a), keep_all()).unwrap())
        });
        let mut dropped = keep_all();
        dropped.threshold = 2.0;
        group.bench_with_input(BenchmarkId::new("dropped", n), &a, |b, a| {
            b.iter(|| MultilevelIlu::compute(black_box(a), dropped.clone()).unwrap())
        });
    }
    group.finish();
}

fn bench_apply(c: &mut Criterion) {
    let n = 400;
    let a = banded(n, 3);
    let m = MultilevelIlu::compute(&a, keep_all()).unwrap();
    let v: Vec<f64> = (0..n).map(|i| (i as f64 * 0.1).sin()).collect();
    c.bench_function("apply_400", |b| {
        b.iter(|| m.apply(black_box(&v)).unwrap())
    });
}

criterion_group!(benches, bench_compute, bench_apply);
criterion_main!(benches);
