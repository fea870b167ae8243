//! End-to-end tests of the multilevel preconditioner

use approx::assert_relative_eq;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use ilur::config::{LevelCriterion, Preset};
use ilur::factor::{DroppingMode, PrecondSide};
use ilur::sparse::CsrMatrix;
use ilur::{Error, IluConfig, MultilevelIlu};

fn laplacian_1d(n: usize) -> CsrMatrix {
    let mut trip = Vec::new();
    for i in 0..n {
        trip.push((i, i, 2.0));
        if i > 0 {
            trip.push((i, i - 1, -1.0));
        }
        if i + 1 < n {
            trip.push((i, i + 1, -1.0));
        }
    }
    CsrMatrix::from_triplets(n, n, &trip).unwrap()
}

fn random_spd_band(n: usize, seed: u64) -> CsrMatrix {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut trip = Vec::new();
    for i in 0..n {
        // diagonally dominant band keeps every pivot comfortably nonzero
        trip.push((i, i, 8.0 + rng.gen::<f64>()));
        for off in 1..=3usize {
            if i + off < n {
                let v = rng.gen::<f64>() - 0.5;
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

#[test]
fn exact_inverse_without_dropping() {
    let n = 60;
    let a = random_spd_band(n, 7);
    let m = MultilevelIlu::compute(&a, keep_all()).unwrap();

    let mut rng = StdRng::seed_from_u64(11);
    let x: Vec<f64> = (0..n).map(|_| rng.gen::<f64>() * 2.0 - 1.0).collect();
    let b = a.matvec(&x).unwrap();
    let got = m.apply(&b).unwrap();
    for (g, e) in got.iter().zip(&x) {
        assert_relative_eq!(g, e, max_relative = 1e-9);
    }
}

#[test]
fn exact_inverse_across_many_levels() {
    // a tiny density factor with a low elimination gate splits the
    // factorization into many levels; with no dropping the stacked
    // forward/backward sweeps must still invert the matrix exactly
    let n = 40;
    let a = laplacian_1d(n);
    let mut cfg = keep_all();
    cfg.level_criterion = LevelCriterion::Density { factor: 1e-9 };
    cfg.min_elim_factor = 0.1;
    let m = MultilevelIlu::compute(&a, cfg).unwrap();
    assert!(m.levels() >= 2, "expected a multilevel split, got {}", m.levels());

    let mut rng = StdRng::seed_from_u64(29);
    let x: Vec<f64> = (0..n).map(|_| rng.gen::<f64>() * 2.0 - 1.0).collect();
    let b = a.matvec(&x).unwrap();
    let got = m.apply(&b).unwrap();
    for (g, e) in got.iter().zip(&x) {
        assert_relative_eq!(g, e, max_relative = 1e-8, epsilon = 1e-10);
    }
}

#[test]
fn split_form_composes_to_full_application() {
    let a = laplacian_1d(30);
    let m = MultilevelIlu::compute(&a, IluConfig::default()).unwrap();
    let v: Vec<f64> = (0..30).map(|i| (i as f64 * 0.3).sin()).collect();
    let left = m.apply_split(PrecondSide::Left, &v).unwrap();
    let composed = m.apply_split(PrecondSide::Right, &left).unwrap();
    assert_eq!(composed, m.apply(&v).unwrap());
}

#[test]
fn factorization_is_deterministic() {
    let a = random_spd_band(40, 3);
    let cfg = IluConfig::default();
    let m1 = MultilevelIlu::compute(&a, cfg.clone()).unwrap();
    let m2 = MultilevelIlu::compute(&a, cfg).unwrap();
    assert_eq!(m1.nnz(), m2.nnz());
    assert_eq!(m1.levels(), m2.levels());
    let v: Vec<f64> = (0..40).map(|i| 1.0 / (1.0 + i as f64)).collect();
    assert_eq!(m1.apply(&v).unwrap(), m2.apply(&v).unwrap());
}

#[test]
fn magnitude_dropping_with_zero_threshold_keeps_everything() {
    // tau = 0 makes the magnitude filter a no-op
    let a = random_spd_band(25, 19);
    let mut dropped = keep_all();
    dropped.dropping = DroppingMode::StandardAbs;
    dropped.threshold = 0.0;
    let m_dropped = MultilevelIlu::compute(&a, dropped).unwrap();
    let m_plain = MultilevelIlu::compute(&a, keep_all()).unwrap();
    assert_eq!(m_dropped.nnz(), m_plain.nnz());
}

#[test]
fn tighter_threshold_stores_fewer_entries() {
    let a = random_spd_band(50, 23);
    let mut loose = keep_all();
    loose.threshold = 8.0;
    let mut tight = keep_all();
    tight.threshold = 1.0;
    let m_loose = MultilevelIlu::compute(&a, loose).unwrap();
    let m_tight = MultilevelIlu::compute(&a, tight).unwrap();
    assert!(m_tight.nnz() <= m_loose.nnz());
    // dropped factors still apply to finite output
    let out = m_tight.apply(&vec![1.0; 50]).unwrap();
    assert!(out.iter().all(|x| x.is_finite()));
}

#[test]
fn preset_catalog_configs_factor_cleanly() {
    let a = laplacian_1d(24);
    for code in [0, 1, 2, 3, 10, 11, 30, 100, 1000, 1011] {
        let cfg = IluConfig::from_code(code)
            .unwrap_or_else(|e| panic!("code {code} rejected: {e}"));
        let m = MultilevelIlu::compute(&a, cfg)
            .unwrap_or_else(|e| panic!("code {code} failed: {e}"));
        assert!(m.levels() >= 1, "code {code} produced no levels");
        let out = m.apply(&vec![1.0; 24]).unwrap();
        assert!(out.iter().all(|x| x.is_finite()), "code {code} output");
    }
}

#[test]
fn unknown_preset_codes_are_rejected() {
    for code in [-1, 4, 9, 74, 105, 2000] {
        assert!(
            matches!(Preset::from_code(code), Err(Error::UnknownPreset { .. })),
            "code {code} should be rejected"
        );
    }
}

#[test]
fn inconsistent_level_limits_fail_fast() {
    let mut cfg = IluConfig::default();
    cfg.max_levels = 50;
    cfg.memory_max_levels = 10;
    let a = laplacian_1d(5);
    let err = MultilevelIlu::compute(&a, cfg).unwrap_err();
    assert!(matches!(err, Error::Config { param: "max_levels", .. }));
}

#[test]
fn single_level_preset_completes_in_one_level() {
    let a = random_spd_band(20, 5);
    let cfg = IluConfig::from_code(100).unwrap();
    let m = MultilevelIlu::compute(&a, cfg).unwrap();
    assert_eq!(m.levels(), 1);
    assert_eq!(m.metrics().per_level[0].eliminated, 20);
}

#[test]
fn metrics_report_fill_and_levels() {
    let a = laplacian_1d(16);
    let m = MultilevelIlu::compute(&a, keep_all()).unwrap();
    let metrics = m.metrics();
    assert_eq!(metrics.n, 16);
    assert_eq!(metrics.original_nnz, a.nnz());
    assert!(metrics.fill_ratio > 0.0);
    assert_eq!(metrics.levels, m.levels());
    let shown = format!("{metrics}");
    assert!(shown.contains("level"));
}
