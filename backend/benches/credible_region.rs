use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::hint::black_box;

use gw_followup::services::{compute_threshold, fit_cone, CredibleRegion};
use gw_followup::skymap::{Ordering, ProbabilityMap};

/// Peaked map: probability falls off with nested index, like a compact localization.
fn synthetic_map(nside: u32) -> ProbabilityMap {
    let npix = 12 * (nside as usize) * (nside as usize);
    let raw: Vec<f64> = (0..npix).map(|i| (-(i as f64) / (npix as f64 / 50.0)).exp()).collect();
    let total: f64 = raw.iter().sum();
    let values = raw.into_iter().map(|v| v / total).collect();
    ProbabilityMap::new(values, Ordering::Nested).unwrap()
}

fn bench_threshold(c: &mut Criterion) {
    let mut group = c.benchmark_group("credible_threshold");

    for nside in [64u32, 256, 512] {
        let map = synthetic_map(nside);
        group.bench_with_input(BenchmarkId::new("mass_0.9", nside), &map, |b, map| {
            b.iter(|| compute_threshold(black_box(map), black_box(0.9)));
        });
    }

    group.finish();
}

fn bench_region_and_cone(c: &mut Criterion) {
    let mut group = c.benchmark_group("region_and_cone");

    let map = synthetic_map(256);
    group.bench_function("from_map", |b| {
        b.iter(|| CredibleRegion::from_map(black_box(&map), 0.9));
    });

    let region = CredibleRegion::from_map(&map, 0.9).unwrap();
    group.bench_function("fit_cone", |b| {
        b.iter(|| fit_cone(black_box(&region.indices), &map));
    });

    group.finish();
}

criterion_group!(benches, bench_threshold, bench_region_and_cone);
criterion_main!(benches);
