#![allow(clippy::cast_possible_truncation)] // Vector counts are tiny

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use tlsoracle_core::fingerprint::{
    Alert, AlertDescription, MessageType, compare_all, compare_maps,
};
use tlsoracle_core::{ResponseFingerprint, ResponseMap, VectorId};

fn uniform_map(vectors: usize) -> ResponseMap {
    let fp = ResponseFingerprint::new(false)
        .with_alert(Alert::fatal(AlertDescription::BadRecordMac))
        .with_messages([MessageType::Alert])
        .with_timing(1);
    ResponseMap::from_pairs((0..vectors).map(|i| (VectorId(i as u32), Some(fp.clone()))))
}

fn bench_compare_all(c: &mut Criterion) {
    let mut group = c.benchmark_group("compare_all");
    // Uniform maps are the worst case: every pair is visited.
    for vectors in [4, 16, 64, 256] {
        let map = uniform_map(vectors);
        group.bench_with_input(BenchmarkId::from_parameter(vectors), &map, |b, map| {
            b.iter(|| compare_all(black_box(map)));
        });
    }
    group.finish();
}

fn bench_compare_maps(c: &mut Criterion) {
    let mut group = c.benchmark_group("compare_maps");
    for vectors in [16, 256] {
        let reference = uniform_map(vectors);
        let candidate = uniform_map(vectors);
        group.bench_with_input(
            BenchmarkId::from_parameter(vectors),
            &(reference, candidate),
            |b, (reference, candidate)| {
                b.iter(|| compare_maps(black_box(reference), black_box(candidate)));
            },
        );
    }
    group.finish();
}

criterion_group!(benches, bench_compare_all, bench_compare_maps);
criterion_main!(benches);
