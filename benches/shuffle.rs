//! Criterion benchmarks for the SIMD byte-shuffle filter.
//!
//! Run with:
//!   cargo bench --bench shuffle

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use qs2::shuffle::{shuffle, unshuffle};

fn synthetic_doubles(n: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(n * 8);
    for i in 0..n {
        out.extend_from_slice(&(i as f64).to_bits().to_le_bytes());
    }
    out
}

fn bench_shuffle_unshuffle(c: &mut Criterion) {
    let mut group = c.benchmark_group("shuffle_unshuffle");

    for &n in &[8_192usize, 131_072, 1_048_576] {
        let src = synthetic_doubles(n);
        let mut shuffled = vec![0u8; src.len()];
        let mut restored = vec![0u8; src.len()];

        group.throughput(Throughput::Bytes(src.len() as u64));
        group.bench_with_input(BenchmarkId::new("shuffle", src.len()), &src, |b, src| {
            b.iter(|| shuffle(&mut shuffled, src, 8))
        });

        shuffle(&mut shuffled, &src, 8);
        group.bench_with_input(
            BenchmarkId::new("unshuffle", src.len()),
            &shuffled,
            |b, shuffled| b.iter(|| unshuffle(&mut restored, shuffled, 8)),
        );
    }

    group.finish();
}

criterion_group!(benches, bench_shuffle_unshuffle);
criterion_main!(benches);
