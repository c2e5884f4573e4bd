//! Criterion benchmarks for the block framer's save/load round trip.
//!
//! Run with:
//!   cargo bench --bench block

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use qs2::api::{load_qs, save_qs};
use qs2::io::{MemReader, MemWriter};
use qs2::options::Options;

/// Compressible synthetic data, repeated to fill exactly `size` bytes.
fn synthetic_data(size: usize) -> Vec<u8> {
    const LOREM: &[u8] = b"Lorem ipsum dolor sit amet, consectetur adipiscing elit, \
        sed do eiusmod tempor incididunt ut labore et dolore magna aliqua. \
        Ut enim ad minim veniam, quis nostrud exercitation ullamco laboris nisi \
        ut aliquip ex ea commodo consequat.";

    let mut out = Vec::with_capacity(size);
    while out.len() < size {
        let rem = size - out.len();
        let take = rem.min(LOREM.len());
        out.extend_from_slice(&LOREM[..take]);
    }
    out
}

fn bench_qs_save_load(c: &mut Criterion) {
    let mut group = c.benchmark_group("qs_save_load");

    for &size in &[65_536usize, 1_048_576, 4_194_304] {
        let data = synthetic_data(size);
        let options = Options::default();

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::new("save_qs", size), &data, |b, data| {
            b.iter(|| save_qs(MemWriter::new(), data, &options).unwrap())
        });

        let saved = save_qs(MemWriter::new(), &data, &options).unwrap().into_inner();
        group.bench_with_input(BenchmarkId::new("load_qs", size), &saved, |b, saved| {
            b.iter(|| load_qs(MemReader::new(saved.clone()), size, &options).unwrap())
        });
    }

    group.finish();
}

criterion_group!(benches, bench_qs_save_load);
criterion_main!(benches);
