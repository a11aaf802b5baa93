//! Benchmarks for asset add/get throughput

use asset_pack::{PackageBuilder, PackageStore};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use tempfile::TempDir;

fn asset_data(size: usize) -> Vec<u8> {
    // Mildly compressible, like typical game assets
    (0..size).map(|i| ((i / 7) ^ (i % 13)) as u8).collect()
}

fn benchmark_add(c: &mut Criterion) {
    let mut group = c.benchmark_group("package_add");

    for size in [1024, 64 * 1024, 1024 * 1024].iter() {
        let data = asset_data(*size);
        group.throughput(Throughput::Bytes(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            let dir = TempDir::new().unwrap();
            let store = PackageStore::create(dir.path().join("bench-add")).unwrap();
            let mut i = 0u64;
            b.iter(|| {
                store
                    .add_asset_from_memory(black_box(&data), &format!("asset{}", i), 0)
                    .unwrap();
                i += 1;
            });
        });
    }

    group.finish();
}

fn benchmark_get(c: &mut Criterion) {
    let mut group = c.benchmark_group("package_get");

    for size in [1024, 64 * 1024, 1024 * 1024].iter() {
        let dir = TempDir::new().unwrap();
        let store = PackageStore::create(dir.path().join("bench-get")).unwrap();
        store
            .add_asset_from_memory(&asset_data(*size), "asset", 0)
            .unwrap();

        group.throughput(Throughput::Bytes(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| black_box(store.get_asset_to_memory("asset").unwrap()));
        });
    }

    group.finish();
}

fn benchmark_compression_levels(c: &mut Criterion) {
    let mut group = c.benchmark_group("package_add_level");
    let data = asset_data(256 * 1024);

    for level in [1u32, 6, 9].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(level), level, |b, &level| {
            let dir = TempDir::new().unwrap();
            let store = PackageBuilder::new()
                .path(dir.path().join("bench-level"))
                .compression_level(level)
                .create()
                .unwrap();
            let mut i = 0u64;
            b.iter(|| {
                store
                    .add_asset_from_memory(black_box(&data), &format!("asset{}", i), 0)
                    .unwrap();
                i += 1;
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    benchmark_add,
    benchmark_get,
    benchmark_compression_levels
);
criterion_main!(benches);
