//! 원장/병합 벤치마크
//!
//! 추출 결과 반영, 다중 레이어 병합, SPDX 생성, 파일 유니버스 수집 성능을 측정합니다.

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use strata_layer_scanner::canonical::canonicalize;
use strata_layer_scanner::report::spdx;
use strata_layer_scanner::{
    Ecosystem, Extraction, FileSet, LayeredInventory, Ledger, PackageIdentity,
};

fn universe(size: usize) -> FileSet {
    (0..size).map(|i| format!("usr/lib/pkg{}/file{i}", i % 100)).collect()
}

/// 100개 패키지가 유니버스를 나눠 가지는 추출 결과
fn extraction(universe: &FileSet) -> Extraction {
    let mut extraction = Extraction::new();
    for (i, path) in universe.iter().enumerate() {
        let identity = PackageIdentity::new(
            format!("pkg{}", i % 100),
            Some("1.0.0".to_owned()),
            Ecosystem::Debian,
        );
        extraction.add(identity, [path.as_str()]);
    }
    extraction
}

fn scanned_ledger(size: usize) -> Ledger {
    let files = universe(size);
    let mut ledger = Ledger::new(files.clone());
    ledger.claim_all("bench", &files, extraction(&files), false);
    ledger
}

fn bench_claim_all(c: &mut Criterion) {
    let mut group = c.benchmark_group("claim_all");

    for size in [1_000, 10_000, 50_000] {
        let files = universe(size);
        let result = extraction(&files);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| {
                let mut ledger = Ledger::new(files.clone());
                ledger.claim_all("bench", &files, black_box(result.clone()), false)
            })
        });
    }

    group.finish();
}

fn bench_merge(c: &mut Criterion) {
    let mut group = c.benchmark_group("merge_layers");

    for layers in [2, 8, 16] {
        let ledgers: Vec<(String, Ledger)> = (0..layers)
            .map(|i| (format!("layer{i}"), scanned_ledger(5_000)))
            .collect();
        group.bench_with_input(BenchmarkId::from_parameter(layers), &layers, |b, _| {
            b.iter(|| LayeredInventory::merge(black_box(ledgers.clone())))
        });
    }

    group.finish();
}

fn bench_spdx(c: &mut Criterion) {
    let inventory = LayeredInventory::merge([
        ("base".to_owned(), scanned_ledger(5_000)),
        ("app".to_owned(), scanned_ledger(2_000)),
    ]);
    c.bench_function("spdx_generate_7k_files", |b| {
        b.iter(|| spdx::generate(black_box(&inventory), "bench:latest").unwrap())
    });
}

fn bench_canonicalize(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    for i in 0..2_000 {
        let sub = dir.path().join(format!("usr/share/doc/pkg{}", i % 50));
        std::fs::create_dir_all(&sub).unwrap();
        std::fs::write(sub.join(format!("file{i}")), "").unwrap();
    }
    c.bench_function("canonicalize_2k_files", |b| {
        b.iter(|| canonicalize(black_box(dir.path()), &[]).unwrap())
    });
}

criterion_group!(benches, bench_claim_all, bench_merge, bench_spdx, bench_canonicalize);
criterion_main!(benches);
