use criterion::{black_box, criterion_group, criterion_main, Criterion};
use presamples::{
    create_presamples_package, DokMatrix, ExchangeType, LcaMatrices, MatrixPresamples,
    PackageOptions, PackagesDataLoader, SampleArray, Seed,
};
use std::path::PathBuf;
use tempfile::TempDir;

const ELEMENTS: i64 = 1_000;
const SAMPLES: usize = 100;

fn technosphere_package(dir: &TempDir) -> PathBuf {
    let exchanges: Vec<(i64, i64, ExchangeType)> = (0..ELEMENTS)
        .map(|id| (id, (id + 1) % ELEMENTS, ExchangeType::Technosphere))
        .collect();
    let samples = SampleArray::new(
        exchanges.len(),
        SAMPLES,
        (0..exchanges.len() * SAMPLES).map(|v| v as f64).collect(),
    )
    .expect("sample array");
    let data = MatrixPresamples::technosphere(samples, &exchanges).expect("technosphere data");
    let options = PackageOptions::in_directory(dir.path()).with_seed(Seed::Fixed(42));
    create_presamples_package(&[data], &[], &options)
        .expect("package")
        .1
}

fn lca() -> LcaMatrices {
    let ids: presamples::IdMapping = (0..ELEMENTS).map(|id| (id, id)).collect();
    let size = ELEMENTS as usize;
    LcaMatrices::new()
        .with_matrix("technosphere_matrix", DokMatrix::new(size, size))
        .with_mapping("_activity_dict", ids.clone())
        .with_mapping("_product_dict", ids)
}

fn benchmark_load_package(c: &mut Criterion) {
    let dir = TempDir::new().expect("temp dir");
    let dirpath = technosphere_package(&dir);
    c.bench_function("load_package", |b| {
        b.iter(|| PackagesDataLoader::new(black_box(&[&dirpath]), None))
    });
}

fn benchmark_update_matrices(c: &mut Criterion) {
    let dir = TempDir::new().expect("temp dir");
    let dirpath = technosphere_package(&dir);
    let mut loader = PackagesDataLoader::new(&[&dirpath], None).expect("loader");
    let mut lca = lca();
    loader.index_arrays(&lca).expect("index arrays");

    c.bench_function("update_matrices", |b| {
        b.iter(|| {
            loader.update_sample_indices();
            loader.update_matrices(black_box(&mut lca), None)
        })
    });
}

criterion_group!(benches, benchmark_load_package, benchmark_update_matrices);
criterion_main!(benches);
