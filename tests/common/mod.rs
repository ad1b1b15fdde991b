#![allow(dead_code)]

use presamples::{
    create_presamples_package, DokMatrix, IdMapping, IndexArray, LabelTriple, LcaMatrices,
    MatrixMetadata, MatrixPresamples, PackageOptions, RecordField, SampleArray, ScalarType, Seed,
};
use std::path::{Path, PathBuf};

/// Index records `(f1, f2, f1, f2)` for the element ids `(1, 1), (1, 2), (2, 3)`
pub fn mock_indices() -> IndexArray {
    let fields = ["f1", "f2", "f3", "f4"]
        .iter()
        .map(|name| RecordField::new(*name, ScalarType::U32))
        .collect();
    let records: Vec<Vec<i64>> = [(1, 1), (1, 2), (2, 3)]
        .iter()
        .map(|(a, b)| vec![*a, *b, *a, *b])
        .collect();
    IndexArray::from_records(fields, &records).unwrap()
}

pub fn mock_metadata() -> MatrixMetadata {
    MatrixMetadata::new(
        "matrix",
        LabelTriple {
            from: "f1".to_string(),
            to: "f3".to_string(),
            dict: "row_dict".to_string(),
        },
        Some(LabelTriple {
            from: "f2".to_string(),
            to: "f4".to_string(),
            dict: "col_dict".to_string(),
        }),
    )
}

pub fn mock_presamples(samples: SampleArray) -> MatrixPresamples {
    MatrixPresamples::custom("mock", samples, mock_indices(), mock_metadata())
}

/// Package with one `mock` resource targeting `matrix`
pub fn mock_package(base: &Path, samples: SampleArray, seed: Seed) -> PathBuf {
    let options = PackageOptions::in_directory(base).with_seed(seed);
    let (_, dirpath) = create_presamples_package(&[mock_presamples(samples)], &[], &options).unwrap();
    dirpath
}

/// Default mock package: every sample is 100
pub fn package(base: &Path) -> PathBuf {
    mock_package(base, SampleArray::filled(3, 4, 100.0), Seed::Fixed(1))
}

/// Samples 0..12 laid out as three rows of four columns
pub fn arange_samples() -> SampleArray {
    SampleArray::new(3, 4, (0..12).map(f64::from).collect()).unwrap()
}

pub fn scaled_mapping(factor: i64) -> IdMapping {
    (0..5).map(|x| (x, factor * x)).collect()
}

/// Activity ids 1..=6 map to matrix indices 0..=5
pub fn shifted_mapping() -> IdMapping {
    (1..=6).map(|x| (x, x - 1)).collect()
}

/// 5x5 `matrix` with row ids doubled and column ids tripled
pub fn mock_lca() -> LcaMatrices {
    LcaMatrices::new()
        .with_matrix("matrix", DokMatrix::new(5, 5))
        .with_mapping("row_dict", scaled_mapping(2))
        .with_mapping("col_dict", scaled_mapping(3))
}

/// Paths of all files in a package directory whose name contains `marker`
pub fn files_containing(dirpath: &Path, marker: &str) -> Vec<PathBuf> {
    std::fs::read_dir(dirpath)
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.contains(marker))
        })
        .collect()
}
