//! Writing presamples packages.
//!
//! [`create_presamples_package`] turns in-memory samples into a package
//! directory that [`PackagesDataLoader`](crate::loader::PackagesDataLoader) can read.

use crate::error::{PresamplesError, Result};
use crate::indexing::{ExchangeType, MISSING_INDEX};
use crate::npy::{IndexArray, RecordField, SampleArray, ScalarType};
use crate::package::{
    Datapackage, FileRef, LabelTriple, Resource, Seed, JSON_MEDIATYPE, NPY_MEDIATYPE,
    PACKAGE_PROFILE, RESOURCE_PROFILE,
};
use crate::validation::md5_file;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;
use uuid::Uuid;

/// Target matrix and label mapping of a matrix resource
#[derive(Debug, Clone, PartialEq)]
pub struct MatrixMetadata {
    pub matrix: String,
    pub row: LabelTriple,
    pub col: Option<LabelTriple>,
}

impl MatrixMetadata {
    pub fn new(matrix: impl Into<String>, row: LabelTriple, col: Option<LabelTriple>) -> Self {
        Self {
            matrix: matrix.into(),
            row,
            col,
        }
    }
}

fn labels(from: &str, to: &str, dict: &str) -> LabelTriple {
    LabelTriple {
        from: from.to_string(),
        to: to.to_string(),
        dict: dict.to_string(),
    }
}

/// Samples for one matrix resource with their index records
#[derive(Debug, Clone)]
pub struct MatrixPresamples {
    pub kind: String,
    pub samples: SampleArray,
    pub indices: IndexArray,
    pub metadata: MatrixMetadata,
}

impl MatrixPresamples {
    /// Technosphere exchanges as `(input id, output id, exchange type)`
    pub fn technosphere(samples: SampleArray, exchanges: &[(i64, i64, ExchangeType)]) -> Result<Self> {
        let fields = vec![
            RecordField::new("input", ScalarType::U32),
            RecordField::new("output", ScalarType::U32),
            RecordField::new("row", ScalarType::U32),
            RecordField::new("col", ScalarType::U32),
            RecordField::new("type", ScalarType::U8),
        ];
        let records: Vec<Vec<i64>> = exchanges
            .iter()
            .map(|(input, output, kind)| vec![*input, *output, MISSING_INDEX, MISSING_INDEX, kind.code()])
            .collect();
        Ok(Self {
            kind: "technosphere".to_string(),
            samples,
            indices: IndexArray::from_records(fields, &records)?,
            metadata: MatrixMetadata::new(
                "technosphere_matrix",
                labels("input", "row", "_product_dict"),
                Some(labels("output", "col", "_activity_dict")),
            ),
        })
    }

    /// Biosphere exchanges as `(flow id, activity id)`
    pub fn biosphere(samples: SampleArray, exchanges: &[(i64, i64)]) -> Result<Self> {
        let fields = vec![
            RecordField::new("input", ScalarType::U32),
            RecordField::new("output", ScalarType::U32),
            RecordField::new("row", ScalarType::U32),
            RecordField::new("col", ScalarType::U32),
        ];
        let records: Vec<Vec<i64>> = exchanges
            .iter()
            .map(|(input, output)| vec![*input, *output, MISSING_INDEX, MISSING_INDEX])
            .collect();
        Ok(Self {
            kind: "biosphere".to_string(),
            samples,
            indices: IndexArray::from_records(fields, &records)?,
            metadata: MatrixMetadata::new(
                "biosphere_matrix",
                labels("input", "row", "_biosphere_dict"),
                Some(labels("output", "col", "_activity_dict")),
            ),
        })
    }

    /// Characterization factors, one flow id per sample row
    pub fn characterization(samples: SampleArray, flows: &[i64]) -> Result<Self> {
        let fields = vec![
            RecordField::new("flow", ScalarType::U32),
            RecordField::new("row", ScalarType::U32),
        ];
        let records: Vec<Vec<i64>> = flows.iter().map(|flow| vec![*flow, MISSING_INDEX]).collect();
        Ok(Self {
            kind: "cf".to_string(),
            samples,
            indices: IndexArray::from_records(fields, &records)?,
            metadata: MatrixMetadata::new(
                "characterization_matrix",
                labels("flow", "row", "_biosphere_dict"),
                None,
            ),
        })
    }

    /// Any other matrix, with caller-built index records
    pub fn custom(
        kind: impl Into<String>,
        samples: SampleArray,
        indices: IndexArray,
        metadata: MatrixMetadata,
    ) -> Self {
        Self {
            kind: kind.into(),
            samples,
            indices,
            metadata,
        }
    }
}

/// Named parameter samples, one name per sample row
#[derive(Debug, Clone)]
pub struct ParameterPresamples {
    pub samples: SampleArray,
    pub names: Vec<String>,
    pub label: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct PackageOptions {
    /// Defaults to the id
    pub name: Option<String>,
    /// Defaults to a random UUID
    pub id: Option<String>,
    pub seed: Seed,
    /// Parent directory; the package is written to `{base_dir}/{id}`
    pub base_dir: PathBuf,
    /// Exact package directory, overriding `base_dir`
    pub dirpath: Option<PathBuf>,
    /// Replace an existing package directory
    pub overwrite: bool,
}

impl PackageOptions {
    pub fn in_directory(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            ..Default::default()
        }
    }

    pub fn with_seed(mut self, seed: Seed) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

/// Write a presamples package and return its id and directory
pub fn create_presamples_package(
    matrix_data: &[MatrixPresamples],
    parameter_data: &[ParameterPresamples],
    options: &PackageOptions,
) -> Result<(String, PathBuf)> {
    if matrix_data.is_empty() && parameter_data.is_empty() {
        return Err(PresamplesError::InvalidParameter(
            "a package needs matrix or parameter presamples".to_string(),
        ));
    }
    let ncols = check_inputs(matrix_data, parameter_data)?;

    let id = options
        .id
        .clone()
        .unwrap_or_else(|| Uuid::new_v4().simple().to_string());
    let name = options.name.clone().unwrap_or_else(|| id.clone());
    let dirpath = options
        .dirpath
        .clone()
        .unwrap_or_else(|| options.base_dir.join(&id));
    prepare_directory(&dirpath, options.overwrite)?;

    let mut resources = Vec::with_capacity(matrix_data.len() + parameter_data.len());
    for (position, data) in matrix_data.iter().enumerate() {
        let samples = write_samples(&dirpath, &id, position, &data.samples)?;
        let indices_path = format!("{id}.{position}.indices.npy");
        data.indices.write(&dirpath.join(&indices_path))?;
        let indices = npy_ref(&dirpath, indices_path, None)?;

        let col = data.metadata.col.clone();
        resources.push(Resource {
            samples: Some(samples),
            indices: Some(indices),
            matrix: Some(data.metadata.matrix.clone()),
            kind: Some(data.kind.clone()),
            index: Some(position),
            row_from_label: Some(data.metadata.row.from.clone()),
            row_to_label: Some(data.metadata.row.to.clone()),
            row_dict: Some(data.metadata.row.dict.clone()),
            col_from_label: col.as_ref().map(|c| c.from.clone()),
            col_to_label: col.as_ref().map(|c| c.to.clone()),
            col_dict: col.map(|c| c.dict),
            profile: Some(RESOURCE_PROFILE.to_string()),
            ..Default::default()
        });
    }

    for (offset, data) in parameter_data.iter().enumerate() {
        let position = matrix_data.len() + offset;
        let samples = write_samples(&dirpath, &id, position, &data.samples)?;
        let names_path = format!("{id}.{position}.names.json");
        let full_path = dirpath.join(&names_path);
        fs::write(&full_path, serde_json::to_string(&data.names)?)
            .map_err(|e| PresamplesError::io(&full_path, e))?;
        let names = FileRef {
            filepath: names_path,
            md5: md5_file(&full_path)?,
            shape: None,
            dtype: None,
            format: Some("json".to_string()),
            mediatype: Some(JSON_MEDIATYPE.to_string()),
        };

        resources.push(Resource {
            samples: Some(samples),
            names: Some(names),
            label: data.label.clone(),
            index: Some(position),
            profile: Some(RESOURCE_PROFILE.to_string()),
            ..Default::default()
        });
    }

    let package = Datapackage {
        name,
        id: id.clone(),
        profile: PACKAGE_PROFILE.to_string(),
        seed: options.seed,
        ncols: Some(ncols),
        resources,
    };
    package.write(&dirpath)?;

    info!(
        package_id = %id,
        dirpath = %dirpath.display(),
        resources = package.resources.len(),
        ncols,
        "Created presamples package"
    );
    Ok((id, dirpath))
}

/// Check shapes and names; returns the shared column count
fn check_inputs(matrix_data: &[MatrixPresamples], parameter_data: &[ParameterPresamples]) -> Result<usize> {
    for data in matrix_data {
        if data.samples.rows() != data.indices.len() {
            return Err(PresamplesError::ShapeMismatch(format!(
                "'{}' presamples have {} sample rows but {} index records",
                data.kind,
                data.samples.rows(),
                data.indices.len()
            )));
        }
    }

    let mut seen = HashSet::new();
    for data in parameter_data {
        if data.samples.rows() != data.names.len() {
            return Err(PresamplesError::ShapeMismatch(format!(
                "{} parameter names for {} sample rows",
                data.names.len(),
                data.samples.rows()
            )));
        }
        if let Some(name) = data.names.iter().find(|name| !seen.insert(name.as_str())) {
            return Err(PresamplesError::InvalidParameter(format!(
                "duplicate parameter name '{name}'"
            )));
        }
    }

    let columns: HashSet<usize> = matrix_data
        .iter()
        .map(|d| d.samples.cols())
        .chain(parameter_data.iter().map(|d| d.samples.cols()))
        .collect();
    match columns.into_iter().collect::<Vec<_>>().as_slice() {
        [ncols] if *ncols > 0 => Ok(*ncols),
        [_] => Err(PresamplesError::ShapeMismatch(
            "sample arrays need at least one column".to_string(),
        )),
        found => Err(PresamplesError::ShapeMismatch(format!(
            "sample arrays disagree on column count: {found:?}"
        ))),
    }
}

fn prepare_directory(dirpath: &Path, overwrite: bool) -> Result<()> {
    if dirpath.exists() {
        let occupied = fs::read_dir(dirpath)
            .map_err(|e| PresamplesError::io(dirpath, e))?
            .next()
            .is_some();
        if occupied && !overwrite {
            return Err(PresamplesError::invalid_package(
                dirpath,
                "directory is not empty; set overwrite to replace it",
            ));
        }
        if occupied {
            fs::remove_dir_all(dirpath).map_err(|e| PresamplesError::io(dirpath, e))?;
        }
    }
    fs::create_dir_all(dirpath).map_err(|e| PresamplesError::io(dirpath, e))
}

fn write_samples(dirpath: &Path, id: &str, position: usize, samples: &SampleArray) -> Result<FileRef> {
    let filepath = format!("{id}.{position}.samples.npy");
    samples.write(&dirpath.join(&filepath))?;
    let (rows, cols) = samples.shape();
    let mut file = npy_ref(dirpath, filepath, Some(vec![rows, cols]))?;
    file.dtype = Some(ScalarType::F64.name());
    Ok(file)
}

fn npy_ref(dirpath: &Path, filepath: String, shape: Option<Vec<usize>>) -> Result<FileRef> {
    Ok(FileRef {
        md5: md5_file(&dirpath.join(&filepath))?,
        filepath,
        shape,
        dtype: None,
        format: Some("npy".to_string()),
        mediatype: Some(NPY_MEDIATYPE.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_requires_some_data() {
        let dir = TempDir::new().unwrap();
        let options = PackageOptions::in_directory(dir.path());
        assert!(matches!(
            create_presamples_package(&[], &[], &options),
            Err(PresamplesError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_rows_must_match_indices() {
        let dir = TempDir::new().unwrap();
        let data =
            MatrixPresamples::characterization(SampleArray::filled(2, 3, 1.0), &[1, 2, 3]).unwrap();
        let err = create_presamples_package(&[data], &[], &PackageOptions::in_directory(dir.path()))
            .unwrap_err();
        assert!(matches!(err, PresamplesError::ShapeMismatch(_)));
    }

    #[test]
    fn test_column_counts_must_agree() {
        let dir = TempDir::new().unwrap();
        let a = MatrixPresamples::characterization(SampleArray::filled(1, 3, 1.0), &[1]).unwrap();
        let b = MatrixPresamples::biosphere(SampleArray::filled(1, 4, 1.0), &[(1, 2)]).unwrap();
        let err = create_presamples_package(&[a, b], &[], &PackageOptions::in_directory(dir.path()))
            .unwrap_err();
        assert!(err.to_string().contains("disagree on column count"));
    }

    #[test]
    fn test_duplicate_parameter_names() {
        let dir = TempDir::new().unwrap();
        let first = ParameterPresamples {
            samples: SampleArray::filled(2, 2, 1.0),
            names: vec!["a".to_string(), "b".to_string()],
            label: None,
        };
        let second = ParameterPresamples {
            samples: SampleArray::filled(1, 2, 1.0),
            names: vec!["a".to_string()],
            label: None,
        };
        assert!(matches!(
            create_presamples_package(&[], &[first, second], &PackageOptions::in_directory(dir.path())),
            Err(PresamplesError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_existing_directory_needs_overwrite() {
        let dir = TempDir::new().unwrap();
        let data = || MatrixPresamples::characterization(SampleArray::filled(1, 2, 1.0), &[1]).unwrap();
        let options = PackageOptions::in_directory(dir.path()).with_id("fixed");

        let (id, dirpath) = create_presamples_package(&[data()], &[], &options).unwrap();
        assert_eq!(id, "fixed");
        assert_eq!(dirpath, dir.path().join("fixed"));
        assert!(create_presamples_package(&[data()], &[], &options).is_err());

        let options = PackageOptions {
            overwrite: true,
            ..options
        };
        assert!(create_presamples_package(&[data()], &[], &options).is_ok());
    }

    #[test]
    fn test_written_metadata() {
        let dir = TempDir::new().unwrap();
        let data = MatrixPresamples::technosphere(
            SampleArray::filled(1, 2, 5.0),
            &[(1, 2, ExchangeType::Technosphere)],
        )
        .unwrap();
        let options = PackageOptions::in_directory(dir.path())
            .with_name("demo")
            .with_seed(Seed::Sequential);
        let (id, dirpath) = create_presamples_package(&[data], &[], &options).unwrap();

        let package = Datapackage::read(&dirpath, 1 << 20).unwrap();
        assert_eq!(package.name, "demo");
        assert_eq!(package.id, id);
        assert_eq!(package.seed, Seed::Sequential);
        assert_eq!(package.ncols, Some(2));

        let resource = &package.resources[0];
        assert_eq!(resource.kind(), "technosphere");
        assert_eq!(resource.row_dict.as_deref(), Some("_product_dict"));
        assert_eq!(resource.col_dict.as_deref(), Some("_activity_dict"));
        let samples = resource.samples.as_ref().unwrap();
        assert_eq!(samples.filepath, format!("{id}.0.samples.npy"));
        assert_eq!(samples.shape, Some(vec![1, 2]));
        assert_eq!(samples.md5, md5_file(&dirpath.join(&samples.filepath)).unwrap());
    }
}
