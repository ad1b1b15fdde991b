//! # Packages Data Loader
//!
//! Loads presamples packages and inserts their sampled values into LCA matrices.
//!
//! Each package directory holds, per resource:
//!
//! * `{id}.{n}.samples.npy`: one row per matrix element, one column per sample.
//! * `{id}.{n}.indices.npy`: structured array with the database ids of each
//!   element and slots for its matrix row and column, for example
//!   `input output row col type` for technosphere presamples or `flow row` for
//!   characterization factors.
//!
//! Resources of the same `type` inside a package are consolidated into one
//! [`MatrixData`] group. Normal life cycle:
//!
//! 1. Build a loader from package directories and an optional seed override.
//! 2. Once the calculation has its id mappings, call
//!    [`index_arrays`](PackagesDataLoader::index_arrays). It may be called again
//!    as more mappings become available; groups are only indexed once.
//! 3. Before a static calculation, or for each Monte Carlo iteration, call
//!    [`update_matrices`](PackagesDataLoader::update_matrices), then
//!    [`update_sample_indices`](PackagesDataLoader::update_sample_indices) to
//!    move every package to its next sample column.
//!
//! Elements whose ids are absent from the calculation's mappings are marked
//! with [`MISSING_INDEX`] and skipped when matrices are updated.

use crate::array::IrregularPresamplesArray;
use crate::config::PresamplesConfig;
use crate::error::{PresamplesError, Result};
use crate::indexer::Indexer;
use crate::indexing::{fix_supply_use, index_with_arrays, IdMapping, MISSING_INDEX};
use crate::logging::log_package_operation;
use crate::matrix::LcaContext;
use crate::npy::IndexArray;
use crate::package::{LabelTriple, Resource, Seed};
use crate::parameters::{ParameterData, ParametersMapping};
use crate::validation::validate_presamples_dirpath;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Resource type whose technosphere inputs are stored as positive numbers
pub const TECHNOSPHERE_TYPE: &str = "technosphere";

/// Index field holding exchange type codes
pub const TYPE_FIELD: &str = "type";

/// Resource keys that describe files rather than the consolidated group
const SKIPPED_METADATA: [&str; 2] = ["format", "mediatype"];

/// Consolidated resources of one type within a package
#[derive(Debug, Clone)]
pub struct MatrixData {
    pub kind: String,
    pub matrix: String,
    pub row: LabelTriple,
    pub col: Option<LabelTriple>,
    pub indices: IndexArray,
    pub samples: IrregularPresamplesArray,
    /// Keys of the group's first resource other than files, labels and profile
    pub metadata: Map<String, Value>,
    indexed: bool,
}

impl MatrixData {
    pub fn is_indexed(&self) -> bool {
        self.indexed
    }

    fn is_technosphere(&self) -> bool {
        self.kind == TECHNOSPHERE_TYPE
    }
}

/// One loaded package directory
#[derive(Debug, Clone)]
pub struct PackageData {
    pub name: String,
    pub id: String,
    /// Seed stored in the package metadata
    pub seed: Seed,
    pub dirpath: PathBuf,
    pub matrix_data: Vec<MatrixData>,
    pub parameters: Option<ParameterData>,
    pub indexer: Indexer,
}

impl PackageData {
    pub fn has_matrix_data(&self) -> bool {
        !self.matrix_data.is_empty()
    }
}

#[derive(Debug)]
pub struct PackagesDataLoader {
    seed: Option<Seed>,
    packages: Vec<PackageData>,
}

impl PackagesDataLoader {
    /// Load package directories with default settings and an optional seed override.
    ///
    /// The override, fixed or sequential, replaces the seed of every package.
    pub fn new<P: AsRef<Path>>(dirpaths: &[P], seed: Option<Seed>) -> Result<Self> {
        let config = PresamplesConfig {
            seed,
            ..Default::default()
        };
        Self::with_config(dirpaths, &config)
    }

    pub fn with_config<P: AsRef<Path>>(dirpaths: &[P], config: &PresamplesConfig) -> Result<Self> {
        config.validate()?;

        let packages = dirpaths
            .iter()
            .map(|dirpath| Self::load_data(dirpath.as_ref(), config))
            .collect::<Result<Vec<_>>>()?;

        let loader = Self {
            seed: config.seed,
            packages,
        };
        info!(
            packages = loader.packages.len(),
            matrix_packages = loader.len(),
            seed_override = ?loader.seed,
            "Presamples loaded"
        );
        Ok(loader)
    }

    /// Validate and load one package directory, consolidating resources by type
    pub fn load_data(dirpath: &Path, config: &PresamplesConfig) -> Result<PackageData> {
        let metadata = validate_presamples_dirpath(
            dirpath,
            config.verify_checksums,
            config.max_metadata_bytes,
        )?;

        let mut groups: BTreeMap<&str, Vec<&Resource>> = BTreeMap::new();
        for resource in metadata.resources.iter().filter(|r| r.is_matrix_resource()) {
            groups.entry(resource.kind()).or_default().push(resource);
        }
        let matrix_data = groups
            .values()
            .map(|group| Self::consolidate(dirpath, group))
            .collect::<Result<Vec<_>>>()?;

        let parameter_resources: Vec<&Resource> = metadata
            .resources
            .iter()
            .filter(|r| r.is_parameter_resource())
            .collect();
        let parameters = if parameter_resources.is_empty() {
            None
        } else {
            Some(ParameterData::load(
                dirpath,
                &metadata.name,
                &parameter_resources,
            )?)
        };

        let ncols = Self::package_ncols(dirpath, metadata.ncols, &matrix_data, parameters.as_ref())?;
        let seed = config.seed.unwrap_or(metadata.seed);
        let indexer = Indexer::new(ncols, seed)?;

        log_package_operation(
            "load",
            &metadata.id,
            dirpath,
            Some(&format!(
                "{} matrix groups, {} parameter resources",
                matrix_data.len(),
                parameter_resources.len()
            )),
        );

        Ok(PackageData {
            name: metadata.name,
            id: metadata.id,
            seed: metadata.seed,
            dirpath: dirpath.to_path_buf(),
            matrix_data,
            parameters,
            indexer,
        })
    }

    /// Every sample array in a package must share one column count
    fn package_ncols(
        dirpath: &Path,
        declared: Option<usize>,
        matrix_data: &[MatrixData],
        parameters: Option<&ParameterData>,
    ) -> Result<usize> {
        let found: BTreeSet<usize> = matrix_data
            .iter()
            .map(|group| group.samples.ncols())
            .chain(parameters.map(ParameterData::ncols))
            .chain(declared)
            .collect();
        match found.len() {
            // Even empty packages get an indexer
            0 => Ok(1),
            1 => Ok(found.into_iter().next().unwrap_or(1)),
            _ => Err(PresamplesError::invalid_package(
                dirpath,
                format!("resources disagree on sample column count: {found:?}"),
            )),
        }
    }

    /// Merge resources of one type into a single group.
    ///
    /// Resources must target the same matrix, use identical row labels (and
    /// column labels, when any of them has a column mapping) and have index
    /// arrays with the same dtype.
    pub fn consolidate(dirpath: &Path, group: &[&Resource]) -> Result<MatrixData> {
        let Some(first) = group.first() else {
            return Err(PresamplesError::invalid_package(
                dirpath,
                "cannot consolidate an empty resource group",
            ));
        };
        let kind = first.kind().to_string();

        let matrices: BTreeSet<&str> = group.iter().filter_map(|r| r.matrix.as_deref()).collect();
        if matrices.len() != 1 || group.iter().any(|r| r.matrix.is_none()) {
            return Err(PresamplesError::ConflictingMatrices {
                group: kind,
                matrices: matrices.into_iter().map(str::to_string).collect(),
            });
        }
        let matrix = first.matrix.clone().unwrap_or_default();

        let row = Self::shared_labels(&kind, "row", group.iter().map(|r| r.row_labels()))?;
        let col = if group.iter().any(|r| r.has_col_dict()) {
            Some(Self::shared_labels(&kind, "col", group.iter().map(|r| r.col_labels()))?)
        } else {
            None
        };

        let mut index_arrays = Vec::with_capacity(group.len());
        let mut sample_files = Vec::with_capacity(group.len());
        for resource in group {
            let (Some(indices), Some(samples)) = (&resource.indices, &resource.samples) else {
                return Err(PresamplesError::invalid_package(
                    dirpath,
                    format!("matrix resource of type '{kind}' needs samples and indices"),
                ));
            };
            index_arrays.push(IndexArray::read(&dirpath.join(&indices.filepath))?);
            sample_files.push((dirpath.join(&samples.filepath), samples.shape.clone()));
        }
        let indices = IndexArray::concat(&index_arrays)
            .ok_or_else(|| PresamplesError::IncompatibleIndices { group: kind.clone() })?;
        let samples = IrregularPresamplesArray::load(&sample_files)?;

        if samples.nrows() != indices.len() {
            return Err(PresamplesError::ShapeMismatch(format!(
                "group '{kind}' has {} sample rows but {} index records",
                samples.nrows(),
                indices.len()
            )));
        }

        let mut required = vec![row.from.as_str(), row.to.as_str()];
        if let Some(col) = &col {
            required.extend([col.from.as_str(), col.to.as_str()]);
        }
        if kind == TECHNOSPHERE_TYPE {
            required.push(TYPE_FIELD);
        }
        if let Some(field) = required.iter().find(|f| indices.column(f).is_none()) {
            return Err(PresamplesError::invalid_package(
                dirpath,
                format!("indices of group '{kind}' have no field '{field}'"),
            ));
        }
        if row.from == row.to || col.as_ref().is_some_and(|c| c.from == c.to) {
            return Err(PresamplesError::invalid_package(
                dirpath,
                format!("group '{kind}' maps a label onto itself"),
            ));
        }

        let mut metadata = first.extra.clone();
        for key in SKIPPED_METADATA {
            metadata.remove(key);
        }
        if let Some(label) = &first.label {
            metadata.insert("label".to_string(), Value::from(label.as_str()));
        }
        if let Some(index) = first.index {
            metadata.insert("index".to_string(), Value::from(index));
        }

        debug!(
            group = %kind,
            matrix = %matrix,
            resources = group.len(),
            elements = indices.len(),
            ncols = samples.ncols(),
            "Consolidated resource group"
        );

        Ok(MatrixData {
            kind,
            matrix,
            row,
            col,
            indices,
            samples,
            metadata,
            indexed: false,
        })
    }

    fn shared_labels(
        kind: &str,
        axis: &'static str,
        labels: impl Iterator<Item = Option<LabelTriple>>,
    ) -> Result<LabelTriple> {
        let conflict = || PresamplesError::ConflictingLabels {
            group: kind.to_string(),
            axis,
        };
        let labels = labels.collect::<Option<BTreeSet<_>>>().ok_or_else(conflict)?;
        let mut labels = labels.into_iter();
        match (labels.next(), labels.next()) {
            (Some(triple), None) => Ok(triple),
            _ => Err(conflict()),
        }
    }

    /// Number of packages with matrix data
    pub fn len(&self) -> usize {
        self.data().count()
    }

    /// True when no package has matrix data
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn seed(&self) -> Option<Seed> {
        self.seed
    }

    /// Every loaded package, including empty ones
    pub fn packages(&self) -> &[PackageData] {
        &self.packages
    }

    /// Packages with matrix data
    pub fn data(&self) -> impl Iterator<Item = &PackageData> {
        self.packages.iter().filter(|p| p.has_matrix_data())
    }

    /// Map database ids in the index arrays to matrix rows and columns.
    ///
    /// Groups whose mappings the context does not have yet are left for a later
    /// call; groups already indexed are never remapped.
    pub fn index_arrays<C: LcaContext + ?Sized>(&mut self, lca: &C) -> Result<()> {
        if self.is_empty() {
            return Ok(());
        }

        for package in self.packages.iter_mut() {
            for group in package.matrix_data.iter_mut() {
                if group.indexed {
                    continue;
                }
                let Some(row_mapping) = lca.mapping(&group.row.dict) else {
                    continue;
                };
                let col_mapping = match &group.col {
                    Some(col) => match lca.mapping(&col.dict) {
                        Some(mapping) => Some((col, mapping)),
                        None => continue,
                    },
                    None => None,
                };

                let mut missing = Self::index_column(&mut group.indices, &group.row, row_mapping)?;
                if let Some((col, mapping)) = col_mapping {
                    missing += Self::index_column(&mut group.indices, col, mapping)?;
                }
                group.indexed = true;

                debug!(
                    package_id = %package.id,
                    group = %group.kind,
                    elements = group.indices.len(),
                    unmapped = missing,
                    "Indexed resource group"
                );
            }
        }
        Ok(())
    }

    fn index_column(
        indices: &mut IndexArray,
        labels: &LabelTriple,
        mapping: &IdMapping,
    ) -> Result<usize> {
        let (from, to) = indices
            .column_pair_mut(&labels.from, &labels.to)
            .ok_or_else(|| {
                PresamplesError::ShapeMismatch(format!(
                    "cannot map field '{}' into '{}'",
                    labels.from, labels.to
                ))
            })?;
        Ok(index_with_arrays(from, to, mapping))
    }

    /// Write the current sample of every group into the matching matrix.
    ///
    /// Groups targeting matrices the context does not have, or not named in
    /// `matrices` when a filter is given, are skipped.
    pub fn update_matrices<C: LcaContext + ?Sized>(
        &self,
        lca: &mut C,
        matrices: Option<&[&str]>,
    ) -> Result<()> {
        if self.is_empty() {
            return Ok(());
        }

        for package in self.data() {
            let index = package.indexer.index();
            for group in &package.matrix_data {
                if matrices.is_some_and(|names| !names.contains(&group.matrix.as_str())) {
                    continue;
                }
                let Some(matrix) = lca.matrix_mut(&group.matrix) else {
                    continue;
                };

                let mut sample = group.samples.sample(index)?;
                if group.is_technosphere() {
                    if let Some(types) = group.indices.column(TYPE_FIELD) {
                        fix_supply_use(types, &mut sample);
                    }
                }

                let rows = Self::required_column(&group.indices, &group.row.to)?;
                let cols = match &group.col {
                    Some(col) => Self::required_column(&group.indices, &col.to)?,
                    None => rows,
                };

                // Check every position before writing so a failing group leaves the matrix untouched
                let shape = matrix.shape();
                let mut writes = Vec::with_capacity(sample.len());
                for ((row, col), value) in rows.iter().zip(cols).zip(&sample) {
                    if *row == MISSING_INDEX || *col == MISSING_INDEX {
                        continue;
                    }
                    match (usize::try_from(*row), usize::try_from(*col)) {
                        (Ok(r), Ok(c)) if r < shape.0 && c < shape.1 => writes.push((r, c, *value)),
                        _ => {
                            return Err(PresamplesError::IndexOutOfBounds {
                                matrix: group.matrix.clone(),
                                row: *row,
                                col: *col,
                                shape,
                            })
                        }
                    }
                }
                for (row, col, value) in &writes {
                    matrix.insert(*row, *col, *value);
                }
                let skipped = sample.len() - writes.len();

                debug!(
                    package_id = %package.id,
                    matrix = %group.matrix,
                    sample_index = index,
                    written = writes.len(),
                    skipped,
                    "Updated matrix"
                );
            }
        }
        Ok(())
    }

    fn required_column<'a>(indices: &'a IndexArray, name: &str) -> Result<&'a [i64]> {
        indices
            .column(name)
            .ok_or_else(|| PresamplesError::ShapeMismatch(format!("indices have no field '{name}'")))
    }

    /// Advance every package to its next sample column
    pub fn update_sample_indices(&mut self) {
        for package in self.packages.iter_mut() {
            package.indexer.advance();
        }
    }

    /// Parameter values of each parameter package at its current sample column
    pub fn parameters(&self) -> Vec<ParametersMapping<'_>> {
        self.packages
            .iter()
            .filter_map(|package| {
                package
                    .parameters
                    .as_ref()
                    .map(|parameters| parameters.at(package.indexer.index()))
            })
            .collect()
    }
}

impl fmt::Display for PackagesDataLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PackagesDataLoader with {} resources", self.len())
    }
}
