//! Named parameter presamples.
//!
//! Parameter resources pair a samples array with a JSON list of names, one
//! name per sample row. A [`ParametersMapping`] reads every parameter of one
//! package at that package's current sample column.

use crate::array::IrregularPresamplesArray;
use crate::error::{PresamplesError, Result};
use crate::package::Resource;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Parameter presamples of one package
#[derive(Debug, Clone)]
pub struct ParameterData {
    package_name: String,
    dirpath: PathBuf,
    labels: Vec<String>,
    names: Vec<String>,
    positions: HashMap<String, usize>,
    samples: IrregularPresamplesArray,
}

impl ParameterData {
    /// Load the names and samples of every parameter resource of a package
    pub fn load(dirpath: &Path, package_name: &str, resources: &[&Resource]) -> Result<Self> {
        let mut names = Vec::new();
        let mut labels = Vec::new();
        let mut sample_files = Vec::with_capacity(resources.len());

        for resource in resources {
            let (Some(names_ref), Some(samples_ref)) = (&resource.names, &resource.samples) else {
                return Err(PresamplesError::invalid_package(
                    dirpath,
                    "parameter resource needs both names and samples",
                ));
            };
            let path = dirpath.join(&names_ref.filepath);
            let text = fs::read_to_string(&path).map_err(|e| PresamplesError::io(&path, e))?;
            let resource_names: Vec<String> = serde_json::from_str(&text)?;

            let shape = samples_ref.shape.clone();
            if let Some(rows) = shape.as_ref().and_then(|s| s.first()) {
                if *rows != resource_names.len() {
                    return Err(PresamplesError::ShapeMismatch(format!(
                        "{} parameter names for {rows} sample rows in '{}'",
                        resource_names.len(),
                        names_ref.filepath
                    )));
                }
            }
            names.extend(resource_names);
            labels.extend(resource.label.clone());
            sample_files.push((dirpath.join(&samples_ref.filepath), shape));
        }

        let samples = IrregularPresamplesArray::load(&sample_files)?;
        if samples.nrows() != names.len() {
            return Err(PresamplesError::ShapeMismatch(format!(
                "{} parameter names for {} sample rows",
                names.len(),
                samples.nrows()
            )));
        }

        let mut positions = HashMap::with_capacity(names.len());
        for (position, name) in names.iter().enumerate() {
            if positions.insert(name.clone(), position).is_some() {
                return Err(PresamplesError::InvalidParameter(format!(
                    "duplicate parameter name '{name}' in package '{package_name}'"
                )));
            }
        }

        Ok(Self {
            package_name: package_name.to_string(),
            dirpath: dirpath.to_path_buf(),
            labels,
            names,
            positions,
            samples,
        })
    }

    pub fn package_name(&self) -> &str {
        &self.package_name
    }

    pub fn dirpath(&self) -> &Path {
        &self.dirpath
    }

    /// Labels of the parameter resources, in resource order
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn ncols(&self) -> usize {
        self.samples.ncols()
    }

    /// View of the parameters at sample column `index`
    pub fn at(&self, index: usize) -> ParametersMapping<'_> {
        ParametersMapping { data: self, index }
    }
}

/// Parameter name to value at one sample column
#[derive(Debug, Clone, Copy)]
pub struct ParametersMapping<'a> {
    data: &'a ParameterData,
    index: usize,
}

impl<'a> ParametersMapping<'a> {
    pub fn package_name(&self) -> &'a str {
        &self.data.package_name
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        let row = *self.data.positions.get(name)?;
        self.data.samples.value(row, self.index)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.data.positions.contains_key(name)
    }

    pub fn names(&self) -> &'a [String] {
        &self.data.names
    }

    pub fn len(&self) -> usize {
        self.data.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.names.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'a str, f64)> + 'a {
        let data = self.data;
        let index = self.index;
        data.names.iter().enumerate().filter_map(move |(row, name)| {
            data.samples
                .value(row, index)
                .map(|value| (name.as_str(), value))
        })
    }
}
