//! Sample arrays of several resources read as one.
//!
//! Consolidated resources keep their own sample files. They must agree on the
//! number of columns but may differ in row count; a draw concatenates the same
//! column of each array in resource order.

use crate::error::{PresamplesError, Result};
use crate::npy::SampleArray;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct IrregularPresamplesArray {
    arrays: Vec<SampleArray>,
    ncols: usize,
}

impl IrregularPresamplesArray {
    pub fn new(arrays: Vec<SampleArray>) -> Result<Self> {
        let ncols = arrays.first().map_or(0, SampleArray::cols);
        if let Some(array) = arrays.iter().find(|a| a.cols() != ncols) {
            return Err(PresamplesError::ShapeMismatch(format!(
                "sample arrays disagree on column count: {} vs {ncols}",
                array.cols()
            )));
        }
        Ok(Self { arrays, ncols })
    }

    /// Read `(path, expected shape)` pairs; a recorded shape must match the file
    pub fn load(files: &[(PathBuf, Option<Vec<usize>>)]) -> Result<Self> {
        let arrays = files
            .iter()
            .map(|(path, shape)| load_checked(path, shape.as_deref()))
            .collect::<Result<Vec<_>>>()?;
        Self::new(arrays)
    }

    pub fn ncols(&self) -> usize {
        self.ncols
    }

    /// Total rows across all arrays
    pub fn nrows(&self) -> usize {
        self.arrays.iter().map(SampleArray::rows).sum()
    }

    pub fn arrays(&self) -> &[SampleArray] {
        &self.arrays
    }

    /// Value at a row of the concatenated arrays
    pub fn value(&self, row: usize, col: usize) -> Option<f64> {
        let mut offset = row;
        for array in &self.arrays {
            if offset < array.rows() {
                return array.get(offset, col);
            }
            offset -= array.rows();
        }
        None
    }

    /// Column `index` of every array, concatenated
    pub fn sample(&self, index: usize) -> Result<Vec<f64>> {
        if index >= self.ncols {
            return Err(PresamplesError::ShapeMismatch(format!(
                "sample index {index} out of range for {} columns",
                self.ncols
            )));
        }
        let mut values = Vec::with_capacity(self.nrows());
        for array in &self.arrays {
            array.extend_with_column(index, &mut values);
        }
        Ok(values)
    }
}

fn load_checked(path: &Path, expected: Option<&[usize]>) -> Result<SampleArray> {
    let array = SampleArray::read(path)?;
    if let Some(shape) = expected {
        let (rows, cols) = array.shape();
        let matches = match shape {
            [r, c] => *r == rows && *c == cols,
            [r] => *r == rows && cols == 1,
            _ => false,
        };
        if !matches {
            return Err(PresamplesError::ShapeMismatch(format!(
                "'{}' has shape ({rows}, {cols}) but metadata records {shape:?}",
                path.display()
            )));
        }
    }
    Ok(array)
}
