//! Target matrices and the calculation context the loader writes into.
//!
//! An LCA calculation exposes named id mappings (such as `_product_dict`) and
//! named matrices (such as `technosphere_matrix`). [`LcaContext`] is that
//! surface; [`LcaMatrices`] is a ready-made implementation over [`DokMatrix`].

use crate::error::{PresamplesError, Result};
use crate::indexing::IdMapping;
use std::collections::HashMap;

/// Matrix that accepts element writes
pub trait MatrixSink {
    fn shape(&self) -> (usize, usize);

    /// Store `value` at `(row, col)`; callers guarantee the position is inside `shape()`
    fn insert(&mut self, row: usize, col: usize, value: f64);
}

/// Named mappings and matrices of one calculation
pub trait LcaContext {
    fn mapping(&self, name: &str) -> Option<&IdMapping>;

    fn matrix_mut(&mut self, name: &str) -> Option<&mut dyn MatrixSink>;
}

/// Dictionary-of-keys sparse matrix
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DokMatrix {
    shape: (usize, usize),
    values: HashMap<(usize, usize), f64>,
}

impl DokMatrix {
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            shape: (rows, cols),
            values: HashMap::new(),
        }
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.values.get(&(row, col)).copied().unwrap_or(0.0)
    }

    pub fn set(&mut self, row: usize, col: usize, value: f64) -> Result<()> {
        if row >= self.shape.0 || col >= self.shape.1 {
            return Err(PresamplesError::IndexOutOfBounds {
                matrix: "dok".to_string(),
                row: i64::try_from(row).unwrap_or(i64::MAX),
                col: i64::try_from(col).unwrap_or(i64::MAX),
                shape: self.shape,
            });
        }
        self.insert(row, col, value);
        Ok(())
    }

    pub fn sum(&self) -> f64 {
        self.values.values().sum()
    }

    /// Number of explicitly stored non-zero elements
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = ((usize, usize), f64)> + '_ {
        self.values.iter().map(|(k, v)| (*k, *v))
    }
}

impl MatrixSink for DokMatrix {
    fn shape(&self) -> (usize, usize) {
        self.shape
    }

    fn insert(&mut self, row: usize, col: usize, value: f64) {
        if value == 0.0 {
            self.values.remove(&(row, col));
        } else {
            self.values.insert((row, col), value);
        }
    }
}

/// In-memory calculation context
#[derive(Debug, Clone, Default)]
pub struct LcaMatrices {
    matrices: HashMap<String, DokMatrix>,
    mappings: HashMap<String, IdMapping>,
}

impl LcaMatrices {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_matrix(mut self, name: impl Into<String>, matrix: DokMatrix) -> Self {
        self.matrices.insert(name.into(), matrix);
        self
    }

    pub fn with_mapping(mut self, name: impl Into<String>, mapping: IdMapping) -> Self {
        self.mappings.insert(name.into(), mapping);
        self
    }

    pub fn matrix(&self, name: &str) -> Option<&DokMatrix> {
        self.matrices.get(name)
    }

    pub fn set_mapping(&mut self, name: impl Into<String>, mapping: IdMapping) {
        self.mappings.insert(name.into(), mapping);
    }

    pub fn remove_mapping(&mut self, name: &str) -> Option<IdMapping> {
        self.mappings.remove(name)
    }
}

impl LcaContext for LcaMatrices {
    fn mapping(&self, name: &str) -> Option<&IdMapping> {
        self.mappings.get(name)
    }

    fn matrix_mut(&mut self, name: &str) -> Option<&mut dyn MatrixSink> {
        self.matrices
            .get_mut(name)
            .map(|matrix| matrix as &mut dyn MatrixSink)
    }
}
