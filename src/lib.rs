#![allow(clippy::doc_markdown)] // Allow technical terms like NumPy, LCA in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Presamples
//!
//! Pre-computed samples for life cycle assessment matrices.
//!
//! ## Overview
//!
//! A presamples package stores sampled values for matrix elements (technosphere
//! exchanges, biosphere flows, characterization factors, or any custom matrix)
//! together with the database ids of those elements. Before a static calculation
//! or each Monte Carlo iteration, the loader writes one sample column of every
//! package into the calculation's matrices. Packages may also carry named
//! parameter samples.
//!
//! ## Module Organization
//!
//! - [`loader`] - Load packages, index them, update matrices
//! - [`packaging`] - Write new packages
//! - [`package`] - `datapackage.json` model
//! - [`npy`] - NumPy `.npy` codec
//! - [`matrix`] - Target matrices and calculation context
//! - [`indexer`] - Per-package sample column selection
//! - [`parameters`] - Named parameter presamples
//! - [`config`] - Configuration management
//! - [`error`] - Structured error handling
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use presamples::{DokMatrix, LcaMatrices, PackagesDataLoader, Seed};
//! use std::collections::HashMap;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut loader = PackagesDataLoader::new(&["presamples/my-package"], Some(Seed::Fixed(42)))?;
//!
//! let activities: HashMap<i64, i64> = (1..=6).map(|id| (id, id - 1)).collect();
//! let mut lca = LcaMatrices::new()
//!     .with_matrix("technosphere_matrix", DokMatrix::new(6, 6))
//!     .with_mapping("_activity_dict", activities.clone())
//!     .with_mapping("_product_dict", activities);
//!
//! loader.index_arrays(&lca)?;
//! for _ in 0..10 {
//!     loader.update_matrices(&mut lca, None)?;
//!     // ... solve the system ...
//!     loader.update_sample_indices();
//! }
//! # Ok(())
//! # }
//! ```

pub mod array;
pub mod config;
pub mod error;
pub mod indexer;
pub mod indexing;
pub mod loader;
pub mod logging;
pub mod matrix;
pub mod npy;
pub mod package;
pub mod packaging;
pub mod parameters;
pub mod validation;

pub use array::IrregularPresamplesArray;
pub use config::{ConfigurationError, LogFormat, PresamplesConfig};
pub use error::{PresamplesError, Result};
pub use indexer::Indexer;
pub use indexing::{ExchangeType, IdMapping, MISSING_INDEX};
pub use loader::{MatrixData, PackageData, PackagesDataLoader};
pub use matrix::{DokMatrix, LcaContext, LcaMatrices, MatrixSink};
pub use npy::{IndexArray, RecordField, SampleArray, ScalarType};
pub use package::{Datapackage, LabelTriple, Resource, Seed};
pub use packaging::{
    create_presamples_package, MatrixMetadata, MatrixPresamples, PackageOptions,
    ParameterPresamples,
};
pub use parameters::{ParameterData, ParametersMapping};
pub use validation::validate_presamples_dirpath;
