//! Per-package sample column indexer.
//!
//! Every package owns one [`Indexer`]; all of its resources read the same
//! column so correlated presamples stay correlated.

use crate::error::{PresamplesError, Result};
use crate::package::Seed;

#[derive(Debug, Clone)]
enum Strategy {
    Random(fastrand::Rng),
    Sequential { count: usize },
}

#[derive(Debug, Clone)]
pub struct Indexer {
    ncols: usize,
    seed: Seed,
    strategy: Strategy,
    index: usize,
}

impl Indexer {
    /// Create an indexer over `ncols` columns and draw the first index
    pub fn new(ncols: usize, seed: Seed) -> Result<Self> {
        if ncols == 0 {
            return Err(PresamplesError::ShapeMismatch(
                "cannot index samples with zero columns".to_string(),
            ));
        }
        let strategy = match seed {
            Seed::Fixed(value) => Strategy::Random(fastrand::Rng::with_seed(value)),
            Seed::Unseeded => Strategy::Random(fastrand::Rng::new()),
            Seed::Sequential => Strategy::Sequential { count: 0 },
        };
        let mut indexer = Self {
            ncols,
            seed,
            strategy,
            index: 0,
        };
        indexer.advance();
        Ok(indexer)
    }

    /// Current sample column
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn ncols(&self) -> usize {
        self.ncols
    }

    pub fn seed(&self) -> Seed {
        self.seed
    }

    /// Move to the next sample column and return it
    pub fn advance(&mut self) -> usize {
        self.index = match &mut self.strategy {
            Strategy::Random(rng) => rng.usize(0..self.ncols),
            Strategy::Sequential { count } => {
                let index = *count % self.ncols;
                *count += 1;
                index
            }
        };
        self.index
    }
}

impl Iterator for Indexer {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        Some(self.advance())
    }
}
