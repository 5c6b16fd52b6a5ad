//! Scattered-to-dense reconstruction of a sparse resistivity grid.

mod clough_tocher;
mod delaunay;
mod reconstruct;

use thiserror::Error;

pub use reconstruct::{reconstruct, ColorBounds, DenseField, MIN_SAMPLES};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldError {
    #[error("only {found} samples present, need at least {required}")]
    InsufficientSamples { found: usize, required: usize },
    #[error("all {found} samples are collinear")]
    DegenerateSamples { found: usize },
}
