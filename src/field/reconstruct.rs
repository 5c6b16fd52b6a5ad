use ndarray::Array2;
use serde::Serialize;

use crate::{
    config::Resolution,
    layout::{MissingMask, SparseGrid},
    reading::Reading,
};

use super::{clough_tocher::CloughTocher, delaunay::Triangulation, FieldError};

/// Fewest present samples a cubic scattered fit is attempted with.
pub const MIN_SAMPLES: usize = 4;

/// Dense raster over `[0, depth_levels - 1] × [0, grid_width - 1]`.
///
/// Cells outside the convex hull of the samples hold `NaN`.
#[derive(Debug, Clone, PartialEq)]
pub struct DenseField {
    values: Array2<f64>,
    row_coords: Vec<f64>,
    col_coords: Vec<f64>,
}

impl DenseField {
    pub fn rows(&self) -> usize {
        self.values.nrows()
    }

    pub fn cols(&self) -> usize {
        self.values.ncols()
    }

    /// Interpolated value, `None` where undefined or out of range.
    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        self.values
            .get((row, col))
            .copied()
            .filter(|value| !value.is_nan())
    }

    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    /// Grid-space depth coordinate of each raster row.
    pub fn row_coords(&self) -> &[f64] {
        &self.row_coords
    }

    /// Grid-space lateral coordinate of each raster column.
    pub fn col_coords(&self) -> &[f64] {
        &self.col_coords
    }

    pub fn defined_count(&self) -> usize {
        self.values.iter().filter(|v| !v.is_nan()).count()
    }

    /// Extrema of the interpolated values; may over- or undershoot the
    /// samples.
    pub fn extrema(&self) -> Option<(f64, f64)> {
        self.values
            .iter()
            .copied()
            .filter(|v| !v.is_nan())
            .fold(None, |acc, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }
}

/// Colour-scale limits, taken from the raw reading rather than the field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ColorBounds {
    pub min: f64,
    pub max: f64,
}

impl ColorBounds {
    pub fn from_reading(reading: &Reading) -> Option<Self> {
        reading.extrema().map(|(min, max)| Self { min, max })
    }
}

/// `n` evenly spaced values over `[start, end]`.
fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (n - 1) as f64;
            (0..n)
                .map(|i| if i == n - 1 { end } else { start + step * i as f64 })
                .collect()
        }
    }
}

/// Interpolates the present cells of `grid` onto a `resolution` mesh.
///
/// Cells flagged in `mask` are ignored even if the grid holds a value for
/// them. Mesh points outside the samples' convex hull are left `NaN`.
pub fn reconstruct(
    grid: &SparseGrid,
    mask: &MissingMask,
    resolution: Resolution,
) -> Result<DenseField, FieldError> {
    let (points, values): (Vec<[f64; 2]>, Vec<f64>) = grid
        .present()
        .filter(|&(row, col, _)| !mask.is_missing(row, col))
        .map(|(row, col, value)| ([row as f64, col as f64], value))
        .unzip();

    if points.len() < MIN_SAMPLES {
        return Err(FieldError::InsufficientSamples {
            found: points.len(),
            required: MIN_SAMPLES,
        });
    }

    let interpolator = CloughTocher::new(Triangulation::new(points)?, values);

    let row_coords = linspace(0.0, grid.rows().saturating_sub(1) as f64, resolution.rows);
    let col_coords = linspace(0.0, grid.cols().saturating_sub(1) as f64, resolution.cols);

    let values = Array2::from_shape_fn((row_coords.len(), col_coords.len()), |(r, c)| {
        interpolator
            .evaluate([row_coords[r], col_coords[c]])
            .unwrap_or(f64::NAN)
    });

    Ok(DenseField {
        values,
        row_coords,
        col_coords,
    })
}
