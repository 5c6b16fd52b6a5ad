use ndarray::Array2;

/// `depth_levels × grid_width` lattice of optional resistivities.
#[derive(Debug, Clone, PartialEq)]
pub struct SparseGrid {
    cells: Array2<Option<f64>>,
}

/// `true` where the matching [`SparseGrid`] cell is absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingMask {
    mask: Array2<bool>,
}

impl SparseGrid {
    pub(crate) fn from_cells(cells: Array2<Option<f64>>) -> Self {
        Self { cells }
    }

    pub fn rows(&self) -> usize {
        self.cells.nrows()
    }

    pub fn cols(&self) -> usize {
        self.cells.ncols()
    }

    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        self.cells.get((row, col)).copied().flatten()
    }

    /// Present cells as `(row, col, value)` in row-major order.
    pub fn present(&self) -> impl Iterator<Item = (usize, usize, f64)> + '_ {
        self.cells
            .indexed_iter()
            .filter_map(|((row, col), cell)| (*cell).map(|value| (row, col, value)))
    }

    pub fn present_columns(&self, row: usize) -> Vec<usize> {
        (0..self.cols())
            .filter(|&col| self.get(row, col).is_some())
            .collect()
    }

    pub fn mask(&self) -> MissingMask {
        MissingMask {
            mask: self.cells.map(|cell| cell.is_none()),
        }
    }
}

impl MissingMask {
    pub fn is_missing(&self, row: usize, col: usize) -> bool {
        self.mask.get((row, col)).copied().unwrap_or(true)
    }

    pub fn missing_count(&self) -> usize {
        self.mask.iter().filter(|&&missing| missing).count()
    }
}
