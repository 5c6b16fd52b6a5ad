mod grid;
mod mapper;

pub use grid::{MissingMask, SparseGrid};
pub use mapper::layout;
