use ndarray::Array2;

use crate::{config::ArrayConfig, reading::Reading};

use super::{MissingMask, SparseGrid};

/// Stacks each depth level under the widest one, centred.
///
/// Level `i` fills columns `[start, start + width)` of row `i` with
/// `start = (grid_width - width) / 2`. A reading shorter than the
/// configuration leaves the unfilled tail absent.
pub fn layout(reading: &Reading, config: &ArrayConfig) -> (SparseGrid, MissingMask) {
    let mut cells = Array2::from_elem((config.depth_levels(), config.grid_width()), None);
    let values = reading.values();

    for (row, (&width, offset)) in config
        .level_widths()
        .iter()
        .zip(config.level_offsets())
        .enumerate()
    {
        let start = config.level_start_column(row);
        for k in 0..width {
            if let Some(&value) = values.get(offset + k) {
                cells[(row, start + k)] = Some(value);
            }
        }
    }

    let grid = SparseGrid::from_cells(cells);
    let mask = grid.mask();
    (grid, mask)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading_for(config: &ArrayConfig) -> Reading {
        let values = (0..config.total_readings()).map(|v| v as f64 + 1.0).collect();
        Reading::try_new(values, config).unwrap()
    }

    #[test]
    fn five_level_pyramid() {
        let config = ArrayConfig::five_level();
        let (grid, mask) = layout(&reading_for(&config), &config);

        assert_eq!((grid.rows(), grid.cols()), (5, 5));
        assert_eq!(grid.present_columns(0), vec![0, 1, 2, 3, 4]);
        assert_eq!(grid.present_columns(1), vec![0, 1, 2, 3]);
        assert_eq!(grid.present_columns(2), vec![1, 2, 3]);
        assert_eq!(grid.present_columns(3), vec![1, 2]);
        assert_eq!(grid.present_columns(4), vec![2]);
        assert_eq!(grid.get(4, 2), Some(15.0));
        assert_eq!(mask.missing_count(), 25 - 15);
    }

    #[test]
    fn values_keep_reading_order_within_a_level() {
        let config = ArrayConfig::five_level();
        let (grid, _) = layout(&reading_for(&config), &config);
        assert_eq!(grid.get(1, 0), Some(6.0));
        assert_eq!(grid.get(1, 3), Some(9.0));
        assert_eq!(grid.get(2, 1), Some(10.0));
        assert_eq!(grid.get(3, 2), Some(14.0));
    }

    #[test]
    fn row_counts_and_centering_hold_for_any_config() {
        for widths in [vec![5, 4, 3, 2, 1], vec![5, 4, 3, 1], vec![7, 2], vec![1, 4, 2], vec![6]] {
            let config = ArrayConfig::new(widths).unwrap();
            let (grid, mask) = layout(&reading_for(&config), &config);
            for (row, &width) in config.level_widths().iter().enumerate() {
                let columns = grid.present_columns(row);
                let start = (config.grid_width() - width) / 2;
                assert_eq!(columns, (start..start + width).collect::<Vec<_>>());
                for col in 0..grid.cols() {
                    assert_eq!(mask.is_missing(row, col), grid.get(row, col).is_none());
                }
            }
        }
    }

    #[test]
    fn layout_is_deterministic() {
        let config = ArrayConfig::eight_electrode();
        let reading = reading_for(&config);
        assert_eq!(layout(&reading, &config), layout(&reading, &config));
    }
}
