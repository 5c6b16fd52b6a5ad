use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("array configuration needs at least one depth level")]
    EmptyLevels,
    #[error("depth level {level} has zero electrode pairs")]
    ZeroWidth { level: usize },
    #[error("resolution must be at least 1x1, got {rows}x{cols}")]
    EmptyResolution { rows: usize, cols: usize },
}

/// Electrode-pair counts per pseudo-depth level, shallowest first.
///
/// Levels are usually non-increasing (`[5, 4, 3, 2, 1]`), but that is only a
/// visual convention: a wider deep level simply widens the grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<usize>", into = "Vec<usize>")]
pub struct ArrayConfig {
    level_widths: Vec<usize>,
}

impl ArrayConfig {
    pub fn new(level_widths: Vec<usize>) -> Result<Self, ConfigError> {
        if level_widths.is_empty() {
            return Err(ConfigError::EmptyLevels);
        }
        if let Some(level) = level_widths.iter().position(|&w| w == 0) {
            return Err(ConfigError::ZeroWidth { level });
        }
        Ok(Self { level_widths })
    }

    /// Five pseudo-depth levels, 15 readings per sweep.
    pub fn five_level() -> Self {
        Self {
            level_widths: vec![5, 4, 3, 2, 1],
        }
    }

    /// The 8-electrode profile: four levels, 13 readings per sweep.
    pub fn eight_electrode() -> Self {
        Self {
            level_widths: vec![5, 4, 3, 1],
        }
    }

    pub fn level_widths(&self) -> &[usize] {
        &self.level_widths
    }

    pub fn total_readings(&self) -> usize {
        self.level_widths.iter().sum()
    }

    pub fn depth_levels(&self) -> usize {
        self.level_widths.len()
    }

    pub fn grid_width(&self) -> usize {
        self.level_widths.iter().copied().max().unwrap_or(0)
    }

    /// Index of each level's first value inside a flat reading.
    pub fn level_offsets(&self) -> Vec<usize> {
        self.level_widths
            .iter()
            .scan(0, |offset, &width| {
                let start = *offset;
                *offset += width;
                Some(start)
            })
            .collect()
    }

    /// First grid column occupied by `level`.
    ///
    /// Floor division, so an odd width difference leaves the extra empty
    /// column on the right.
    pub fn level_start_column(&self, level: usize) -> usize {
        let width = self.level_widths.get(level).copied().unwrap_or(0);
        (self.grid_width() - width) / 2
    }

    /// Depth-axis label; spacings are numbered from `a=2`.
    pub fn level_label(&self, level: usize) -> String {
        format!("a={}", level + 2)
    }
}

impl Default for ArrayConfig {
    fn default() -> Self {
        Self::five_level()
    }
}

impl TryFrom<Vec<usize>> for ArrayConfig {
    type Error = ConfigError;

    fn try_from(level_widths: Vec<usize>) -> Result<Self, Self::Error> {
        Self::new(level_widths)
    }
}

impl From<ArrayConfig> for Vec<usize> {
    fn from(config: ArrayConfig) -> Self {
        config.level_widths
    }
}
