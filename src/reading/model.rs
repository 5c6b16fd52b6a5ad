use std::{fmt, sync::Arc};

use crate::config::ArrayConfig;

use super::parser::ParseError;

/// One sweep of apparent resistivities (ohm·m), shallowest level first.
///
/// Values are finite. Cloning shares the underlying buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    values: Arc<[f64]>,
}

impl Reading {
    pub(crate) fn from_validated(values: Vec<f64>) -> Self {
        Self {
            values: values.into(),
        }
    }

    /// Validates length and finiteness the same way [`super::parse`] does.
    pub fn try_new(values: Vec<f64>, config: &ArrayConfig) -> Result<Self, ParseError> {
        if values.len() != config.total_readings() {
            return Err(ParseError::LengthMismatch {
                expected: config.total_readings(),
                actual: values.len(),
            });
        }
        if let Some(index) = values.iter().position(|v| !v.is_finite()) {
            return Err(ParseError::NonNumericElement {
                index,
                token: format!("{:?}", values[index]),
            });
        }
        Ok(Self::from_validated(values))
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Raw minimum and maximum, `None` for an empty reading.
    pub fn extrema(&self) -> Option<(f64, f64)> {
        let mut iter = self.values.iter().copied();
        let first = iter.next()?;
        Some(iter.fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v))))
    }

    /// The sub-slice belonging to depth `level`, clipped at the reading's end.
    pub fn level<'a>(&'a self, config: &ArrayConfig, level: usize) -> &'a [f64] {
        let Some(&width) = config.level_widths().get(level) else {
            return &[];
        };
        let start = config.level_offsets()[level].min(self.values.len());
        let end = (start + width).min(self.values.len());
        &self.values[start..end]
    }
}

/// Same literal-list form the instrument sends, e.g. `[29.3, 219.78, 5.0]`.
impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, value) in self.values.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            // Debug keeps the shortest round-trip form and the trailing `.0`.
            write!(f, "{value:?}")?;
        }
        f.write_str("]")
    }
}
