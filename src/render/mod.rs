//! Raster export of a reconstructed field.
//!
//! Colours follow a log-normalised jet ramp between the bounds the session
//! hands over. Undefined cells are transparent.

use anyhow::Result;
use image::{ImageFormat, Rgba, RgbaImage};
use std::path::Path;

use crate::field::{ColorBounds, DenseField};

/// Long side of an exported image, in pixels, before rounding.
const MIN_LONG_SIDE_PX: usize = 400;

/// Floor applied to bounds before taking logarithms.
const LOG_FLOOR: f64 = 1e-3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LogNorm {
    log_min: f64,
    log_max: f64,
}

impl LogNorm {
    /// Clamps non-positive bounds and widens a zero span by a decade.
    pub fn new(bounds: ColorBounds) -> Self {
        let min = bounds.min.max(LOG_FLOOR);
        let max = bounds.max.max(min);
        let (log_min, mut log_max) = (min.log10(), max.log10());
        if log_max - log_min < f64::EPSILON {
            log_max = log_min + 1.0;
        }
        Self { log_min, log_max }
    }

    /// Position of `value` on `[0, 1]`, clamped.
    pub fn normalize(&self, value: f64) -> f64 {
        let t = (value.max(LOG_FLOOR).log10() - self.log_min) / (self.log_max - self.log_min);
        t.clamp(0.0, 1.0)
    }
}

/// Jet colour ramp, blue through cyan, yellow and red.
pub fn jet(t: f64) -> [u8; 3] {
    let channel = |center: f64| {
        let v = (1.5 - (4.0 * t - center).abs()).clamp(0.0, 1.0);
        (v * 255.0).round() as u8
    };
    [channel(3.0), channel(2.0), channel(1.0)]
}

/// Renders `field` with each cell scaled up to a block of pixels.
pub fn colorize(field: &DenseField, bounds: ColorBounds) -> RgbaImage {
    let norm = LogNorm::new(bounds);
    let long_side = field.rows().max(field.cols()).max(1);
    let scale = MIN_LONG_SIDE_PX.div_ceil(long_side).max(1);

    let width = (field.cols() * scale) as u32;
    let height = (field.rows() * scale) as u32;
    RgbaImage::from_fn(width, height, |x, y| {
        let (row, col) = (y as usize / scale, x as usize / scale);
        match field.get(row, col) {
            Some(value) => {
                let [r, g, b] = jet(norm.normalize(value));
                Rgba([r, g, b, 255])
            }
            None => Rgba([0, 0, 0, 0]),
        }
    })
}

pub fn save_png(image: &RgbaImage, path: &Path) -> Result<(), image::ImageError> {
    image.save_with_format(path, ImageFormat::Png)
}

/// Decoded size of a PNG written by [`save_png`].
pub fn png_dimensions(path: &Path) -> Result<(u32, u32)> {
    let img = image::open(path)?;
    Ok((img.width(), img.height()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::{ArrayConfig, Resolution},
        field::reconstruct,
        layout::layout,
        reading::Reading,
    };

    fn field() -> (DenseField, ColorBounds) {
        let config = ArrayConfig::five_level();
        let values = (1..=15).map(|v| v as f64 * 20.0).collect();
        let reading = Reading::try_new(values, &config).unwrap();
        let (grid, mask) = layout(&reading, &config);
        let field = reconstruct(&grid, &mask, Resolution::new(50, 50)).unwrap();
        (field, ColorBounds::from_reading(&reading).unwrap())
    }

    #[test]
    fn jet_endpoints() {
        assert_eq!(jet(0.0), [0, 0, 128]);
        assert_eq!(jet(0.5), [128, 255, 128]);
        assert_eq!(jet(1.0), [128, 0, 0]);
    }

    #[test]
    fn log_norm_maps_bounds_to_unit_interval() {
        let norm = LogNorm::new(ColorBounds { min: 10.0, max: 1000.0 });
        assert_eq!(norm.normalize(10.0), 0.0);
        assert!((norm.normalize(100.0) - 0.5).abs() < 1e-12);
        assert_eq!(norm.normalize(1000.0), 1.0);
        assert_eq!(norm.normalize(5000.0), 1.0);
    }

    #[test]
    fn log_norm_survives_flat_and_negative_bounds() {
        let flat = LogNorm::new(ColorBounds { min: 50.0, max: 50.0 });
        assert_eq!(flat.normalize(50.0), 0.0);
        let negative = LogNorm::new(ColorBounds { min: -5.0, max: -1.0 });
        assert!(negative.normalize(1.0).is_finite());
    }

    #[test]
    fn undefined_cells_are_transparent() {
        let (field, bounds) = field();
        let image = colorize(&field, bounds);
        assert_eq!(image.dimensions(), (400, 400));
        // Bottom-right corner lies outside the sample pyramid.
        assert_eq!(image.get_pixel(399, 399)[3], 0);
        assert_eq!(image.get_pixel(0, 0)[3], 255);
    }

    #[test]
    fn png_round_trip() {
        let (field, bounds) = field();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("field.png");
        save_png(&colorize(&field, bounds), &path).unwrap();
        assert_eq!(png_dimensions(&path).unwrap(), (400, 400));
    }
}
