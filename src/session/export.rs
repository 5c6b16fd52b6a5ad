use std::{
    fs,
    io,
    path::{Path, PathBuf},
};

use thiserror::Error;

use crate::render;

use super::{Frame, SessionHistory};

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("nothing to export: no reading has been accepted yet")]
    NoDataYet,
    #[error("failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to encode image {}: {source}", path.display())]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

/// Writes `history` one literal-list line per reading.
pub fn write_history(history: &SessionHistory, path: &Path) -> Result<usize, ExportError> {
    if history.is_empty() {
        return Err(ExportError::NoDataYet);
    }
    fs::write(path, history.to_text()).map_err(|source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(history.len())
}

/// Renders `frame` to a PNG at `path`.
pub fn write_field_image(frame: Option<&Frame>, path: &Path) -> Result<(u32, u32), ExportError> {
    let frame = frame.ok_or(ExportError::NoDataYet)?;
    let image = render::colorize(&frame.field, frame.bounds);
    render::save_png(&image, path).map_err(|source| ExportError::Image {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(image.dimensions())
}
