use log::{info, warn};

use crate::{
    field::{ColorBounds, DenseField},
    reading::ParseError,
};

/// Receives everything the session wants shown.
pub trait Presenter {
    /// A fresh field with the raw-reading colour bounds of its frame.
    fn render(&mut self, field: &DenseField, bounds: ColorBounds);

    fn report_status(&mut self, status: &str);

    /// Diagnostic channel for lines that failed to parse; kept apart from
    /// status so a noisy link does not drown the state display.
    fn report_rejected(&mut self, line: &str, error: &ParseError) {
        warn!("Rejected line {line:?}: {error}");
    }
}

impl<P: Presenter + ?Sized> Presenter for Box<P> {
    fn render(&mut self, field: &DenseField, bounds: ColorBounds) {
        (**self).render(field, bounds)
    }

    fn report_status(&mut self, status: &str) {
        (**self).report_status(status)
    }

    fn report_rejected(&mut self, line: &str, error: &ParseError) {
        (**self).report_rejected(line, error)
    }
}

/// Headless presenter that writes frames and status to the log.
#[derive(Debug, Default)]
pub struct LogPresenter {
    frames: usize,
    last_status: Option<String>,
}

impl LogPresenter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Presenter for LogPresenter {
    fn render(&mut self, field: &DenseField, bounds: ColorBounds) {
        self.frames += 1;
        let (lo, hi) = field.extrema().unwrap_or((f64::NAN, f64::NAN));
        info!(
            "Frame {}: {}x{} field, {} defined cells, colour range {:.2}..{:.2} ohm·m \
             (interpolated {:.2}..{:.2})",
            self.frames,
            field.rows(),
            field.cols(),
            field.defined_count(),
            bounds.min,
            bounds.max,
            lo,
            hi
        );
    }

    fn report_status(&mut self, status: &str) {
        // Streaming status changes every frame; only log transitions.
        if self.last_status.as_deref() != Some(status) {
            info!("Status: {status}");
            self.last_status = Some(status.to_string());
        }
    }
}

/// The most recently rendered field and the bounds it was drawn with.
#[derive(Debug, Clone)]
pub struct Frame {
    pub field: DenseField,
    pub bounds: ColorBounds,
    /// 1-based history index of the reading this frame came from.
    pub reading_index: usize,
}
