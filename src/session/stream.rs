use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::{
    config::{ArrayConfig, Resolution, SessionConfig, TransportTarget},
    field::{reconstruct, ColorBounds, FieldError},
    layout::layout,
    log_debug, log_error, log_info, log_warn,
    reading::{parse, ParseError},
    transport::{Transport, TransportError, TransportGuard},
};

use super::{export, ErrorClass, ExportError, Frame, Presenter, SessionHistory, SessionState};

const ENABLE_LOGS: bool = true;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("cannot {action} a session that is {from}")]
    InvalidTransition {
        from: SessionState,
        action: &'static str,
    },
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// What a single tick did.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// No transport yet.
    NotConnected,
    /// Nothing buffered on the transport.
    NoInput,
    /// A reading was accepted and a new field rendered.
    Rendered,
    /// A reading was accepted but could not be reconstructed; the previous
    /// frame stays current.
    FrameSkipped(FieldError),
    /// The line failed to parse and was dropped.
    Rejected(ParseError),
    /// The session is stopped or failed; nothing more will happen.
    Halted,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub id: Uuid,
    pub state: SessionState,
    pub target: Option<String>,
    pub accepted: usize,
    pub rejected: usize,
    pub skipped_frames: usize,
    pub last_error: Option<ErrorClass>,
    pub status: String,
    pub started_at: Option<DateTime<Utc>>,
    pub last_reading_at: Option<DateTime<Utc>>,
}

/// One acquisition run against one transport.
///
/// The session is driven by [`tick`](Self::tick) from whatever scheduler
/// owns it; it never blocks on the transport. `Stopped` and `Failed` are
/// final.
pub struct StreamingSession<T: Transport, P: Presenter> {
    id: Uuid,
    array: ArrayConfig,
    resolution: Resolution,
    state: SessionState,
    transport: TransportGuard<T>,
    target: Option<String>,
    presenter: P,
    history: SessionHistory,
    last_frame: Option<Frame>,
    rejected: usize,
    skipped_frames: usize,
    last_error: Option<ErrorClass>,
    failure: Option<String>,
    started_at: Option<DateTime<Utc>>,
    last_reading_at: Option<DateTime<Utc>>,
}

impl<T: Transport, P: Presenter> StreamingSession<T, P> {
    pub fn new(config: &SessionConfig, presenter: P) -> Self {
        Self::with_array(config.array().clone(), config.resolution(), presenter)
    }

    pub fn with_array(array: ArrayConfig, resolution: Resolution, presenter: P) -> Self {
        Self {
            id: Uuid::new_v4(),
            array,
            resolution,
            state: SessionState::Idle,
            transport: TransportGuard::empty(),
            target: None,
            presenter,
            history: SessionHistory::new(),
            last_frame: None,
            rejected: 0,
            skipped_frames: 0,
            last_error: None,
            failure: None,
            started_at: None,
            last_reading_at: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn history(&self) -> &SessionHistory {
        &self.history
    }

    pub fn last_frame(&self) -> Option<&Frame> {
        self.last_frame.as_ref()
    }

    pub fn last_error(&self) -> Option<ErrorClass> {
        self.last_error
    }

    pub fn presenter(&self) -> &P {
        &self.presenter
    }

    pub fn is_transport_held(&self) -> bool {
        self.transport.is_held()
    }

    /// Opens `target` with `open` and takes ownership of the transport.
    ///
    /// An open failure moves the session to `Failed`.
    pub fn connect<F>(&mut self, target: &TransportTarget, open: F) -> Result<(), SessionError>
    where
        F: FnOnce(&TransportTarget) -> Result<T, TransportError>,
    {
        if self.state != SessionState::Idle {
            return Err(SessionError::InvalidTransition {
                from: self.state,
                action: "connect",
            });
        }

        let identifier = target.identifier();
        self.target = Some(identifier.clone());
        match open(target) {
            Ok(transport) => {
                self.transport = TransportGuard::new(transport);
                self.state = SessionState::Connected;
                log_info!("Session {} connected to {}", self.id, identifier);
                self.publish_status();
                Ok(())
            }
            Err(err) => {
                self.fail(err.clone());
                Err(err.into())
            }
        }
    }

    /// Enters the polling regime. A no-op while already streaming.
    pub fn start(&mut self) -> Result<(), SessionError> {
        match self.state {
            SessionState::Connected => {
                self.state = SessionState::Streaming;
                self.started_at = Some(Utc::now());
                log_info!("Session {} streaming", self.id);
                self.publish_status();
                Ok(())
            }
            SessionState::Streaming => Ok(()),
            from => Err(SessionError::InvalidTransition {
                from,
                action: "start",
            }),
        }
    }

    /// One non-blocking poll: at most one line is read and processed.
    pub fn tick(&mut self) -> TickOutcome {
        match self.state {
            SessionState::Idle => return TickOutcome::NotConnected,
            SessionState::Stopped | SessionState::Failed => return TickOutcome::Halted,
            SessionState::Connected => {
                if self.start().is_err() {
                    return TickOutcome::Halted;
                }
            }
            SessionState::Streaming => {}
        }

        let polled = match self.transport.get_mut() {
            Some(transport) => match transport.has_pending_input() {
                Ok(true) => transport.read_line().map(Some),
                Ok(false) => Ok(None),
                Err(err) => Err(err),
            },
            None => Err(TransportError::disconnected("transport released")),
        };

        match polled {
            Ok(Some(line)) => self.handle_line(&line),
            Ok(None) => TickOutcome::NoInput,
            Err(err) => {
                self.fail(err);
                TickOutcome::Halted
            }
        }
    }

    fn handle_line(&mut self, line: &str) -> TickOutcome {
        let reading = match parse(line, &self.array) {
            Ok(reading) => reading,
            Err(err) => {
                self.rejected += 1;
                self.last_error = Some(ErrorClass::from(&err));
                self.presenter.report_rejected(line, &err);
                self.publish_status();
                return TickOutcome::Rejected(err);
            }
        };

        self.history.push(reading.clone());
        self.last_reading_at = Some(Utc::now());
        log_debug!("Session {} accepted reading #{}", self.id, self.history.len());
        for level in 0..self.array.depth_levels() {
            let label = self.array.level_label(level);
            log_debug!("  {}: {:?}", label, reading.level(&self.array, level));
        }

        let (grid, mask) = layout(&reading, &self.array);
        let outcome = match reconstruct(&grid, &mask, self.resolution) {
            Ok(field) => {
                let bounds = ColorBounds::from_reading(&reading).unwrap_or_default();
                self.presenter.render(&field, bounds);
                self.last_frame = Some(Frame {
                    field,
                    bounds,
                    reading_index: self.history.len(),
                });
                TickOutcome::Rendered
            }
            Err(err) => {
                log_warn!("Skipping frame for reading #{}: {}", self.history.len(), err);
                self.skipped_frames += 1;
                self.last_error = Some(ErrorClass::from(&err));
                TickOutcome::FrameSkipped(err)
            }
        };
        self.publish_status();
        outcome
    }

    /// Ends the session and releases the transport. Repeated calls are
    /// harmless, and a failed session stays failed.
    pub fn stop(&mut self) {
        self.transport.release();
        if self.state.is_terminal() {
            return;
        }
        self.state = SessionState::Stopped;
        log_info!(
            "Session {} stopped after {} readings",
            self.id,
            self.history.len()
        );
        self.publish_status();
    }

    fn fail(&mut self, err: TransportError) {
        log_error!("Session {} failed: {}", self.id, err);
        self.transport.release();
        self.last_error = Some(ErrorClass::from(&err));
        self.failure = Some(err.to_string());
        self.state = SessionState::Failed;
        self.publish_status();
    }

    fn publish_status(&mut self) {
        let status = self.status_text();
        self.presenter.report_status(&status);
    }

    pub fn status_text(&self) -> String {
        let base = match self.state {
            SessionState::Idle => "Idle".to_string(),
            SessionState::Connected => {
                format!("Connected to {}", self.target.as_deref().unwrap_or("transport"))
            }
            SessionState::Streaming => format!("Streaming ({} readings)", self.history.len()),
            SessionState::Stopped => "Stopped".to_string(),
            SessionState::Failed => {
                return format!("Failed: {}", self.failure.as_deref().unwrap_or("unknown error"));
            }
        };
        match self.last_error {
            Some(class) => format!("{base} - last error: {class}"),
            None => base,
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            id: self.id,
            state: self.state,
            target: self.target.clone(),
            accepted: self.history.len(),
            rejected: self.rejected,
            skipped_frames: self.skipped_frames,
            last_error: self.last_error,
            status: self.status_text(),
            started_at: self.started_at,
            last_reading_at: self.last_reading_at,
        }
    }

    /// Writes the last rendered field as a PNG. Never touches the transport.
    pub fn export_image(&mut self, path: &Path) -> Result<(u32, u32), ExportError> {
        let result = export::write_field_image(self.last_frame.as_ref(), path);
        self.note_export(&result);
        result
    }

    /// Writes the history, one reading per line. Never touches the transport.
    pub fn export_data(&mut self, path: &Path) -> Result<usize, ExportError> {
        let result = export::write_history(&self.history, path);
        self.note_export(&result);
        result
    }

    fn note_export<R>(&mut self, result: &Result<R, ExportError>) {
        if let Err(ExportError::NoDataYet) = result {
            self.last_error = Some(ErrorClass::NoDataYet);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        field::DenseField,
        transport::{MemoryTransport, Scripted},
    };

    const SAPI_LINE: &str = "[29.30, 219.78, 103.05, 119.17, 118.19, 41.03, 222.22, \
                             256.41, 147.99, 215.87, 305.74, 278.39, 306.23, 333.09, 474.24]";

    #[derive(Default)]
    struct Recorder {
        frames: Vec<ColorBounds>,
        statuses: Vec<String>,
        rejected: Vec<String>,
    }

    impl Presenter for Recorder {
        fn render(&mut self, _field: &DenseField, bounds: ColorBounds) {
            self.frames.push(bounds);
        }

        fn report_status(&mut self, status: &str) {
            self.statuses.push(status.to_string());
        }

        fn report_rejected(&mut self, line: &str, _error: &ParseError) {
            self.rejected.push(line.to_string());
        }
    }

    fn session(script: Vec<Scripted>) -> StreamingSession<MemoryTransport, Recorder> {
        let mut session = StreamingSession::with_array(
            ArrayConfig::five_level(),
            Resolution::new(20, 20),
            Recorder::default(),
        );
        session
            .connect(&TransportTarget::default(), |_| Ok(MemoryTransport::new(script)))
            .unwrap();
        session
    }

    #[test]
    fn starts_idle() {
        let mut session: StreamingSession<MemoryTransport, Recorder> = StreamingSession::with_array(
            ArrayConfig::five_level(),
            Resolution::new(5, 5),
            Recorder::default(),
        );
        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(session.status_text(), "Idle");
        assert_eq!(session.tick(), TickOutcome::NotConnected);
    }

    #[test]
    fn connect_then_tick_auto_starts() {
        let mut session = session(vec![Scripted::Line(SAPI_LINE.into())]);
        assert_eq!(session.state(), SessionState::Connected);
        assert_eq!(session.status_text(), "Connected to simulated");
        assert_eq!(session.tick(), TickOutcome::Rendered);
        assert_eq!(session.state(), SessionState::Streaming);
        assert_eq!(session.presenter().frames, vec![ColorBounds { min: 29.30, max: 474.24 }]);
        assert_eq!(session.last_frame().unwrap().reading_index, 1);
        assert_eq!(session.status_text(), "Streaming (1 readings)");
    }

    #[test]
    fn malformed_lines_are_contained() {
        let mut session = session(vec![
            Scripted::Line("[not, a, list".into()),
            Scripted::Line("[1,2,3]".into()),
            Scripted::Line(SAPI_LINE.into()),
        ]);
        assert!(matches!(
            session.tick(),
            TickOutcome::Rejected(ParseError::MalformedSyntax { .. })
        ));
        assert!(matches!(
            session.tick(),
            TickOutcome::Rejected(ParseError::LengthMismatch { .. })
        ));
        assert_eq!(
            session.status_text(),
            "Streaming (0 readings) - last error: length mismatch"
        );
        assert_eq!(session.tick(), TickOutcome::Rendered);
        assert_eq!(session.presenter().rejected.len(), 2);
        assert_eq!(session.snapshot().rejected, 2);
        assert_eq!(session.snapshot().accepted, 1);
    }

    #[test]
    fn quiet_transport_yields_no_input() {
        let mut session = session(vec![Scripted::Quiet]);
        assert_eq!(session.tick(), TickOutcome::NoInput);
        assert_eq!(session.tick(), TickOutcome::NoInput);
        assert_eq!(session.state(), SessionState::Streaming);
    }

    #[test]
    fn disconnect_fails_and_halts() {
        let mut session = session(vec![Scripted::Line(SAPI_LINE.into()), Scripted::Disconnect]);
        assert_eq!(session.tick(), TickOutcome::Rendered);
        assert_eq!(session.tick(), TickOutcome::Halted);
        assert_eq!(session.state(), SessionState::Failed);
        assert!(!session.is_transport_held());
        assert_eq!(session.last_error(), Some(ErrorClass::TransportDisconnected));
        assert!(session.status_text().starts_with("Failed: "));
        assert_eq!(session.tick(), TickOutcome::Halted);
        // History and frame survive the failure.
        assert_eq!(session.history().len(), 1);
        assert!(session.last_frame().is_some());
    }

    #[test]
    fn failed_open_moves_to_failed() {
        let mut session: StreamingSession<MemoryTransport, Recorder> = StreamingSession::with_array(
            ArrayConfig::five_level(),
            Resolution::new(5, 5),
            Recorder::default(),
        );
        let err = session
            .connect(&TransportTarget::default(), |_| {
                Err(TransportError::Unavailable {
                    target: "COM9".into(),
                    reason: "busy".into(),
                })
            })
            .unwrap_err();
        assert!(matches!(err, SessionError::Transport(TransportError::Unavailable { .. })));
        assert_eq!(session.state(), SessionState::Failed);
        assert_eq!(session.last_error(), Some(ErrorClass::TransportUnavailable));
        assert_eq!(session.tick(), TickOutcome::Halted);
    }

    #[test]
    fn terminal_states_reject_transitions() {
        let mut session = session(vec![]);
        session.stop();
        assert_eq!(session.state(), SessionState::Stopped);
        assert_eq!(
            session.start(),
            Err(SessionError::InvalidTransition {
                from: SessionState::Stopped,
                action: "start"
            })
        );
        assert!(matches!(
            session.connect(&TransportTarget::default(), |_| Ok(MemoryTransport::new(vec![]))),
            Err(SessionError::InvalidTransition { .. })
        ));
        session.stop();
        assert_eq!(session.state(), SessionState::Stopped);
    }

    #[test]
    fn stop_after_failure_stays_failed() {
        let mut session = session(vec![Scripted::Disconnect]);
        assert_eq!(session.tick(), TickOutcome::Halted);
        session.stop();
        assert_eq!(session.state(), SessionState::Failed);
    }

    #[test]
    fn field_errors_skip_only_the_frame() {
        let mut session = StreamingSession::with_array(
            ArrayConfig::new(vec![3, 1]).unwrap(),
            Resolution::new(5, 5),
            Recorder::default(),
        );
        session
            .connect(&TransportTarget::default(), |_| {
                Ok(MemoryTransport::from_lines(["[1, 2, 3, 4]"]))
            })
            .unwrap();
        assert_eq!(session.tick(), TickOutcome::Rendered);

        let mut too_small = StreamingSession::with_array(
            ArrayConfig::new(vec![2, 1]).unwrap(),
            Resolution::new(5, 5),
            Recorder::default(),
        );
        too_small
            .connect(&TransportTarget::default(), |_| {
                Ok(MemoryTransport::from_lines(["[1, 2, 3]"]))
            })
            .unwrap();
        assert!(matches!(
            too_small.tick(),
            TickOutcome::FrameSkipped(FieldError::InsufficientSamples { .. })
        ));
        assert_eq!(too_small.history().len(), 1);
        assert!(too_small.last_frame().is_none());
        assert_eq!(too_small.last_error(), Some(ErrorClass::InsufficientSamples));
    }

    #[test]
    fn export_without_data_is_no_data_yet() {
        let mut session = session(vec![]);
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            session.export_data(&dir.path().join("data.txt")),
            Err(ExportError::NoDataYet)
        ));
        assert!(matches!(
            session.export_image(&dir.path().join("field.png")),
            Err(ExportError::NoDataYet)
        ));
        assert_eq!(session.last_error(), Some(ErrorClass::NoDataYet));
        assert_eq!(session.state(), SessionState::Connected);
    }

    #[test]
    fn snapshot_serializes_camel_case() {
        let mut session = session(vec![Scripted::Line(SAPI_LINE.into())]);
        session.tick();
        let json = serde_json::to_value(session.snapshot()).unwrap();
        assert_eq!(json["state"], "streaming");
        assert_eq!(json["accepted"], 1);
        assert!(json["startedAt"].is_string());
        assert!(json["lastReadingAt"].is_string());
        assert!(json["lastError"].is_null());
    }
}
