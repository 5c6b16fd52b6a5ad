//! Acquisition state machine and its async driver.

mod controller;
mod export;
mod history;
mod presenter;
mod state;
mod stream;

pub use controller::SessionController;
pub use export::{write_field_image, write_history, ExportError};
pub use history::SessionHistory;
pub use presenter::{Frame, LogPresenter, Presenter};
pub use state::{ErrorClass, SessionState};
pub use stream::{SessionError, SessionSnapshot, StreamingSession, TickOutcome};
