mod array;
mod session;

pub use array::{ArrayConfig, ConfigError};
pub use session::{Resolution, SessionConfig, TransportTarget, CONFIG_PATH_ENV, DEBUG_ENV};
