//! Line transports feeding the streaming session.
//!
//! The session only ever asks two things of a transport: is a line waiting,
//! and give me that line. Both are non-blocking, so a poll never stalls the
//! tick loop.

mod memory;
mod replay;
mod serial;
mod simulated;

use thiserror::Error;

use crate::config::{SessionConfig, TransportTarget};

pub use memory::{CloseProbe, MemoryTransport, Scripted};
pub use replay::ReplayTransport;
pub use serial::SerialTransport;
pub use simulated::SimulatedTransport;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("cannot open {target}: {reason}")]
    Unavailable { target: String, reason: String },
    #[error("transport disconnected: {reason}")]
    Disconnected { reason: String },
}

impl TransportError {
    pub fn disconnected(reason: impl Into<String>) -> Self {
        TransportError::Disconnected {
            reason: reason.into(),
        }
    }
}

/// An opened, exclusively owned input stream of text lines.
pub trait Transport {
    /// Whether a complete line can be read without waiting.
    fn has_pending_input(&mut self) -> Result<bool, TransportError>;

    /// Next line, without its terminator.
    ///
    /// Only called after `has_pending_input` returned `true`.
    fn read_line(&mut self) -> Result<String, TransportError>;

    /// Releases the underlying resource. Must be idempotent.
    fn close(&mut self);
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn has_pending_input(&mut self) -> Result<bool, TransportError> {
        (**self).has_pending_input()
    }

    fn read_line(&mut self) -> Result<String, TransportError> {
        (**self).read_line()
    }

    fn close(&mut self) {
        (**self).close()
    }
}

/// Owns a transport and closes it exactly once: on [`release`](Self::release)
/// or on drop, whichever comes first.
pub struct TransportGuard<T: Transport> {
    inner: Option<T>,
}

impl<T: Transport> TransportGuard<T> {
    pub fn empty() -> Self {
        Self { inner: None }
    }

    pub fn new(transport: T) -> Self {
        Self {
            inner: Some(transport),
        }
    }

    pub fn get_mut(&mut self) -> Option<&mut T> {
        self.inner.as_mut()
    }

    pub fn is_held(&self) -> bool {
        self.inner.is_some()
    }

    pub fn release(&mut self) {
        if let Some(mut transport) = self.inner.take() {
            transport.close();
        }
    }
}

impl<T: Transport> Drop for TransportGuard<T> {
    fn drop(&mut self) {
        self.release();
    }
}

pub type BoxedTransport = Box<dyn Transport + Send>;

/// Opens the transport named by `target` with the array, baud rate and
/// connect timeout of `config`.
pub fn open(
    target: &TransportTarget,
    config: &SessionConfig,
) -> Result<BoxedTransport, TransportError> {
    match target {
        TransportTarget::Replay { path, loop_forever } => {
            Ok(Box::new(ReplayTransport::open(path, *loop_forever)?))
        }
        TransportTarget::Simulated {
            seed,
            every_ticks,
            glitch_rate,
        } => Ok(Box::new(SimulatedTransport::new(
            config.array().clone(),
            *seed,
            *every_ticks,
            *glitch_rate,
        ))),
        TransportTarget::Port { name } => Ok(Box::new(SerialTransport::open(
            name,
            config.baud_rate,
            config.connect_timeout(),
        )?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_closes_once_on_release_and_drop() {
        let (transport, probe) = MemoryTransport::with_probe(vec![]);
        let mut guard = TransportGuard::new(transport);
        assert!(guard.is_held());
        guard.release();
        assert_eq!(probe.close_count(), 1);
        drop(guard);
        assert_eq!(probe.close_count(), 1);
    }

    #[test]
    fn guard_closes_on_drop() {
        let (transport, probe) = MemoryTransport::with_probe(vec![]);
        {
            let _guard = TransportGuard::new(transport);
        }
        assert_eq!(probe.close_count(), 1);
    }

    #[test]
    fn missing_serial_device_is_unavailable() {
        let target = TransportTarget::Port {
            name: "/dev/wennerviz-absent".to_string(),
        };
        match open(&target, &SessionConfig::default()) {
            Err(TransportError::Unavailable { target, .. }) => {
                assert_eq!(target, "/dev/wennerviz-absent")
            }
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("absent device opened"),
        }
    }

    #[test]
    fn missing_replay_file_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let target = TransportTarget::Replay {
            path: dir.path().join("nope.txt"),
            loop_forever: false,
        };
        assert!(matches!(
            open(&target, &SessionConfig::default()),
            Err(TransportError::Unavailable { .. })
        ));
    }
}
