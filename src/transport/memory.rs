use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use super::{Transport, TransportError};

/// One scripted transport step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scripted {
    Line(String),
    /// One poll with nothing buffered.
    Quiet,
    /// The device drops off the bus.
    Disconnect,
}

/// Scripted in-memory transport for tests and demos.
#[derive(Debug)]
pub struct MemoryTransport {
    script: VecDeque<Scripted>,
    closes: Arc<AtomicUsize>,
}

/// Observes how often a [`MemoryTransport`] was closed after it has been
/// moved into a session.
#[derive(Debug, Clone)]
pub struct CloseProbe {
    closes: Arc<AtomicUsize>,
}

impl CloseProbe {
    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.close_count() > 0
    }
}

impl MemoryTransport {
    pub fn new(script: Vec<Scripted>) -> Self {
        Self {
            script: script.into(),
            closes: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(lines.into_iter().map(|l| Scripted::Line(l.into())).collect())
    }

    pub fn with_probe(script: Vec<Scripted>) -> (Self, CloseProbe) {
        let transport = Self::new(script);
        let probe = CloseProbe {
            closes: Arc::clone(&transport.closes),
        };
        (transport, probe)
    }

    fn is_closed(&self) -> bool {
        self.closes.load(Ordering::SeqCst) > 0
    }
}

impl Transport for MemoryTransport {
    fn has_pending_input(&mut self) -> Result<bool, TransportError> {
        if self.is_closed() {
            return Err(TransportError::disconnected("transport closed"));
        }
        match self.script.front() {
            Some(Scripted::Line(_)) => Ok(true),
            Some(Scripted::Quiet) => {
                self.script.pop_front();
                Ok(false)
            }
            Some(Scripted::Disconnect) => {
                self.script.pop_front();
                Err(TransportError::disconnected("device removed"))
            }
            None => Ok(false),
        }
    }

    fn read_line(&mut self) -> Result<String, TransportError> {
        match self.script.pop_front() {
            Some(Scripted::Line(line)) => Ok(line),
            Some(Scripted::Disconnect) => Err(TransportError::disconnected("device removed")),
            _ => Err(TransportError::disconnected("read with no pending line")),
        }
    }

    fn close(&mut self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}
