use std::{fs, path::Path};

use super::{Transport, TransportError};

/// Plays back a capture file one line per poll.
///
/// Blank lines are skipped. With `loop_forever` the capture restarts from
/// the top once exhausted; otherwise the transport stays quiet.
#[derive(Debug)]
pub struct ReplayTransport {
    lines: Vec<String>,
    cursor: usize,
    loop_forever: bool,
    closed: bool,
}

impl ReplayTransport {
    pub fn open(path: &Path, loop_forever: bool) -> Result<Self, TransportError> {
        let contents = fs::read_to_string(path).map_err(|err| TransportError::Unavailable {
            target: path.display().to_string(),
            reason: err.to_string(),
        })?;
        Ok(Self::from_capture(&contents, loop_forever))
    }

    pub fn from_capture(contents: &str, loop_forever: bool) -> Self {
        let lines = contents
            .lines()
            .map(|line| line.trim_end_matches('\r'))
            .filter(|line| !line.trim().is_empty())
            .map(str::to_string)
            .collect();
        Self {
            lines,
            cursor: 0,
            loop_forever,
            closed: false,
        }
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

impl Transport for ReplayTransport {
    fn has_pending_input(&mut self) -> Result<bool, TransportError> {
        if self.closed {
            return Err(TransportError::disconnected("replay closed"));
        }
        if self.cursor >= self.lines.len() && self.loop_forever {
            self.cursor = 0;
        }
        Ok(self.cursor < self.lines.len())
    }

    fn read_line(&mut self) -> Result<String, TransportError> {
        if self.closed {
            return Err(TransportError::disconnected("replay closed"));
        }
        let line = self
            .lines
            .get(self.cursor)
            .cloned()
            .ok_or_else(|| TransportError::disconnected("replay exhausted"))?;
        self.cursor += 1;
        Ok(line)
    }

    fn close(&mut self) {
        self.closed = true;
    }
}
