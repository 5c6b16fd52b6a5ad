use std::{io::Read, time::Duration};

use serialport::{FlowControl, SerialPort};

use super::{Transport, TransportError};

const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

/// A line longer than this without a terminator is line noise.
const MAX_LINE_BYTES: usize = 16 * 1024;

/// Bytes received but not yet handed out as lines.
#[derive(Debug, Default)]
struct LineBuffer {
    bytes: Vec<u8>,
}

impl LineBuffer {
    fn extend(&mut self, chunk: &[u8]) {
        self.bytes.extend_from_slice(chunk);
        if self.bytes.len() > MAX_LINE_BYTES && !self.has_line() {
            log_warn!("Dropping {} unterminated bytes", self.bytes.len());
            self.bytes.clear();
        }
    }

    fn has_line(&self) -> bool {
        self.bytes.contains(&b'\n')
    }

    /// Next complete line without `\n` or `\r\n`. Invalid UTF-8 is replaced
    /// and left for the parser to reject.
    fn take_line(&mut self) -> Option<String> {
        let end = self.bytes.iter().position(|&b| b == b'\n')?;
        let mut line: Vec<u8> = self.bytes.drain(..=end).collect();
        line.pop();
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        Some(String::from_utf8_lossy(&line).into_owned())
    }
}

/// A serial device producing one reading per line.
///
/// Polling only reads what the driver already holds (`bytes_to_read`), so
/// neither call waits on the wire. The port timeout bounds those reads.
pub struct SerialTransport {
    name: String,
    port: Option<Box<dyn SerialPort>>,
    buffer: LineBuffer,
}

impl SerialTransport {
    pub fn open(name: &str, baud_rate: u32, timeout: Duration) -> Result<Self, TransportError> {
        // On Windows, COM ports >= 10 need the \\.\COMxx form
        #[cfg(target_os = "windows")]
        let device = if name.starts_with("COM") && !name.starts_with(r"\\") {
            format!(r"\\.\{}", name)
        } else {
            name.to_string()
        };
        #[cfg(not(target_os = "windows"))]
        let device = name.to_string();

        let port = serialport::new(&device, baud_rate)
            .timeout(timeout)
            .flow_control(FlowControl::None)
            .open()
            .map_err(|err| TransportError::Unavailable {
                target: name.to_string(),
                reason: format!("{err} (known ports: {})", known_ports()),
            })?;

        log_info!("Opened {} at {} baud", name, baud_rate);
        Ok(Self {
            name: name.to_string(),
            port: Some(port),
            buffer: LineBuffer::default(),
        })
    }

    fn fill(&mut self) -> Result<(), TransportError> {
        let Some(port) = self.port.as_mut() else {
            return Err(TransportError::disconnected("serial port closed"));
        };
        let waiting = port
            .bytes_to_read()
            .map_err(|err| TransportError::disconnected(format!("{}: {err}", self.name)))?;
        if waiting == 0 {
            return Ok(());
        }

        let mut chunk = vec![0u8; waiting as usize];
        match port.read(&mut chunk) {
            Ok(n) => self.buffer.extend(&chunk[..n]),
            Err(err) if err.kind() == std::io::ErrorKind::TimedOut => {}
            Err(err) => {
                return Err(TransportError::disconnected(format!("{}: {err}", self.name)));
            }
        }
        Ok(())
    }
}

fn known_ports() -> String {
    match serialport::available_ports() {
        Ok(ports) if ports.is_empty() => "none".to_string(),
        Ok(ports) => ports
            .into_iter()
            .map(|port| port.port_name)
            .collect::<Vec<_>>()
            .join(", "),
        Err(_) => "unknown".to_string(),
    }
}

impl Transport for SerialTransport {
    fn has_pending_input(&mut self) -> Result<bool, TransportError> {
        if self.port.is_none() {
            return Err(TransportError::disconnected("serial port closed"));
        }
        if !self.buffer.has_line() {
            self.fill()?;
        }
        Ok(self.buffer.has_line())
    }

    fn read_line(&mut self) -> Result<String, TransportError> {
        if self.port.is_none() {
            return Err(TransportError::disconnected("serial port closed"));
        }
        self.buffer
            .take_line()
            .ok_or_else(|| TransportError::disconnected("no complete line buffered"))
    }

    fn close(&mut self) {
        if self.port.take().is_some() {
            log_info!("Closed {}", self.name);
        }
    }
}
