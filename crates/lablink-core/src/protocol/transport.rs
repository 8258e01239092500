//! Transport abstraction over the physical link
//!
//! The engine talks to the instrument through the [`Transport`] trait so the
//! transaction and session layers can be exercised against scripted
//! transports. [`SerialTransport`] is the production implementation.

use serialport::SerialPort;
use std::io::{Read, Write};
use std::time::{Duration, Instant};
use tracing::debug;

use super::serial::{self, POLL_INTERVAL};
use super::{ConnectionConfig, ProtocolError};

/// One exclusively-owned channel to the instrument.
///
/// A transport must never be accessed by more than one in-flight operation;
/// the driver issues operations strictly sequentially.
pub trait Transport: Send {
    /// Write `line` followed by a single trailing newline
    fn write_line(&mut self, line: &str) -> Result<(), ProtocolError>;

    /// Read one newline-terminated line, blocking up to `timeout`.
    ///
    /// On expiry returns whatever has accumulated, possibly empty, as `Ok` -
    /// the transaction layer treats any non-matching text uniformly as a
    /// failed response. Only hard I/O faults are errors.
    fn read_line(&mut self, timeout: Duration) -> Result<String, ProtocolError>;

    /// Discard anything buffered in either direction
    fn clear_buffers(&mut self) -> Result<(), ProtocolError>;
}

/// Blocking serial port transport
pub struct SerialTransport {
    port: Box<dyn SerialPort>,
    write_timeout: Duration,
}

impl SerialTransport {
    /// Open the configured port and clear both buffers so the logical
    /// session starts clean.
    pub fn open(config: &ConnectionConfig) -> Result<Self, ProtocolError> {
        let mut port = serial::open_port(config)?;
        serial::clear_buffers(port.as_mut())?;
        Ok(Self {
            port,
            write_timeout: config.write_timeout,
        })
    }
}

impl Transport for SerialTransport {
    fn write_line(&mut self, line: &str) -> Result<(), ProtocolError> {
        // serialport shares one handle timeout across reads and writes; widen
        // it for the write, then pin it back to the read poll interval.
        self.port
            .set_timeout(self.write_timeout)
            .map_err(|e| ProtocolError::Serial(e.to_string()))?;
        let framed = format!("{line}\n");
        let outcome = self
            .port
            .write_all(framed.as_bytes())
            .and_then(|()| self.port.flush());
        self.port
            .set_timeout(POLL_INTERVAL)
            .map_err(|e| ProtocolError::Serial(e.to_string()))?;
        outcome.map_err(|e| ProtocolError::Serial(e.to_string()))?;
        debug!(line, "wrote command line");
        Ok(())
    }

    fn read_line(&mut self, timeout: Duration) -> Result<String, ProtocolError> {
        let deadline = Instant::now() + timeout;
        let mut buffer = [0u8; 1];
        let mut line = String::new();

        while Instant::now() < deadline {
            match self.port.read(&mut buffer) {
                Ok(0) => break,
                Ok(_) => {
                    let ch = buffer[0] as char;
                    if ch == '\n' {
                        debug!(line = line.as_str(), "read response line");
                        return Ok(line);
                    }
                    line.push(ch);
                }
                Err(ref e)
                    if e.kind() == std::io::ErrorKind::TimedOut
                        || e.kind() == std::io::ErrorKind::WouldBlock =>
                {
                    // Poll interval elapsed without data; keep waiting until
                    // the caller's deadline.
                }
                Err(e) => return Err(ProtocolError::Serial(e.to_string())),
            }
        }

        debug!(
            line = line.as_str(),
            timeout_ms = timeout.as_millis() as u64,
            "read deadline expired"
        );
        Ok(line)
    }

    fn clear_buffers(&mut self) -> Result<(), ProtocolError> {
        serial::clear_buffers(self.port.as_mut())
    }
}
