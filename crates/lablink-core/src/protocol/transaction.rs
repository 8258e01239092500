//! Command transactions
//!
//! A transaction is one write/read/compare exchange. [`execute_with_retry`]
//! wraps it in a bounded attempt loop; retries are back-to-back by design,
//! delays exist only at session-initialization granularity.

use tracing::{debug, warn};

use super::{Command, ProtocolError, Transport};

/// Execute a single command transaction.
///
/// Writes the command line, reads one response line under the command's
/// timeout and compares it, trimmed, against the expected token with exact
/// case-sensitive equality. An empty read (timeout) is an ordinary mismatch.
pub fn execute(transport: &mut dyn Transport, command: &Command) -> Result<(), ProtocolError> {
    if command.line.contains('\n') {
        return Err(ProtocolError::InvalidCommand(command.line.clone()));
    }

    transport
        .write_line(&command.line)
        .map_err(|err| ProtocolError::WriteFailed {
            command: command.line.clone(),
            detail: err.to_string(),
        })?;

    let received = transport.read_line(command.read_timeout)?;
    let received = received.trim();
    if received == command.expected {
        debug!(command = command.line.as_str(), "command acknowledged");
        Ok(())
    } else {
        Err(ProtocolError::UnexpectedResponse {
            command: command.line.clone(),
            expected: command.expected.clone(),
            received: received.to_string(),
        })
    }
}

/// Execute a command, retrying up to `max_attempts` times.
///
/// Success short-circuits immediately. Once the budget is exhausted the last
/// failure is surfaced wrapped in [`ProtocolError::RetryExhausted`] with the
/// attempt count; non-retryable failures are surfaced unwrapped right away.
/// A `max_attempts` below 1 behaves as 1.
pub fn execute_with_retry(
    transport: &mut dyn Transport,
    command: &Command,
    max_attempts: u32,
) -> Result<(), ProtocolError> {
    let mut attempt = 0;
    loop {
        attempt += 1;
        match execute(transport, command) {
            Ok(()) => return Ok(()),
            Err(err) if !err.is_retryable() => return Err(err),
            Err(err) if attempt >= max_attempts => {
                warn!(
                    command = command.line.as_str(),
                    attempts = attempt,
                    "maximum attempts reached, giving up on command"
                );
                return Err(ProtocolError::RetryExhausted {
                    command: command.line.clone(),
                    attempts: attempt,
                    source: Box::new(err),
                });
            }
            Err(err) => {
                warn!(
                    command = command.line.as_str(),
                    attempt,
                    error = %err,
                    "command failed, retrying"
                );
            }
        }
    }
}
