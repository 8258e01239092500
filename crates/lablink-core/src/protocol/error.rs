//! Protocol errors

use thiserror::Error;

/// Errors that can occur while driving the instrument
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// The serial port could not be opened
    #[error("Failed to open serial port {port}: {detail}")]
    ConnectionFailed {
        /// Port the open was attempted on
        port: String,
        /// Underlying failure description
        detail: String,
    },

    /// The connectivity handshake never succeeded within the retry budget
    #[error("Failed to connect to the instrument after {rounds} initialization rounds")]
    HandshakeFailed {
        /// Initialization rounds performed before giving up
        rounds: u32,
    },

    /// An operation was issued while the session is not ready
    #[error("Not connected to the instrument")]
    NotConnected,

    /// Writing the command line failed
    #[error("Failed to send command {command}: {detail}")]
    WriteFailed {
        /// Command line that could not be sent
        command: String,
        /// Underlying failure description
        detail: String,
    },

    /// The response did not match the expected token.
    ///
    /// A read timeout yields an empty `received` text; a wrong or garbled
    /// token is not distinguished from it.
    #[error("Unexpected response to command {command}: expected {expected:?}, received {received:?}")]
    UnexpectedResponse {
        /// Command line the response belongs to
        command: String,
        /// Token the instrument was expected to answer
        expected: String,
        /// Text actually received, trimmed, possibly empty
        received: String,
    },

    /// Every attempt of a command failed
    #[error("Giving up on command {command} after {attempts} attempts: {source}")]
    RetryExhausted {
        /// Command line that was retried
        command: String,
        /// Attempts performed
        attempts: u32,
        /// Failure of the final attempt
        #[source]
        source: Box<ProtocolError>,
    },

    /// The command line contains an embedded newline
    #[error("Command contains an embedded newline: {0:?}")]
    InvalidCommand(String),

    /// Serial port error below the framing layer
    #[error("Serial port error: {0}")]
    Serial(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProtocolError {
    /// Whether a failed command attempt may be retried.
    ///
    /// Write failures, mismatched (or timed-out) responses and transient
    /// serial faults are retryable; session-fatal kinds must be surfaced to
    /// the caller instead.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProtocolError::WriteFailed { .. }
                | ProtocolError::UnexpectedResponse { .. }
                | ProtocolError::Serial(_)
                | ProtocolError::Io(_)
        )
    }
}
