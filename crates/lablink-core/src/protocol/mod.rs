//! Instrument Serial Protocol
//!
//! Implements the line-oriented command/acknowledgement protocol spoken by
//! the imaging instrument over its serial link.
//!
//! Commands are `;`-delimited ASCII lines, responses are single literal
//! tokens compared verbatim after trimming. Every exchange is bounded by a
//! timeout and a fixed retry budget so a transient fault does not abort a
//! multi-step acquisition sequence.

pub mod commands;
mod device;
mod error;
pub mod serial;
mod simulator;
mod transaction;
mod transport;

#[cfg(test)]
mod mock;

pub use commands::Command;
pub use device::{ConnectionConfig, Device, SerialTransportFactory, SessionState, TransportFactory};
pub use error::ProtocolError;
pub use simulator::Simulator;
pub use transaction::{execute, execute_with_retry};
pub use transport::{SerialTransport, Transport};

use std::time::Duration;

/// Baud rate fixed by the instrument firmware
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Default timeout when reading command responses
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(3);

/// Default timeout when writing commands
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(3);

/// Rounds of connectivity handshake attempted during initialization
pub const INITIALIZE_RETRIES: u32 = 3;

/// Delay between failed initialization rounds
pub const INITIALIZE_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Attempts per command before giving up
pub const COMMAND_MAX_ATTEMPTS: u32 = 3;

/// Timeout for the chained `AnalysisDone` confirmation line after a capture
pub const ANALYSIS_DONE_TIMEOUT: Duration = Duration::from_secs(60);
