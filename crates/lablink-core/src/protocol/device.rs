//! Session lifecycle and the device facade
//!
//! Handles session initialization (open, buffer clear, connectivity
//! handshake with bounded retry rounds) and exposes the acquisition
//! operations, each a single retry-wrapped command transaction.

use serde::{Deserialize, Serialize};
use std::thread;
use std::time::Duration;
use tracing::{info, warn};

use super::transport::SerialTransport;
use super::{
    commands, transaction, ProtocolError, Transport, ANALYSIS_DONE_TIMEOUT, COMMAND_MAX_ATTEMPTS,
    DEFAULT_BAUD_RATE, DEFAULT_READ_TIMEOUT, DEFAULT_WRITE_TIMEOUT, INITIALIZE_RETRIES,
    INITIALIZE_RETRY_DELAY,
};

/// Connection configuration.
///
/// Immutable after construction and passed explicitly into the device; there
/// is no ambient configuration state. The serial framing must match the
/// instrument firmware exactly and is not negotiable at runtime.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Serial port name (e.g. "COM1" or "/dev/ttyUSB0")
    pub port_name: String,
    /// Baud rate
    pub baud_rate: u32,
    /// Data bits per character
    pub data_bits: serialport::DataBits,
    /// Parity checking mode
    pub parity: serialport::Parity,
    /// Stop bits
    pub stop_bits: serialport::StopBits,
    /// Default timeout when reading command responses
    pub read_timeout: Duration,
    /// Timeout when writing commands
    pub write_timeout: Duration,
    /// Rounds of connectivity handshake during initialization
    pub init_retries: u32,
    /// Delay between failed initialization rounds
    pub init_retry_delay: Duration,
    /// Attempts per command before giving up
    pub command_max_attempts: u32,
    /// Also require the `ReadyForNextSample` handshake during initialization
    /// (firmware variant)
    pub require_ready_probe: bool,
    /// Expect a chained `AnalysisDone` line after `CaptureOK` (firmware
    /// variant)
    pub chained_analysis_confirmation: bool,
    /// Timeout for the chained `AnalysisDone` line
    pub analysis_done_timeout: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            port_name: String::new(),
            baud_rate: DEFAULT_BAUD_RATE,
            data_bits: serialport::DataBits::Seven,
            parity: serialport::Parity::Even,
            stop_bits: serialport::StopBits::One,
            read_timeout: DEFAULT_READ_TIMEOUT,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            init_retries: INITIALIZE_RETRIES,
            init_retry_delay: INITIALIZE_RETRY_DELAY,
            command_max_attempts: COMMAND_MAX_ATTEMPTS,
            require_ready_probe: false,
            chained_analysis_confirmation: false,
            analysis_done_timeout: ANALYSIS_DONE_TIMEOUT,
        }
    }
}

/// Session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    /// No transport open yet
    Unconnected,
    /// Opening the serial port
    Opening,
    /// Port open, connectivity handshake in progress
    ProbingConnectivity,
    /// Handshake succeeded, operations may be issued
    Ready,
    /// Initialization exhausted its retry budget; the device is unusable
    /// until reconstructed and reinitialized
    Failed,
}

/// Opens transports for a device.
///
/// The seam exists so session initialization can be exercised against stub
/// transports; production code uses [`SerialTransportFactory`].
pub trait TransportFactory: Send {
    /// Open a fresh transport per the configuration, buffers cleared
    fn open(&mut self, config: &ConnectionConfig) -> Result<Box<dyn Transport>, ProtocolError>;
}

/// Factory producing real serial transports
pub struct SerialTransportFactory;

impl TransportFactory for SerialTransportFactory {
    fn open(&mut self, config: &ConnectionConfig) -> Result<Box<dyn Transport>, ProtocolError> {
        Ok(Box::new(SerialTransport::open(config)?))
    }
}

/// High-level driver for the imaging instrument.
///
/// Owns one exclusive transport; operations are strictly sequential. A
/// multi-worker host must serialize access externally, one owning task per
/// physical instrument.
pub struct Device {
    config: ConnectionConfig,
    factory: Box<dyn TransportFactory>,
    transport: Option<Box<dyn Transport>>,
    state: SessionState,
}

impl Device {
    /// Create a device driving a real serial port (not yet initialized)
    pub fn new(config: ConnectionConfig) -> Self {
        Self::with_factory(config, Box::new(SerialTransportFactory))
    }

    /// Create a device with a custom transport factory
    pub fn with_factory(config: ConnectionConfig, factory: Box<dyn TransportFactory>) -> Self {
        Self {
            config,
            factory,
            transport: None,
            state: SessionState::Unconnected,
        }
    }

    /// Current session state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The configuration the device was constructed with
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Open the transport and run the connectivity handshake.
    ///
    /// Up to `init_retries` rounds are attempted, sleeping `init_retry_delay`
    /// between rounds. A round that fails to open counts against the budget
    /// like a failed handshake. Exhaustion leaves the device in
    /// [`SessionState::Failed`]; no operations may be issued afterwards.
    pub fn initialize(&mut self) -> Result<(), ProtocolError> {
        let budget = self.config.init_retries.max(1);
        let mut rounds = 0;
        while rounds < budget {
            rounds += 1;
            match self.handshake_round() {
                Ok(()) => {
                    info!(rounds, port = self.config.port_name.as_str(), "instrument session ready");
                    self.state = SessionState::Ready;
                    return Ok(());
                }
                Err(err) => {
                    warn!(
                        round = rounds,
                        error = %err,
                        "failed to connect to the instrument"
                    );
                    // Drop the transport so the next round reopens from scratch.
                    self.transport = None;
                    if rounds < budget {
                        thread::sleep(self.config.init_retry_delay);
                    }
                }
            }
        }
        self.state = SessionState::Failed;
        Err(ProtocolError::HandshakeFailed { rounds })
    }

    fn handshake_round(&mut self) -> Result<(), ProtocolError> {
        if self.transport.is_none() {
            self.state = SessionState::Opening;
            self.transport = Some(self.factory.open(&self.config)?);
        }
        self.state = SessionState::ProbingConnectivity;

        let attempts = self.config.command_max_attempts;
        let read_timeout = self.config.read_timeout;
        let require_ready = self.config.require_ready_probe;
        let transport = self
            .transport
            .as_deref_mut()
            .ok_or(ProtocolError::NotConnected)?;

        transaction::execute_with_retry(
            transport,
            &commands::check_connection(read_timeout),
            attempts,
        )?;
        if require_ready {
            transaction::execute_with_retry(
                transport,
                &commands::ready_for_next_sample(read_timeout),
                attempts,
            )?;
        }
        Ok(())
    }

    fn run(&mut self, command: commands::Command) -> Result<(), ProtocolError> {
        if self.state != SessionState::Ready {
            return Err(ProtocolError::NotConnected);
        }
        let attempts = self.config.command_max_attempts;
        let transport = self
            .transport
            .as_deref_mut()
            .ok_or(ProtocolError::NotConnected)?;
        transaction::execute_with_retry(transport, &command, attempts)
    }

    /// Capture an image.
    ///
    /// `timeout_secs` bounds how long the instrument may take to acknowledge
    /// with `CaptureOK`. In the chained-confirmation variant one extra
    /// `AnalysisDone` line is read afterwards; it is not retried, since a
    /// retry would resend the capture.
    pub fn capture_image(
        &mut self,
        sample_id: &str,
        initials: &str,
        comments: &str,
        suffix_by_timestamp: bool,
        timeout_secs: u64,
    ) -> Result<(), ProtocolError> {
        self.run(commands::capture(
            sample_id,
            initials,
            comments,
            suffix_by_timestamp,
            Duration::from_secs(timeout_secs),
        ))?;
        if self.config.chained_analysis_confirmation {
            self.confirm_analysis_done()?;
        }
        Ok(())
    }

    fn confirm_analysis_done(&mut self) -> Result<(), ProtocolError> {
        let timeout = self.config.analysis_done_timeout;
        let transport = self
            .transport
            .as_deref_mut()
            .ok_or(ProtocolError::NotConnected)?;
        let received = transport.read_line(timeout)?;
        let received = received.trim();
        if received == commands::ANALYSIS_DONE {
            Ok(())
        } else {
            Err(ProtocolError::UnexpectedResponse {
                command: commands::CAPTURE.to_string(),
                expected: commands::ANALYSIS_DONE.to_string(),
                received: received.to_string(),
            })
        }
    }

    /// Wait until the previous sample's analysis has completed
    pub fn wait_for_analysis_complete(&mut self, timeout_secs: u64) -> Result<(), ProtocolError> {
        self.run(commands::wait_for_analysis_complete(timeout_secs))
    }

    /// Wait until the integrating sphere has moved up
    pub fn wait_for_sphere_up(&mut self, timeout_secs: u64) -> Result<(), ProtocolError> {
        self.run(commands::wait_for_sphere_up(timeout_secs))
    }

    /// Check whether the analysis of the last image failed.
    ///
    /// The instrument answers `False` when the image is fine; a failure is
    /// reported as `True: {detail}`, which surfaces here as an
    /// [`ProtocolError::UnexpectedResponse`] carrying the detail text.
    pub fn check_if_last_image_failed(&mut self) -> Result<(), ProtocolError> {
        self.run(commands::last_image_failed(self.config.read_timeout))
    }
}
