//! Serial port handling
//!
//! Low-level access to the instrument's serial link. The framing (baud,
//! data bits, parity, stop bits) must match the instrument firmware exactly
//! and is taken verbatim from the connection configuration.

use serialport::SerialPort;
use std::time::Duration;

use super::{ConnectionConfig, ProtocolError};

/// Timeout applied to the OS handle itself.
///
/// Reads poll at this interval; the caller-facing deadline is enforced by the
/// transport on top of it, so the handle setting never has to change between
/// calls.
pub(crate) const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Open the instrument port with the exact framing in the configuration
pub fn open_port(config: &ConnectionConfig) -> Result<Box<dyn SerialPort>, ProtocolError> {
    serialport::new(&config.port_name, config.baud_rate)
        .data_bits(config.data_bits)
        .parity(config.parity)
        .stop_bits(config.stop_bits)
        .flow_control(serialport::FlowControl::None)
        .timeout(POLL_INTERVAL)
        .open()
        .map_err(|e| ProtocolError::ConnectionFailed {
            port: config.port_name.clone(),
            detail: e.to_string(),
        })
}

/// Clear the serial port buffers
pub fn clear_buffers(port: &mut dyn SerialPort) -> Result<(), ProtocolError> {
    port.clear(serialport::ClearBuffer::All)
        .map_err(|e| ProtocolError::Serial(e.to_string()))
}
