//! # LabLink Core Library
//!
//! Host-side driver for VideometerLab-style laboratory imaging instruments
//! reachable over a serial link.
//!
//! The instrument speaks a line-oriented text protocol: the host writes a
//! newline-terminated command, the instrument answers with a single literal
//! acknowledgement token. This library provides:
//!
//! - the serial transport with per-call read deadlines
//! - the command transaction (write, timed read, compare-to-expected)
//! - bounded retries around transactions and around session initialization
//! - a device facade exposing the acquisition operations (capture image,
//!   wait for analysis, wait for sphere, check last image)
//! - an instrument-side simulator for driving the protocol without hardware
//!
//! ## Example
//!
//! ```rust,ignore
//! use lablink_core::prelude::*;
//!
//! let config = ConnectionConfig {
//!     port_name: "/dev/ttyUSB0".to_string(),
//!     ..ConnectionConfig::default()
//! };
//! let mut device = Device::new(config);
//! device.initialize()?;
//! device.wait_for_analysis_complete(5)?;
//! device.capture_image("S1", "JD", "first pass", true, 15)?;
//! device.wait_for_sphere_up(10)?;
//! ```

#![warn(missing_docs)]

pub mod protocol;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::protocol::{
        ConnectionConfig, Device, ProtocolError, SessionState, Simulator, Transport,
    };
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
