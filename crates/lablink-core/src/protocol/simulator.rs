//! Instrument-side responder
//!
//! Mirrors the session controller running inside the instrument so the
//! driver can be exercised without hardware: one `;`-delimited command line
//! in, one acknowledgement token or human-readable diagnostic line out.
//!
//! The simulator answers from its current state instead of polling real
//! capture/analysis machinery; tests and the CLI flip the state to model the
//! instrument being busy, the sphere being down, or the last image failing.

use std::time::Duration;

use tracing::debug;

use super::commands::{
    ANALYSIS_COMPLETE, CAPTURE, CAPTURE_OK, CHECK_CONNECTION, CONNECTION_OK, LAST_IMAGE_FAILED,
    NO_FAILURE, READY_FOR_NEXT_SAMPLE, SEPARATOR, SPHERE_IS_UP, WAIT_FOR_ANALYSIS_COMPLETE,
    WAIT_FOR_SPHERE_UP,
};
use super::{ProtocolError, Transport};

const KEYWORDS: &[&str] = &[
    CHECK_CONNECTION,
    READY_FOR_NEXT_SAMPLE,
    CAPTURE,
    WAIT_FOR_ANALYSIS_COMPLETE,
    WAIT_FOR_SPHERE_UP,
    LAST_IMAGE_FAILED,
];

fn expected_parts(keyword: &str) -> usize {
    match keyword {
        CAPTURE => 5,
        WAIT_FOR_ANALYSIS_COMPLETE | WAIT_FOR_SPHERE_UP => 2,
        _ => 1,
    }
}

/// Simulated instrument session controller.
///
/// Constructed in the happy state: connected, ready, analysis complete,
/// sphere up, last image fine.
pub struct Simulator {
    ready_for_next_sample: bool,
    analysis_complete: bool,
    capture_complete: bool,
    sphere_up: bool,
    last_image_failure: Option<String>,
}

impl Default for Simulator {
    fn default() -> Self {
        Self::new()
    }
}

impl Simulator {
    /// Create a simulator whose waits all succeed immediately
    pub fn new() -> Self {
        Self {
            ready_for_next_sample: true,
            analysis_complete: true,
            capture_complete: true,
            sphere_up: true,
            last_image_failure: None,
        }
    }

    /// Whether `ReadyForNextSample` answers `True`
    pub fn set_ready_for_next_sample(&mut self, ready: bool) {
        self.ready_for_next_sample = ready;
    }

    /// Whether `WaitForAnalysisComplete` succeeds
    pub fn set_analysis_complete(&mut self, complete: bool) {
        self.analysis_complete = complete;
    }

    /// Whether `Capture` acknowledges with `CaptureOK`
    pub fn set_capture_complete(&mut self, complete: bool) {
        self.capture_complete = complete;
    }

    /// Whether `WaitForSphereUp` succeeds
    pub fn set_sphere_up(&mut self, up: bool) {
        self.sphere_up = up;
    }

    /// Record a failure for the last image; `LastImageFailed` then answers
    /// `True: {detail}` until the next capture begins
    pub fn record_image_failure(&mut self, detail: impl Into<String>) {
        self.last_image_failure = Some(detail.into());
    }

    /// Answer one inbound command line
    pub fn respond(&mut self, line: &str) -> String {
        let line = line.trim();
        let parts: Vec<&str> = line.split(SEPARATOR).collect();

        match parts.as_slice() {
            [CHECK_CONNECTION] => CONNECTION_OK.to_string(),

            [READY_FOR_NEXT_SAMPLE] => if self.ready_for_next_sample {
                "True"
            } else {
                "False"
            }
            .to_string(),

            [LAST_IMAGE_FAILED] => match &self.last_image_failure {
                Some(detail) => format!("True: {detail}"),
                None => NO_FAILURE.to_string(),
            },

            [CAPTURE, _sample_id, _initials, _comments, suffix] => {
                if !matches!(*suffix, "True" | "False") {
                    return format!(
                        "Last parameter must be either \"True\" or \"False\", but was {suffix}"
                    );
                }
                // A new image begins; the previous failure no longer applies.
                self.last_image_failure = None;
                if self.capture_complete {
                    CAPTURE_OK.to_string()
                } else {
                    "Failed waiting for capture to finish.".to_string()
                }
            }

            [WAIT_FOR_ANALYSIS_COMPLETE, secs] => match parse_timeout(secs, "analysis") {
                Ok(_) if self.analysis_complete => ANALYSIS_COMPLETE.to_string(),
                Ok(secs) => format!(
                    "Failed waiting for analysis to finish. Waited {}ms.",
                    secs * 1000
                ),
                Err(diagnostic) => diagnostic,
            },

            [WAIT_FOR_SPHERE_UP, secs] => match parse_timeout(secs, "sphere up") {
                Ok(_) if self.sphere_up => SPHERE_IS_UP.to_string(),
                Ok(secs) => format!(
                    "Failed waiting for sphere to move up. Waited {}ms.",
                    secs * 1000
                ),
                Err(diagnostic) => diagnostic,
            },

            [keyword, ..] if KEYWORDS.contains(keyword) => format!(
                "Expected {} arguments separated by {SEPARATOR}, but received {}. Received {line}",
                expected_parts(keyword),
                parts.len()
            ),

            _ => {
                let received = if line.is_empty() {
                    "Received an empty string.".to_string()
                } else {
                    format!("Received {line}.")
                };
                format!(
                    "The first word must be one of {}. {received}",
                    KEYWORDS.join(", ")
                )
            }
        }
    }

    /// Serve commands over a transport until it fails.
    ///
    /// Blank reads (poll timeouts) are skipped; every command line gets
    /// exactly one response line.
    pub fn serve(&mut self, transport: &mut dyn Transport) -> Result<(), ProtocolError> {
        loop {
            let line = transport.read_line(Duration::from_secs(1))?;
            if line.trim().is_empty() {
                continue;
            }
            debug!(line = line.trim(), "simulator received command");
            let reply = self.respond(&line);
            transport.write_line(&reply)?;
        }
    }
}

fn parse_timeout(value: &str, kind: &str) -> Result<u64, String> {
    value.parse::<u64>().map_err(|_| {
        format!("Unable to parse {kind} timeout parameter. Parameter was: {value}.")
    })
}

#[cfg(test)]
mod tests {
    use super::super::{ConnectionConfig, Device, TransportFactory};
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::VecDeque;

    #[test]
    fn test_connectivity_handshake() {
        let mut sim = Simulator::new();
        assert_eq!(sim.respond("CheckConnection"), "ConnectionOK");
        assert_eq!(sim.respond("ReadyForNextSample"), "True");

        sim.set_ready_for_next_sample(false);
        assert_eq!(sim.respond("ReadyForNextSample"), "False");
    }

    #[test]
    fn test_capture_acknowledged_when_complete() {
        let mut sim = Simulator::new();
        assert_eq!(sim.respond("Capture;S1;JD;note;True"), "CaptureOK");
    }

    #[test]
    fn test_capture_timeout_diagnostic() {
        let mut sim = Simulator::new();
        sim.set_capture_complete(false);
        assert_eq!(
            sim.respond("Capture;S1;JD;note;True"),
            "Failed waiting for capture to finish."
        );
    }

    #[test]
    fn test_capture_validates_suffix_flag() {
        let mut sim = Simulator::new();
        let reply = sim.respond("Capture;S1;JD;note;yes");
        assert_eq!(
            reply,
            "Last parameter must be either \"True\" or \"False\", but was yes"
        );
    }

    #[test]
    fn test_wrong_argument_count_diagnostic() {
        let mut sim = Simulator::new();
        let reply = sim.respond("Capture;S1;JD");
        assert_eq!(
            reply,
            "Expected 5 arguments separated by ;, but received 3. Received Capture;S1;JD"
        );
    }

    #[test]
    fn test_unknown_keyword_diagnostic() {
        let mut sim = Simulator::new();
        let reply = sim.respond("SelfDestruct");
        assert!(reply.starts_with("The first word must be one of"));
        assert!(reply.ends_with("Received SelfDestruct."));
    }

    #[test]
    fn test_unparsable_timeout_diagnostic() {
        let mut sim = Simulator::new();
        assert_eq!(
            sim.respond("WaitForSphereUp;soon"),
            "Unable to parse sphere up timeout parameter. Parameter was: soon."
        );
    }

    #[test]
    fn test_wait_diagnostics_carry_budget() {
        let mut sim = Simulator::new();
        sim.set_analysis_complete(false);
        sim.set_sphere_up(false);
        assert_eq!(
            sim.respond("WaitForAnalysisComplete;5"),
            "Failed waiting for analysis to finish. Waited 5000ms."
        );
        assert_eq!(
            sim.respond("WaitForSphereUp;10"),
            "Failed waiting for sphere to move up. Waited 10000ms."
        );
    }

    #[test]
    fn test_last_image_failure_reported_until_next_capture() {
        let mut sim = Simulator::new();
        assert_eq!(sim.respond("LastImageFailed"), "False");

        sim.record_image_failure("segmentation failed");
        assert_eq!(
            sim.respond("LastImageFailed"),
            "True: segmentation failed"
        );

        // Starting the next image resets the failure flag.
        sim.respond("Capture;S2;JD;;False");
        assert_eq!(sim.respond("LastImageFailed"), "False");
    }

    /// In-process wiring of the driver to the simulator: each written line is
    /// answered immediately and queued for the next read.
    struct SimulatorLink {
        simulator: Simulator,
        pending: VecDeque<String>,
    }

    impl Transport for SimulatorLink {
        fn write_line(&mut self, line: &str) -> Result<(), ProtocolError> {
            let reply = self.simulator.respond(line);
            self.pending.push_back(reply);
            Ok(())
        }

        fn read_line(&mut self, _timeout: Duration) -> Result<String, ProtocolError> {
            Ok(self.pending.pop_front().unwrap_or_default())
        }

        fn clear_buffers(&mut self) -> Result<(), ProtocolError> {
            Ok(())
        }
    }

    struct SimulatorFactory;

    impl TransportFactory for SimulatorFactory {
        fn open(
            &mut self,
            _config: &ConnectionConfig,
        ) -> Result<Box<dyn Transport>, ProtocolError> {
            Ok(Box::new(SimulatorLink {
                simulator: Simulator::new(),
                pending: VecDeque::new(),
            }))
        }
    }

    #[test]
    fn test_full_capture_sequence_against_simulator() {
        let config = ConnectionConfig {
            port_name: "sim".to_string(),
            require_ready_probe: true,
            ..ConnectionConfig::default()
        };
        let mut device = Device::with_factory(config, Box::new(SimulatorFactory));

        device.initialize().unwrap();
        device.wait_for_analysis_complete(5).unwrap();
        device.capture_image("S1", "JD", "note", true, 15).unwrap();
        device.wait_for_sphere_up(10).unwrap();
        device.check_if_last_image_failed().unwrap();
    }
}
