//! Wire protocol commands
//!
//! Outbound grammar is `Keyword` or `Keyword;param1;param2;...` with
//! positional `;`-delimited parameters and no escaping. Each command is
//! acknowledged by a single literal token, compared verbatim after trimming.

use std::time::Duration;

/// Parameter separator within a command line
pub const SEPARATOR: char = ';';

/// Connectivity handshake keyword
pub const CHECK_CONNECTION: &str = "CheckConnection";
/// Acknowledgement for [`CHECK_CONNECTION`]
pub const CONNECTION_OK: &str = "ConnectionOK";

/// Readiness handshake keyword
pub const READY_FOR_NEXT_SAMPLE: &str = "ReadyForNextSample";
/// Acknowledgement for [`READY_FOR_NEXT_SAMPLE`]
pub const READY_OK: &str = "True";

/// Capture keyword; takes sample id, initials, comments and the
/// suffix-by-timestamp flag as parameters
pub const CAPTURE: &str = "Capture";
/// Acknowledgement for [`CAPTURE`]
pub const CAPTURE_OK: &str = "CaptureOK";
/// Second confirmation line after [`CAPTURE_OK`] in the chained-confirmation
/// firmware variant
pub const ANALYSIS_DONE: &str = "AnalysisDone";

/// Wait-for-analysis keyword; takes the wait budget in seconds
pub const WAIT_FOR_ANALYSIS_COMPLETE: &str = "WaitForAnalysisComplete";
/// Acknowledgement for [`WAIT_FOR_ANALYSIS_COMPLETE`]
pub const ANALYSIS_COMPLETE: &str = "AnalysisComplete";

/// Wait-for-sphere keyword; takes the wait budget in seconds
pub const WAIT_FOR_SPHERE_UP: &str = "WaitForSphereUp";
/// Acknowledgement for [`WAIT_FOR_SPHERE_UP`]
pub const SPHERE_IS_UP: &str = "SphereIsUp";

/// Last-image status keyword
pub const LAST_IMAGE_FAILED: &str = "LastImageFailed";
/// Answer when the last image did not fail. A failure is reported as
/// `True: {detail}` instead, which the driver surfaces as a mismatch carrying
/// the detail text.
pub const NO_FAILURE: &str = "False";

/// One command/expected-response pair, constructed per call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// Command line without the trailing newline
    pub line: String,
    /// Token the instrument must answer for the transaction to succeed
    pub expected: String,
    /// How long to wait for the response line
    pub read_timeout: Duration,
}

impl Command {
    /// Create a command from its line, expected token and read timeout
    pub fn new(
        line: impl Into<String>,
        expected: impl Into<String>,
        read_timeout: Duration,
    ) -> Self {
        Self {
            line: line.into(),
            expected: expected.into(),
            read_timeout,
        }
    }
}

/// The instrument renders booleans Python-style on the wire
fn bool_token(value: bool) -> &'static str {
    if value {
        "True"
    } else {
        "False"
    }
}

/// `CheckConnection` -> `ConnectionOK`
pub fn check_connection(read_timeout: Duration) -> Command {
    Command::new(CHECK_CONNECTION, CONNECTION_OK, read_timeout)
}

/// `ReadyForNextSample` -> `True`
pub fn ready_for_next_sample(read_timeout: Duration) -> Command {
    Command::new(READY_FOR_NEXT_SAMPLE, READY_OK, read_timeout)
}

/// `Capture;{sample_id};{initials};{comments};{suffix_by_timestamp}` -> `CaptureOK`
pub fn capture(
    sample_id: &str,
    initials: &str,
    comments: &str,
    suffix_by_timestamp: bool,
    read_timeout: Duration,
) -> Command {
    let line = format!(
        "{CAPTURE}{SEPARATOR}{sample_id}{SEPARATOR}{initials}{SEPARATOR}{comments}{SEPARATOR}{}",
        bool_token(suffix_by_timestamp)
    );
    Command::new(line, CAPTURE_OK, read_timeout)
}

/// `WaitForAnalysisComplete;{seconds}` -> `AnalysisComplete`.
///
/// The wait budget rides in the command, and the same budget bounds the read.
pub fn wait_for_analysis_complete(timeout_secs: u64) -> Command {
    Command::new(
        format!("{WAIT_FOR_ANALYSIS_COMPLETE}{SEPARATOR}{timeout_secs}"),
        ANALYSIS_COMPLETE,
        Duration::from_secs(timeout_secs),
    )
}

/// `WaitForSphereUp;{seconds}` -> `SphereIsUp`
pub fn wait_for_sphere_up(timeout_secs: u64) -> Command {
    Command::new(
        format!("{WAIT_FOR_SPHERE_UP}{SEPARATOR}{timeout_secs}"),
        SPHERE_IS_UP,
        Duration::from_secs(timeout_secs),
    )
}

/// `LastImageFailed` -> `False`
pub fn last_image_failed(read_timeout: Duration) -> Command {
    Command::new(LAST_IMAGE_FAILED, NO_FAILURE, read_timeout)
}
