//! Scripted transports for exercising the engine without hardware

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::{ConnectionConfig, ProtocolError, Transport, TransportFactory};

/// Transport that replays a fixed list of response lines.
///
/// Reads beyond the script return an empty string, matching the real
/// transport's timeout behavior. The write log is shared so tests can keep a
/// handle after the transport moves into a `Device`.
pub(crate) struct MockTransport {
    responses: VecDeque<String>,
    written: Arc<Mutex<Vec<String>>>,
    reads: Arc<AtomicU32>,
    write_failures: u32,
}

impl MockTransport {
    pub(crate) fn with_responses(responses: &[&str]) -> Self {
        Self {
            responses: responses.iter().map(|r| r.to_string()).collect(),
            written: Arc::new(Mutex::new(Vec::new())),
            reads: Arc::new(AtomicU32::new(0)),
            write_failures: 0,
        }
    }

    /// Transport whose first `count` writes fail
    pub(crate) fn failing_writes(count: u32) -> Self {
        let mut transport = Self::with_responses(&[]);
        transport.write_failures = count;
        transport
    }

    pub(crate) fn with_response(mut self, response: &str) -> Self {
        self.responses.push_back(response.to_string());
        self
    }

    pub(crate) fn written_handle(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.written)
    }

    pub(crate) fn written(&self) -> Vec<String> {
        self.written.lock().unwrap().clone()
    }

    pub(crate) fn reads(&self) -> u32 {
        self.reads.load(Ordering::SeqCst)
    }
}

impl Transport for MockTransport {
    fn write_line(&mut self, line: &str) -> Result<(), ProtocolError> {
        if self.write_failures > 0 {
            self.write_failures -= 1;
            return Err(ProtocolError::Serial("stub write failure".to_string()));
        }
        self.written.lock().unwrap().push(line.to_string());
        Ok(())
    }

    fn read_line(&mut self, _timeout: Duration) -> Result<String, ProtocolError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.responses.pop_front().unwrap_or_default())
    }

    fn clear_buffers(&mut self) -> Result<(), ProtocolError> {
        Ok(())
    }
}

/// Factory that fails a fixed number of opens, then hands out scripted
/// transports, recording how often it was asked to open.
pub(crate) struct MockFactory {
    fail_opens: u32,
    scripts: VecDeque<MockTransport>,
    opens: Arc<AtomicU32>,
}

impl MockFactory {
    pub(crate) fn new(fail_opens: u32, scripts: Vec<MockTransport>) -> Self {
        Self {
            fail_opens,
            scripts: scripts.into_iter().collect(),
            opens: Arc::new(AtomicU32::new(0)),
        }
    }

    pub(crate) fn open_counter(&self) -> Arc<AtomicU32> {
        Arc::clone(&self.opens)
    }
}

impl TransportFactory for MockFactory {
    fn open(&mut self, _config: &ConnectionConfig) -> Result<Box<dyn Transport>, ProtocolError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        if self.fail_opens > 0 {
            self.fail_opens -= 1;
            return Err(ProtocolError::ConnectionFailed {
                port: "mock".to_string(),
                detail: "stub open failure".to_string(),
            });
        }
        Ok(Box::new(
            self.scripts
                .pop_front()
                .unwrap_or_else(|| MockTransport::with_responses(&[])),
        ))
    }
}
