//! Shared fixtures for unit tests.

use std::io;
use std::sync::Arc;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::config::EmitterConfig;
use crate::metrics::{MetricsEmitter, Transport};

/// In-memory transport; clones share the same record.
#[derive(Clone, Default)]
pub struct RecordingTransport {
    sent: Arc<Mutex<Vec<Vec<u8>>>>,
    calls: Arc<Mutex<usize>>,
    short_by: usize,
    fail: bool,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn short_by(n: usize) -> Self {
        Self {
            short_by: n,
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock()
    }

    pub fn datagrams(&self) -> Vec<String> {
        self.sent
            .lock()
            .iter()
            .map(|d| String::from_utf8_lossy(d).into_owned())
            .collect()
    }

    pub fn sizes(&self) -> Vec<usize> {
        self.sent.lock().iter().map(Vec::len).collect()
    }

    /// Every line of every datagram, in send order.
    pub fn lines(&self) -> Vec<String> {
        self.datagrams()
            .iter()
            .flat_map(|d| d.split('\n').map(str::to_owned).collect::<Vec<_>>())
            .collect()
    }
}

impl Transport for RecordingTransport {
    fn send(&self, payload: &[u8]) -> io::Result<usize> {
        *self.calls.lock() += 1;
        if self.fail {
            return Err(io::Error::new(io::ErrorKind::ConnectionRefused, "refused"));
        }
        self.sent.lock().push(payload.to_vec());
        Ok(payload.len().saturating_sub(self.short_by))
    }

    fn destination(&self) -> String {
        "recording".into()
    }
}

/// Emitter wired to a recording transport and a seeded generator.
pub fn emitter(config: &EmitterConfig) -> (Arc<MetricsEmitter>, RecordingTransport) {
    let transport = RecordingTransport::new();
    let emitter = MetricsEmitter::with_parts(
        config,
        Box::new(transport.clone()),
        Box::new(StdRng::seed_from_u64(7)),
    );
    (Arc::new(emitter), transport)
}

pub fn config(prefix: &str, sample_rate: f64) -> EmitterConfig {
    EmitterConfig::new("127.0.0.1", 8125, prefix, sample_rate)
}
