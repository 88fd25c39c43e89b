pub mod buffer;
pub mod codec;
pub mod emitter;
pub mod transport;

pub use buffer::{Flush, SampleBuffer, DATAGRAM_CAPACITY};
pub use emitter::MetricsEmitter;
pub use transport::{Transport, UdpTransport};

/// StatsD metric type carried by a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Counter,
    Timing,
}

/// One reportable event, already prefix-qualified.
/// The emitter builds these and encodes them.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSample {
    pub kind: MetricKind,
    /// e.g. "jdbc.pool.connection.commit.timing"
    pub key: String,
    /// 1 for counters, elapsed time units for timings
    pub value: u64,
    /// Rate in effect when the sample was taken
    pub sample_rate: f64,
}

impl MetricSample {
    pub fn counter(key: impl Into<String>, sample_rate: f64) -> Self {
        Self {
            kind: MetricKind::Counter,
            key: key.into(),
            value: 1,
            sample_rate,
        }
    }

    pub fn timing(key: impl Into<String>, value: u64, sample_rate: f64) -> Self {
        Self {
            kind: MetricKind::Timing,
            key: key.into(),
            value,
            sample_rate,
        }
    }
}
