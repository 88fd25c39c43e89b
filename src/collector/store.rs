use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;

use chrono::{DateTime, Utc};
use hdrhistogram::Histogram;
use parking_lot::Mutex;
use pool_statsd::metrics::codec::split_datagram;
use pool_statsd::{MetricKind, MetricSample};
use serde::Serialize;
use tokio::sync::broadcast;

/// Lines a slow tail subscriber may fall behind before it skips ahead.
const TAIL_BACKLOG: usize = 1024;

/// 1 unit up to 60 s in µs, whatever unit the emitter reports in
const HIST_HIGH: u64 = 60_000_000;

// ─── Key layout ──────────────────────────────────────────────────

/// `<prefix><namespace>.<operation>.timing|count`
#[derive(Debug, PartialEq)]
struct KeyParts<'a> {
    prefix: &'a str,
    namespace: &'a str,
    operation: &'a str,
    kind: MetricKind,
}

impl<'a> KeyParts<'a> {
    fn split(key: &'a str) -> Option<Self> {
        let (rest, suffix) = key.rsplit_once('.')?;
        let kind = match suffix {
            "timing" => MetricKind::Timing,
            "count" => MetricKind::Counter,
            _ => return None,
        };
        let (rest, operation) = rest.rsplit_once('.')?;
        let namespace = rest.rsplit('.').next().unwrap_or(rest);
        if namespace.is_empty() || operation.is_empty() {
            return None;
        }
        Some(Self {
            prefix: &rest[..rest.len() - namespace.len()],
            namespace,
            operation,
            kind,
        })
    }
}

// ─── Public views ────────────────────────────────────────────────

/// One received line, as pushed to tail subscribers.
#[derive(Debug, Clone, Serialize)]
pub struct TailLine {
    pub received_at: DateTime<Utc>,
    pub line: String,
    /// False when the line was malformed or not an interceptor key
    pub recognised: bool,
}

/// Distribution of the reported timings, in the emitter's unit.
#[derive(Debug, Clone, Serialize)]
pub struct TimingStats {
    pub mean: f64,
    pub median: u64,
    pub p90: u64,
    pub p99: u64,
    pub max: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct OperationView {
    pub operation: String,
    /// Timing lines actually received
    pub sampled: u64,
    /// Every sampled call stands for 1/rate real calls
    pub estimated_calls: f64,
    pub estimated_calls_per_sec: f64,
    /// Extrapolated from `.count` lines; absent when counting is off
    pub counted_calls: Option<f64>,
    /// Rate carried by the most recent line
    pub last_rate: f64,
    pub timing: Option<TimingStats>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NamespaceView {
    pub namespace: String,
    pub sampled: u64,
    pub estimated_calls: f64,
    pub operations: Vec<OperationView>,
}

/// Everything the mock collector knows, grouped the way the interceptor
/// names its keys.
#[derive(Debug, Clone, Serialize)]
pub struct CollectorSnapshot {
    pub elapsed_secs: f64,
    pub datagrams: u64,
    pub lines: u64,
    pub lines_per_datagram: f64,
    pub malformed_lines: u64,
    pub foreign_lines: u64,
    pub prefixes: Vec<String>,
    pub namespaces: Vec<NamespaceView>,
}

// ─── Store ───────────────────────────────────────────────────────

/// The UDP listener records, the HTTP handlers read.
pub struct CollectorStore {
    inner: Mutex<Inner>,
    tail: broadcast::Sender<TailLine>,
}

impl CollectorStore {
    pub fn new() -> Self {
        let (tail, _) = broadcast::channel(TAIL_BACKLOG);
        Self {
            inner: Mutex::new(Inner::default()),
            tail,
        }
    }

    pub fn record_datagram(&self, payload: &str) {
        let recorded = self.inner.lock().record_datagram(payload);
        // no subscribers is the normal case
        for line in recorded {
            let _ = self.tail.send(line);
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TailLine> {
        self.tail.subscribe()
    }

    pub fn reset(&self) {
        *self.inner.lock() = Inner::default();
    }

    pub fn snapshot(&self) -> CollectorSnapshot {
        self.inner.lock().snapshot()
    }

    pub fn namespace(&self, namespace: &str) -> Option<NamespaceView> {
        self.snapshot()
            .namespaces
            .into_iter()
            .find(|ns| ns.namespace == namespace)
    }
}

impl Default for CollectorStore {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Aggregation ─────────────────────────────────────────────────

#[derive(Default)]
struct Inner {
    /// Keyed by (namespace, operation) so views come out grouped and sorted
    operations: BTreeMap<(String, String), OperationStats>,
    prefixes: BTreeSet<String>,
    datagrams: u64,
    lines: u64,
    malformed_lines: u64,
    foreign_lines: u64,
    first_datagram: Option<Instant>,
}

struct OperationStats {
    timings: Histogram<u64>,
    estimated_calls: f64,
    count_lines: u64,
    counted_calls: f64,
    last_rate: f64,
}

impl OperationStats {
    fn new() -> Self {
        Self {
            timings: Histogram::<u64>::new_with_bounds(1, HIST_HIGH, 3)
                .expect("histogram creation"),
            estimated_calls: 0.0,
            count_lines: 0,
            counted_calls: 0.0,
            last_rate: 1.0,
        }
    }

    fn view(&self, operation: &str, elapsed_secs: f64) -> OperationView {
        let sampled = self.timings.len();
        OperationView {
            operation: operation.to_owned(),
            sampled,
            estimated_calls: self.estimated_calls,
            estimated_calls_per_sec: if elapsed_secs > 0.0 {
                self.estimated_calls / elapsed_secs
            } else {
                0.0
            },
            counted_calls: (self.count_lines > 0).then_some(self.counted_calls),
            last_rate: self.last_rate,
            timing: (sampled > 0).then(|| TimingStats {
                mean: self.timings.mean(),
                median: self.timings.value_at_quantile(0.5),
                p90: self.timings.value_at_quantile(0.9),
                p99: self.timings.value_at_quantile(0.99),
                max: self.timings.max(),
            }),
        }
    }
}

impl Inner {
    fn record_datagram(&mut self, payload: &str) -> Vec<TailLine> {
        self.first_datagram.get_or_insert_with(Instant::now);
        self.datagrams += 1;

        let received_at = Utc::now();
        split_datagram(payload)
            .map(|line| {
                self.lines += 1;
                TailLine {
                    received_at,
                    line: line.to_owned(),
                    recognised: self.record_line(line),
                }
            })
            .collect()
    }

    fn record_line(&mut self, line: &str) -> bool {
        let sample = match MetricSample::parse(line) {
            Ok(sample) => sample,
            Err(e) => {
                self.malformed_lines += 1;
                tracing::debug!(line, error = %e, "Collector dropped malformed line");
                return false;
            }
        };
        let Some(parts) = KeyParts::split(&sample.key).filter(|p| p.kind == sample.kind) else {
            self.foreign_lines += 1;
            return false;
        };

        if !self.prefixes.contains(parts.prefix) {
            self.prefixes.insert(parts.prefix.to_owned());
        }
        let stats = self
            .operations
            .entry((parts.namespace.to_owned(), parts.operation.to_owned()))
            .or_insert_with(OperationStats::new);

        // a rate of 0 is never sent; treat it as full weight
        let weight = if sample.sample_rate > 0.0 {
            1.0 / sample.sample_rate
        } else {
            1.0
        };
        stats.last_rate = sample.sample_rate;
        match sample.kind {
            MetricKind::Timing => {
                let _ = stats.timings.record(sample.value.clamp(1, HIST_HIGH));
                stats.estimated_calls += weight;
            }
            MetricKind::Counter => {
                stats.count_lines += 1;
                stats.counted_calls += sample.value as f64 * weight;
            }
        }
        true
    }

    fn snapshot(&self) -> CollectorSnapshot {
        let elapsed_secs = self
            .first_datagram
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0);

        let mut namespaces: Vec<NamespaceView> = Vec::new();
        for ((namespace, operation), stats) in &self.operations {
            let view = stats.view(operation, elapsed_secs);
            match namespaces.last_mut() {
                Some(ns) if ns.namespace == *namespace => {
                    ns.sampled += view.sampled;
                    ns.estimated_calls += view.estimated_calls;
                    ns.operations.push(view);
                }
                _ => namespaces.push(NamespaceView {
                    namespace: namespace.clone(),
                    sampled: view.sampled,
                    estimated_calls: view.estimated_calls,
                    operations: vec![view],
                }),
            }
        }

        CollectorSnapshot {
            elapsed_secs,
            datagrams: self.datagrams,
            lines: self.lines,
            lines_per_datagram: if self.datagrams > 0 {
                self.lines as f64 / self.datagrams as f64
            } else {
                0.0
            },
            malformed_lines: self.malformed_lines,
            foreign_lines: self.foreign_lines,
            prefixes: self.prefixes.iter().cloned().collect(),
            namespaces,
        }
    }
}
