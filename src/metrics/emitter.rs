use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};

use super::buffer::{Flush, SampleBuffer};
use super::transport::{Transport, UdpTransport};
use super::MetricSample;
use crate::config::{EmitterConfig, FlushPolicy, TimingUnit};
use crate::error::ConfigError;

// ─── Public types ────────────────────────────────────────────────

/// Thread-safe StatsD reporter shared by every instrumented resource.
/// Dispatchers call `should_sample()` and `report_*()`, nothing else.
pub struct MetricsEmitter {
    settings: RwLock<Settings>,
    channel: Mutex<Channel>,
    rng: Mutex<Box<dyn RngCore + Send>>,
}

// ─── Internal state ──────────────────────────────────────────────

struct Settings {
    prefix: String,
    sample_rate: f64,
    count_calls: bool,
    timing_unit: TimingUnit,
    flush_policy: FlushPolicy,
}

/// Buffer and transport change together or not at all.
struct Channel {
    destination: String,
    transport: Box<dyn Transport>,
    buffer: SampleBuffer,
}

impl Settings {
    fn from_config(config: &EmitterConfig) -> Self {
        Self {
            prefix: config.prefix.clone(),
            sample_rate: config.sample_rate,
            count_calls: config.count_calls,
            timing_unit: config.timing_unit,
            flush_policy: config.flush_policy,
        }
    }
}

// ─── MetricsEmitter impl ─────────────────────────────────────────

impl MetricsEmitter {
    /// Resolve the collector, open a UDP socket, seed sampling from entropy.
    pub fn configure(config: &EmitterConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let endpoint = config.endpoint();
        let transport = UdpTransport::open(endpoint.resolve()?)?;

        tracing::debug!(
            endpoint = %endpoint,
            target = %transport.target(),
            prefix = %config.prefix,
            sample_rate = config.sample_rate,
            "Configured StatsD emitter"
        );

        Ok(Self::with_parts(
            config,
            Box::new(transport),
            Box::new(StdRng::from_entropy()),
        ))
    }

    /// Assemble from an existing transport and random source.
    pub fn with_parts(
        config: &EmitterConfig,
        transport: Box<dyn Transport>,
        rng: Box<dyn RngCore + Send>,
    ) -> Self {
        Self {
            settings: RwLock::new(Settings::from_config(config)),
            channel: Mutex::new(Channel {
                destination: transport.destination(),
                transport,
                buffer: SampleBuffer::new(),
            }),
            rng: Mutex::new(rng),
        }
    }

    /// Swap in a new collector and settings. Lines staged for the old
    /// collector are flushed to it first.
    pub fn reconfigure(&self, config: &EmitterConfig) -> Result<(), ConfigError> {
        config.validate()?;
        let transport = UdpTransport::open(config.endpoint().resolve()?)?;
        self.replace_transport(config, Box::new(transport));
        Ok(())
    }

    /// Settings are locked before the channel, here and in `send`, so no
    /// sample built from the old settings reaches the new transport.
    pub(crate) fn replace_transport(&self, config: &EmitterConfig, transport: Box<dyn Transport>) {
        let mut settings = self.settings.write();
        {
            let mut channel = self.channel.lock();
            let Channel {
                destination,
                transport: old,
                buffer,
            } = &mut *channel;
            let outcome = buffer.flush(old.as_ref());
            log_flush(&outcome, "<pending>", destination);

            *destination = transport.destination();
            *old = transport;
        }
        *settings = Settings::from_config(config);
        drop(settings);

        tracing::debug!(
            prefix = %config.prefix,
            sample_rate = config.sample_rate,
            "Reconfigured StatsD emitter"
        );
    }

    /// Report `<prefix><key>:1|c`.
    pub fn report_count(&self, key: &str) -> bool {
        self.send(|s| MetricSample::counter(format!("{}{}", s.prefix, key), s.sample_rate))
    }

    /// Report `<prefix><key>:<elapsed>|ms` in the configured unit.
    pub fn report_timing(&self, key: &str, elapsed: Duration) -> bool {
        self.send(|s| {
            MetricSample::timing(
                format!("{}{}", s.prefix, key),
                s.timing_unit.convert(elapsed),
                s.sample_rate,
            )
        })
    }

    /// One-shot gate for a top-level call.
    pub fn should_sample(&self) -> bool {
        let rate = self.settings.read().sample_rate;
        if rate >= 1.0 {
            return true;
        }
        if rate <= 0.0 {
            return false;
        }
        self.rng.lock().gen::<f64>() <= rate
    }

    /// Push out whatever is staged. Only useful with `FlushPolicy::Capacity`.
    pub fn flush(&self) -> bool {
        let mut channel = self.channel.lock();
        let Channel {
            destination,
            transport,
            buffer,
        } = &mut *channel;
        let outcome = buffer.flush(transport.as_ref());
        log_flush(&outcome, "<pending>", destination);
        !outcome.is_failure()
    }

    pub fn sample_rate(&self) -> f64 {
        self.settings.read().sample_rate
    }

    pub fn prefix(&self) -> String {
        self.settings.read().prefix.clone()
    }

    pub fn counts_calls(&self) -> bool {
        self.settings.read().count_calls
    }

    pub fn destination(&self) -> String {
        self.channel.lock().destination.clone()
    }

    // ── Send path ───────────────────────────────────────────────

    /// Build, stage and maybe flush while holding the settings the sample
    /// was built from.
    fn send(&self, build: impl FnOnce(&Settings) -> MetricSample) -> bool {
        let settings = self.settings.read();
        let policy = settings.flush_policy;
        let line = build(&settings).encode();

        let mut channel = self.channel.lock();
        let Channel {
            destination,
            transport,
            buffer,
        } = &mut *channel;

        let staged = buffer.append(line.as_bytes(), transport.as_ref());
        log_flush(&staged, &line, destination);
        if staged.is_failure() {
            return false;
        }

        match policy {
            FlushPolicy::Eager => {
                let sent = buffer.flush(transport.as_ref());
                log_flush(&sent, &line, destination);
                sent.is_sent()
            }
            FlushPolicy::Capacity => true,
        }
    }
}

fn log_flush(outcome: &Flush, stat: &str, destination: &str) {
    match outcome {
        Flush::Empty => {}
        Flush::Sent(bytes) => {
            tracing::trace!(stat, destination, bytes, "Sent datagram to collector");
        }
        Flush::Short { sent, offered } => {
            tracing::warn!(
                stat,
                destination,
                sent,
                offered,
                "Could not send entire datagram to collector"
            );
        }
        Flush::Failed(e) => {
            tracing::warn!(stat, destination, error = %e, "Could not send stat to collector");
        }
    }
}
