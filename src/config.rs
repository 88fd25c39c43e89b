//! Emitter configuration.
//!
//! Two ways in: the pool hands over its raw string properties
//! ([`EmitterConfig::from_properties`]), or a TOML table is deserialized
//! straight into [`EmitterConfig`]. Both insist on `hostname`, `port`,
//! `sampleRate` and `prefix`; the remaining knobs have defaults.

use std::collections::HashMap;
use std::net::{SocketAddr, ToSocketAddrs};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::ConfigError;

// ─── Endpoint ────────────────────────────────────────────────────

/// Where the collector listens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// First address the host resolves to.
    pub fn resolve(&self) -> Result<SocketAddr, ConfigError> {
        let resolve_err = |source| ConfigError::Resolve {
            host: self.host.clone(),
            port: self.port,
            source,
        };

        (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map_err(resolve_err)?
            .next()
            .ok_or_else(|| {
                resolve_err(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "no address returned",
                ))
            })
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

// ─── Policies ────────────────────────────────────────────────────

/// Unit used when a measured `Duration` becomes the integer on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum TimingUnit {
    #[default]
    #[serde(rename = "ms")]
    Millis,
    #[serde(rename = "us")]
    Micros,
    #[serde(rename = "ns")]
    Nanos,
}

impl TimingUnit {
    pub fn convert(self, elapsed: Duration) -> u64 {
        let v = match self {
            Self::Millis => elapsed.as_millis(),
            Self::Micros => elapsed.as_micros(),
            Self::Nanos => elapsed.as_nanos(),
        };
        u64::try_from(v).unwrap_or(u64::MAX)
    }
}

impl FromStr for TimingUnit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ms" => Ok(Self::Millis),
            "us" => Ok(Self::Micros),
            "ns" => Ok(Self::Nanos),
            other => Err(format!("expected one of ms, us, ns, got {other:?}")),
        }
    }
}

/// When staged lines leave the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlushPolicy {
    /// Send right after every append.
    #[default]
    Eager,
    /// Send only when the next line would not fit, or on explicit flush.
    Capacity,
}

impl FromStr for FlushPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "eager" => Ok(Self::Eager),
            "capacity" => Ok(Self::Capacity),
            other => Err(format!("expected eager or capacity, got {other:?}")),
        }
    }
}

// ─── EmitterConfig ───────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmitterConfig {
    pub hostname: String,
    pub port: u16,
    /// Probability in [0, 1] that a top-level call is reported.
    pub sample_rate: f64,
    /// Prepended verbatim to every key; include the trailing dot yourself.
    pub prefix: String,

    /// Also report `<ns>.<op>.count` next to every timing.
    #[serde(default)]
    pub count_calls: bool,
    #[serde(default)]
    pub timing_unit: TimingUnit,
    #[serde(default)]
    pub flush_policy: FlushPolicy,
}

impl EmitterConfig {
    pub fn new(
        hostname: impl Into<String>,
        port: u16,
        prefix: impl Into<String>,
        sample_rate: f64,
    ) -> Self {
        Self {
            hostname: hostname.into(),
            port,
            sample_rate,
            prefix: prefix.into(),
            count_calls: false,
            timing_unit: TimingUnit::default(),
            flush_policy: FlushPolicy::default(),
        }
    }

    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new(self.hostname.clone(), self.port)
    }

    /// Build from the string properties a pool passes to its interceptors.
    pub fn from_properties(props: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let hostname = required(props, "hostname")?.to_owned();
        let port = parse_required(props, "port")?;
        let sample_rate = parse_required(props, "sampleRate")?;
        let prefix = required(props, "prefix")?.to_owned();

        let mut config = Self::new(hostname, port, prefix, sample_rate);
        if let Some(v) = parse_optional(props, "countCalls")? {
            config.count_calls = v;
        }
        if let Some(v) = parse_optional(props, "timingUnit")? {
            config.timing_unit = v;
        }
        if let Some(v) = parse_optional(props, "flushPolicy")? {
            config.flush_policy = v;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.hostname.is_empty() {
            return Err(ConfigError::Missing("hostname"));
        }
        if !(0.0..=1.0).contains(&self.sample_rate) {
            return Err(ConfigError::Invalid {
                name: "sampleRate",
                value: self.sample_rate.to_string(),
                reason: "must be within [0, 1]".into(),
            });
        }
        Ok(())
    }
}

/// Read and deserialize a TOML file.
pub fn load_file<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T, ConfigError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;
    Ok(toml::from_str(&text)?)
}

// ─── Helpers ─────────────────────────────────────────────────────

fn required<'a>(
    props: &'a HashMap<String, String>,
    name: &'static str,
) -> Result<&'a str, ConfigError> {
    props
        .get(name)
        .map(|v| v.trim())
        .ok_or(ConfigError::Missing(name))
}

fn parse_required<T>(props: &HashMap<String, String>, name: &'static str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    parse_value(name, required(props, name)?)
}

fn parse_optional<T>(
    props: &HashMap<String, String>,
    name: &'static str,
) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    props
        .get(name)
        .map(|raw| parse_value(name, raw.trim()))
        .transpose()
}

fn parse_value<T>(name: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
        name,
        value: raw.to_owned(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn props(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn full() -> HashMap<String, String> {
        props(&[
            ("hostname", "localhost"),
            ("port", "8125"),
            ("sampleRate", "0.25"),
            ("prefix", "jdbc.pool."),
        ])
    }

    #[test]
    fn parses_required_properties() {
        let config = EmitterConfig::from_properties(&full()).unwrap();
        assert_eq!(config.hostname, "localhost");
        assert_eq!(config.port, 8125);
        assert_eq!(config.sample_rate, 0.25);
        assert_eq!(config.prefix, "jdbc.pool.");
        assert!(!config.count_calls);
        assert_eq!(config.timing_unit, TimingUnit::Millis);
        assert_eq!(config.flush_policy, FlushPolicy::Eager);
    }

    #[test]
    fn every_required_property_is_enforced() {
        for name in ["hostname", "port", "sampleRate", "prefix"] {
            let mut p = full();
            p.remove(name);
            match EmitterConfig::from_properties(&p) {
                Err(ConfigError::Missing(missing)) => assert_eq!(missing, name),
                other => panic!("expected Missing({name}), got {other:?}"),
            }
        }
    }

    #[test]
    fn rejects_bad_values() {
        let mut p = full();
        p.insert("port".into(), "eighty".into());
        assert!(matches!(
            EmitterConfig::from_properties(&p),
            Err(ConfigError::Invalid { name: "port", .. })
        ));

        let mut p = full();
        p.insert("sampleRate".into(), "1.5".into());
        assert!(matches!(
            EmitterConfig::from_properties(&p),
            Err(ConfigError::Invalid { name: "sampleRate", .. })
        ));

        let mut p = full();
        p.insert("timingUnit".into(), "fortnights".into());
        assert!(matches!(
            EmitterConfig::from_properties(&p),
            Err(ConfigError::Invalid { name: "timingUnit", .. })
        ));
    }

    #[test]
    fn optional_properties_override_defaults() {
        let mut p = full();
        p.insert("countCalls".into(), "true".into());
        p.insert("timingUnit".into(), "us".into());
        p.insert("flushPolicy".into(), "capacity".into());
        let config = EmitterConfig::from_properties(&p).unwrap();
        assert!(config.count_calls);
        assert_eq!(config.timing_unit, TimingUnit::Micros);
        assert_eq!(config.flush_policy, FlushPolicy::Capacity);
    }

    #[test]
    fn deserializes_from_toml() {
        let config: EmitterConfig = toml::from_str(
            r#"
            hostname = "127.0.0.1"
            port = 8125
            sampleRate = 1.0
            prefix = "app."
            timingUnit = "ns"
            "#,
        )
        .unwrap();
        assert_eq!(config.timing_unit, TimingUnit::Nanos);
        assert_eq!(config.flush_policy, FlushPolicy::Eager);

        let missing: Result<EmitterConfig, _> = toml::from_str(
            r#"
            hostname = "127.0.0.1"
            port = 8125
            prefix = "app."
            "#,
        );
        assert!(missing.is_err());
    }

    #[test]
    fn timing_unit_conversion() {
        let d = Duration::from_micros(2_500);
        assert_eq!(TimingUnit::Millis.convert(d), 2);
        assert_eq!(TimingUnit::Micros.convert(d), 2_500);
        assert_eq!(TimingUnit::Nanos.convert(d), 2_500_000);
    }

    #[test]
    fn endpoint_resolves_loopback() {
        let addr = Endpoint::new("127.0.0.1", 9).resolve().unwrap();
        assert_eq!(addr.port(), 9);
        assert!(addr.ip().is_loopback());
    }
}
