use pool_statsd::config::{load_file, EmitterConfig};
use pool_statsd::ConfigError;
use serde::Deserialize;

/// Top-level demo configuration (`pool-statsd.toml`).
#[derive(Debug, Clone, Deserialize)]
pub struct DemoConfig {
    /// Passed straight to the interceptor; every required key must be present
    pub statsd: EmitterConfig,
    #[serde(default)]
    pub collector: CollectorSettings,
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub database: DatabaseSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CollectorSettings {
    /// Run the in-process mock collector on the statsd host/port
    #[serde(default = "default_true")]
    pub enabled: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_bind")]
    pub bind: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    /// Simulated per-statement latency of the in-memory database
    #[serde(default = "default_latency_us")]
    pub latency_us: u64,
}

fn default_true() -> bool {
    true
}
fn default_bind() -> String {
    "0.0.0.0:3000".into()
}
fn default_latency_us() -> u64 {
    1_500
}

impl Default for CollectorSettings {
    fn default() -> Self {
        Self {
            enabled: default_true(),
        }
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            latency_us: default_latency_us(),
        }
    }
}

impl DemoConfig {
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let config: Self = load_file(path)?;
        config.statsd.validate()?;
        Ok(config)
    }
}
