//! The contract between a connection pool and this crate.
//!
//! The pool owns the lifecycle: it calls `configure` once with the
//! interceptor's properties, `intercept` for every connection it hands out,
//! and `reset` when a connection goes back.

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::EmitterConfig;
use crate::error::HookError;
use crate::intercept::InstrumentedConnection;
use crate::metrics::MetricsEmitter;
use crate::resource::Connection;

pub trait PoolHook<C: Connection> {
    type Wrapped: Connection<Error = C::Error>;

    fn configure(&mut self, properties: &HashMap<String, String>) -> Result<(), HookError>;
    fn intercept(&self, connection: C) -> Result<Self::Wrapped, HookError>;
    fn reset(&self, connection: &mut Self::Wrapped);
}

/// Reports connection and statement timings to a StatsD collector.
#[derive(Default)]
pub struct StatsdInterceptor {
    emitter: Option<Arc<MetricsEmitter>>,
}

impl StatsdInterceptor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Skip property parsing when the emitter is built elsewhere.
    pub fn with_emitter(emitter: Arc<MetricsEmitter>) -> Self {
        Self {
            emitter: Some(emitter),
        }
    }

    pub fn emitter(&self) -> Option<&Arc<MetricsEmitter>> {
        self.emitter.as_ref()
    }

    /// Apply a parsed config; a second call re-targets the existing emitter
    /// so connections already handed out follow along.
    pub fn apply(&mut self, config: &EmitterConfig) -> Result<(), HookError> {
        match &self.emitter {
            Some(emitter) => emitter.reconfigure(config)?,
            None => self.emitter = Some(Arc::new(MetricsEmitter::configure(config)?)),
        }
        Ok(())
    }
}

impl<C: Connection> PoolHook<C> for StatsdInterceptor {
    type Wrapped = InstrumentedConnection<C>;

    fn configure(&mut self, properties: &HashMap<String, String>) -> Result<(), HookError> {
        let config = EmitterConfig::from_properties(properties)?;
        self.apply(&config)
    }

    fn intercept(&self, connection: C) -> Result<InstrumentedConnection<C>, HookError> {
        let emitter = self.emitter.clone().ok_or(HookError::NotConfigured)?;
        Ok(InstrumentedConnection::new(connection, emitter))
    }

    fn reset(&self, _connection: &mut InstrumentedConnection<C>) {
        // nothing per-connection to clear
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConfigError;
    use crate::memory::{MemoryConnection, MemoryDatabase};

    fn props(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn intercept_before_configure_is_refused() {
        let hook = StatsdInterceptor::new();
        let conn = MemoryDatabase::new().connect();
        let result = PoolHook::<MemoryConnection>::intercept(&hook, conn);
        assert!(matches!(result, Err(HookError::NotConfigured)));
    }

    #[test]
    fn configure_requires_all_properties() {
        let mut hook = StatsdInterceptor::new();
        let result = PoolHook::<MemoryConnection>::configure(
            &mut hook,
            &props(&[("hostname", "127.0.0.1"), ("port", "8125"), ("prefix", "p.")]),
        );
        assert!(matches!(
            result,
            Err(HookError::Config(ConfigError::Missing("sampleRate")))
        ));
        assert!(hook.emitter().is_none());
    }

    #[test]
    fn reconfigure_keeps_the_same_emitter() {
        let mut hook = StatsdInterceptor::new();
        let base = [("hostname", "127.0.0.1"), ("port", "8125"), ("prefix", "a.")];

        let mut first = props(&base);
        first.insert("sampleRate".into(), "1.0".into());
        PoolHook::<MemoryConnection>::configure(&mut hook, &first).unwrap();
        let emitter = hook.emitter().cloned().unwrap();

        let mut second = props(&base);
        second.insert("sampleRate".into(), "0.5".into());
        PoolHook::<MemoryConnection>::configure(&mut hook, &second).unwrap();

        assert!(Arc::ptr_eq(&emitter, hook.emitter().unwrap()));
        assert_eq!(emitter.sample_rate(), 0.5);
    }

    #[test]
    fn intercept_and_reset() {
        let mut hook = StatsdInterceptor::new();
        let mut p = props(&[("hostname", "127.0.0.1"), ("port", "8125"), ("prefix", "")]);
        p.insert("sampleRate".into(), "0.0".into());
        PoolHook::<MemoryConnection>::configure(&mut hook, &p).unwrap();

        let mut wrapped = hook.intercept(MemoryDatabase::new().connect()).unwrap();
        wrapped.commit().unwrap();
        PoolHook::<MemoryConnection>::reset(&hook, &mut wrapped);
        assert!(!wrapped.is_closed());
    }
}
