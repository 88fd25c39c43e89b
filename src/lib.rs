//! Sampled StatsD timing for pooled database connections.
//!
//! A pool registers a [`StatsdInterceptor`] and runs every connection it
//! hands out through [`PoolHook::intercept`]. The returned
//! [`InstrumentedConnection`] behaves exactly like the driver's connection,
//! except that a sampled share of its calls, and of the statements those
//! calls create, are timed and sent to the collector as
//! `<prefix><namespace>.<operation>.timing:<value>|ms[|@<rate>]`.

pub mod config;
pub mod error;
pub mod hook;
pub mod intercept;
pub mod memory;
pub mod metrics;
pub mod resource;

#[cfg(test)]
mod testing;

pub use config::{EmitterConfig, Endpoint, FlushPolicy, TimingUnit};
pub use error::{ConfigError, DecodeError, HookError};
pub use hook::{PoolHook, StatsdInterceptor};
pub use intercept::{Instrumented, InstrumentedConnection, ProxyFactory, Sampling};
pub use metrics::{MetricKind, MetricSample, MetricsEmitter};
pub use resource::{CallableStatement, Connection, PreparedStatement, Statement, Value};
