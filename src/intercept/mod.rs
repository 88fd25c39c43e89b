//! Decorators that time pooled-resource calls.
//!
//! - [`dispatcher`]: bindings, the sampling decision, and the timing wrapper
//! - [`connection`]: the connection decorator handed out by the pool hook
//! - [`proxy`]: wraps the statements a sampled connection call returns
//! - [`statement`]: statement decorators and the raw-or-wrapped enum

pub mod connection;
pub mod dispatcher;
pub mod proxy;
pub mod statement;

pub use connection::InstrumentedConnection;
pub use dispatcher::{
    Binding, Dispatcher, Sampling, CALLABLE_STATEMENT, CONNECTION, PREPARED_STATEMENT, STATEMENT,
};
pub use proxy::ProxyFactory;
pub use statement::{Instrumented, StatementProxy};
