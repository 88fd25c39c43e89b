use std::sync::Arc;

use super::dispatcher::{
    Binding, Dispatcher, Sampling, CALLABLE_STATEMENT, PREPARED_STATEMENT, STATEMENT,
};
use super::statement::{Instrumented, StatementProxy};
use crate::metrics::MetricsEmitter;
use crate::resource::{CallableStatement, PreparedStatement, Statement};

/// Wraps statements returned by an instrumented connection.
#[derive(Clone)]
pub struct ProxyFactory {
    emitter: Arc<MetricsEmitter>,
}

impl ProxyFactory {
    pub fn new(emitter: Arc<MetricsEmitter>) -> Self {
        Self { emitter }
    }

    pub fn statement<S: Statement>(&self, statement: S, decision: Sampling) -> Instrumented<S> {
        self.wrap(statement, &STATEMENT, decision)
    }

    pub fn prepared_statement<S: PreparedStatement>(
        &self,
        statement: S,
        decision: Sampling,
    ) -> Instrumented<S> {
        self.wrap(statement, &PREPARED_STATEMENT, decision)
    }

    pub fn callable_statement<S: CallableStatement>(
        &self,
        statement: S,
        decision: Sampling,
    ) -> Instrumented<S> {
        self.wrap(statement, &CALLABLE_STATEMENT, decision)
    }

    /// Unsampled children stay raw so they never pay for instrumentation.
    fn wrap<S>(&self, statement: S, binding: &'static Binding, decision: Sampling) -> Instrumented<S> {
        match decision {
            Sampling::Sampled => Instrumented::Wrapped(StatementProxy::new(
                statement,
                Dispatcher::inherit(self.emitter.clone(), binding, decision),
            )),
            Sampling::Skipped => Instrumented::Raw(statement),
        }
    }
}
