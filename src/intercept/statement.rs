use super::dispatcher::Dispatcher;
use crate::resource::{CallableStatement, PreparedStatement, Statement, Value};

/// A statement that reports its reportable operations.
#[derive(Debug)]
pub struct StatementProxy<S> {
    inner: S,
    dispatcher: Dispatcher,
}

impl<S> StatementProxy<S> {
    pub(crate) fn new(inner: S, dispatcher: Dispatcher) -> Self {
        Self { inner, dispatcher }
    }

    pub fn get_ref(&self) -> &S {
        &self.inner
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: Statement> Statement for StatementProxy<S> {
    type Rows = S::Rows;
    type Error = S::Error;

    fn execute(&mut self, sql: &str) -> Result<bool, Self::Error> {
        self.dispatcher.dispatch("execute", || self.inner.execute(sql))
    }

    fn execute_query(&mut self, sql: &str) -> Result<Self::Rows, Self::Error> {
        self.dispatcher
            .dispatch("executeQuery", || self.inner.execute_query(sql))
    }

    fn execute_update(&mut self, sql: &str) -> Result<u64, Self::Error> {
        self.dispatcher
            .dispatch("executeUpdate", || self.inner.execute_update(sql))
    }

    fn add_batch(&mut self, sql: &str) -> Result<(), Self::Error> {
        self.dispatcher.dispatch("addBatch", || self.inner.add_batch(sql))
    }

    fn execute_batch(&mut self) -> Result<Vec<u64>, Self::Error> {
        self.dispatcher
            .dispatch("executeBatch", || self.inner.execute_batch())
    }

    fn close(&mut self) -> Result<(), Self::Error> {
        self.dispatcher.dispatch("close", || self.inner.close())
    }
}

impl<S: PreparedStatement> PreparedStatement for StatementProxy<S> {
    fn bind(&mut self, index: usize, value: Value) -> Result<(), Self::Error> {
        self.dispatcher
            .dispatch("setObject", || self.inner.bind(index, value))
    }

    fn clear_parameters(&mut self) -> Result<(), Self::Error> {
        self.dispatcher
            .dispatch("clearParameters", || self.inner.clear_parameters())
    }

    fn execute_prepared(&mut self) -> Result<bool, Self::Error> {
        self.dispatcher
            .dispatch("execute", || self.inner.execute_prepared())
    }

    fn execute_query_prepared(&mut self) -> Result<Self::Rows, Self::Error> {
        self.dispatcher
            .dispatch("executeQuery", || self.inner.execute_query_prepared())
    }

    fn execute_update_prepared(&mut self) -> Result<u64, Self::Error> {
        self.dispatcher
            .dispatch("executeUpdate", || self.inner.execute_update_prepared())
    }

    fn add_batch_prepared(&mut self) -> Result<(), Self::Error> {
        self.dispatcher
            .dispatch("addBatch", || self.inner.add_batch_prepared())
    }
}

impl<S: CallableStatement> CallableStatement for StatementProxy<S> {
    fn register_out_parameter(&mut self, index: usize) -> Result<(), Self::Error> {
        self.dispatcher.dispatch("registerOutParameter", || {
            self.inner.register_out_parameter(index)
        })
    }

    fn out_value(&self, index: usize) -> Result<Value, Self::Error> {
        self.dispatcher
            .dispatch("getObject", || self.inner.out_value(index))
    }
}

// ─── Raw or wrapped ──────────────────────────────────────────────

/// What an instrumented connection hands back: the wrapped statement on a
/// sampled call, the driver's own statement otherwise.
#[derive(Debug)]
pub enum Instrumented<S> {
    Raw(S),
    Wrapped(StatementProxy<S>),
}

impl<S> Instrumented<S> {
    pub fn is_wrapped(&self) -> bool {
        matches!(self, Self::Wrapped(_))
    }

    pub fn get_ref(&self) -> &S {
        match self {
            Self::Raw(s) => s,
            Self::Wrapped(p) => p.get_ref(),
        }
    }

    pub fn into_inner(self) -> S {
        match self {
            Self::Raw(s) => s,
            Self::Wrapped(p) => p.into_inner(),
        }
    }
}

impl<S: Statement> Statement for Instrumented<S> {
    type Rows = S::Rows;
    type Error = S::Error;

    fn execute(&mut self, sql: &str) -> Result<bool, Self::Error> {
        match self {
            Self::Raw(s) => s.execute(sql),
            Self::Wrapped(p) => p.execute(sql),
        }
    }

    fn execute_query(&mut self, sql: &str) -> Result<Self::Rows, Self::Error> {
        match self {
            Self::Raw(s) => s.execute_query(sql),
            Self::Wrapped(p) => p.execute_query(sql),
        }
    }

    fn execute_update(&mut self, sql: &str) -> Result<u64, Self::Error> {
        match self {
            Self::Raw(s) => s.execute_update(sql),
            Self::Wrapped(p) => p.execute_update(sql),
        }
    }

    fn add_batch(&mut self, sql: &str) -> Result<(), Self::Error> {
        match self {
            Self::Raw(s) => s.add_batch(sql),
            Self::Wrapped(p) => p.add_batch(sql),
        }
    }

    fn execute_batch(&mut self) -> Result<Vec<u64>, Self::Error> {
        match self {
            Self::Raw(s) => s.execute_batch(),
            Self::Wrapped(p) => p.execute_batch(),
        }
    }

    fn close(&mut self) -> Result<(), Self::Error> {
        match self {
            Self::Raw(s) => s.close(),
            Self::Wrapped(p) => p.close(),
        }
    }
}

impl<S: PreparedStatement> PreparedStatement for Instrumented<S> {
    fn bind(&mut self, index: usize, value: Value) -> Result<(), Self::Error> {
        match self {
            Self::Raw(s) => s.bind(index, value),
            Self::Wrapped(p) => p.bind(index, value),
        }
    }

    fn clear_parameters(&mut self) -> Result<(), Self::Error> {
        match self {
            Self::Raw(s) => s.clear_parameters(),
            Self::Wrapped(p) => p.clear_parameters(),
        }
    }

    fn execute_prepared(&mut self) -> Result<bool, Self::Error> {
        match self {
            Self::Raw(s) => s.execute_prepared(),
            Self::Wrapped(p) => p.execute_prepared(),
        }
    }

    fn execute_query_prepared(&mut self) -> Result<Self::Rows, Self::Error> {
        match self {
            Self::Raw(s) => s.execute_query_prepared(),
            Self::Wrapped(p) => p.execute_query_prepared(),
        }
    }

    fn execute_update_prepared(&mut self) -> Result<u64, Self::Error> {
        match self {
            Self::Raw(s) => s.execute_update_prepared(),
            Self::Wrapped(p) => p.execute_update_prepared(),
        }
    }

    fn add_batch_prepared(&mut self) -> Result<(), Self::Error> {
        match self {
            Self::Raw(s) => s.add_batch_prepared(),
            Self::Wrapped(p) => p.add_batch_prepared(),
        }
    }
}

impl<S: CallableStatement> CallableStatement for Instrumented<S> {
    fn register_out_parameter(&mut self, index: usize) -> Result<(), Self::Error> {
        match self {
            Self::Raw(s) => s.register_out_parameter(index),
            Self::Wrapped(p) => p.register_out_parameter(index),
        }
    }

    fn out_value(&self, index: usize) -> Result<Value, Self::Error> {
        match self {
            Self::Raw(s) => s.out_value(index),
            Self::Wrapped(p) => p.out_value(index),
        }
    }
}
