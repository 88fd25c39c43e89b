use std::sync::Arc;

use super::dispatcher::{Dispatcher, CONNECTION};
use super::proxy::ProxyFactory;
use super::statement::Instrumented;
use crate::metrics::MetricsEmitter;
use crate::resource::Connection;

/// Decorator over a pooled connection.
///
/// Every operation is a top-level call with its own sampling decision.
/// Statement-creating operations pass that same decision to the proxy
/// factory, so the returned statement is wrapped exactly when the call that
/// produced it was reported.
pub struct InstrumentedConnection<C> {
    inner: C,
    dispatcher: Dispatcher,
    proxies: ProxyFactory,
}

impl<C: Connection> InstrumentedConnection<C> {
    pub fn new(inner: C, emitter: Arc<MetricsEmitter>) -> Self {
        Self {
            inner,
            dispatcher: Dispatcher::top_level(emitter.clone(), &CONNECTION),
            proxies: ProxyFactory::new(emitter),
        }
    }

    pub fn get_ref(&self) -> &C {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut C {
        &mut self.inner
    }

    pub fn into_inner(self) -> C {
        self.inner
    }
}

impl<C: Connection> Connection for InstrumentedConnection<C> {
    type Error = C::Error;
    type Metadata = C::Metadata;
    type Statement = Instrumented<C::Statement>;
    type Prepared = Instrumented<C::Prepared>;
    type Callable = Instrumented<C::Callable>;

    fn create_statement(&mut self) -> Result<Self::Statement, Self::Error> {
        let decision = self.dispatcher.decide();
        let raw = self
            .dispatcher
            .dispatch_with(decision, "createStatement", || self.inner.create_statement())?;
        Ok(self.proxies.statement(raw, decision))
    }

    fn prepare_statement(&mut self, sql: &str) -> Result<Self::Prepared, Self::Error> {
        let decision = self.dispatcher.decide();
        let raw = self
            .dispatcher
            .dispatch_with(decision, "prepareStatement", || self.inner.prepare_statement(sql))?;
        Ok(self.proxies.prepared_statement(raw, decision))
    }

    fn prepare_call(&mut self, sql: &str) -> Result<Self::Callable, Self::Error> {
        let decision = self.dispatcher.decide();
        let raw = self
            .dispatcher
            .dispatch_with(decision, "prepareCall", || self.inner.prepare_call(sql))?;
        Ok(self.proxies.callable_statement(raw, decision))
    }

    fn commit(&mut self) -> Result<(), Self::Error> {
        self.dispatcher.dispatch("commit", || self.inner.commit())
    }

    fn rollback(&mut self) -> Result<(), Self::Error> {
        self.dispatcher.dispatch("rollback", || self.inner.rollback())
    }

    fn metadata(&self) -> Result<Self::Metadata, Self::Error> {
        self.dispatcher.dispatch("getMetadata", || self.inner.metadata())
    }

    fn set_auto_commit(&mut self, enabled: bool) -> Result<(), Self::Error> {
        self.dispatcher
            .dispatch("setAutoCommit", || self.inner.set_auto_commit(enabled))
    }

    fn is_closed(&self) -> bool {
        // Infallible, so no decision to make
        self.inner.is_closed()
    }

    fn close(&mut self) -> Result<(), Self::Error> {
        self.dispatcher.dispatch("close", || self.inner.close())
    }
}

impl<C: std::fmt::Debug> std::fmt::Debug for InstrumentedConnection<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstrumentedConnection")
            .field("inner", &self.inner)
            .field("dispatcher", &self.dispatcher)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryDatabase, MemoryError};
    use crate::resource::Statement;
    use crate::testing::{config, emitter};

    #[test]
    fn create_statement_then_execute_reports_in_order() {
        let (emitter, transport) = emitter(&config("jdbc.pool.", 1.0));
        let mut conn = InstrumentedConnection::new(MemoryDatabase::new().connect(), emitter);

        let mut stmt = conn.create_statement().unwrap();
        assert!(stmt.is_wrapped());
        stmt.execute("CREATE TABLE toto (a INTEGER)").unwrap();

        let lines = transport.lines();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("jdbc.pool.connection.createStatement.timing:"));
        assert!(lines[1].starts_with("jdbc.pool.statement.execute.timing:"));
        assert!(lines.iter().all(|l| l.ends_with("|ms")));
    }

    #[test]
    fn unsampled_call_returns_raw_statement() {
        let (emitter, transport) = emitter(&config("", 0.0));
        let mut conn = InstrumentedConnection::new(MemoryDatabase::new().connect(), emitter);

        let mut stmt = conn.create_statement().unwrap();
        assert!(!stmt.is_wrapped());
        stmt.execute("INSERT INTO t VALUES (1)").unwrap();
        conn.commit().unwrap();
        assert_eq!(transport.calls(), 0);
    }

    #[test]
    fn non_reportable_connection_operations_are_silent() {
        let (emitter, transport) = emitter(&config("", 1.0));
        let mut conn = InstrumentedConnection::new(MemoryDatabase::new().connect(), emitter);

        conn.set_auto_commit(false).unwrap();
        assert!(!conn.is_closed());
        conn.close().unwrap();
        assert!(conn.is_closed());
        assert!(transport.lines().is_empty());
    }

    #[test]
    fn driver_errors_are_not_altered() {
        let (emitter, transport) = emitter(&config("", 1.0));
        let mut conn = InstrumentedConnection::new(MemoryDatabase::new().connect(), emitter);
        conn.close().unwrap();

        let err = conn.commit().unwrap_err();
        assert_eq!(err, MemoryError::Closed);

        let err = conn.create_statement().unwrap_err();
        assert_eq!(err, MemoryError::Closed);

        // both calls were still timed
        let lines = transport.lines();
        assert!(lines[0].starts_with("connection.commit.timing:"));
        assert!(lines[1].starts_with("connection.createStatement.timing:"));
    }

    #[test]
    fn metadata_is_timed_as_get_metadata() {
        let (emitter, transport) = emitter(&config("", 1.0));
        let conn = InstrumentedConnection::new(MemoryDatabase::new().connect(), emitter);

        let meta = conn.metadata().unwrap();
        assert_eq!(meta.product, "memory");
        assert!(transport.lines()[0].starts_with("connection.getMetadata.timing:"));
    }

    #[test]
    fn statement_is_wrapped_exactly_when_its_creation_was_reported() {
        let (emitter, transport) = emitter(&config("half.", 0.5));
        let db = MemoryDatabase::new();
        db.connect()
            .create_statement()
            .unwrap()
            .execute("CREATE TABLE t (a INTEGER)")
            .unwrap();
        let mut conn = InstrumentedConnection::new(db.connect(), emitter);

        let (mut wrapped, mut raw) = (0, 0);
        for _ in 0..500 {
            let before = transport.lines().len();
            let mut stmt = conn.create_statement().unwrap();
            let lines = transport.lines();
            let reported = match &lines[before..] {
                [] => false,
                [line] => {
                    assert!(line.starts_with("half.connection.createStatement.timing:"));
                    assert!(line.ends_with("|@0.500000"));
                    true
                }
                more => panic!("one call reported {} lines", more.len()),
            };
            assert_eq!(stmt.is_wrapped(), reported);

            // the child follows the same decision
            stmt.execute("SELECT * FROM t").unwrap();
            assert_eq!(transport.lines().len() - lines.len(), usize::from(reported));

            if reported {
                wrapped += 1;
            } else {
                raw += 1;
            }
        }
        assert!(wrapped > 150 && raw > 150, "wrapped {wrapped}, raw {raw}");
    }
}
