//! In-memory database implementing the resource traits.
//!
//! Understands just enough SQL to drive the interceptor end to end:
//!
//! ```text
//! CREATE TABLE <name> ...
//! INSERT INTO <name> VALUES (<literal>, ...)   -- or (?, ...) when prepared
//! SELECT ... FROM <name>
//! CALL <procedure>(?)                          -- out params get the row total
//! FAIL ...                                     -- always errors
//! ```
//!
//! Inserts made with auto-commit off stay private to the connection until
//! `commit()`.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use thiserror::Error;
use uuid::Uuid;

use crate::resource::{CallableStatement, Connection, PreparedStatement, Statement, Value};

pub type Rows = Vec<Vec<Value>>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum MemoryError {
    #[error("connection or statement is closed")]
    Closed,

    #[error("no such table: {0}")]
    NoSuchTable(String),

    #[error("unsupported statement: {0}")]
    Syntax(String),

    #[error("statement failed: {0}")]
    Failed(String),

    #[error("parameter {0} is not bound")]
    Unbound(usize),

    #[error("parameter {0} was not registered as out parameter")]
    NotRegistered(usize),
}

/// Shared store; clones see the same tables.
#[derive(Debug, Clone, Default)]
pub struct MemoryDatabase {
    tables: Arc<Mutex<HashMap<String, Rows>>>,
    latency: Duration,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep this long inside every executed statement.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn connect(&self) -> MemoryConnection {
        MemoryConnection {
            id: Uuid::new_v4(),
            db: self.clone(),
            session: Arc::new(Mutex::new(Session {
                closed: false,
                auto_commit: true,
                pending: Vec::new(),
            })),
        }
    }

    pub fn row_count(&self, table: &str) -> usize {
        self.tables.lock().get(table).map_or(0, Vec::len)
    }

    fn total_rows(&self) -> usize {
        self.tables.lock().values().map(Vec::len).sum()
    }
}

// ─── Connection ──────────────────────────────────────────────────

#[derive(Debug)]
struct Session {
    closed: bool,
    auto_commit: bool,
    pending: Vec<(String, Vec<Value>)>,
}

#[derive(Debug)]
pub struct MemoryConnection {
    id: Uuid,
    db: MemoryDatabase,
    session: Arc<Mutex<Session>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MemoryMetadata {
    pub product: &'static str,
    pub version: &'static str,
    pub connection_id: Uuid,
}

impl MemoryConnection {
    pub fn id(&self) -> Uuid {
        self.id
    }

    fn open_statement(&self, sql: Option<&str>) -> Result<MemoryStatement, MemoryError> {
        self.ensure_open()?;
        Ok(MemoryStatement {
            db: self.db.clone(),
            session: self.session.clone(),
            sql: sql.map(str::to_owned),
            params: BTreeMap::new(),
            batch: Vec::new(),
            registered: BTreeSet::new(),
            out: BTreeMap::new(),
            closed: false,
        })
    }

    fn ensure_open(&self) -> Result<(), MemoryError> {
        if self.session.lock().closed {
            Err(MemoryError::Closed)
        } else {
            Ok(())
        }
    }
}

impl Connection for MemoryConnection {
    type Error = MemoryError;
    type Metadata = MemoryMetadata;
    type Statement = MemoryStatement;
    type Prepared = MemoryStatement;
    type Callable = MemoryStatement;

    fn create_statement(&mut self) -> Result<MemoryStatement, MemoryError> {
        self.open_statement(None)
    }

    fn prepare_statement(&mut self, sql: &str) -> Result<MemoryStatement, MemoryError> {
        self.open_statement(Some(sql))
    }

    fn prepare_call(&mut self, sql: &str) -> Result<MemoryStatement, MemoryError> {
        self.open_statement(Some(sql))
    }

    fn commit(&mut self) -> Result<(), MemoryError> {
        self.ensure_open()?;
        let pending = std::mem::take(&mut self.session.lock().pending);
        let mut tables = self.db.tables.lock();
        for (table, row) in pending {
            tables.entry(table).or_default().push(row);
        }
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), MemoryError> {
        self.ensure_open()?;
        self.session.lock().pending.clear();
        Ok(())
    }

    fn metadata(&self) -> Result<MemoryMetadata, MemoryError> {
        self.ensure_open()?;
        Ok(MemoryMetadata {
            product: "memory",
            version: env!("CARGO_PKG_VERSION"),
            connection_id: self.id,
        })
    }

    fn set_auto_commit(&mut self, enabled: bool) -> Result<(), MemoryError> {
        self.ensure_open()?;
        self.session.lock().auto_commit = enabled;
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.session.lock().closed
    }

    fn close(&mut self) -> Result<(), MemoryError> {
        let mut session = self.session.lock();
        session.closed = true;
        session.pending.clear();
        Ok(())
    }
}

// ─── Statement ───────────────────────────────────────────────────

#[derive(Debug)]
enum Batched {
    Sql(String),
    Params(Vec<Value>),
}

enum Outcome {
    Rows(Rows),
    Updated(u64),
    Done,
}

/// One type serves plain, prepared and callable statements.
#[derive(Debug)]
pub struct MemoryStatement {
    db: MemoryDatabase,
    session: Arc<Mutex<Session>>,
    sql: Option<String>,
    params: BTreeMap<usize, Value>,
    batch: Vec<Batched>,
    registered: BTreeSet<usize>,
    out: BTreeMap<usize, Value>,
    closed: bool,
}

impl MemoryStatement {
    fn ensure_open(&self) -> Result<(), MemoryError> {
        if self.closed || self.session.lock().closed {
            Err(MemoryError::Closed)
        } else {
            Ok(())
        }
    }

    fn prepared_sql(&self) -> Result<String, MemoryError> {
        self.sql
            .clone()
            .ok_or_else(|| MemoryError::Syntax("no prepared SQL".into()))
    }

    /// Bound values in placeholder order; every `?` must be bound.
    fn bound_params(&self, sql: &str) -> Result<Vec<Value>, MemoryError> {
        let placeholders = sql.matches('?').count();
        (1..=placeholders)
            .map(|i| self.params.get(&i).cloned().ok_or(MemoryError::Unbound(i)))
            .collect()
    }

    fn run(&mut self, sql: &str, params: Vec<Value>) -> Result<Outcome, MemoryError> {
        self.ensure_open()?;
        if !self.db.latency.is_zero() {
            std::thread::sleep(self.db.latency);
        }

        let words: Vec<&str> = sql.split_whitespace().collect();
        let upper: Vec<String> = words.iter().map(|w| w.to_ascii_uppercase()).collect();
        let upper: Vec<&str> = upper.iter().map(String::as_str).collect();

        match upper.as_slice() {
            ["FAIL", ..] => Err(MemoryError::Failed(sql.to_owned())),
            ["CREATE", "TABLE", ..] if words.len() > 2 => {
                let name = table_name(words[2]);
                self.db.tables.lock().entry(name).or_default();
                Ok(Outcome::Done)
            }
            ["INSERT", "INTO", ..] if words.len() > 2 => {
                let name = table_name(words[2]);
                let row = if params.is_empty() {
                    parse_literals(sql)
                } else {
                    params
                };
                let mut session = self.session.lock();
                if session.auto_commit {
                    self.db.tables.lock().entry(name).or_default().push(row);
                } else {
                    session.pending.push((name, row));
                }
                Ok(Outcome::Updated(1))
            }
            ["SELECT", ..] => {
                let from = upper
                    .iter()
                    .position(|w| *w == "FROM")
                    .and_then(|i| words.get(i + 1))
                    .ok_or_else(|| MemoryError::Syntax(sql.to_owned()))?;
                let name = table_name(from);
                let limit = match upper.iter().position(|w| *w == "LIMIT") {
                    Some(i) => words
                        .get(i + 1)
                        .and_then(|w| w.parse::<usize>().ok())
                        .ok_or_else(|| MemoryError::Syntax(sql.to_owned()))?,
                    None => usize::MAX,
                };

                // tables and session are never locked together
                let mut rows: Rows = self
                    .db
                    .tables
                    .lock()
                    .get(&name)
                    .ok_or(MemoryError::NoSuchTable(name.clone()))?
                    .iter()
                    .take(limit)
                    .cloned()
                    .collect();
                let room = limit - rows.len();
                rows.extend(
                    self.session
                        .lock()
                        .pending
                        .iter()
                        .filter(|(t, _)| *t == name)
                        .take(room)
                        .map(|(_, r)| r.clone()),
                );
                Ok(Outcome::Rows(rows))
            }
            ["CALL", ..] => {
                let total = Value::Int(self.db.total_rows() as i64);
                for &i in &self.registered {
                    self.out.insert(i, total.clone());
                }
                Ok(Outcome::Done)
            }
            _ => Err(MemoryError::Syntax(sql.to_owned())),
        }
    }

    fn run_execute(&mut self, sql: &str, params: Vec<Value>) -> Result<bool, MemoryError> {
        Ok(matches!(self.run(sql, params)?, Outcome::Rows(_)))
    }

    fn run_query(&mut self, sql: &str, params: Vec<Value>) -> Result<Rows, MemoryError> {
        match self.run(sql, params)? {
            Outcome::Rows(rows) => Ok(rows),
            _ => Err(MemoryError::Syntax(format!("not a query: {sql}"))),
        }
    }

    fn run_update(&mut self, sql: &str, params: Vec<Value>) -> Result<u64, MemoryError> {
        match self.run(sql, params)? {
            Outcome::Updated(n) => Ok(n),
            Outcome::Done => Ok(0),
            Outcome::Rows(_) => Err(MemoryError::Syntax(format!("not an update: {sql}"))),
        }
    }
}

impl Statement for MemoryStatement {
    type Rows = Rows;
    type Error = MemoryError;

    fn execute(&mut self, sql: &str) -> Result<bool, MemoryError> {
        self.run_execute(sql, Vec::new())
    }

    fn execute_query(&mut self, sql: &str) -> Result<Rows, MemoryError> {
        self.run_query(sql, Vec::new())
    }

    fn execute_update(&mut self, sql: &str) -> Result<u64, MemoryError> {
        self.run_update(sql, Vec::new())
    }

    fn add_batch(&mut self, sql: &str) -> Result<(), MemoryError> {
        self.ensure_open()?;
        self.batch.push(Batched::Sql(sql.to_owned()));
        Ok(())
    }

    fn execute_batch(&mut self) -> Result<Vec<u64>, MemoryError> {
        let batch = std::mem::take(&mut self.batch);
        let mut counts = Vec::with_capacity(batch.len());
        for entry in batch {
            let n = match entry {
                Batched::Sql(sql) => self.run_update(&sql, Vec::new())?,
                Batched::Params(params) => {
                    let sql = self.prepared_sql()?;
                    self.run_update(&sql, params)?
                }
            };
            counts.push(n);
        }
        Ok(counts)
    }

    fn close(&mut self) -> Result<(), MemoryError> {
        self.closed = true;
        Ok(())
    }
}

impl PreparedStatement for MemoryStatement {
    fn bind(&mut self, index: usize, value: Value) -> Result<(), MemoryError> {
        self.ensure_open()?;
        self.params.insert(index, value);
        Ok(())
    }

    fn clear_parameters(&mut self) -> Result<(), MemoryError> {
        self.params.clear();
        Ok(())
    }

    fn execute_prepared(&mut self) -> Result<bool, MemoryError> {
        let sql = self.prepared_sql()?;
        let params = self.bound_params(&sql)?;
        self.run_execute(&sql, params)
    }

    fn execute_query_prepared(&mut self) -> Result<Rows, MemoryError> {
        let sql = self.prepared_sql()?;
        let params = self.bound_params(&sql)?;
        self.run_query(&sql, params)
    }

    fn execute_update_prepared(&mut self) -> Result<u64, MemoryError> {
        let sql = self.prepared_sql()?;
        let params = self.bound_params(&sql)?;
        self.run_update(&sql, params)
    }

    fn add_batch_prepared(&mut self) -> Result<(), MemoryError> {
        let sql = self.prepared_sql()?;
        let params = self.bound_params(&sql)?;
        self.batch.push(Batched::Params(params));
        Ok(())
    }
}

impl CallableStatement for MemoryStatement {
    fn register_out_parameter(&mut self, index: usize) -> Result<(), MemoryError> {
        self.ensure_open()?;
        self.registered.insert(index);
        // out parameters are not inputs
        self.params.insert(index, Value::Null);
        Ok(())
    }

    fn out_value(&self, index: usize) -> Result<Value, MemoryError> {
        if !self.registered.contains(&index) {
            return Err(MemoryError::NotRegistered(index));
        }
        Ok(self.out.get(&index).cloned().unwrap_or(Value::Null))
    }
}

// ─── Helpers ─────────────────────────────────────────────────────

fn table_name(word: &str) -> String {
    word.split('(')
        .next()
        .unwrap_or(word)
        .trim_end_matches(';')
        .to_owned()
}

/// Values of the first parenthesized list after `VALUES`.
fn parse_literals(sql: &str) -> Vec<Value> {
    let upper = sql.to_ascii_uppercase();
    let Some(start) = upper.find("VALUES").and_then(|i| sql[i..].find('(').map(|j| i + j + 1))
    else {
        return Vec::new();
    };
    let end = sql[start..].find(')').map_or(sql.len(), |j| start + j);

    sql[start..end]
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(parse_literal)
        .collect()
}

fn parse_literal(raw: &str) -> Value {
    if raw.eq_ignore_ascii_case("null") {
        Value::Null
    } else if let Ok(i) = raw.parse::<i64>() {
        Value::Int(i)
    } else if let Ok(f) = raw.parse::<f64>() {
        Value::Real(f)
    } else {
        Value::Text(raw.trim_matches('\'').to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_select_literals() {
        let db = MemoryDatabase::new();
        let mut conn = db.connect();
        let mut stmt = conn.create_statement().unwrap();

        assert!(!stmt.execute("CREATE TABLE users (id INTEGER, name TEXT)").unwrap());
        assert_eq!(stmt.execute_update("INSERT INTO users VALUES (1, 'ann')").unwrap(), 1);

        let rows = stmt.execute_query("SELECT * FROM users").unwrap();
        assert_eq!(rows, vec![vec![Value::Int(1), Value::Text("ann".into())]]);
        assert!(stmt.execute("SELECT id FROM users").unwrap());
    }

    #[test]
    fn select_limit_caps_committed_and_pending_rows() {
        let db = MemoryDatabase::new();
        let mut conn = db.connect();
        let mut stmt = conn.create_statement().unwrap();
        for i in 0..5 {
            stmt.execute_update(&format!("INSERT INTO orders VALUES ({i})")).unwrap();
        }

        let rows = stmt.execute_query("SELECT * FROM orders LIMIT 3").unwrap();
        assert_eq!(rows, vec![vec![Value::Int(0)], vec![Value::Int(1)], vec![Value::Int(2)]]);

        conn.set_auto_commit(false).unwrap();
        let mut stmt = conn.create_statement().unwrap();
        stmt.execute_update("INSERT INTO orders VALUES (9)").unwrap();
        assert_eq!(stmt.execute_query("SELECT * FROM orders LIMIT 10").unwrap().len(), 6);

        assert!(matches!(
            stmt.execute_query("SELECT * FROM orders LIMIT many"),
            Err(MemoryError::Syntax(_))
        ));
    }

    #[test]
    fn prepared_statement_requires_every_parameter() {
        let db = MemoryDatabase::new();
        let mut conn = db.connect();
        let mut stmt = conn.prepare_statement("INSERT INTO t VALUES (?, ?)").unwrap();

        stmt.bind(1, Value::Int(1)).unwrap();
        assert_eq!(stmt.execute_update_prepared(), Err(MemoryError::Unbound(2)));

        stmt.bind(2, Value::Real(2.5)).unwrap();
        assert_eq!(stmt.execute_update_prepared(), Ok(1));
        assert_eq!(db.row_count("t"), 1);
    }

    #[test]
    fn batches_run_in_order() {
        let db = MemoryDatabase::new();
        let mut conn = db.connect();
        let mut stmt = conn.prepare_statement("INSERT INTO t VALUES (?)").unwrap();

        for i in 0..3 {
            stmt.bind(1, Value::Int(i)).unwrap();
            stmt.add_batch_prepared().unwrap();
        }
        assert_eq!(stmt.execute_batch().unwrap(), vec![1, 1, 1]);
        assert_eq!(db.row_count("t"), 3);
    }

    #[test]
    fn manual_commit_and_rollback() {
        let db = MemoryDatabase::new();
        let mut conn = db.connect();
        conn.set_auto_commit(false).unwrap();
        let mut stmt = conn.create_statement().unwrap();

        stmt.execute_update("INSERT INTO t VALUES (1)").unwrap();
        assert_eq!(db.row_count("t"), 0);
        conn.rollback().unwrap();

        stmt.execute_update("INSERT INTO t VALUES (2)").unwrap();
        conn.commit().unwrap();
        assert_eq!(db.row_count("t"), 1);
    }

    #[test]
    fn callable_fills_out_parameters() {
        let db = MemoryDatabase::new();
        let mut conn = db.connect();
        conn.create_statement()
            .unwrap()
            .execute_update("INSERT INTO t VALUES (1)")
            .unwrap();

        let mut call = conn.prepare_call("CALL count_rows(?)").unwrap();
        assert_eq!(call.out_value(1), Err(MemoryError::NotRegistered(1)));
        call.register_out_parameter(1).unwrap();
        call.execute_prepared().unwrap();
        assert_eq!(call.out_value(1), Ok(Value::Int(1)));
    }

    #[test]
    fn failures_and_closed_handles() {
        let db = MemoryDatabase::new();
        let mut conn = db.connect();
        let mut stmt = conn.create_statement().unwrap();

        assert!(matches!(stmt.execute("FAIL please"), Err(MemoryError::Failed(_))));
        assert!(matches!(stmt.execute("DROP TABLE x"), Err(MemoryError::Syntax(_))));
        assert_eq!(
            stmt.execute_query("SELECT * FROM missing"),
            Err(MemoryError::NoSuchTable("missing".into()))
        );

        conn.close().unwrap();
        assert_eq!(stmt.execute("SELECT * FROM t"), Err(MemoryError::Closed));
        assert!(matches!(conn.create_statement(), Err(MemoryError::Closed)));
    }
}
