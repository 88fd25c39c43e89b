//! Capabilities of the pooled resources we instrument.
//!
//! A driver implements these; the interceptor wraps them in decorators that
//! implement the very same traits, so callers cannot tell the difference.

use serde::Serialize;

/// A bound or returned SQL value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Value {
    Null,
    Int(i64),
    Real(f64),
    Text(String),
}

pub trait Statement {
    type Rows;
    type Error;

    fn execute(&mut self, sql: &str) -> Result<bool, Self::Error>;
    fn execute_query(&mut self, sql: &str) -> Result<Self::Rows, Self::Error>;
    fn execute_update(&mut self, sql: &str) -> Result<u64, Self::Error>;
    fn add_batch(&mut self, sql: &str) -> Result<(), Self::Error>;
    fn execute_batch(&mut self) -> Result<Vec<u64>, Self::Error>;
    fn close(&mut self) -> Result<(), Self::Error>;
}

/// A statement compiled once with positional parameters (1-based).
pub trait PreparedStatement: Statement {
    fn bind(&mut self, index: usize, value: Value) -> Result<(), Self::Error>;
    fn clear_parameters(&mut self) -> Result<(), Self::Error>;

    fn execute_prepared(&mut self) -> Result<bool, Self::Error>;
    fn execute_query_prepared(&mut self) -> Result<Self::Rows, Self::Error>;
    fn execute_update_prepared(&mut self) -> Result<u64, Self::Error>;
    fn add_batch_prepared(&mut self) -> Result<(), Self::Error>;
}

/// A stored-procedure call with out parameters.
pub trait CallableStatement: PreparedStatement {
    fn register_out_parameter(&mut self, index: usize) -> Result<(), Self::Error>;
    fn out_value(&self, index: usize) -> Result<Value, Self::Error>;
}

pub trait Connection {
    type Error;
    type Metadata;
    type Statement: Statement<Error = Self::Error>;
    type Prepared: PreparedStatement<Error = Self::Error>;
    type Callable: CallableStatement<Error = Self::Error>;

    fn create_statement(&mut self) -> Result<Self::Statement, Self::Error>;
    fn prepare_statement(&mut self, sql: &str) -> Result<Self::Prepared, Self::Error>;
    fn prepare_call(&mut self, sql: &str) -> Result<Self::Callable, Self::Error>;

    fn commit(&mut self) -> Result<(), Self::Error>;
    fn rollback(&mut self) -> Result<(), Self::Error>;
    fn metadata(&self) -> Result<Self::Metadata, Self::Error>;

    fn set_auto_commit(&mut self, enabled: bool) -> Result<(), Self::Error>;
    fn is_closed(&self) -> bool;
    fn close(&mut self) -> Result<(), Self::Error>;
}
