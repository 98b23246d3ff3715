//! The seam between the transaction lifecycle and the database.
//!
//! [`ConnectionSource`] stands for the external pool, [`Connection`] for the
//! execution engine behind one pooled connection. [`SqlxSource`](crate::SqlxSource)
//! implements both on top of SQLx; tests substitute an in-memory double.

use crate::value::Value;

/// One exclusively owned database connection.
///
/// Statements arrive already expanded: `sql` uses only `?` placeholders and
/// `params` holds one value per placeholder, in order.
pub trait Connection {
    /// Raw result row handed to row mappers.
    type Row;

    /// Disables autocommit so that every following statement belongs to one
    /// transaction until [`commit`](Self::commit) or [`rollback`](Self::rollback).
    fn begin(&mut self) -> Result<(), sqlx::Error>;

    fn query(&mut self, sql: &str, params: &[Value]) -> Result<Vec<Self::Row>, sqlx::Error>;

    /// Runs a mutating statement and returns the number of affected rows.
    fn update(&mut self, sql: &str, params: &[Value]) -> Result<u64, sqlx::Error>;

    fn commit(&mut self) -> Result<(), sqlx::Error>;

    fn rollback(&mut self) -> Result<(), sqlx::Error>;

    /// Hands the connection back to its source.
    fn release(self) -> Result<(), sqlx::Error>;
}

/// Hands out ready-to-use connections on demand.
pub trait ConnectionSource {
    type Connection: Connection;

    fn acquire(&self) -> Result<Self::Connection, sqlx::Error>;
}

impl<S: ConnectionSource + ?Sized> ConnectionSource for &S {
    type Connection = S::Connection;

    fn acquire(&self) -> Result<Self::Connection, sqlx::Error> {
        (**self).acquire()
    }
}

impl<S: ConnectionSource + ?Sized> ConnectionSource for std::sync::Arc<S> {
    type Connection = S::Connection;

    fn acquire(&self) -> Result<Self::Connection, sqlx::Error> {
        (**self).acquire()
    }
}
