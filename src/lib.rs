//! # sqlx-txman
//!
//! Callback-scoped transactions for SQLx with named and list parameter expansion,
//! usable from plain blocking code.
//!
//! ## Features
//!
//! - **Named Placeholders**: Use `:param_name` instead of `?` in your SQL templates
//! - **List Expansion**: Bind a list to `IN (:keys)` and get `IN (?, ?, ?)` with the values flattened in place
//! - **Scoped Transactions**: `TxMan::begin` commits or rolls back and releases the connection exactly once,
//!   however the callback ends
//! - **Explicit Rollback**: Call `Tx::set_rollback` anywhere in the callback; everything the transaction did is undone
//! - **Plain Row Mappers**: Map rows with ordinary closures over SQLx rows
//! - **Pluggable Backend**: The lifecycle only depends on the `Connection` and `ConnectionSource` traits
//!
//! ## Quick Start
//!
//! Add to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! sqlx = "0.8"
//! sqlx-txman = "0.1"
//! ```
//!
//! ## Examples
//!
//! ### Basic Transaction
//!
//! ```rust,no_run
//! use sqlx_txman::{NamedParams, SqlxSource, TxMan};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let txman = TxMan::new(SqlxSource::connect("mysql://localhost/test")?);
//!
//! let inserted = txman.begin(|tx| {
//!     tx.update(
//!         "INSERT INTO users (id, name) VALUES (:id, :name)",
//!         &NamedParams::new().put("id", 42).put("name", "John Doe"),
//!     )
//! })?;
//! println!("Inserted {} rows", inserted);
//! # Ok(())
//! # }
//! ```
//!
//! ### Typed Query Results
//!
//! ```rust,no_run
//! use sqlx::Row;
//! use sqlx_txman::{NamedParams, SqlxSource, TxMan};
//!
//! struct User {
//!     id: i64,
//!     name: String,
//! }
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! # let txman = TxMan::new(SqlxSource::connect("mysql://localhost/test")?);
//! let users = txman.begin_read_only(|tx| {
//!     tx.execute(
//!         "SELECT id, name FROM users WHERE id IN (:ids) AND age >= :min_age",
//!         &NamedParams::new().put_list("ids", [1, 2, 3]).put("min_age", 18),
//!         |row| {
//!             Ok(User {
//!                 id: row.try_get("id")?,
//!                 name: row.try_get("name")?,
//!             })
//!         },
//!     )
//! })?;
//!
//! for user in users {
//!     println!("{}: {}", user.id, user.name);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ### Optional Results
//!
//! ```rust,no_run
//! use sqlx::Row;
//! use sqlx_txman::{NamedParams, SqlxSource, TxMan};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! # let txman = TxMan::new(SqlxSource::connect("mysql://localhost/test")?);
//! let name: Option<String> = txman.begin_read_only(|tx| {
//!     tx.execute_one(
//!         "SELECT name FROM users WHERE email = :email",
//!         &NamedParams::new().put("email", "user@example.com"),
//!         |row| Ok(row.try_get("name")?),
//!     )
//! })?;
//!
//! match name {
//!     Some(name) => println!("Found user: {}", name),
//!     None => println!("User not found"),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ### Rolling Back
//!
//! ```rust,no_run
//! use sqlx_txman::{NamedParams, SqlxSource, TxMan};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! # let txman = TxMan::new(SqlxSource::connect("mysql://localhost/test")?);
//! txman.begin(|tx| {
//!     tx.update(
//!         "UPDATE accounts SET balance = balance - :amount WHERE id = :id",
//!         &NamedParams::new().put("amount", 100).put("id", 1),
//!     )?;
//!     // Nothing above is kept once the scope ends.
//!     tx.set_rollback();
//!     Ok::<_, sqlx_txman::Error>(())
//! })?;
//! # Ok(())
//! # }
//! ```
//!
//! ## How It Works
//!
//! 1. **Acquire**: `TxMan` takes a connection from its `ConnectionSource` and wraps it in a `Tx`;
//!    read-write transactions disable autocommit
//! 2. **Expand**: Every statement's `:name` references are rewritten to `?` in template order and the
//!    values are flattened into a matching positional list
//! 3. **Finalize**: When the callback returns, the `Tx` commits (or rolls back if flagged) and releases
//!    its connection, even when the commit itself fails
//!
//! A callback that returns `Err` without calling `set_rollback` still commits. Use
//! `TxManOptions::rollback_on_error` to roll back on errors instead.
//!
//! ## Limitations
//!
//! - Only drivers that use `?` placeholders (MySQL, SQLite)
//! - Placeholder names must match `[a-zA-Z0-9_-]+`
//! - Blocking API: do not call it from inside an async runtime
//!
//! ## License
//!
//! Licensed under either of Apache License, Version 2.0 or MIT license at your option.

pub mod builder;
pub mod connection;
pub mod error;
pub mod pool;
pub mod tx;
pub mod txman;
pub mod value;

#[cfg(test)]
mod test_utils;

pub use builder::{expand, expand_positional, ExpandedStatement};
pub use connection::{Connection, ConnectionSource};
pub use error::{Error, Operation, Result};
pub use pool::{SourceOptions, SqlxConnection, SqlxSource};
pub use tx::Tx;
pub use txman::{TxMan, TxManOptions};
pub use value::{NamedParams, Param, Params, PositionalParams, Value};

/// Convenience re-exports for common use cases
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::value::{NamedParams, PositionalParams};
    pub use crate::SqlxSource;
    pub use crate::Tx;
    pub use crate::TxMan;
}
