use tracing::{debug, warn};

use crate::connection::Connection;
use crate::error::{Error, Operation};
use crate::value::Params;

/// One transaction, handed to the callback of [`TxMan::begin`](crate::TxMan::begin)
/// or [`TxMan::begin_read_only`](crate::TxMan::begin_read_only).
///
/// A `Tx` exclusively owns its connection for the duration of the callback.
/// When the callback returns, the scope finalizes it: read-write transactions
/// commit, or roll back when [`set_rollback`](Tx::set_rollback) was called;
/// read-only transactions just release the connection. Finalize runs exactly
/// once, and if the owner never gets to it (the callback panicked) it runs on
/// drop.
///
/// # Examples
///
/// ```rust,no_run
/// use sqlx::Row;
/// use sqlx_txman::{NamedParams, SqlxSource, TxMan};
///
/// # fn example() -> Result<(), sqlx_txman::Error> {
/// let txman = TxMan::new(SqlxSource::connect("sqlite://app.db")?);
///
/// let names = txman.begin(|tx| {
///     tx.update(
///         "INSERT INTO users (id, name) VALUES (:id, :name)",
///         &NamedParams::new().put("id", 42).put("name", "John Doe"),
///     )?;
///     tx.execute(
///         "SELECT name FROM users WHERE id IN (:ids)",
///         &NamedParams::new().put_list("ids", [1, 42]),
///         |row| Ok(row.try_get::<String, _>("name")?),
///     )
/// })?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Tx<C: Connection> {
    connection: Option<C>,
    read_only: bool,
    rollback: bool,
}

impl<C: Connection> Tx<C> {
    /// Wraps a freshly acquired connection. Read-write transactions disable
    /// autocommit here; if that fails the connection is released and the
    /// error returned.
    pub(crate) fn new(mut connection: C, read_only: bool) -> crate::Result<Self> {
        if !read_only {
            if let Err(err) = connection.begin() {
                if let Err(release_err) = connection.release() {
                    warn!(error = %release_err, "failed to release connection after begin failure");
                }
                return Err(Error::resource(Operation::Begin, err));
            }
        }

        debug!(read_only, "transaction opened");
        Ok(Self {
            connection: Some(connection),
            read_only,
            rollback: false,
        })
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Whether the transaction will roll back when finalized.
    pub fn is_rollback(&self) -> bool {
        self.rollback
    }

    /// Marks the transaction to roll back instead of commit.
    ///
    /// Statements issued afterwards still run; their effects are rolled back
    /// together with everything else. Has no effect on read-only
    /// transactions, which run every statement in its own implicit unit.
    pub fn set_rollback(&mut self) {
        if !self.rollback {
            debug!("transaction marked for rollback");
        }
        self.rollback = true;
    }

    /// Runs a query and maps every returned row, preserving result order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Database`] if the statement fails, or whatever error
    /// the mapper returns for a row.
    pub fn execute<P, T, F>(&mut self, template: &str, params: &P, mut mapper: F) -> crate::Result<Vec<T>>
    where
        P: Params + ?Sized,
        F: FnMut(&C::Row) -> crate::Result<T>,
    {
        let statement = params.expand(template)?;
        debug!(sql = %statement.sql, params = statement.parameters.len(), "query");

        let rows = self
            .connection()?
            .query(&statement.sql, &statement.parameters)?;
        rows.iter().map(&mut mapper).collect()
    }

    /// Runs a query expected to produce at most one row.
    ///
    /// # Returns
    ///
    /// `Ok(None)` when no row matches, `Ok(Some(value))` for exactly one row.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MultipleResults`] when two or more rows come back,
    /// in addition to the errors of [`execute`](Tx::execute).
    pub fn execute_one<P, T, F>(&mut self, template: &str, params: &P, mapper: F) -> crate::Result<Option<T>>
    where
        P: Params + ?Sized,
        F: FnMut(&C::Row) -> crate::Result<T>,
    {
        let mut results = self.execute(template, params, mapper)?;
        if results.len() > 1 {
            return Err(Error::MultipleResults {
                sql: template.to_owned(),
                count: results.len(),
            });
        }
        Ok(results.pop())
    }

    /// Runs a mutating statement and returns the number of affected rows.
    ///
    /// Calling this on a read-only transaction is a caller error; it is not
    /// rejected, and the statement takes effect immediately.
    pub fn update<P>(&mut self, template: &str, params: &P) -> crate::Result<u64>
    where
        P: Params + ?Sized,
    {
        let statement = params.expand(template)?;
        debug!(sql = %statement.sql, params = statement.parameters.len(), "update");

        Ok(self
            .connection()?
            .update(&statement.sql, &statement.parameters)?)
    }

    fn connection(&mut self) -> crate::Result<&mut C> {
        self.connection.as_mut().ok_or(Error::Closed)
    }

    /// Commits or rolls back, then releases the connection.
    pub(crate) fn finalize(mut self) -> crate::Result<()> {
        self.close()
    }

    fn close(&mut self) -> crate::Result<()> {
        let Some(mut connection) = self.connection.take() else {
            return Ok(());
        };

        let outcome = if self.read_only {
            Ok(())
        } else if self.rollback {
            debug!("rolling back transaction");
            connection
                .rollback()
                .map_err(|err| Error::resource(Operation::Rollback, err))
        } else {
            debug!("committing transaction");
            connection
                .commit()
                .map_err(|err| Error::resource(Operation::Commit, err))
        };

        let released = connection
            .release()
            .map_err(|err| Error::resource(Operation::Release, err));

        match (outcome, released) {
            (Err(err), Err(release_err)) => {
                warn!(error = %release_err, "failed to release connection after failed finalize");
                Err(err)
            }
            (outcome, released) => outcome.and(released),
        }
    }
}

impl<C: Connection> Drop for Tx<C> {
    fn drop(&mut self) {
        if self.connection.is_some() {
            warn!("transaction dropped without being finalized");
            if let Err(err) = self.close() {
                warn!(error = %err, "failed to finalize dropped transaction");
            }
        }
    }
}
