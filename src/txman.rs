use tracing::{instrument, warn};

use crate::connection::ConnectionSource;
use crate::error::{Error, Operation};
use crate::tx::Tx;

/// Behaviour switches for [`TxMan`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TxManOptions {
    /// Roll back whenever the callback returns `Err`.
    ///
    /// Off by default: a failing callback that never called
    /// [`Tx::set_rollback`] still commits whatever it wrote.
    pub rollback_on_error: bool,
}

impl TxManOptions {
    pub fn rollback_on_error(mut self, enabled: bool) -> Self {
        self.rollback_on_error = enabled;
        self
    }
}

/// Runs callbacks inside transactions drawn from a [`ConnectionSource`].
///
/// Each [`begin`](TxMan::begin) or [`begin_read_only`](TxMan::begin_read_only)
/// acquires its own connection, so independent scopes may run concurrently on
/// separate threads. The callback's [`Tx`] is finalized exactly once after the
/// callback returns, whatever it returns.
///
/// # Examples
///
/// ```rust,no_run
/// use sqlx::Row;
/// use sqlx_txman::{NamedParams, SqlxSource, TxMan};
///
/// # fn example() -> Result<(), sqlx_txman::Error> {
/// let txman = TxMan::new(SqlxSource::connect("mysql://localhost/test")?);
///
/// txman.begin(|tx| {
///     tx.update(
///         "UPDATE accounts SET balance = balance - :amount WHERE id = :id",
///         &NamedParams::new().put("amount", 100).put("id", 1),
///     )?;
///     tx.update(
///         "UPDATE accounts SET balance = balance + :amount WHERE id = :id",
///         &NamedParams::new().put("amount", 100).put("id", 2),
///     )
/// })?;
///
/// let total: Option<i64> = txman.begin_read_only(|tx| {
///     tx.execute_one("SELECT SUM(balance) AS total FROM accounts", &(), |row| {
///         Ok(row.try_get("total")?)
///     })
/// })?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct TxMan<S> {
    source: S,
    options: TxManOptions,
}

impl<S: ConnectionSource> TxMan<S> {
    pub fn new(source: S) -> Self {
        Self::with_options(source, TxManOptions::default())
    }

    pub fn with_options(source: S, options: TxManOptions) -> Self {
        Self { source, options }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn options(&self) -> TxManOptions {
        self.options
    }

    /// Runs `callback` in a read-write transaction.
    ///
    /// Commits when the callback returns, unless it called
    /// [`Tx::set_rollback`]. The callback's value is returned once the
    /// connection has been released.
    ///
    /// # Errors
    ///
    /// The callback's own error takes precedence; a finalize failure after a
    /// failing callback is only logged. Otherwise acquire, begin, commit,
    /// rollback and release failures are returned as [`Error::Resource`].
    pub fn begin<T, E, F>(&self, callback: F) -> Result<T, E>
    where
        F: FnOnce(&mut Tx<S::Connection>) -> Result<T, E>,
        E: From<Error>,
    {
        self.run(false, callback)
    }

    /// Runs `callback` with autocommit left on; nothing is committed or
    /// rolled back explicitly. Statements that write are out of contract here.
    pub fn begin_read_only<T, E, F>(&self, callback: F) -> Result<T, E>
    where
        F: FnOnce(&mut Tx<S::Connection>) -> Result<T, E>,
        E: From<Error>,
    {
        self.run(true, callback)
    }

    #[instrument(level = "debug", skip(self, callback))]
    fn run<T, E, F>(&self, read_only: bool, callback: F) -> Result<T, E>
    where
        F: FnOnce(&mut Tx<S::Connection>) -> Result<T, E>,
        E: From<Error>,
    {
        let connection = self
            .source
            .acquire()
            .map_err(|err| Error::resource(Operation::Acquire, err))?;
        let mut tx = Tx::new(connection, read_only)?;

        let outcome = callback(&mut tx);
        if outcome.is_err() && self.options.rollback_on_error {
            tx.set_rollback();
        }

        match (outcome, tx.finalize()) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(err)) => Err(err.into()),
            (Err(err), finalized) => {
                if let Err(finalize_err) = finalized {
                    warn!(error = %finalize_err, "failed to finalize transaction after callback error");
                }
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::panic::{catch_unwind, AssertUnwindSafe};

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::test_utils::{Event, MockConnection, MockSource};
    use crate::value::{NamedParams, Value};

    fn insert(tx: &mut Tx<MockConnection>) -> crate::Result<u64> {
        tx.update(
            "INSERT INTO record (key, value) VALUES (:key, :value)",
            &NamedParams::new().put("key", 123).put("value", "abc"),
        )
    }

    fn inserted() -> Event {
        Event::Update(
            "INSERT INTO record (key, value) VALUES (?, ?)".into(),
            vec![Value::Int(123), Value::Text("abc".into())],
        )
    }

    #[test]
    fn test_begin_commits_and_returns_value() {
        let source = MockSource::new(MockConnection::new());
        let log = source.log();
        let txman = TxMan::new(source);

        let affected = txman.begin(insert).unwrap();

        assert_eq!(affected, 1);
        assert_eq!(
            log.events(),
            vec![Event::Acquire, Event::Begin, inserted(), Event::Commit, Event::Release]
        );
    }

    #[test]
    fn test_begin_rolls_back_when_flagged() {
        let source = MockSource::new(MockConnection::new());
        let log = source.log();
        let txman = TxMan::new(source);

        txman
            .begin(|tx| {
                insert(tx)?;
                tx.set_rollback();
                Ok::<_, Error>(())
            })
            .unwrap();

        assert_eq!(
            log.events(),
            vec![Event::Acquire, Event::Begin, inserted(), Event::Rollback, Event::Release]
        );
    }

    #[test]
    fn test_begin_read_only_only_releases() {
        let source = MockSource::new(MockConnection::new().with_rows(vec![vec![Value::Int(1)]]));
        let log = source.log();
        let txman = TxMan::new(source);

        let rows = txman
            .begin_read_only(|tx| tx.execute("SELECT 1", &(), |row| Ok(row.clone())))
            .unwrap();

        assert_eq!(rows, vec![vec![Value::Int(1)]]);
        assert_eq!(
            log.events(),
            vec![Event::Acquire, Event::Query("SELECT 1".into(), vec![]), Event::Release]
        );
    }

    #[test]
    fn test_callback_error_still_commits_by_default() {
        let source = MockSource::new(MockConnection::new());
        let log = source.log();
        let txman = TxMan::new(source);

        let result: Result<(), Error> = txman.begin(|tx| {
            insert(tx)?;
            Err(Error::Config("callback failed".into()))
        });

        assert!(matches!(result, Err(Error::Config(_))));
        assert_eq!(
            log.events(),
            vec![Event::Acquire, Event::Begin, inserted(), Event::Commit, Event::Release]
        );
    }

    #[test]
    fn test_callback_error_rolls_back_when_configured() {
        let source = MockSource::new(MockConnection::new());
        let log = source.log();
        let txman = TxMan::with_options(source, TxManOptions::default().rollback_on_error(true));

        let result: Result<(), Error> = txman.begin(|tx| {
            insert(tx)?;
            Err(Error::Config("callback failed".into()))
        });

        assert!(result.is_err());
        assert_eq!(
            log.events(),
            vec![Event::Acquire, Event::Begin, inserted(), Event::Rollback, Event::Release]
        );
    }

    #[test]
    fn test_callback_error_wins_over_finalize_error() {
        let source = MockSource::new(MockConnection::new().failing_commit());
        let log = source.log();
        let txman = TxMan::new(source);

        let result: Result<(), Error> =
            txman.begin(|_| Err(Error::Config("callback failed".into())));

        assert!(matches!(result, Err(Error::Config(_))));
        assert_eq!(log.events(), vec![Event::Acquire, Event::Begin, Event::Release]);
    }

    #[test]
    fn test_finalize_error_is_returned_after_success() {
        let source = MockSource::new(MockConnection::new().failing_release());
        let txman = TxMan::new(source);

        let result = txman.begin(|_| Ok::<_, Error>(()));

        assert!(matches!(
            result,
            Err(Error::Resource {
                operation: Operation::Release,
                ..
            })
        ));
    }

    #[test]
    fn test_acquire_failure() {
        let source = MockSource::new(MockConnection::new()).failing_acquire();
        let log = source.log();
        let txman = TxMan::new(source);
        let mut called = false;

        let result = txman.begin(|_| {
            called = true;
            Ok::<_, Error>(())
        });

        assert!(matches!(
            result,
            Err(Error::Resource {
                operation: Operation::Acquire,
                ..
            })
        ));
        assert!(!called);
        assert!(log.events().is_empty());
    }

    #[test]
    fn test_panicking_callback_still_releases() {
        let source = MockSource::new(MockConnection::new());
        let log = source.log();
        let txman = TxMan::new(source);

        let result = catch_unwind(AssertUnwindSafe(|| {
            txman.begin(|tx| -> Result<(), Error> {
                insert(tx)?;
                panic!("callback panicked");
            })
        }));

        assert!(result.is_err());
        assert_eq!(
            log.events(),
            vec![Event::Acquire, Event::Begin, inserted(), Event::Commit, Event::Release]
        );
    }

    #[derive(Debug)]
    enum AppError {
        Db(Error),
        NotFound,
    }

    impl From<Error> for AppError {
        fn from(err: Error) -> Self {
            AppError::Db(err)
        }
    }

    #[test]
    fn test_caller_error_type() {
        let txman = TxMan::new(MockSource::new(MockConnection::new()));

        let result: Result<(), AppError> = txman.begin_read_only(|tx| {
            let found = tx.execute_one("SELECT key FROM record", &(), |row| Ok(row.clone()))?;
            found.map(|_| ()).ok_or(AppError::NotFound)
        });

        assert!(matches!(result, Err(AppError::NotFound)));

        let result: Result<(), AppError> = TxMan::new(MockSource::new(MockConnection::new()).failing_acquire())
            .begin(|_| Ok(()));
        assert!(matches!(result, Err(AppError::Db(Error::Resource { .. }))));
    }
}
