//! SQLx implementation of [`ConnectionSource`] and [`Connection`].
//!
//! The pool is an [`AnyPool`], so any driver that uses `?` placeholders works;
//! MySQL and SQLite are compiled in. Calls are blocking: every engine call is
//! driven to completion on a Tokio runtime owned by the source, which means
//! none of these methods may be called from inside an async context.

use std::sync::Arc;
use std::time::Duration;

use sqlx::any::{AnyArguments, AnyPoolOptions, AnyRow};
use sqlx::pool::PoolConnection;
use sqlx::query::Query;
use sqlx::{Any, AnyPool, Executor};
use tokio::runtime::{self, Runtime};
use tracing::{debug, instrument, warn};

use crate::connection::{Connection, ConnectionSource};
use crate::error::Error;
use crate::value::Value;

/// Type alias for SQLx Query with `Any` arguments
pub type Q<'q> = Query<'q, Any, AnyArguments<'q>>;

const DEFAULT_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_WORKER_THREADS: usize = 2;

/// Settings for [`SqlxSource`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceOptions {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
    /// Threads of the runtime that drives the pool
    pub worker_threads: usize,
}

impl SourceOptions {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            acquire_timeout: DEFAULT_ACQUIRE_TIMEOUT,
            worker_threads: DEFAULT_WORKER_THREADS,
        }
    }

    /// Reads the options from the environment.
    ///
    /// | Variable                     | Default |
    /// |------------------------------|---------|
    /// | `DATABASE_URL`               | required |
    /// | `TXMAN_MAX_CONNECTIONS`      | 10      |
    /// | `TXMAN_ACQUIRE_TIMEOUT_SECS` | 30      |
    /// | `TXMAN_WORKER_THREADS`       | 2       |
    pub fn from_env() -> crate::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> crate::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let url = lookup("DATABASE_URL")
            .ok_or_else(|| Error::Config("DATABASE_URL is not set".to_owned()))?;
        let mut options = Self::new(url);

        if let Some(value) = parse_var(&lookup, "TXMAN_MAX_CONNECTIONS")? {
            options.max_connections = value;
        }
        if let Some(secs) = parse_var(&lookup, "TXMAN_ACQUIRE_TIMEOUT_SECS")? {
            options.acquire_timeout = Duration::from_secs(secs);
        }
        if let Some(value) = parse_var(&lookup, "TXMAN_WORKER_THREADS")? {
            options.worker_threads = value;
        }
        Ok(options)
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    pub fn worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = threads;
        self
    }
}

fn parse_var<F, T>(lookup: &F, key: &str) -> crate::Result<Option<T>>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse()
                .map_err(|err| Error::Config(format!("{key}={raw:?}: {err}")))
        })
        .transpose()
}

/// A blocking connection source backed by an [`AnyPool`].
///
/// Cloning is cheap; clones share the pool and the runtime.
#[derive(Debug, Clone)]
pub struct SqlxSource {
    pool: AnyPool,
    runtime: Arc<Runtime>,
}

impl SqlxSource {
    /// Connects with default [`SourceOptions`].
    pub fn connect(url: &str) -> crate::Result<Self> {
        Self::connect_with(SourceOptions::new(url))
    }

    #[instrument(skip_all, err)]
    pub fn connect_with(options: SourceOptions) -> crate::Result<Self> {
        if options.max_connections == 0 {
            return Err(Error::Config("max_connections must be at least 1".to_owned()));
        }

        sqlx::any::install_default_drivers();

        let runtime = runtime::Builder::new_multi_thread()
            .worker_threads(options.worker_threads.max(1))
            .thread_name("sqlx-txman")
            .enable_all()
            .build()?;

        let pool = runtime.block_on(
            AnyPoolOptions::new()
                .max_connections(options.max_connections)
                .acquire_timeout(options.acquire_timeout)
                .connect(&options.url),
        )?;
        debug!(max_connections = options.max_connections, "connection pool ready");

        Ok(Self {
            pool,
            runtime: Arc::new(runtime),
        })
    }

    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }

    /// Closes the pool, waiting for checked-out connections to be returned.
    pub fn close(&self) {
        self.runtime.block_on(self.pool.close());
    }
}

impl ConnectionSource for SqlxSource {
    type Connection = SqlxConnection;

    fn acquire(&self) -> Result<SqlxConnection, sqlx::Error> {
        let conn = self.runtime.block_on(self.pool.acquire())?;
        Ok(SqlxConnection {
            conn: Some(conn),
            runtime: Arc::clone(&self.runtime),
            in_transaction: false,
        })
    }
}

/// A pooled connection checked out of a [`SqlxSource`].
#[derive(Debug)]
pub struct SqlxConnection {
    conn: Option<PoolConnection<Any>>,
    runtime: Arc<Runtime>,
    /// A transaction was started and not yet successfully ended
    in_transaction: bool,
}

impl SqlxConnection {
    fn raw(&mut self, sql: &'static str) -> Result<(), sqlx::Error> {
        let conn = self.conn.as_mut().ok_or(sqlx::Error::PoolClosed)?;
        self.runtime.block_on((&mut **conn).execute(sql))?;
        Ok(())
    }
}

fn bind<'q>(query: Q<'q>, params: &[Value]) -> Q<'q> {
    params.iter().fold(query, |query, value| match value {
        Value::Null => query.bind(None::<i64>),
        Value::Bool(value) => query.bind(*value),
        Value::Int(value) => query.bind(*value),
        Value::Float(value) => query.bind(*value),
        Value::Text(value) => query.bind(value.clone()),
        Value::Bytes(value) => query.bind(value.clone()),
    })
}

impl Connection for SqlxConnection {
    type Row = AnyRow;

    fn begin(&mut self) -> Result<(), sqlx::Error> {
        self.raw("BEGIN")?;
        self.in_transaction = true;
        Ok(())
    }

    fn query(&mut self, sql: &str, params: &[Value]) -> Result<Vec<AnyRow>, sqlx::Error> {
        let conn = self.conn.as_mut().ok_or(sqlx::Error::PoolClosed)?;
        let query = bind(sqlx::query(sql), params);
        self.runtime.block_on(query.fetch_all(&mut **conn))
    }

    fn update(&mut self, sql: &str, params: &[Value]) -> Result<u64, sqlx::Error> {
        let conn = self.conn.as_mut().ok_or(sqlx::Error::PoolClosed)?;
        let query = bind(sqlx::query(sql), params);
        let result = self.runtime.block_on(query.execute(&mut **conn))?;
        Ok(result.rows_affected())
    }

    fn commit(&mut self) -> Result<(), sqlx::Error> {
        self.raw("COMMIT")?;
        self.in_transaction = false;
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), sqlx::Error> {
        self.raw("ROLLBACK")?;
        self.in_transaction = false;
        Ok(())
    }

    /// Returns the connection to the pool, or closes it if a transaction is
    /// still open on it.
    fn release(mut self) -> Result<(), sqlx::Error> {
        let Some(conn) = self.conn.take() else {
            return Ok(());
        };

        if self.in_transaction {
            warn!("closing connection with an unfinished transaction");
            return self.runtime.block_on(conn.close());
        }

        // Returning a connection to the pool spawns onto the runtime.
        let _guard = self.runtime.enter();
        drop(conn);
        Ok(())
    }
}

impl Drop for SqlxConnection {
    fn drop(&mut self) {
        let Some(conn) = self.conn.take() else {
            return;
        };

        if self.in_transaction {
            if let Err(err) = self.runtime.block_on(conn.close()) {
                warn!(error = %err, "failed to close connection with an unfinished transaction");
            }
        } else {
            let _guard = self.runtime.enter();
            drop(conn);
        }
    }
}
