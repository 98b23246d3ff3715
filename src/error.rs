use std::fmt;

/// Connection lifecycle step that failed with a [`Error::Resource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Taking a connection from the source
    Acquire,
    /// Disabling autocommit on a read-write transaction
    Begin,
    Commit,
    Rollback,
    /// Handing the connection back to its source
    Release,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Acquire => "acquire",
            Operation::Begin => "begin",
            Operation::Commit => "commit",
            Operation::Rollback => "rollback",
            Operation::Release => "release",
        };
        f.write_str(name)
    }
}

/// Error types for sqlx-txman
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Error during SQL template parsing
    #[error("Failed to parse SQL template: {0}")]
    Parse(#[from] regex::Error),

    /// Error from SQLx while preparing, binding or executing a statement
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A single-row query produced more than one row
    #[error("Multiple results returned ({count} rows): {sql}")]
    MultipleResults { sql: String, count: usize },

    /// Failure while acquiring, committing, rolling back or releasing a connection
    #[error("Failed to {operation} connection: {source}")]
    Resource {
        operation: Operation,
        #[source]
        source: sqlx::Error,
    },

    /// The transaction has already been finalized
    #[error("Transaction is already closed")]
    Closed,

    /// Invalid connection source configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// The blocking runtime could not be started
    #[error("Failed to start runtime: {0}")]
    Runtime(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn resource(operation: Operation, source: sqlx::Error) -> Self {
        Self::Resource { operation, source }
    }
}

/// Result type alias for sqlx-txman operations
pub type Result<T> = std::result::Result<T, Error>;
