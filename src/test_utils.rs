//! In-memory connection double for lifecycle tests

use std::sync::{Arc, Mutex};

use crate::connection::{Connection, ConnectionSource};
use crate::value::Value;

pub type MockRow = Vec<Value>;

/// A call observed by a [`MockConnection`]. Failed calls are not recorded.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Acquire,
    Begin,
    Query(String, Vec<Value>),
    Update(String, Vec<Value>),
    Commit,
    Rollback,
    Release,
}

/// Shared view of the events recorded by one or more connections.
#[derive(Debug, Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<Event>>>);

impl EventLog {
    fn push(&self, event: Event) {
        self.0.lock().expect("event log poisoned").push(event);
    }

    pub fn events(&self) -> Vec<Event> {
        self.0.lock().expect("event log poisoned").clone()
    }
}

fn failure(what: &str) -> sqlx::Error {
    sqlx::Error::Protocol(format!("mock {what} failure"))
}

#[derive(Debug, Clone, Default)]
pub struct MockConnection {
    log: EventLog,
    rows: Vec<MockRow>,
    fail_begin: bool,
    fail_statements: bool,
    fail_commit: bool,
    fail_release: bool,
}

impl MockConnection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log(&self) -> EventLog {
        self.log.clone()
    }

    /// Rows returned by every query.
    pub fn with_rows(mut self, rows: Vec<MockRow>) -> Self {
        self.rows = rows;
        self
    }

    pub fn failing_begin(mut self) -> Self {
        self.fail_begin = true;
        self
    }

    pub fn failing_statements(mut self) -> Self {
        self.fail_statements = true;
        self
    }

    pub fn failing_commit(mut self) -> Self {
        self.fail_commit = true;
        self
    }

    pub fn failing_release(mut self) -> Self {
        self.fail_release = true;
        self
    }
}

impl Connection for MockConnection {
    type Row = MockRow;

    fn begin(&mut self) -> Result<(), sqlx::Error> {
        if self.fail_begin {
            return Err(failure("begin"));
        }
        self.log.push(Event::Begin);
        Ok(())
    }

    fn query(&mut self, sql: &str, params: &[Value]) -> Result<Vec<MockRow>, sqlx::Error> {
        if self.fail_statements {
            return Err(failure("query"));
        }
        self.log.push(Event::Query(sql.to_owned(), params.to_vec()));
        Ok(self.rows.clone())
    }

    fn update(&mut self, sql: &str, params: &[Value]) -> Result<u64, sqlx::Error> {
        if self.fail_statements {
            return Err(failure("update"));
        }
        self.log.push(Event::Update(sql.to_owned(), params.to_vec()));
        Ok(1)
    }

    fn commit(&mut self) -> Result<(), sqlx::Error> {
        if self.fail_commit {
            return Err(failure("commit"));
        }
        self.log.push(Event::Commit);
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), sqlx::Error> {
        self.log.push(Event::Rollback);
        Ok(())
    }

    fn release(self) -> Result<(), sqlx::Error> {
        if self.fail_release {
            return Err(failure("release"));
        }
        self.log.push(Event::Release);
        Ok(())
    }
}

/// Hands out clones of a template connection, all sharing one event log.
#[derive(Debug, Clone, Default)]
pub struct MockSource {
    template: MockConnection,
    fail_acquire: bool,
}

impl MockSource {
    pub fn new(template: MockConnection) -> Self {
        Self {
            template,
            fail_acquire: false,
        }
    }

    pub fn failing_acquire(mut self) -> Self {
        self.fail_acquire = true;
        self
    }

    pub fn log(&self) -> EventLog {
        self.template.log()
    }
}

impl ConnectionSource for MockSource {
    type Connection = MockConnection;

    fn acquire(&self) -> Result<MockConnection, sqlx::Error> {
        if self.fail_acquire {
            return Err(sqlx::Error::PoolTimedOut);
        }
        self.template.log.push(Event::Acquire);
        Ok(self.template.clone())
    }
}
