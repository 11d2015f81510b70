//! Storage for the `users` table.
//!
//! Every operation issues exactly one parameterized statement over the
//! session's connection. Prepared statements live only for the duration of
//! the call, so they are released on every path including errors.

mod error;
mod pg;
mod sqlite;

use std::fmt;

use serde::Serialize;

use crate::config::Backend;

pub use error::StoreError;
pub use pg::PgUserStore;
pub use sqlite::SqliteUserStore;
#[cfg(test)]
pub(crate) use sqlite::memory_store as sqlite_memory_store;

/// A row of the `users` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} {} <{}>", self.id, self.name, self.email)
    }
}

/// Rows matched by an update or delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Affected {
    pub rows: u64,
}

impl Affected {
    pub fn matched(self) -> bool {
        self.rows > 0
    }
}

/// CRUD access to the `users` table over a single connection.
pub trait UserStore {
    /// Display name of the backend, e.g. "PostgreSQL".
    fn backend(&self) -> &'static str;

    /// Insert a user and return the id the database assigned.
    fn create_user(&mut self, name: &str, email: &str) -> Result<i64, StoreError>;

    /// Fetch a user by id. A missing row is `Ok(None)`, not an error.
    fn read_user(&mut self, id: i64) -> Result<Option<User>, StoreError>;

    /// Replace name and email of the user with `id`.
    fn update_user(&mut self, id: i64, name: &str, email: &str) -> Result<Affected, StoreError>;

    /// Remove the user with `id` permanently.
    fn delete_user(&mut self, id: i64) -> Result<Affected, StoreError>;

    fn is_closed(&self) -> bool;

    /// Close the connection, reporting any error the driver raises on shutdown.
    fn close(self: Box<Self>) -> Result<(), StoreError>;
}

/// Open the one connection a session uses.
pub fn connect(backend: &Backend) -> Result<Box<dyn UserStore>, StoreError> {
    match backend {
        Backend::Postgres(settings) => Ok(Box::new(PgUserStore::connect(settings)?)),
        Backend::Sqlite(settings) => Ok(Box::new(SqliteUserStore::open(&settings.path)?)),
    }
}
