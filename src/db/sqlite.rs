use std::path::Path;
use std::time::Duration;

use rusqlite::{Connection, OpenFlags, OptionalExtension, params};

use super::{Affected, StoreError, User, UserStore};
use crate::ui::prelude::*;

const INSERT_USER: &str = "INSERT INTO users (name, email) VALUES (?1, ?2)";
const SELECT_USER: &str = "SELECT id, name, email FROM users WHERE id = ?1";
const UPDATE_USER: &str = "UPDATE users SET name = ?1, email = ?2 WHERE id = ?3";
const DELETE_USER: &str = "DELETE FROM users WHERE id = ?1";

/// `users` table in a local SQLite database file.
pub struct SqliteUserStore {
    conn: Connection,
}

impl SqliteUserStore {
    /// Open an existing database. A missing file is an error rather than
    /// silently creating an empty database.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        debug(
            "db.sqlite.open",
            &format!("Opening SQLite database {}", path.display()),
        );

        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn = Connection::open_with_flags(path, flags).map_err(|source| {
            StoreError::SqliteOpen {
                path: path.to_path_buf(),
                source,
            }
        })?;

        // Wait on another writer instead of failing immediately
        conn.busy_timeout(Duration::from_secs(5))?;

        Ok(Self { conn })
    }

    #[cfg(test)]
    pub fn from_connection(conn: Connection) -> Self {
        Self { conn }
    }
}

impl UserStore for SqliteUserStore {
    fn backend(&self) -> &'static str {
        "SQLite"
    }

    fn create_user(&mut self, name: &str, email: &str) -> Result<i64, StoreError> {
        let mut stmt = self.conn.prepare(INSERT_USER)?;
        stmt.execute(params![name, email])?;
        Ok(self.conn.last_insert_rowid())
    }

    fn read_user(&mut self, id: i64) -> Result<Option<User>, StoreError> {
        let mut stmt = self.conn.prepare(SELECT_USER)?;
        let user = stmt
            .query_row(params![id], |row| {
                Ok(User {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    email: row.get(2)?,
                })
            })
            .optional()?;
        Ok(user)
    }

    fn update_user(&mut self, id: i64, name: &str, email: &str) -> Result<Affected, StoreError> {
        let mut stmt = self.conn.prepare(UPDATE_USER)?;
        let rows = stmt.execute(params![name, email, id])?;
        Ok(Affected { rows: rows as u64 })
    }

    fn delete_user(&mut self, id: i64) -> Result<Affected, StoreError> {
        let mut stmt = self.conn.prepare(DELETE_USER)?;
        let rows = stmt.execute(params![id])?;
        Ok(Affected { rows: rows as u64 })
    }

    fn is_closed(&self) -> bool {
        false
    }

    fn close(self: Box<Self>) -> Result<(), StoreError> {
        let store = *self;
        store.conn.close().map_err(|(_, err)| StoreError::Sqlite(err))
    }
}

/// Create the `users` table the way an operator would for a fresh database.
#[cfg(test)]
pub(crate) fn create_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute(
        "CREATE TABLE users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            email TEXT NOT NULL
        )",
        (),
    )?;
    Ok(())
}

#[cfg(test)]
pub(crate) fn memory_store() -> SqliteUserStore {
    let conn = Connection::open_in_memory().unwrap();
    create_schema(&conn).unwrap();
    SqliteUserStore::from_connection(conn)
}
