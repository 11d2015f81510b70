use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("could not connect to {target}")]
    PostgresConnect {
        target: String,
        #[source]
        source: postgres::Error,
    },

    #[error("could not open {}", .path.display())]
    SqliteOpen {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] postgres::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("database connection is closed")]
    ConnectionClosed,
}

impl StoreError {
    /// Whether the session can keep using the connection after this error.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            StoreError::ConnectionClosed
                | StoreError::PostgresConnect { .. }
                | StoreError::SqliteOpen { .. }
        )
    }
}
