use std::time::Duration;

use postgres::error::SqlState;
use postgres::{Client, Config, NoTls, Row};

use super::{Affected, StoreError, User, UserStore};
use crate::config::PostgresSettings;
use crate::ui::prelude::*;

// Ids are cast to INT8 so SERIAL and BIGSERIAL columns both map to i64.
const INSERT_USER: &str =
    "INSERT INTO users (name, email) VALUES ($1, $2) RETURNING id::int8 AS id";
const SELECT_USER: &str = "SELECT id::int8 AS id, name, email FROM users WHERE id = $1::int8";
const UPDATE_USER: &str = "UPDATE users SET name = $1, email = $2 WHERE id = $3::int8";
const DELETE_USER: &str = "DELETE FROM users WHERE id = $1::int8";

/// `users` table on a PostgreSQL server, over one blocking client.
pub struct PgUserStore {
    client: Client,
}

impl PgUserStore {
    pub fn connect(settings: &PostgresSettings) -> Result<Self, StoreError> {
        let mut config = Config::new();
        config
            .host(&settings.host)
            .port(settings.port)
            .dbname(&settings.database)
            .user(&settings.user);
        if let Some(password) = &settings.password {
            config.password(password);
        }
        if let Some(secs) = settings.connect_timeout {
            config.connect_timeout(Duration::from_secs(secs));
        }

        let target = format!(
            "{}@{}:{}/{}",
            settings.user, settings.host, settings.port, settings.database
        );
        debug("db.postgres.connect", &format!("Connecting to {}", target));

        let client = config
            .connect(NoTls)
            .map_err(|source| StoreError::PostgresConnect { target, source })?;

        Ok(Self { client })
    }

    /// Map a driver error, noticing when it took the connection down with it.
    fn check<T>(&self, result: Result<T, postgres::Error>) -> Result<T, StoreError> {
        result.map_err(|err| {
            if connection_lost(&err) || self.client.is_closed() {
                StoreError::ConnectionClosed
            } else {
                StoreError::Postgres(err)
            }
        })
    }
}

/// A terminated backend reports `57P01` before the socket closes, and the
/// client may not have noticed the close yet when the error comes back.
fn connection_lost(err: &postgres::Error) -> bool {
    err.is_closed() || err.code() == Some(&SqlState::ADMIN_SHUTDOWN)
}

fn user_from_row(row: &Row) -> Result<User, postgres::Error> {
    Ok(User {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        email: row.try_get("email")?,
    })
}

impl UserStore for PgUserStore {
    fn backend(&self) -> &'static str {
        "PostgreSQL"
    }

    fn create_user(&mut self, name: &str, email: &str) -> Result<i64, StoreError> {
        let result = self
            .client
            .query_one(INSERT_USER, &[&name, &email])
            .and_then(|row| row.try_get::<_, i64>("id"));
        self.check(result)
    }

    fn read_user(&mut self, id: i64) -> Result<Option<User>, StoreError> {
        let result = self
            .client
            .query_opt(SELECT_USER, &[&id])
            .and_then(|row| row.as_ref().map(user_from_row).transpose());
        self.check(result)
    }

    fn update_user(&mut self, id: i64, name: &str, email: &str) -> Result<Affected, StoreError> {
        let result = self.client.execute(UPDATE_USER, &[&name, &email, &id]);
        self.check(result).map(|rows| Affected { rows })
    }

    fn delete_user(&mut self, id: i64) -> Result<Affected, StoreError> {
        let result = self.client.execute(DELETE_USER, &[&id]);
        self.check(result).map(|rows| Affected { rows })
    }

    fn is_closed(&self) -> bool {
        self.client.is_closed()
    }

    fn close(self: Box<Self>) -> Result<(), StoreError> {
        let store = *self;
        store.client.close()?;
        Ok(())
    }
}
