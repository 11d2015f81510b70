//! Connection settings for the users database.
//!
//! The file is laid out in INI-style sections, one per backend, with TOML
//! value syntax:
//!
//! ```toml
//! [postgresql]
//! host = "localhost"
//! port = 5432
//! database = "app"
//! user = "app"
//! password = "secret"
//! ```
//!
//! or, for a local database file:
//!
//! ```toml
//! [sqlite]
//! path = "users.db"
//! ```

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// File name looked up in the working directory and the user config dir.
pub const CONFIG_FILE_NAME: &str = "db_config.ini";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config file {} does not exist", .0.display())]
    NotFound(PathBuf),

    #[error("failed to read config file {}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("config file {} has no [postgresql] or [sqlite] section", .0.display())]
    MissingSection(PathBuf),

    #[error("config file {} defines both [postgresql] and [sqlite]; keep exactly one", .0.display())]
    AmbiguousSection(PathBuf),

    #[error("unable to determine user config directory")]
    NoConfigDir,
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    5432
}

/// Parameters for a PostgreSQL server connection.
#[derive(Clone, Deserialize, PartialEq, Eq)]
pub struct PostgresSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(alias = "dbname")]
    pub database: String,
    pub user: String,
    #[serde(default)]
    pub password: Option<String>,
    /// Seconds to wait for the server before giving up.
    #[serde(default)]
    pub connect_timeout: Option<u64>,
}

impl fmt::Debug for PostgresSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgresSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct SqliteSettings {
    pub path: PathBuf,
}

/// Raw file layout before backend selection.
#[derive(Debug, Deserialize)]
struct ConfigFile {
    postgresql: Option<PostgresSettings>,
    sqlite: Option<SqliteSettings>,
}

/// The database a config file points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backend {
    Postgres(PostgresSettings),
    Sqlite(SqliteSettings),
}

impl Backend {
    pub fn name(&self) -> &'static str {
        match self {
            Backend::Postgres(_) => "PostgreSQL",
            Backend::Sqlite(_) => "SQLite",
        }
    }

    /// Human readable target, never including credentials.
    pub fn describe(&self) -> String {
        match self {
            Backend::Postgres(pg) => {
                format!("{}@{}:{}/{}", pg.user, pg.host, pg.port, pg.database)
            }
            Backend::Sqlite(sqlite) => sqlite.path.display().to_string(),
        }
    }
}

/// Pick the config file: explicit path, then `./db_config.ini`, then the
/// user config directory.
pub fn resolve_path(explicit: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }

    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.exists() {
        return Ok(local);
    }

    let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
    Ok(config_dir.join("usercli").join(CONFIG_FILE_NAME))
}

/// Load and validate the config file at `path`.
pub fn load(path: &Path) -> Result<Backend, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }

    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let base_dir = path.parent().unwrap_or_else(|| Path::new(""));
    parse(&contents, path, base_dir)
}

fn parse(contents: &str, path: &Path, base_dir: &Path) -> Result<Backend, ConfigError> {
    let file: ConfigFile = toml::from_str(contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    match (file.postgresql, file.sqlite) {
        (Some(pg), None) => Ok(Backend::Postgres(pg)),
        (None, Some(mut sqlite)) => {
            if sqlite.path.is_relative() {
                sqlite.path = base_dir.join(&sqlite.path);
            }
            Ok(Backend::Sqlite(sqlite))
        }
        (Some(_), Some(_)) => Err(ConfigError::AmbiguousSection(path.to_path_buf())),
        (None, None) => Err(ConfigError::MissingSection(path.to_path_buf())),
    }
}
