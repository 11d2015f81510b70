//! Embedded PostgreSQL for tests that exercise the server backend.
//!
//! `pg-embed-setup-unpriv` installs into `/var/tmp` by default. When
//! `PG_RUNTIME_DIR` or `PG_DATA_DIR` is unset, both are pointed at a fresh
//! directory under `target/pg-embed` for the duration of the bootstrap.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, OnceLock};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use pg_embedded_setup_unpriv::TestCluster;
use postgres::config::Host;
use postgres::{Client, NoTls};

use super::TestEnvironment;

static BOOTSTRAP_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
static BOOTSTRAP_COUNT: AtomicUsize = AtomicUsize::new(0);

const MAX_RETRIES: u32 = 3;
const RETRY_DELAY_MS: u64 = 500;

const TEST_DB: &str = "usercli_test";

/// `SERIAL` rather than `BIGSERIAL` so the `int8` casts are exercised.
const CREATE_USERS: &str = "CREATE TABLE users (
    id SERIAL PRIMARY KEY,
    name TEXT NOT NULL,
    email TEXT NOT NULL
)";

/// A running cluster with a scratch database holding an empty users table.
pub struct PgFixture {
    // Dropped before the cluster that owns it
    database: pg_embedded_setup_unpriv::TemporaryDatabase,
    _cluster: TestCluster,
}

impl PgFixture {
    pub fn start() -> Result<Self> {
        let cluster = bootstrap_cluster()?;
        let database = cluster
            .temporary_database(TEST_DB)
            .map_err(|err| anyhow!("create database {TEST_DB}: {err:?}"))?;

        let fixture = Self {
            database,
            _cluster: cluster,
        };
        fixture
            .client()?
            .batch_execute(CREATE_USERS)
            .map_err(|err| anyhow!(format_postgres_error(&err)))?;
        Ok(fixture)
    }

    pub fn url(&self) -> &str {
        self.database.url()
    }

    /// A separate session, for checking rows and managing other backends.
    pub fn client(&self) -> Result<Client> {
        Client::connect(self.url(), NoTls)
            .map_err(|err| anyhow!(format_postgres_error(&err)))
    }

    pub fn stored_user(&self, id: i64) -> Result<Option<(String, String)>> {
        let row = self
            .client()?
            .query_opt("SELECT name, email FROM users WHERE id = $1::int8", &[&id])
            .map_err(|err| anyhow!(format_postgres_error(&err)))?;
        Ok(row.map(|row| (row.get("name"), row.get("email"))))
    }

    /// Kill every other session on the scratch database, as an administrator would.
    pub fn terminate_other_sessions(&self) -> Result<u64> {
        let mut client = self.client()?;
        let rows = client
            .query(
                "SELECT pg_terminate_backend(pid) FROM pg_stat_activity
                 WHERE datname = current_database() AND pid <> pg_backend_pid()",
                &[],
            )
            .map_err(|err| anyhow!(format_postgres_error(&err)))?;
        Ok(rows.len() as u64)
    }

    /// Write a `[postgresql]` config for the scratch database into `env`.
    pub fn write_config(&self, env: &TestEnvironment) -> Result<()> {
        let config: postgres::Config = self
            .url()
            .parse()
            .with_context(|| format!("parsing {}", self.url()))?;

        let host = match config.get_hosts().first() {
            Some(Host::Tcp(host)) => host.clone(),
            #[cfg(unix)]
            Some(Host::Unix(path)) => path.to_string_lossy().into_owned(),
            None => "localhost".to_string(),
        };
        let port = config.get_ports().first().copied().unwrap_or(5432);
        let database = config.get_dbname().unwrap_or(TEST_DB);
        let user = config.get_user().unwrap_or("postgres");

        let mut section = toml::Table::new();
        section.insert("host".into(), host.into());
        section.insert("port".into(), i64::from(port).into());
        section.insert("database".into(), database.into());
        section.insert("user".into(), user.into());
        if let Some(password) = config.get_password() {
            section.insert(
                "password".into(),
                String::from_utf8_lossy(password).into_owned().into(),
            );
        }
        section.insert("connect_timeout".into(), 10i64.into());

        let mut file = toml::Table::new();
        file.insert("postgresql".into(), section.into());
        env.write_config(&toml::to_string(&file)?)
    }
}

/// Returns true when `SKIP_TEST_CLUSTER` is "1", "true" or "yes".
pub fn should_skip_test_cluster() -> bool {
    std::env::var("SKIP_TEST_CLUSTER")
        .map(|value| matches!(value.to_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

/// Print a skip marker when `SKIP_TEST_CLUSTER` is set, otherwise panic.
pub fn handle_cluster_setup_failure<T>(reason: impl std::fmt::Display) -> Option<T> {
    if should_skip_test_cluster() {
        eprintln!("SKIP-TEST-CLUSTER: {reason}");
        None
    } else {
        panic!("Test cluster setup failed: {reason}. Set SKIP_TEST_CLUSTER=1 to skip.");
    }
}

pub fn format_postgres_error(error: &postgres::Error) -> String {
    let Some(db_error) = error.as_db_error() else {
        return error.to_string();
    };

    let mut summary = format!(
        "postgres error {:?}: {}",
        db_error.code(),
        db_error.message()
    );
    if let Some(detail) = db_error.detail() {
        summary.push_str("; detail: ");
        summary.push_str(detail);
    }
    if let Some(hint) = db_error.hint() {
        summary.push_str("; hint: ");
        summary.push_str(hint);
    }
    summary
}

fn pg_embed_dirs() -> Result<(PathBuf, PathBuf)> {
    let base = std::env::var_os("CARGO_TARGET_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("target"))
        .join("pg-embed")
        .join(format!(
            "bootstrap-{}-{}",
            std::process::id(),
            BOOTSTRAP_COUNT.fetch_add(1, Ordering::SeqCst)
        ));
    let runtime_dir = base.join("install");
    let data_dir = base.join("data");
    std::fs::create_dir_all(&runtime_dir)?;
    std::fs::create_dir_all(&data_dir)?;
    Ok((runtime_dir, data_dir))
}

fn is_transient_error(err: &str) -> bool {
    let err = err.to_lowercase();
    [
        "error decoding response body",
        "connection reset",
        "connection refused",
        "timed out",
        "temporarily unavailable",
        "dns error",
    ]
    .iter()
    .any(|pattern| err.contains(pattern))
}

fn bootstrap_cluster() -> Result<TestCluster> {
    let _bootstrap_guard = BOOTSTRAP_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|err| err.into_inner());

    let needs_override =
        std::env::var_os("PG_RUNTIME_DIR").is_none() || std::env::var_os("PG_DATA_DIR").is_none();
    let _env_guard = if needs_override {
        let (runtime_dir, data_dir) = pg_embed_dirs()?;
        Some(env_lock::lock_env([
            ("PG_RUNTIME_DIR", Some(runtime_dir.to_string_lossy().into_owned())),
            ("PG_DATA_DIR", Some(data_dir.to_string_lossy().into_owned())),
        ]))
    } else {
        None
    };

    let mut last_error = String::new();
    for attempt in 0..=MAX_RETRIES {
        match TestCluster::new() {
            Ok(cluster) => return Ok(cluster),
            Err(err) => {
                last_error = format!("{err:?}");
                if attempt == MAX_RETRIES || !is_transient_error(&last_error) {
                    break;
                }
                std::thread::sleep(Duration::from_millis(RETRY_DELAY_MS * (1 << attempt)));
            }
        }
    }
    Err(anyhow!("embedded PostgreSQL did not start: {last_error}"))
}
