mod config;
mod db;
mod repl;
mod timing;
mod ui;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use crate::repl::{Session, TerminalConsole};
use crate::ui::prelude::*;

/// Interactive create/read/update/delete console for a users table
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Connection settings file (default: ./db_config.ini, then the user config dir)
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Activate debug mode
    #[arg(short, long)]
    debug: bool,

    /// Output format for messages
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,
}

fn main() {
    let cli = Cli::parse();

    ui::init(cli.format, !cli.no_color);
    ui::set_debug_mode(cli.debug);

    if let Err(e) = run(&cli) {
        emit(Level::Error, "app.error", &format!("Error: {:#}", e), None);
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    let config_path = config::resolve_path(cli.config.as_deref())?;
    debug(
        "config.path",
        &format!("Using config file {}", config_path.display()),
    );

    let backend = config::load(&config_path)?;
    debug(
        "config.backend",
        &format!("Backend {} at {}", backend.name(), backend.describe()),
    );

    let store = db::connect(&backend).context("Failed to connect to the database")?;
    emit(
        Level::Success,
        "db.connected",
        &format!("Connected to {} database.", store.backend()),
        None,
    );

    let mut session = Session::new(store, TerminalConsole::new());
    session.run()?;
    session.close().context("closing database connection")?;

    Ok(())
}
