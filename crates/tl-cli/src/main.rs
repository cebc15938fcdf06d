use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use tl_cli::commands::{bookmark, diary, entries, report, tag, task, timer, todo, track};
use tl_cli::{Cli, Commands, Config};

/// Load config and open database, ensuring the parent directory exists.
fn open_database(config_path: Option<&Path>) -> Result<(tl_db::Database, Config)> {
    let config = Config::load_from(config_path).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");

    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent).context("failed to create database directory")?;
    }

    let db = tl_db::Database::open(&config.database_path)
        .with_context(|| format!("failed to open {}", config.database_path.display()))?;
    Ok((db, config))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing with verbose flag support
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // Use try_init to avoid panic if tracing is already initialized (e.g., in tests)
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    let Some(command) = &cli.command else {
        // No subcommand, show help
        use clap::CommandFactory;
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };

    let (mut db, config) = open_database(cli.config.as_deref())?;
    let now = Utc::now();
    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    match command {
        Commands::Task(action) => task::run(&mut out, &mut db, action)?,
        Commands::Tag(action) => tag::run(&mut out, &mut db, action)?,
        Commands::Start { task, at } => {
            timer::start(&mut out, &mut db, task.as_deref(), at.as_deref(), now)?;
        }
        Commands::Stop { at, at_last_seen } => {
            timer::stop(&mut out, &mut db, at.as_deref(), *at_last_seen, now)?;
        }
        Commands::Resume { at } => timer::resume(&mut out, &mut db, at.as_deref(), now)?,
        Commands::Status => timer::status(&mut out, &db, now)?,
        Commands::Entries { filter, long } => {
            let floor = long.then(|| config.summary().long_entry_floor);
            entries::list(&mut out, &db, filter, floor, now)?;
        }
        Commands::Entry(action) => entries::run(&mut out, &mut db, action, now)?,
        Commands::Diary(action) => diary::run(&mut out, &mut db, action, now)?,
        Commands::Todo(action) => todo::run(&mut out, &mut db, action, now)?,
        Commands::Report {
            kind,
            filter,
            by_tag,
            json,
        } => report::run(
            &mut out,
            &db,
            *kind,
            filter,
            *by_tag,
            *json,
            &config.summary(),
            now,
        )?,
        Commands::Bookmark(action) => bookmark::run(&mut out, &mut db, action, now)?,
        Commands::Track => track::run(&mut out, db, config.heartbeat_interval())?,
    }

    out.flush()?;
    Ok(())
}
