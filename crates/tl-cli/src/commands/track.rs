//! Track command: runs the heartbeat in the foreground until interrupted.

use std::future::Future;
use std::io::Write;
use std::time::Duration;

use anyhow::{Context, Result};

use tl_db::{Database, Heartbeat, SharedDatabase};

use super::util::format_instant;

/// How long to wait for the heartbeat to finish its last checkpoint.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Runs until Ctrl-C, checkpointing the current task every `interval`.
pub fn run<W: Write>(writer: &mut W, db: Database, interval: Duration) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    runtime.block_on(async {
        let signal = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!(error = %e, "failed to listen for interrupt");
            }
        };
        track_until(writer, SharedDatabase::new(db), interval, signal).await
    })
}

/// Keeps a heartbeat alive until `signal` resolves.
pub async fn track_until<W: Write>(
    writer: &mut W,
    db: SharedDatabase,
    interval: Duration,
    signal: impl Future<Output = ()>,
) -> Result<()> {
    match db.with(|db| db.current_entry())? {
        Some(entry) => writeln!(
            writer,
            "Tracking {} (since {}). Press Ctrl-C to stop.",
            entry.task,
            format_instant(entry.start)
        )?,
        None => writeln!(
            writer,
            "No task running; checkpoints resume once one starts. Press Ctrl-C to stop."
        )?,
    }
    writer.flush()?;

    let heartbeat = Heartbeat::spawn(db, interval);
    signal.await;
    if !heartbeat.shutdown(SHUTDOWN_TIMEOUT).await {
        tracing::warn!("heartbeat shutdown was not clean");
    }
    Ok(())
}
