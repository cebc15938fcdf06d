//! Background liveness checkpoints for the current task.
//!
//! The worker wakes on a fixed interval and stamps `last_seen` on the open
//! entry, so a crash leaves evidence of how long the task really ran. Failures
//! are logged and swallowed; the command path never sees them.

use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::SharedDatabase;

/// Default interval between checkpoints.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(10);

/// Handle to a running heartbeat worker.
pub struct Heartbeat {
    shutdown: CancellationToken,
    handle: JoinHandle<()>,
}

impl Heartbeat {
    /// Spawns the worker on the current tokio runtime.
    pub fn spawn(db: SharedDatabase, interval: Duration) -> Self {
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(run(db, interval, shutdown.clone()));
        info!(interval = ?interval, "heartbeat started");
        Self { shutdown, handle }
    }

    /// Asks the worker to exit without waiting for it.
    pub fn stop(&self) {
        self.shutdown.cancel();
    }

    /// Stops the worker and waits up to `timeout` for it to exit.
    ///
    /// Returns false (after logging) if the worker did not finish in time.
    pub async fn shutdown(self, timeout: Duration) -> bool {
        self.shutdown.cancel();
        match tokio::time::timeout(timeout, self.handle).await {
            Ok(Ok(())) => {
                info!("heartbeat stopped");
                true
            }
            Ok(Err(e)) => {
                warn!(error = %e, "heartbeat worker failed");
                false
            }
            Err(_) => {
                warn!(timeout = ?timeout, "heartbeat did not stop in time");
                false
            }
        }
    }
}

async fn run(db: SharedDatabase, interval: Duration, shutdown: CancellationToken) {
    loop {
        tokio::select! {
            () = shutdown.cancelled() => break,
            () = tokio::time::sleep(interval) => tick(&db),
        }
    }
}

fn tick(db: &SharedDatabase) {
    let now = Utc::now();
    match db.with(|db| db.checkpoint(now)) {
        Ok(true) => debug!(at = %now, "heartbeat checkpoint written"),
        Ok(false) => trace!("heartbeat idle: no current task"),
        Err(e) => warn!(error = %e, "heartbeat checkpoint failed"),
    }
}
