//! Store handle shared between the command path and the heartbeat.

use std::sync::{Arc, Mutex, PoisonError};

use crate::Database;

/// A [`Database`] behind one store-wide mutex.
///
/// Every read and write, from either actor, runs inside [`SharedDatabase::with`],
/// so the invariants that span several rows are checked and applied atomically.
#[derive(Clone)]
pub struct SharedDatabase {
    inner: Arc<Mutex<Database>>,
}

impl SharedDatabase {
    pub fn new(db: Database) -> Self {
        Self {
            inner: Arc::new(Mutex::new(db)),
        }
    }

    /// Runs `f` with exclusive access to the store.
    ///
    /// A panic in another holder does not leave the store half-written (every
    /// mutation is a transaction), so a poisoned lock is recovered.
    pub fn with<T>(&self, f: impl FnOnce(&mut Database) -> T) -> T {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }
}
