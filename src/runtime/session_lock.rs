//! Per-session mutual exclusion (spec §4.7): only one turn may run against a
//! given session at a time. Grounded on the teacher's keyed-map-of-trackers
//! shape in `kernel::rate_limiter::SlidingWindow` (one entry per key, created
//! on first use), adapted here to guard access instead of counting it.

use crate::error::{Error, Result};
use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

#[derive(Debug, Default)]
pub struct SessionLockTable {
    locks: StdMutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl SessionLockTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_for(&self, session_id: &str) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock().expect("session lock table poisoned");
        locks
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    /// Try to acquire the lock for `session_id`, failing fast with
    /// `Error::SessionBusy` rather than queueing behind a concurrent turn.
    pub fn try_acquire(&self, session_id: &str) -> Result<OwnedMutexGuard<()>> {
        self.lock_for(session_id)
            .try_lock_owned()
            .map_err(|_| Error::session_busy(format!("session {session_id} is already processing a message")))
    }

    /// Drop the table entry for a session once nothing else references it,
    /// so a long-lived runtime doesn't grow the map forever. Best-effort: a
    /// session id that is acquired again after this just gets a fresh entry.
    pub fn evict_if_unused(&self, session_id: &str) {
        let mut locks = self.locks.lock().expect("session lock table poisoned");
        if let Some(entry) = locks.get(session_id) {
            if Arc::strong_count(entry) == 1 {
                locks.remove(session_id);
            }
        }
    }
}
