//! Process-wide registry of open databases.
//!
//! Every open database registers a weak reference here so that process
//! termination can drain writer queues that the application forgot to
//! close. Rust offers no ordered at-exit hook for user code, so the drain
//! is explicit: call [`shutdown_all`] before the process exits. A database
//! dropped without `close` also drains itself (with a warning).
//!
//! Weak references keep the registry from extending database lifetimes;
//! `close` deregisters.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Weak;

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use tracing::warn;

/// Drain-and-park hook each database exposes to the registry.
pub(crate) trait DrainClose: Send + Sync {
    /// Journal file path, for diagnostics.
    fn path(&self) -> &Path;

    /// Push the shutdown sentinel and wait for the queue to drain.
    /// Idempotent; records enqueued after this are not honored.
    fn drain_close(&self);
}

struct Entry {
    id: u64,
    db: Weak<dyn DrainClose>,
}

/// Registry of open databases (weak references).
static OPEN_DATABASES: Lazy<Mutex<Vec<Entry>>> = Lazy::new(|| Mutex::new(Vec::new()));

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

pub(crate) fn register(db: Weak<dyn DrainClose>) -> u64 {
    let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    OPEN_DATABASES.lock().push(Entry { id, db });
    id
}

pub(crate) fn deregister(id: u64) {
    OPEN_DATABASES.lock().retain(|entry| entry.id != id);
}

/// Drain every database still open in this process.
///
/// Each one is reported with a warning naming its file, then its writer
/// queue is drained and further operations on it fail as closed. Intended
/// to run once, just before process exit.
pub fn shutdown_all() {
    let entries = std::mem::take(&mut *OPEN_DATABASES.lock());
    drain_entries(entries);
}

fn drain_entries(entries: Vec<Entry>) {
    for entry in entries {
        if let Some(db) = entry.db.upgrade() {
            warn!(
                target: "daybreak::registry",
                path = ?db.path(),
                "database still open at shutdown; draining queue"
            );
            db.drain_close();
        }
    }
}
