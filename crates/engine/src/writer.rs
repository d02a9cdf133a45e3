//! Background journal writer.
//!
//! One dedicated thread per database consumes the mutation queue and
//! appends records under the journal's exclusive lock. Entries stay queued
//! until they are durably written, so "queue empty" is exactly the
//! predicate flushers wait on.
//!
//! A failed batch is logged, dropped from the queue, and its error parked
//! in shared state; the next synchronous caller (`flush`, `sync`, `lock`,
//! `compact`, `close`) surfaces it. The worker itself keeps running.

use std::sync::Arc;

use daybreak_core::{Result, Serializer};
use daybreak_journal::Record;
use tracing::{debug, warn};

use crate::database::Core;

/// One queued unit of work for the writer thread.
pub(crate) enum Task {
    /// Append this record.
    Record(Record),
    /// Shutdown sentinel: flush and exit after everything queued before it.
    Shutdown,
}

/// Writer thread main loop.
pub(crate) fn run<S: Serializer>(core: Arc<Core<S>>) {
    loop {
        // Snapshot the records up to (not including) a shutdown sentinel,
        // leaving everything queued until it is on disk.
        let (batch, shutdown) = {
            let mut inner = core.inner.lock();
            while inner.queue.is_empty() {
                core.full.wait(&mut inner);
            }
            let mut batch = Vec::new();
            let mut shutdown = false;
            for task in inner.queue.iter() {
                match task {
                    Task::Record(record) => batch.push(record.clone()),
                    Task::Shutdown => {
                        shutdown = true;
                        break;
                    }
                }
            }
            (batch, shutdown)
        };

        let written = write_batch(&core, &batch);

        {
            let mut inner = core.inner.lock();
            let popped = batch.len() + usize::from(shutdown);
            for _ in 0..popped {
                inner.queue.pop_front();
            }
            if let Err(e) = written {
                warn!(
                    target: "daybreak::writer",
                    path = ?core.path,
                    error = %e,
                    records = batch.len(),
                    "journal append failed; batch dropped"
                );
                inner.writer_error = Some(e);
            }
            if inner.queue.is_empty() {
                core.empty.notify_all();
            }
        }

        if shutdown {
            debug!(target: "daybreak::writer", path = ?core.path, "writer exiting");
            break;
        }
    }
}

/// Append a batch under one exclusive-lock acquisition, flush, and apply
/// the back-reading optimization.
fn write_batch<S: Serializer>(core: &Arc<Core<S>>, records: &[Record]) -> Result<()> {
    if records.is_empty() {
        return core.journal.flush();
    }

    let guard = core.journal.exclusive()?;
    let mut total = 0u64;
    for record in records {
        let bytes = record.to_bytes();
        core.journal.append(&guard, &bytes)?;
        total += bytes.len() as u64;
    }
    core.journal.flush()?;
    let size = core.journal.size()?;
    drop(guard);

    // If the file ends exactly where the cursor plus this batch would, the
    // appended bytes never need to be re-read on the next update.
    let mut cursor = core.cursor.lock();
    if !cursor.has_pending_reset() && size == cursor.pos() + total {
        cursor.advance(total, records.len() as u64);
    }

    Ok(())
}
