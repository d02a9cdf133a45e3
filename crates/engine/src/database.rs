//! Database facade: open/close lifecycle and the public operation set.
//!
//! A [`Database`] pairs an insertion-ordered in-memory index with an
//! append-only journal file. Mutations update the index immediately and
//! enqueue a record for the writer thread; `sync` (and the `_sync` op
//! variants) block until the queue drains and then replay any records other
//! processes appended.
//!
//! # Locking
//!
//! One mutex (`inner`) protects the index, the queue and replay; two
//! condvars signal queue-non-empty (to the worker) and queue-empty (to
//! flushers). Facade operations that need the journal's exclusive file lock
//! (`lock`, `compact`, `clear`) drain the queue first while holding
//! `inner`, which guarantees the worker is idle and not holding the file
//! lock when they acquire it.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use std::thread::JoinHandle;

use daybreak_core::{DaybreakError, Result, Serializer};
use daybreak_journal::{Header, JournalFile, ReadCursor, Record, ReplayBatch, TempJournal};
use parking_lot::{Condvar, Mutex, MutexGuard};
use tracing::{info, warn};

use crate::index::KeyIndex;
use crate::options::{DefaultValue, Options};
use crate::registry::{self, DrainClose};
use crate::writer::{self, Task};

/// An embedded, single-file, append-only key-value store.
///
/// Values are typed through the configured [`Serializer`]; keys are
/// non-empty strings. One writer thread per database appends queued
/// mutations to the journal; several databases (in this or other
/// processes) may share one file, coordinated by advisory file locks.
pub struct Database<S: Serializer> {
    core: Option<Arc<Core<S>>>,
    worker: Option<JoinHandle<()>>,
    registry_id: u64,
}

/// State shared between the facade, the writer thread and the registry.
pub(crate) struct Core<S: Serializer> {
    pub(crate) path: PathBuf,
    pub(crate) serializer: S,
    pub(crate) default: Mutex<DefaultValue<S::Value>>,
    pub(crate) journal: JournalFile,
    pub(crate) cursor: Mutex<ReadCursor>,
    pub(crate) inner: Mutex<Inner<S::Value>>,
    pub(crate) full: Condvar,
    pub(crate) empty: Condvar,
}

/// Everything behind the single database mutex.
pub(crate) struct Inner<V> {
    pub(crate) index: KeyIndex<V>,
    pub(crate) queue: VecDeque<Task>,
    pub(crate) closed: bool,
    pub(crate) writer_error: Option<DaybreakError>,
}

impl<S: Serializer> Database<S> {
    /// Open (or create) the database at `path` with default options.
    pub fn open(path: impl AsRef<Path>) -> Result<Self>
    where
        S: Default,
    {
        Self::open_with(path, Options::new(S::default()))
    }

    /// Open (or create) the database at `path`.
    ///
    /// Creates the file with a header naming the serializer if it is new,
    /// validates the header if it exists, replays the journal into the
    /// index, and starts the writer thread.
    pub fn open_with(path: impl AsRef<Path>, options: Options<S>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let header = Header::new(options.serializer.format_name());
        let journal = JournalFile::open(&path, header)?;
        let cursor = ReadCursor::open(&path, options.serializer.format_name())?;

        let core = Arc::new(Core {
            path: path.clone(),
            serializer: options.serializer,
            default: Mutex::new(options.default),
            journal,
            cursor: Mutex::new(cursor),
            inner: Mutex::new(Inner {
                index: KeyIndex::new(),
                queue: VecDeque::new(),
                closed: false,
                writer_error: None,
            }),
            full: Condvar::new(),
            empty: Condvar::new(),
        });

        {
            let mut inner = core.inner.lock();
            core.update(&mut inner, false)?;
        }

        let worker = {
            let core = Arc::clone(&core);
            std::thread::Builder::new()
                .name("daybreak-writer".to_string())
                .spawn(move || writer::run(core))?
        };

        let weak: Weak<dyn DrainClose> = Arc::downgrade(&core) as Weak<dyn DrainClose>;
        let registry_id = registry::register(weak);

        info!(target: "daybreak::db", path = ?path, "database opened");

        Ok(Database {
            core: Some(core),
            worker: Some(worker),
            registry_id,
        })
    }

    /// Look up `key` in memory.
    ///
    /// On a miss with a configured default, the default is installed via
    /// the `set` path (so it persists) and returned.
    pub fn get(&self, key: &str) -> Result<Option<S::Value>> {
        let core = self.core()?;
        let mut inner = core.inner.lock();
        Core::<S>::ensure_open(&inner)?;
        core.get_in(&mut inner, key)
    }

    /// Assign `value` to `key` and queue the put for the writer.
    pub fn set(&self, key: &str, value: S::Value) -> Result<()> {
        let core = self.core()?;
        let mut inner = core.inner.lock();
        Core::<S>::ensure_open(&inner)?;
        core.set_in(&mut inner, key, value)
    }

    /// [`set`](Self::set), then block until the record is on disk.
    pub fn set_sync(&self, key: &str, value: S::Value) -> Result<()> {
        let core = self.core()?;
        let mut inner = core.inner.lock();
        Core::<S>::ensure_open(&inner)?;
        core.set_in(&mut inner, key, value)?;
        core.wait_drained(&mut inner)
    }

    /// Remove `key` and queue a tombstone for the writer.
    pub fn delete(&self, key: &str) -> Result<()> {
        let core = self.core()?;
        let mut inner = core.inner.lock();
        Core::<S>::ensure_open(&inner)?;
        core.delete_in(&mut inner, key)
    }

    /// [`delete`](Self::delete), then block until the tombstone is on disk.
    pub fn delete_sync(&self, key: &str) -> Result<()> {
        let core = self.core()?;
        let mut inner = core.inner.lock();
        Core::<S>::ensure_open(&inner)?;
        core.delete_in(&mut inner, key)?;
        core.wait_drained(&mut inner)
    }

    /// Whether `key` is live. Never installs a default.
    pub fn has(&self, key: &str) -> Result<bool> {
        let core = self.core()?;
        let inner = core.inner.lock();
        Core::<S>::ensure_open(&inner)?;
        Ok(inner.index.contains(key))
    }

    /// Number of live keys.
    pub fn len(&self) -> Result<usize> {
        let core = self.core()?;
        let inner = core.inner.lock();
        Core::<S>::ensure_open(&inner)?;
        Ok(inner.index.len())
    }

    /// Whether the database holds no live keys.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Snapshot of all `(key, value)` pairs, in the order of each key's
    /// most recent put.
    pub fn entries(&self) -> Result<Vec<(String, S::Value)>> {
        let core = self.core()?;
        let inner = core.inner.lock();
        Core::<S>::ensure_open(&inner)?;
        Ok(inner
            .index
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect())
    }

    /// Snapshot of all live keys, in index order.
    pub fn keys(&self) -> Result<Vec<String>> {
        let core = self.core()?;
        let inner = core.inner.lock();
        Core::<S>::ensure_open(&inner)?;
        Ok(inner.index.iter().map(|(k, _)| k.to_string()).collect())
    }

    /// Block until every queued mutation is on disk.
    ///
    /// Also surfaces any error the writer thread parked since the last
    /// synchronous call.
    pub fn flush(&self) -> Result<()> {
        let core = self.core()?;
        let mut inner = core.inner.lock();
        Core::<S>::ensure_open(&inner)?;
        core.wait_drained(&mut inner)
    }

    /// Flush, then replay records other instances appended to the file.
    pub fn sync(&self) -> Result<()> {
        let core = self.core()?;
        let mut inner = core.inner.lock();
        Core::<S>::ensure_open(&inner)?;
        core.wait_drained(&mut inner)?;
        core.update(&mut inner, false)
    }

    /// Run `f` while holding the journal's exclusive lock.
    ///
    /// The queue is drained and the index caught up before `f` runs; writes
    /// made through the [`Locked`] view are flushed before the lock is
    /// released. No other process can append or rename while `f` runs.
    pub fn lock<R>(&self, f: impl FnOnce(&mut Locked<'_, S>) -> R) -> Result<R> {
        let core = self.core()?;
        let mut inner = core.inner.lock();
        Core::<S>::ensure_open(&inner)?;
        core.wait_drained(&mut inner)?;

        let guard = core.journal.exclusive()?;
        core.update(&mut inner, true)?;
        let result = {
            let mut view = Locked {
                core: core.as_ref(),
                inner: &mut *inner,
            };
            f(&mut view)
        };
        core.wait_drained(&mut inner)?;
        drop(guard);
        Ok(result)
    }

    /// Rewrite the journal to one put per live key.
    ///
    /// Records appended by other instances while the rewrite was in
    /// progress are carried over; the file is replaced atomically by
    /// rename. Readers in other processes pick up the replacement through
    /// the `nlink == 0` check on their next operation.
    pub fn compact(&self) -> Result<()> {
        let core = self.core()?;
        let mut inner = core.inner.lock();
        Core::<S>::ensure_open(&inner)?;

        // Dump the current in-memory state to a sibling temp file.
        let mut temp = TempJournal::create(&core.path, core.journal.header())?;
        for (key, value) in inner.index.iter() {
            let record = Record::put(
                core.serializer.key_bytes(key),
                core.serializer.encode(value)?,
            );
            temp.append_record(&record)?;
        }
        let compactsize = temp.size()?;

        // Make the in-memory state durable, then swap under the lock.
        core.wait_drained(&mut inner)?;
        {
            let guard = core.journal.exclusive()?;
            let mut cursor = core.cursor.lock();
            let newsize = cursor.file_size()?;
            if newsize == compactsize {
                // Already minimal; a concurrent compaction may have won.
                drop(temp);
            } else {
                if newsize > cursor.pos() {
                    let tail = cursor.read_tail(newsize)?;
                    temp.append_raw(&tail)?;
                }
                temp.persist_over(&core.path)?;
            }
            drop(cursor);
            drop(guard);
        }

        core.update(&mut inner, false)
    }

    /// Remove every key and truncate the journal to its header.
    pub fn clear(&self) -> Result<()> {
        let core = self.core()?;
        let mut inner = core.inner.lock();
        Core::<S>::ensure_open(&inner)?;
        core.wait_drained(&mut inner)?;

        let temp = TempJournal::create(&core.path, core.journal.header())?;
        {
            let guard = core.journal.exclusive()?;
            temp.persist_over(&core.path)?;
            drop(guard);
        }
        inner.index.clear();
        core.update(&mut inner, false)
    }

    /// Records applied over this instance's lifetime.
    ///
    /// Monotonic non-decreasing, not a precise count of live records;
    /// callers use it to decide when to [`compact`](Self::compact).
    pub fn logsize(&self) -> Result<u64> {
        let core = self.core()?;
        Ok(core.cursor.lock().logsize())
    }

    /// Path of the journal file, if the database is still open.
    pub fn path(&self) -> Option<&Path> {
        self.core.as_deref().map(|core| core.path.as_path())
    }

    /// Drain the queue, stop the writer thread and release the handles.
    ///
    /// Idempotent: a second `close` is a no-op. Mutations enqueued by other
    /// threads after the shutdown sentinel are not honored (they fail as
    /// closed).
    pub fn close(&mut self) -> Result<()> {
        let Some(core) = self.core.take() else {
            return Ok(());
        };
        core.drain_close();
        let parked = core.inner.lock().writer_error.take();

        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!(target: "daybreak::db", path = ?core.path, "writer thread panicked");
            }
        }
        registry::deregister(self.registry_id);
        info!(target: "daybreak::db", path = ?core.path, "database closed");

        match parked {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn core(&self) -> Result<&Arc<Core<S>>> {
        self.core.as_ref().ok_or(DaybreakError::Closed)
    }
}

impl<S: Serializer> Drop for Database<S> {
    fn drop(&mut self) {
        if let Some(core) = &self.core {
            warn!(
                target: "daybreak::db",
                path = ?core.path,
                "database dropped without close; draining queue"
            );
            let _ = self.close();
        }
    }
}

/// View of a database inside [`Database::lock`].
///
/// Operations mirror the facade but run under the already-held database
/// mutex and exclusive file lock.
pub struct Locked<'a, S: Serializer> {
    core: &'a Core<S>,
    inner: &'a mut Inner<S::Value>,
}

impl<S: Serializer> Locked<'_, S> {
    /// Look up `key`; installs the configured default on a miss.
    pub fn get(&mut self, key: &str) -> Result<Option<S::Value>> {
        self.core.get_in(self.inner, key)
    }

    /// Assign `value` to `key`.
    pub fn set(&mut self, key: &str, value: S::Value) -> Result<()> {
        self.core.set_in(self.inner, key, value)
    }

    /// Remove `key`.
    pub fn delete(&mut self, key: &str) -> Result<()> {
        self.core.delete_in(self.inner, key)
    }

    /// Whether `key` is live.
    pub fn has(&self, key: &str) -> bool {
        self.inner.index.contains(key)
    }

    /// Number of live keys.
    pub fn len(&self) -> usize {
        self.inner.index.len()
    }

    /// Whether the database holds no live keys.
    pub fn is_empty(&self) -> bool {
        self.inner.index.is_empty()
    }
}

impl<S: Serializer> Core<S> {
    fn ensure_open(inner: &Inner<S::Value>) -> Result<()> {
        if inner.closed {
            Err(DaybreakError::Closed)
        } else {
            Ok(())
        }
    }

    fn set_in(&self, inner: &mut Inner<S::Value>, key: &str, value: S::Value) -> Result<()> {
        let key_bytes = self.serializer.key_bytes(key);
        if key_bytes.is_empty() {
            return Err(DaybreakError::InvalidKey);
        }
        let value_bytes = self.serializer.encode(&value)?;
        inner.index.put(key.to_string(), value);
        inner
            .queue
            .push_back(Task::Record(Record::put(key_bytes, value_bytes)));
        self.full.notify_one();
        Ok(())
    }

    fn delete_in(&self, inner: &mut Inner<S::Value>, key: &str) -> Result<()> {
        let key_bytes = self.serializer.key_bytes(key);
        if key_bytes.is_empty() {
            return Err(DaybreakError::InvalidKey);
        }
        inner.index.remove(key);
        inner
            .queue
            .push_back(Task::Record(Record::tombstone(key_bytes)));
        self.full.notify_one();
        Ok(())
    }

    fn get_in(&self, inner: &mut Inner<S::Value>, key: &str) -> Result<Option<S::Value>> {
        if let Some(value) = inner.index.get(key) {
            return Ok(Some(value.clone()));
        }
        let default = match &*self.default.lock() {
            DefaultValue::None => return Ok(None),
            DefaultValue::Constant(value) => value.clone(),
            DefaultValue::Factory(factory) => factory(key),
        };
        self.set_in(inner, key, default.clone())?;
        Ok(Some(default))
    }

    /// Wait until the worker has observed an empty queue, then surface any
    /// parked writer error.
    fn wait_drained(&self, inner: &mut MutexGuard<'_, Inner<S::Value>>) -> Result<()> {
        while !inner.queue.is_empty() {
            self.empty.wait(inner);
        }
        match inner.writer_error.take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Poll the cursor and fold the result into the index.
    fn update(&self, inner: &mut Inner<S::Value>, skip_lock: bool) -> Result<()> {
        let batch = self.cursor.lock().poll(skip_lock)?;
        self.apply(inner, batch)
    }

    fn apply(&self, inner: &mut Inner<S::Value>, batch: ReplayBatch) -> Result<()> {
        if batch.reset {
            inner.index.clear();
        }
        for record in batch.records {
            match record {
                Record::Put { key, value } => {
                    let key = self.serializer.key_from_bytes(&key)?;
                    let value = self.serializer.decode(&value)?;
                    inner.index.put(key, value);
                }
                Record::Tombstone { key } => {
                    let key = self.serializer.key_from_bytes(&key)?;
                    inner.index.remove(&key);
                }
            }
        }
        Ok(())
    }
}

impl<S: Serializer> DrainClose for Core<S> {
    fn path(&self) -> &Path {
        &self.path
    }

    fn drain_close(&self) {
        let mut inner = self.inner.lock();
        if inner.closed {
            return;
        }
        inner.closed = true;
        inner.queue.push_back(Task::Shutdown);
        self.full.notify_one();
        while !inner.queue.is_empty() {
            self.empty.wait(&mut inner);
        }
    }
}
