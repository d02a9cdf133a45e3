//! # Daybreak
//!
//! An embedded, single-file, append-only key-value store.
//!
//! Every mutation is persisted as a length-prefixed, CRC-checked record
//! appended to a journal file by a background writer; an in-memory index
//! mirrors the journal's latest state, so reads never touch the disk.
//! Several instances, across threads or processes, may share one file,
//! coordinated by advisory file locks, and compaction rewrites the journal
//! in place to drop superseded records.
//!
//! # Quick Start
//!
//! ```no_run
//! use daybreak::{Database, JsonSerializer};
//!
//! fn main() -> daybreak::Result<()> {
//!     let mut db: Database<JsonSerializer<String>> = Database::open("my.db")?;
//!
//!     db.set("greeting", "hello".to_string())?;       // queued
//!     db.set_sync("count", "42".to_string())?;        // durable on return
//!     assert_eq!(db.get("greeting")?, Some("hello".to_string()));
//!
//!     db.sync()?;      // drain the queue, pick up writes from other processes
//!     db.compact()?;   // rewrite the journal to one record per live key
//!     db.close()?;
//!     Ok(())
//! }
//! ```
//!
//! # Durability
//!
//! `set`/`delete` enqueue and return; `flush`/`sync` (and the `_sync`
//! variants) block until the queued records reach the file. Bytes are
//! flushed out of the process at every batch; disk-level guarantees beyond
//! that are not promised.
//!
//! # Choosing a serializer
//!
//! Values are typed through a [`Serializer`]. [`JsonSerializer`] is the
//! default choice; [`BytesSerializer`] stores raw byte strings. The
//! serializer's name is recorded in the file header, so a journal written
//! with one serializer refuses to open with another.
//!
//! The journal byte format and locking discipline live in the internal
//! `daybreak-journal` crate; only the surface re-exported here is stable.

pub use daybreak_core::{
    BytesSerializer, DaybreakError, JsonSerializer, Result, Serializer, SerializerError,
};
pub use daybreak_engine::{shutdown_all, Database, DefaultValue, Locked, Options};
