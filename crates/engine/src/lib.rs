//! Database engine for the daybreak store.
//!
//! This crate layers the in-memory side over the on-disk journal:
//!
//! - [`Database`]: the public facade for lookup, mutation, iteration,
//!   durability control, compaction and lifecycle
//! - a dedicated writer thread per database, consuming a queue of records
//!   and appending them under the journal's exclusive lock
//! - an insertion-ordered key index rebuilt by replaying the journal
//! - a process-wide registry of open databases with [`shutdown_all`] for
//!   termination-time draining

#![warn(missing_docs)]
#![warn(clippy::all)]

mod database;
mod index;
mod options;
mod registry;
mod writer;

pub use database::{Database, Locked};
pub use options::{DefaultValue, Options};
pub use registry::shutdown_all;
