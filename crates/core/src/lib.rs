//! Core types shared across the daybreak crates.
//!
//! This crate defines the unified [`DaybreakError`] type and the
//! [`Serializer`] contract that turns user values into the byte strings the
//! journal persists. The journal and engine crates build on these; nothing
//! here touches the filesystem.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod serializer;

pub use error::{DaybreakError, Result};
pub use serializer::{BytesSerializer, JsonSerializer, Serializer, SerializerError};
