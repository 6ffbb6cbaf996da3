//! `palace-storage` – durable state for memory palaces.
//!
//! # Modules
//!
//! - [`kv`] – the [`KeyValueStore`][kv::KeyValueStore] abstraction with a
//!   SQLite-backed implementation ([`SqliteKvStore`][kv::SqliteKvStore]) and
//!   an in-process one ([`MemoryKvStore`][kv::MemoryKvStore]).
//! - [`repository`] – [`PalaceRepository`][repository::PalaceRepository]:
//!   the typed palace collection and the append-only quiz-results log, both
//!   stored as whole JSON arrays under fixed keys.

pub mod kv;
pub mod repository;

pub use kv::{KeyValueStore, MemoryKvStore, SqliteKvStore, StorageError};
pub use repository::{PALACES_KEY, PalaceRepository, PalaceSummary, QUIZ_RESULTS_KEY};
