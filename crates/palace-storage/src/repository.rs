//! Typed palace collection and quiz-results log.
//!
//! Both collections are whole JSON arrays stored under a fixed key of a
//! [`KeyValueStore`].  Reads are "parse-or-empty": a missing key, a backend
//! read failure, or a document that is not a JSON array all yield an empty
//! collection.  Inside a valid array each element is decoded on its own;
//! elements that do not decode are left out of reads and written back
//! unchanged.
//!
//! Writes replace the whole array.  A write that leaves a collection empty
//! removes its key.
//!
//! # Example
//!
//! ```rust
//! use palace_storage::{MemoryKvStore, PalaceRepository};
//! use palace_types::{catalog, MemoryPalace, Room};
//!
//! let mut repo = PalaceRepository::new(MemoryKvStore::new());
//! let palace = MemoryPalace::new("Kings", Room::from_template(catalog::room_template("medieval-castle")));
//! repo.upsert_palace(&palace).unwrap();
//!
//! assert_eq!(repo.list_palaces().len(), 1);
//! assert!(repo.delete_palace(&palace.id).unwrap());
//! assert!(!repo.delete_palace(&palace.id).unwrap());
//! ```

use chrono::{DateTime, Utc};
use palace_types::{MemoryPalace, QuizSession};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::kv::{KeyValueStore, MemoryKvStore, StorageError};

/// Key of the palace collection.
pub const PALACES_KEY: &str = "memoryPalaces";

/// Key of the completed-quiz log.
pub const QUIZ_RESULTS_KEY: &str = "quizResults";

// ─────────────────────────────────────────────────────────────────────────────
// PalaceSummary
// ─────────────────────────────────────────────────────────────────────────────

/// What the load menu shows for each saved palace.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PalaceSummary {
    pub id: String,
    pub name: String,
    pub room_count: usize,
    pub object_count: usize,
    pub last_modified: DateTime<Utc>,
}

impl From<&MemoryPalace> for PalaceSummary {
    fn from(palace: &MemoryPalace) -> Self {
        Self {
            id: palace.id.clone(),
            name: palace.name.clone(),
            room_count: palace.rooms.len(),
            object_count: palace.rooms.iter().map(|r| r.objects.len()).sum(),
            last_modified: palace.last_modified,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// PalaceRepository
// ─────────────────────────────────────────────────────────────────────────────

/// Durable palace collection plus quiz-results log over any
/// [`KeyValueStore`].
pub struct PalaceRepository {
    kv: Box<dyn KeyValueStore>,
}

impl PalaceRepository {
    pub fn new(kv: impl KeyValueStore + 'static) -> Self {
        Self { kv: Box::new(kv) }
    }

    /// A repository that forgets everything when dropped.
    pub fn in_memory() -> Self {
        Self::new(MemoryKvStore::new())
    }

    // ── palaces ──────────────────────────────────────────────────────────────

    /// Every saved palace, in insertion order.
    pub fn list_palaces(&self) -> Vec<MemoryPalace> {
        self.read_collection(PALACES_KEY)
    }

    /// Menu summaries of every saved palace.
    pub fn summaries(&self) -> Vec<PalaceSummary> {
        self.list_palaces().iter().map(PalaceSummary::from).collect()
    }

    pub fn find_palace(&self, id: &str) -> Option<MemoryPalace> {
        self.list_palaces().into_iter().find(|p| p.id == id)
    }

    /// Append `palace` without checking for an existing entry.
    pub fn append_palace(&mut self, palace: &MemoryPalace) -> Result<(), StorageError> {
        let mut entries = self.read_entries(PALACES_KEY);
        entries.push(serde_json::to_value(palace)?);
        self.write_entries(PALACES_KEY, &entries)
    }

    /// Replace the palace with the same identity, or append it.
    ///
    /// Returns `true` when the palace was inserted rather than replaced.
    pub fn upsert_palace(&mut self, palace: &MemoryPalace) -> Result<bool, StorageError> {
        let mut entries = self.read_entries(PALACES_KEY);
        let value = serde_json::to_value(palace)?;
        let existing = entries
            .iter_mut()
            .find(|e| entry_id(e) == Some(palace.id.as_str()));
        let inserted = match existing {
            Some(existing) => {
                *existing = value;
                false
            }
            None => {
                entries.push(value);
                true
            }
        };
        self.write_entries(PALACES_KEY, &entries)?;
        Ok(inserted)
    }

    /// Remove every palace with identity `id`.
    ///
    /// Returns `true` if anything was removed; deleting an absent id is a
    /// no-op that still succeeds.
    pub fn delete_palace(&mut self, id: &str) -> Result<bool, StorageError> {
        let mut entries = self.read_entries(PALACES_KEY);
        let before = entries.len();
        entries.retain(|e| entry_id(e) != Some(id));
        if entries.len() == before {
            debug!(palace_id = id, "delete_palace: no such palace");
            return Ok(false);
        }
        self.write_entries(PALACES_KEY, &entries)?;
        Ok(true)
    }

    // ── quiz results ─────────────────────────────────────────────────────────

    /// Completed quiz sessions, oldest first.
    pub fn quiz_results(&self) -> Vec<QuizSession> {
        self.read_collection(QUIZ_RESULTS_KEY)
    }

    /// Append a completed session to the results log.
    pub fn append_quiz_result(&mut self, session: &QuizSession) -> Result<(), StorageError> {
        let mut entries = self.read_entries(QUIZ_RESULTS_KEY);
        entries.push(serde_json::to_value(session)?);
        self.write_entries(QUIZ_RESULTS_KEY, &entries)
    }

    // ── helpers ──────────────────────────────────────────────────────────────

    fn read_collection<T: DeserializeOwned>(&self, key: &str) -> Vec<T> {
        self.read_entries(key)
            .into_iter()
            .enumerate()
            .filter_map(|(index, entry)| match serde_json::from_value(entry) {
                Ok(item) => Some(item),
                Err(e) => {
                    warn!(key, index, error = %e, "skipping unreadable entry");
                    None
                }
            })
            .collect()
    }

    /// The stored array's raw elements.
    fn read_entries(&self, key: &str) -> Vec<Value> {
        let raw = match self.kv.get(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(e) => {
                warn!(key, error = %e, "failed to read collection; treating as empty");
                return Vec::new();
            }
        };
        match serde_json::from_str(&raw) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(key, error = %e, "stored collection is not a JSON array; treating as empty");
                Vec::new()
            }
        }
    }

    fn write_entries(&mut self, key: &str, entries: &[Value]) -> Result<(), StorageError> {
        if entries.is_empty() {
            self.kv.remove(key)?;
            debug!(key, "collection emptied; key removed");
            return Ok(());
        }
        let raw = serde_json::to_string(entries)?;
        self.kv.put(key, &raw)?;
        debug!(key, len = entries.len(), "collection written");
        Ok(())
    }
}

fn entry_id(entry: &Value) -> Option<&str> {
    entry.get("id")?.as_str()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
