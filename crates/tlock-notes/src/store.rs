//! Durable note storage.
//!
//! The whole note collection lives under one fixed key (`notes`) as a JSON
//! array in insertion order. Two backends implement `NoteStore`:
//!   - **JSON file** (default): one file, rewritten atomically via temp+rename.
//!   - **Memory**: a key-value map holding the serialized JSON, for tests and
//!     embedding.
//!
//! A missing key or file reads as an empty collection.
//!
//! Corruption: a top-level value that is not an array fails the load and
//! leaves the file untouched. Individual records that do not parse, or that
//! violate the revealed-fields invariant, are dropped with a warning; the
//! file backend copies the original to `<file>.corrupt` before the next save.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tlock_core::{Note, TlockError, TlockResult};
use tracing::{debug, warn};

/// Key under which the note collection is stored.
pub const STORE_KEY: &str = "notes";

/// Read-modify-write storage for the full note collection.
pub trait NoteStore: Send + Sync {
    /// All notes, oldest first.
    fn load(&self) -> TlockResult<Vec<Note>>;
    /// Replace the stored collection.
    fn save(&self, notes: &[Note]) -> TlockResult<()>;
}

/// Parse a stored collection, dropping bad records.
///
/// A record whose nonce (and therefore id) repeats an earlier one is dropped
/// too: reveal could never address it.
///
/// Returns the surviving notes and the number dropped.
pub fn parse_notes(raw: &str) -> TlockResult<(Vec<Note>, usize)> {
    let values: Vec<serde_json::Value> = serde_json::from_str(raw)
        .map_err(|e| TlockError::Store(format!("note collection is not a JSON array: {e}")))?;

    let mut notes = Vec::with_capacity(values.len());
    let mut seen = HashSet::with_capacity(values.len());
    let mut dropped = 0;
    for (index, value) in values.into_iter().enumerate() {
        match serde_json::from_value::<Note>(value) {
            Ok(note) if !note.is_consistent() => {
                warn!(index, "dropping note with inconsistent reveal fields");
                dropped += 1;
            }
            Ok(note) if !seen.insert(note.id()) => {
                warn!(index, id = %note.id(), "dropping note with duplicate id");
                dropped += 1;
            }
            Ok(note) => notes.push(note),
            Err(e) => {
                warn!(index, error = %e, "dropping unparseable note record");
                dropped += 1;
            }
        }
    }
    Ok((notes, dropped))
}

fn serialize_notes(notes: &[Note]) -> TlockResult<String> {
    serde_json::to_string(notes).map_err(|e| TlockError::Store(format!("serializing notes: {e}")))
}

/// Notes persisted to a single JSON file.
pub struct JsonFileStore {
    path: PathBuf,
    /// Set when a load dropped records and the original has not been copied aside yet
    quarantine_pending: Mutex<bool>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            quarantine_pending: Mutex::new(false),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn quarantine_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".corrupt");
        PathBuf::from(name)
    }

    fn set_quarantine_pending(&self, pending: bool) {
        if let Ok(mut flag) = self.quarantine_pending.lock() {
            *flag = pending;
        }
    }

    fn take_quarantine_pending(&self) -> bool {
        self.quarantine_pending
            .lock()
            .map(|mut flag| std::mem::replace(&mut *flag, false))
            .unwrap_or(false)
    }
}

impl NoteStore for JsonFileStore {
    fn load(&self) -> TlockResult<Vec<Note>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let raw = std::fs::read_to_string(&self.path).map_err(|e| {
            TlockError::Store(format!("reading note store {}: {e}", self.path.display()))
        })?;
        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }

        let (notes, dropped) = parse_notes(&raw).inspect_err(|e| {
            warn!(path = %self.path.display(), error = %e, "note store unreadable");
        })?;
        if dropped > 0 {
            warn!(
                path = %self.path.display(),
                dropped,
                "note store contained corrupt records"
            );
            self.set_quarantine_pending(true);
        }
        Ok(notes)
    }

    fn save(&self, notes: &[Note]) -> TlockResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    TlockError::Store(format!("creating store dir {}: {e}", parent.display()))
                })?;
            }
        }

        if self.take_quarantine_pending() && self.path.exists() {
            let dest = self.quarantine_path();
            std::fs::copy(&self.path, &dest).map_err(|e| {
                TlockError::Store(format!("copying corrupt store to {}: {e}", dest.display()))
            })?;
            warn!(path = %dest.display(), "original note store kept for inspection");
        }

        let json = serialize_notes(notes)?;

        // Atomic write: write to temp file, then rename
        let tmp_path = self.path.with_extension("tmp");
        std::fs::write(&tmp_path, &json).map_err(|e| {
            TlockError::Store(format!("writing note store temp {}: {e}", tmp_path.display()))
        })?;
        std::fs::rename(&tmp_path, &self.path).map_err(|e| {
            TlockError::Store(format!("renaming note store {}: {e}", self.path.display()))
        })?;

        debug!(path = %self.path.display(), count = notes.len(), "note store saved");
        Ok(())
    }
}

/// In-memory key-value backend.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw stored value, as a browser-style key-value store would hold it.
    pub fn raw(&self) -> Option<String> {
        self.entries
            .lock()
            .ok()
            .and_then(|entries| entries.get(STORE_KEY).cloned())
    }

    /// Overwrite the raw stored value.
    pub fn set_raw(&self, raw: impl Into<String>) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(STORE_KEY.to_string(), raw.into());
        }
    }
}

impl NoteStore for MemoryStore {
    fn load(&self) -> TlockResult<Vec<Note>> {
        match self.raw() {
            Some(raw) => parse_notes(&raw).map(|(notes, _)| notes),
            None => Ok(Vec::new()),
        }
    }

    fn save(&self, notes: &[Note]) -> TlockResult<()> {
        let json = serialize_notes(notes)?;
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| TlockError::Store("memory store lock poisoned".into()))?;
        entries.insert(STORE_KEY.to_string(), json);
        Ok(())
    }
}
