//! The note lifecycle manager: the single writer of the note store.
//!
//! Every mutation is a read-modify-write of the whole collection under one
//! async mutex. Key derivation runs on the blocking pool and the mutex is
//! not held across it, so ticks keep flowing while a reveal is decrypting.

use std::sync::Arc;
use std::time::Duration;

use tlock_core::{Note, NoteId, NoteStatus, NoteView, TlockError, TlockResult};
use tlock_crypto::TimeLock;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::lifecycle::{self, classify};
use crate::store::NoteStore;

/// How long a revealed note stays readable.
pub const DEFAULT_VIEW_WINDOW: Duration = Duration::from_secs(20 * 60);

pub struct NoteManager<S, C> {
    store: S,
    cipher: Arc<C>,
    view_window_ms: i64,
    write_lock: Mutex<()>,
}

impl<S, C> NoteManager<S, C>
where
    S: NoteStore,
    C: TimeLock + 'static,
{
    pub fn new(store: S, cipher: C) -> Self {
        Self {
            store,
            cipher: Arc::new(cipher),
            view_window_ms: DEFAULT_VIEW_WINDOW.as_millis() as i64,
            write_lock: Mutex::new(()),
        }
    }

    pub fn with_view_window(mut self, window: Duration) -> Self {
        self.view_window_ms = window.as_millis() as i64;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Lock `text` until `unlock_time_ms`.
    ///
    /// The text is trimmed before encryption. Nothing is stored unless
    /// encryption succeeds.
    pub async fn create_note(&self, text: &str, unlock_time_ms: i64, now: i64) -> TlockResult<Note> {
        let text = text.trim();
        if text.is_empty() {
            return Err(TlockError::Validation("note text is empty".into()));
        }
        if unlock_time_ms <= now {
            return Err(TlockError::Validation(
                "unlock time must be in the future".into(),
            ));
        }

        let owned = text.to_string();
        let encrypted = self
            .with_cipher(move |cipher| cipher.encrypt(&owned, unlock_time_ms))
            .await
            .inspect_err(|e| warn!(error = %e, "note encryption failed"))?;
        let note = Note::locked(encrypted, unlock_time_ms);

        let _guard = self.write_lock.lock().await;
        let mut notes = self.store.load()?;
        notes.push(note.clone());
        self.store.save(&notes)?;

        info!(id = %note.id(), unlock_time = unlock_time_ms, "note locked");
        Ok(note)
    }

    /// One re-evaluation pass at `now`: purges expired notes (persisted
    /// immediately) and returns the views, newest first.
    ///
    /// Never fails; store errors are logged and yield what could be computed.
    /// One-shot callers that must report a broken store use `try_evaluate`.
    pub async fn evaluate(&self, now: i64) -> Vec<NoteView> {
        let _guard = self.write_lock.lock().await;

        let notes = match self.store.load() {
            Ok(notes) => notes,
            Err(e) => {
                error!(error = %e, "loading notes for evaluation failed");
                return Vec::new();
            }
        };

        let eval = lifecycle::evaluate(notes, now);
        if eval.purged > 0 {
            if let Err(e) = self.store.save(&eval.notes) {
                error!(error = %e, purged = eval.purged, "persisting purge failed");
            }
        }
        eval.views
    }

    /// Like `evaluate`, but a store that cannot be read or written is an error.
    pub async fn try_evaluate(&self, now: i64) -> TlockResult<Vec<NoteView>> {
        let _guard = self.write_lock.lock().await;

        let eval = lifecycle::evaluate(self.store.load()?, now);
        if eval.purged > 0 {
            self.store.save(&eval.notes)?;
        }
        Ok(eval.views)
    }

    /// Decrypt an unlockable note and open its viewing window at `now`.
    ///
    /// The caller attests the user confirmed. Locked or already revealed
    /// notes are refused without touching the cipher. On decryption failure
    /// the note is left as it was and can be retried.
    pub async fn reveal(&self, id: &NoteId, now: i64) -> TlockResult<Note> {
        let (payload, unlock_time) = {
            let _guard = self.write_lock.lock().await;
            let notes = self.store.load()?;
            let note = find(&notes, id)?;
            match classify(note, now).status() {
                Some(NoteStatus::Unlockable) => {}
                Some(status) => {
                    return Err(TlockError::InvalidState {
                        id: id.clone(),
                        status,
                    })
                }
                None => return Err(TlockError::NotFound(id.clone())),
            }
            (note.encrypted.clone(), note.unlock_time)
        };

        let plaintext = self
            .with_cipher(move |cipher| cipher.decrypt(&payload, unlock_time))
            .await
            .inspect_err(|e| warn!(id = %id, error = %e, "note reveal failed"))?;

        let _guard = self.write_lock.lock().await;
        let mut notes = self.store.load()?;
        let note = notes
            .iter_mut()
            .find(|n| n.id() == *id)
            .ok_or_else(|| TlockError::NotFound(id.clone()))?;

        if note.unlocked {
            // A concurrent reveal got there first
            return Ok(note.clone());
        }

        note.reveal(plaintext, now + self.view_window_ms);
        let updated = note.clone();
        self.store.save(&notes)?;

        info!(id = %id, view_until = ?updated.view_until, "note revealed");
        Ok(updated)
    }

    async fn with_cipher<T, F>(&self, f: F) -> TlockResult<T>
    where
        F: FnOnce(&C) -> TlockResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let cipher = Arc::clone(&self.cipher);
        tokio::task::spawn_blocking(move || f(cipher.as_ref()))
            .await
            .map_err(|e| TlockError::Crypto(format!("crypto task failed: {e}")))?
    }
}

fn find<'a>(notes: &'a [Note], id: &NoteId) -> TlockResult<&'a Note> {
    notes
        .iter()
        .find(|n| n.id() == *id)
        .ok_or_else(|| TlockError::NotFound(id.clone()))
}
