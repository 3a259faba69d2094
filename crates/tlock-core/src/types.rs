use std::fmt;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::{Deserialize, Serialize};

/// AES-GCM output as persisted: nonce plus ciphertext with the tag appended.
///
/// Both fields serialize as plain arrays of 0-255 integers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedPayload {
    pub iv: Vec<u8>,
    pub data: Vec<u8>,
}

/// A time-locked note record, in the persisted layout:
///
/// ```text
/// { "encrypted": { "iv": [..], "data": [..] }, "unlockTime": 1700000000000,
///   "unlocked": true, "plaintext": "..", "viewUntil": 1700001200000 }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub encrypted: SealedPayload,
    /// Epoch milliseconds. Also the only key material.
    pub unlock_time: i64,
    #[serde(default, skip_serializing_if = "is_false")]
    pub unlocked: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plaintext: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view_until: Option<i64>,
}

fn is_false(b: &bool) -> bool {
    !*b
}

impl Note {
    /// A freshly locked note.
    pub fn locked(encrypted: SealedPayload, unlock_time: i64) -> Self {
        Self {
            encrypted,
            unlock_time,
            unlocked: false,
            plaintext: None,
            view_until: None,
        }
    }

    pub fn id(&self) -> NoteId {
        NoteId::from_nonce(&self.encrypted.iv)
    }

    /// `plaintext` and `view_until` are present exactly when `unlocked` is set.
    pub fn is_consistent(&self) -> bool {
        self.unlocked == self.plaintext.is_some() && self.unlocked == self.view_until.is_some()
    }

    /// Mark revealed. Only the first call has any effect.
    pub fn reveal(&mut self, plaintext: String, view_until: i64) {
        if self.unlocked {
            return;
        }
        self.plaintext = Some(plaintext);
        self.view_until = Some(view_until);
        self.unlocked = true;
    }
}

/// Stable note identifier: the note's nonce, URL-safe base64 without padding.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NoteId(String);

impl NoteId {
    pub fn from_nonce(nonce: &[u8]) -> Self {
        Self(URL_SAFE_NO_PAD.encode(nonce))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NoteId {
    fn from(s: &str) -> Self {
        Self(s.trim().to_string())
    }
}

/// Classified state of a live note. Purged notes have no status; they are gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoteStatus {
    /// `now < unlock_time`
    Locked,
    /// Unlock time reached, waiting for an explicit reveal
    Unlockable,
    /// Revealed, inside the viewing window
    Viewing,
}

impl fmt::Display for NoteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NoteStatus::Locked => f.write_str("locked"),
            NoteStatus::Unlockable => f.write_str("unlockable"),
            NoteStatus::Viewing => f.write_str("viewing"),
        }
    }
}

/// What the render layer gets per note after an evaluation pass.
///
/// `plaintext` is untrusted user input; escape it before display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NoteView {
    pub id: NoteId,
    pub status: NoteStatus,
    pub unlock_time: i64,
    /// Milliseconds until unlock (Locked) or until purge (Viewing)
    pub remaining_ms: Option<i64>,
    /// `remaining_ms` formatted, e.g. `"3h 12m"`
    pub remaining: Option<String>,
    pub plaintext: Option<String>,
}
