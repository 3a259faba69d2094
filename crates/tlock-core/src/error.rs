use thiserror::Error;

use crate::types::{NoteId, NoteStatus};

pub type TlockResult<T> = Result<T, TlockError>;

#[derive(Debug, Error)]
pub enum TlockError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("crypto error: {0}")]
    Crypto(String),

    /// Wrong unlock time, tampered ciphertext and malformed stored data all
    /// look the same from here.
    #[error("decryption failed: wrong unlock time or corrupted note")]
    Decryption,

    #[error("note not found: {0}")]
    NotFound(NoteId),

    #[error("note {id} cannot be revealed while {status}")]
    InvalidState { id: NoteId, status: NoteStatus },

    #[error("store error: {0}")]
    Store(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl TlockError {
    /// Errors the user can fix by retrying or changing input; nothing was consumed.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            TlockError::Validation(_) | TlockError::Decryption | TlockError::Crypto(_)
        )
    }
}
