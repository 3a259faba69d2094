pub mod config;
pub mod error;
pub mod types;

pub use error::{TlockError, TlockResult};
pub use types::{Note, NoteId, NoteStatus, NoteView, SealedPayload};
