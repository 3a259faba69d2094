//! Note state machine.
//!
//! ```text
//! Locked --(now >= unlock_time)--> Unlockable --(reveal ok)--> Viewing --(now > view_until)--> purged
//! Unlockable --(reveal fails)--> Unlockable
//! ```
//!
//! State is never stored; it is recomputed from the persisted fields and the
//! current time on every pass. Only revealed notes can be purged, so a note
//! with a reveal in flight is never removed underneath it.

use tlock_core::{Note, NoteStatus, NoteView};

use crate::format::format_remaining;

/// Outcome of classifying a single note at `now`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Purge,
    Locked { remaining_ms: i64 },
    Unlockable,
    Viewing { remaining_ms: i64 },
}

impl Classification {
    pub fn status(&self) -> Option<NoteStatus> {
        match self {
            Classification::Purge => None,
            Classification::Locked { .. } => Some(NoteStatus::Locked),
            Classification::Unlockable => Some(NoteStatus::Unlockable),
            Classification::Viewing { .. } => Some(NoteStatus::Viewing),
        }
    }
}

/// Classify `note` at `now` (epoch ms). Branch order matters: an expired
/// revealed note is purged before anything else is looked at.
pub fn classify(note: &Note, now: i64) -> Classification {
    if note.unlocked {
        if let Some(view_until) = note.view_until {
            if now > view_until {
                return Classification::Purge;
            }
        }
    }

    if now < note.unlock_time {
        Classification::Locked {
            remaining_ms: note.unlock_time - now,
        }
    } else if !note.unlocked {
        Classification::Unlockable
    } else {
        Classification::Viewing {
            remaining_ms: note.view_until.unwrap_or(now) - now,
        }
    }
}

/// Result of one evaluation pass.
#[derive(Debug, Clone, Default)]
pub struct Evaluation {
    /// Surviving notes, still in insertion order
    pub notes: Vec<Note>,
    /// One view per surviving note, newest first
    pub views: Vec<NoteView>,
    /// Number of notes removed by this pass
    pub purged: usize,
}

/// Re-classify every note at `now`, dropping expired ones.
pub fn evaluate(notes: Vec<Note>, now: i64) -> Evaluation {
    let mut survivors = Vec::with_capacity(notes.len());
    let mut views = Vec::with_capacity(notes.len());
    let mut purged = 0;

    for note in notes.into_iter().rev() {
        let class = classify(&note, now);
        let Some(status) = class.status() else {
            tracing::info!(id = %note.id(), "viewing window over, note purged");
            purged += 1;
            continue;
        };

        let remaining_ms = match class {
            Classification::Locked { remaining_ms } | Classification::Viewing { remaining_ms } => {
                Some(remaining_ms)
            }
            _ => None,
        };

        views.push(NoteView {
            id: note.id(),
            status,
            unlock_time: note.unlock_time,
            remaining_ms,
            remaining: remaining_ms.map(format_remaining),
            plaintext: match status {
                NoteStatus::Viewing => note.plaintext.clone(),
                _ => None,
            },
        });
        survivors.push(note);
    }

    survivors.reverse();
    Evaluation {
        notes: survivors,
        views,
        purged,
    }
}
