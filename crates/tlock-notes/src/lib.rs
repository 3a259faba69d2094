//! tlock-notes: time-locked note lifecycle
//!
//! ```text
//! lock(text, t) ──► TimeLock::encrypt ──► NoteStore (append)
//! tick (1s)     ──► evaluate(notes, now) ──► purge expired, views ──► Render
//! reveal(id)    ──► TimeLock::decrypt ──► unlocked + view_until = now + 20m
//! ```
//!
//! `NoteManager` is the only writer of the store. `driver` wraps it in a
//! command loop so a UI only sends commands and reads views.

pub mod clock;
pub mod driver;
pub mod format;
pub mod lifecycle;
pub mod manager;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use driver::{run_driver, Command, DriverHandle, Render};
pub use format::{escape_html, escape_terminal, format_remaining};
pub use lifecycle::{classify, evaluate, Classification, Evaluation};
pub use manager::{NoteManager, DEFAULT_VIEW_WINDOW};
pub use store::{JsonFileStore, MemoryStore, NoteStore};
