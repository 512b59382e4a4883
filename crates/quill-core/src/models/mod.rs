//! Data models for Quill

mod note;
mod timestamp;

pub use note::{sort_for_display, LocalNote, Note, NoteEdit, NoteId, SyncStatus};
pub use timestamp::{NativeTimestamp, Timestamp};
