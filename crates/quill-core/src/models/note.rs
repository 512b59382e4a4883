//! Note model

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Timestamp;
use crate::error::{Error, Result};

/// A stable, caller-generated note identifier.
///
/// Fresh ids are UUID v7 strings so notes can be created offline without a
/// server round-trip; ids written by other clients are accepted verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NoteId(String);

impl NoteId {
    /// Create a new unique note ID using UUID v7
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    /// Get the string representation of this ID
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for NoteId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for NoteId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidInput("note id cannot be empty".into()));
        }
        if trimmed.contains('/') {
            return Err(Error::InvalidInput(format!(
                "note id cannot contain '/': {trimmed}"
            )));
        }
        Ok(Self(trimmed.to_string()))
    }
}

/// A note as shared by every store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    /// Unique identifier, immutable once assigned
    pub id: NoteId,
    pub title: String,
    pub description: String,
    pub created_at: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<Timestamp>,
    /// Display position written by reorder
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<u32>,
}

impl Note {
    /// Create a new note with a fresh id and creation time
    #[must_use]
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self::with_id(NoteId::new(), title, description)
    }

    /// Create a new note with a caller-supplied id
    #[must_use]
    pub fn with_id(id: NoteId, title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into().trim().to_string(),
            description: description.into().trim().to_string(),
            created_at: Timestamp::now(),
            updated_at: None,
            order: None,
        }
    }

    /// Reject notes that cannot be stored
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(Error::InvalidInput("note title cannot be empty".into()));
        }
        Ok(())
    }

    /// Apply an edit, touching only the fields an edit may overwrite
    #[must_use]
    pub fn apply_edit(&self, edit: &NoteEdit, now: Timestamp) -> Self {
        let mut updated = self.clone();
        if let Some(title) = &edit.title {
            updated.title = title.trim().to_string();
        }
        if let Some(description) = &edit.description {
            updated.description = description.trim().to_string();
        }
        updated.updated_at = Some(now);
        updated
    }

    /// Move the note to a new display position
    #[must_use]
    pub fn with_order(&self, order: u32, now: Timestamp) -> Self {
        let mut moved = self.clone();
        moved.order = Some(order);
        moved.updated_at = Some(now);
        moved
    }

    /// The most recent mutation time
    pub fn last_modified(&self) -> Timestamp {
        self.updated_at.unwrap_or(self.created_at)
    }
}

/// The fields a caller may change on an existing note
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoteEdit {
    pub title: Option<String>,
    pub description: Option<String>,
}

impl NoteEdit {
    #[must_use]
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub const fn is_empty(&self) -> bool {
        self.title.is_none() && self.description.is_none()
    }
}

/// Reconciliation state of a locally held note
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    /// Fully reconciled, or never queued
    #[default]
    Unset,
    /// A local mutation awaits remote application
    Pending,
    /// Last pending snapshot reached the remote store
    Synced,
    /// Written by older clients; treated like `Unset`
    Failed,
}

impl SyncStatus {
    pub const fn is_unset(&self) -> bool {
        matches!(self, Self::Unset)
    }
}

/// A note plus its local sync metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalNote {
    #[serde(flatten)]
    pub note: Note,
    #[serde(default, skip_serializing_if = "SyncStatus::is_unset")]
    pub sync_status: SyncStatus,
}

impl LocalNote {
    pub const fn new(note: Note) -> Self {
        Self {
            note,
            sync_status: SyncStatus::Unset,
        }
    }

    pub const fn pending(note: Note) -> Self {
        Self {
            note,
            sync_status: SyncStatus::Pending,
        }
    }

    pub const fn synced(note: Note) -> Self {
        Self {
            note,
            sync_status: SyncStatus::Synced,
        }
    }

    pub const fn id(&self) -> &NoteId {
        &self.note.id
    }

    pub const fn is_pending(&self) -> bool {
        matches!(self.sync_status, SyncStatus::Pending)
    }
}

/// Sort notes by display position, unpositioned notes last, then by age
pub fn sort_for_display(notes: &mut [LocalNote]) {
    notes.sort_by(|a, b| {
        let by_order = match (a.note.order, b.note.order) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        by_order.then_with(|| a.note.created_at.cmp(&b.note.created_at))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_note_id_unique() {
        let id1 = NoteId::new();
        let id2 = NoteId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_note_id_parse() {
        let id: NoteId = " n1 ".parse().unwrap();
        assert_eq!(id.as_str(), "n1");
        assert!("".parse::<NoteId>().is_err());
        assert!("a/b".parse::<NoteId>().is_err());
    }

    #[test]
    fn test_note_new_trims_fields() {
        let note = Note::new("  Groceries ", " milk, eggs\n");
        assert_eq!(note.title, "Groceries");
        assert_eq!(note.description, "milk, eggs");
        assert!(note.updated_at.is_none());
        assert!(note.validate().is_ok());
    }

    #[test]
    fn test_blank_title_is_invalid() {
        let note = Note::new("   ", "body");
        assert!(matches!(note.validate(), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_apply_edit_only_touches_edited_fields() {
        let mut note = Note::new("Title", "Body");
        note.order = Some(3);
        let now = Timestamp::now();

        let edited = note.apply_edit(&NoteEdit::default().title("New title"), now);
        assert_eq!(edited.title, "New title");
        assert_eq!(edited.description, "Body");
        assert_eq!(edited.id, note.id);
        assert_eq!(edited.created_at, note.created_at);
        assert_eq!(edited.order, Some(3));
        assert_eq!(edited.updated_at, Some(now));
    }

    #[test]
    fn test_local_note_json_shape() {
        let note = Note::with_id("n1".parse().unwrap(), "Groceries", "milk, eggs");
        let json = serde_json::to_value(LocalNote::pending(note.clone())).unwrap();
        assert_eq!(json["id"], "n1");
        assert_eq!(json["syncStatus"], "pending");
        assert!(json.get("createdAt").is_some());
        assert!(json.get("updatedAt").is_none());

        let unset = serde_json::to_value(LocalNote::new(note)).unwrap();
        assert!(unset.get("syncStatus").is_none());
    }

    #[test]
    fn test_local_note_reads_legacy_payload() {
        let raw = r#"{
            "id": "n7",
            "title": "Old",
            "description": "from the web client",
            "createdAt": {"seconds": 1700000000, "nanoseconds": 0},
            "updatedAt": "2024-01-02T03:04:05.000Z",
            "isLocal": true,
            "syncStatus": "failed"
        }"#;
        let local: LocalNote = serde_json::from_str(raw).unwrap();
        assert_eq!(local.id().as_str(), "n7");
        assert_eq!(local.note.created_at.unix_seconds(), 1_700_000_000);
        assert_eq!(local.sync_status, SyncStatus::Failed);
    }

    #[test]
    fn test_sort_for_display() {
        let mut first = LocalNote::new(Note::with_id("a".parse().unwrap(), "A", ""));
        let mut second = LocalNote::new(Note::with_id("b".parse().unwrap(), "B", ""));
        let third = LocalNote::new(Note::with_id("c".parse().unwrap(), "C", ""));
        first.note.order = Some(1);
        second.note.order = Some(0);

        let mut notes = vec![third, first, second];
        sort_for_display(&mut notes);
        let ids: Vec<&str> = notes.iter().map(|n| n.id().as_str()).collect();
        assert_eq!(ids, vec!["b", "a", "c"]);
    }
}
