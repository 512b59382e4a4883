//! On-device persistence of notes and of the pending-sync queue.
//!
//! Every operation is synchronous and total: a missing medium, a medium
//! error or a malformed payload degrades to an empty collection (and a log
//! line) rather than an error. The `try_*` readers surface the underlying
//! failure for diagnostics.
//!
//! Reads skip entries that no longer decode, and writes carry them through
//! unchanged, so one bad record never costs the rest of the slot. A slot
//! that is not a JSON array at all is copied aside before it is replaced.

mod medium;
mod migrations;
mod sqlite;

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::models::{LocalNote, NoteId};

pub use medium::{KeyValueMedium, MemoryMedium};
pub use sqlite::SqliteMedium;

/// Slot holding every note known on this device
pub const LOCAL_NOTES_KEY: &str = "local_notes";
/// Slot holding the latest unsynced snapshot per note
pub const PENDING_SYNC_KEY: &str = "pending_sync_notes";
/// Slot holding ids deleted while offline
pub const PENDING_DELETE_KEY: &str = "pending_delete_notes";
/// Suffix of the slot an unparseable payload is copied to before replacement
pub const UNREADABLE_SUFFIX: &str = ".unreadable";

/// Local note collection plus pending-sync queue over a key-value medium
#[derive(Clone, Default)]
pub struct LocalStore {
    medium: Option<Arc<dyn KeyValueMedium>>,
}

impl LocalStore {
    pub fn new(medium: impl KeyValueMedium + 'static) -> Self {
        Self {
            medium: Some(Arc::new(medium)),
        }
    }

    /// Share a medium with other handles
    pub fn from_shared(medium: Arc<dyn KeyValueMedium>) -> Self {
        Self {
            medium: Some(medium),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(MemoryMedium::new())
    }

    /// A store with no backing medium: reads are empty, writes are dropped
    pub const fn detached() -> Self {
        Self { medium: None }
    }

    pub const fn is_available(&self) -> bool {
        self.medium.is_some()
    }

    pub fn get_all(&self) -> Vec<LocalNote> {
        self.read_slot(LOCAL_NOTES_KEY)
    }

    pub fn try_get_all(&self) -> Result<Vec<LocalNote>> {
        self.try_read_slot(LOCAL_NOTES_KEY)
    }

    pub fn get(&self, id: &NoteId) -> Option<LocalNote> {
        self.get_all().into_iter().find(|note| note.id() == id)
    }

    /// Insert or replace by id
    pub fn save(&self, note: &LocalNote) {
        self.modify_slot(LOCAL_NOTES_KEY, |notes| {
            upsert(notes, note);
            true
        });
    }

    pub fn delete(&self, id: &NoteId) {
        self.modify_slot::<LocalNote>(LOCAL_NOTES_KEY, |notes| {
            notes.retain(|entry| !entry.has_id(id));
            true
        });
    }

    pub fn get_all_pending(&self) -> Vec<LocalNote> {
        self.read_slot(PENDING_SYNC_KEY)
    }

    pub fn try_get_all_pending(&self) -> Result<Vec<LocalNote>> {
        self.try_read_slot(PENDING_SYNC_KEY)
    }

    /// Queue a snapshot; an existing entry for the same id is replaced in place
    pub fn add_pending(&self, note: &LocalNote) {
        self.modify_slot(PENDING_SYNC_KEY, |pending| {
            upsert(pending, note);
            true
        });
    }

    pub fn remove_pending(&self, id: &NoteId) {
        self.modify_slot::<LocalNote>(PENDING_SYNC_KEY, |pending| {
            pending.retain(|entry| !entry.has_id(id));
            true
        });
    }

    /// Remove a queue entry only if it still equals `snapshot`.
    ///
    /// Returns `false` when the entry was replaced after the snapshot was
    /// taken, in which case the newer entry stays queued.
    pub fn remove_pending_if_unchanged(&self, snapshot: &LocalNote) -> bool {
        let mut unchanged = true;
        self.modify_slot::<LocalNote>(PENDING_SYNC_KEY, |pending| {
            let Some(index) = pending.iter().position(|entry| entry.has_id(snapshot.id())) else {
                return false;
            };
            if !matches!(&pending[index], Entry::Decoded(current) if current == snapshot) {
                unchanged = false;
                return false;
            }
            pending.remove(index);
            true
        });
        unchanged
    }

    pub fn clear_pending(&self) {
        if let Some(medium) = &self.medium {
            if let Err(error) = medium.remove_item(PENDING_SYNC_KEY) {
                tracing::warn!("Failed to clear pending sync queue: {}", error);
            }
        }
    }

    pub fn get_pending_deletions(&self) -> Vec<NoteId> {
        self.read_slot(PENDING_DELETE_KEY)
    }

    pub fn add_pending_deletion(&self, id: &NoteId) {
        self.modify_slot::<NoteId>(PENDING_DELETE_KEY, |deletions| {
            if deletions.iter().any(|entry| entry.has_id(id)) {
                return false;
            }
            deletions.push(Entry::Decoded(id.clone()));
            true
        });
    }

    pub fn remove_pending_deletion(&self, id: &NoteId) {
        self.modify_slot::<NoteId>(PENDING_DELETE_KEY, |deletions| {
            deletions.retain(|entry| !entry.has_id(id));
            true
        });
    }

    /// Strict read: any undecodable entry fails the whole slot
    fn try_read_slot<T: DeserializeOwned>(&self, key: &str) -> Result<Vec<T>> {
        let Some(medium) = &self.medium else {
            return Ok(Vec::new());
        };
        match medium.get_item(key)? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(Vec::new()),
        }
    }

    /// Every decodable entry; the rest are logged and skipped
    fn read_slot<T: SlotItem>(&self, key: &str) -> Vec<T> {
        match self.load_entries::<T>(key) {
            Ok(entries) => entries
                .into_iter()
                .filter_map(|entry| match entry {
                    Entry::Decoded(item) => Some(item),
                    Entry::Undecodable(_) => None,
                })
                .collect(),
            Err(error) => {
                tracing::warn!("Ignoring unreadable local slot '{}': {}", key, error);
                Vec::new()
            }
        }
    }

    fn load_entries<T: SlotItem>(&self, key: &str) -> Result<Vec<Entry<T>>> {
        let Some(medium) = &self.medium else {
            return Ok(Vec::new());
        };
        let Some(raw) = medium.get_item(key)? else {
            return Ok(Vec::new());
        };
        let values: Vec<Value> = serde_json::from_str(&raw)?;
        Ok(values
            .into_iter()
            .map(|value| match T::deserialize(&value) {
                Ok(item) => Entry::Decoded(item),
                Err(error) => {
                    tracing::warn!(
                        "Skipping undecodable entry in local slot '{}': {}",
                        key,
                        error
                    );
                    Entry::Undecodable(value)
                }
            })
            .collect())
    }

    /// Read-modify-write of one slot. Undecodable entries are written back
    /// as they were read. `change` returns whether anything changed.
    fn modify_slot<T: SlotItem>(
        &self,
        key: &str,
        change: impl FnOnce(&mut Vec<Entry<T>>) -> bool,
    ) {
        let Some(medium) = &self.medium else {
            return;
        };
        let mut entries = match self.load_entries::<T>(key) {
            Ok(entries) => entries,
            Err(Error::Serialization(reason)) => {
                if !self.set_aside(key) {
                    return;
                }
                tracing::warn!("Replacing unreadable local slot '{}': {}", key, reason);
                Vec::new()
            }
            Err(error) => {
                tracing::warn!("Not writing local slot '{}', read failed: {}", key, error);
                return;
            }
        };
        if !change(&mut entries) {
            return;
        }

        let result = serde_json::to_string(&entries)
            .map_err(Into::into)
            .and_then(|raw| medium.set_item(key, &raw));
        if let Err(error) = result {
            tracing::warn!("Failed to write local slot '{}': {}", key, error);
        }
    }

    /// Copy an unparseable slot to `<key>.unreadable` before it is replaced
    fn set_aside(&self, key: &str) -> bool {
        let Some(medium) = &self.medium else {
            return false;
        };
        let backup = format!("{key}{UNREADABLE_SUFFIX}");
        let result = medium
            .get_item(key)
            .and_then(|raw| raw.map_or(Ok(()), |raw| medium.set_item(&backup, &raw)));
        match result {
            Ok(()) => true,
            Err(error) => {
                tracing::warn!("Failed to set aside local slot '{}': {}", key, error);
                false
            }
        }
    }
}

/// A stored item, or the raw JSON of one that no longer decodes
#[derive(Serialize)]
#[serde(untagged)]
enum Entry<T> {
    Decoded(T),
    Undecodable(Value),
}

impl<T: SlotItem> Entry<T> {
    fn has_id(&self, id: &NoteId) -> bool {
        match self {
            Self::Decoded(item) => item.note_id() == id,
            Self::Undecodable(value) => T::raw_id(value) == Some(id.as_str()),
        }
    }
}

/// Slot contents addressed by note id
trait SlotItem: Serialize + DeserializeOwned {
    fn note_id(&self) -> &NoteId;

    /// The id inside an entry that failed to decode, when still readable
    fn raw_id(value: &Value) -> Option<&str>;
}

impl SlotItem for LocalNote {
    fn note_id(&self) -> &NoteId {
        self.id()
    }

    fn raw_id(value: &Value) -> Option<&str> {
        value.get("id").and_then(Value::as_str)
    }
}

impl SlotItem for NoteId {
    fn note_id(&self) -> &NoteId {
        self
    }

    fn raw_id(value: &Value) -> Option<&str> {
        value.as_str()
    }
}

/// Replace the entry with the same id, including an undecodable one
fn upsert(entries: &mut Vec<Entry<LocalNote>>, note: &LocalNote) {
    let replacement = Entry::Decoded(note.clone());
    if let Some(existing) = entries.iter_mut().find(|entry| entry.has_id(note.id())) {
        *existing = replacement;
    } else {
        entries.push(replacement);
    }
}
