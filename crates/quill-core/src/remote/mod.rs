//! Remote document store boundary.
//!
//! A [`RemoteStore`] speaks in hierarchical paths and untyped field maps;
//! [`RemoteNotes`] layers the note schema on top, converting timestamps to
//! the store's native form on write and validating documents on read.

mod codec;
mod firestore;
mod memory;

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;

use crate::error::{Error, Result};
use crate::models::{NativeTimestamp, Note, NoteId};

pub use codec::{note_from_document, note_to_fields};
pub use firestore::{FirestoreStore, DEFAULT_FIRESTORE_URL};
pub use memory::{MemoryRemoteStore, RemoteCall};

/// A typed value inside a remote document
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Boolean(bool),
    Integer(i64),
    Double(f64),
    String(String),
    Timestamp(NativeTimestamp),
}

/// Field mapping of a remote document
pub type Fields = BTreeMap<String, FieldValue>;

/// A document read back from the remote store
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// Last path segment
    pub id: String,
    pub fields: Fields,
}

/// Slash-separated address of a document or collection.
///
/// An even number of segments addresses a document, an odd number a
/// collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentPath {
    segments: Vec<String>,
}

impl DocumentPath {
    pub fn parse(raw: &str) -> Result<Self> {
        let segments = raw
            .trim()
            .trim_matches('/')
            .split('/')
            .map(str::to_string)
            .collect::<Vec<_>>();
        if segments.iter().any(|segment| segment.trim().is_empty()) {
            return Err(Error::InvalidInput(format!("invalid document path: '{raw}'")));
        }
        Ok(Self { segments })
    }

    /// `users/{uid}/notes`
    pub fn notes_collection(uid: &str) -> Result<Self> {
        Self::parse(&format!("users/{}/notes", checked_segment(uid)?))
    }

    /// `users/{uid}/notes/{noteId}`
    pub fn note(uid: &str, id: &NoteId) -> Result<Self> {
        Ok(Self::notes_collection(uid)?.child(id.as_str()))
    }

    pub fn is_document(&self) -> bool {
        self.segments.len() % 2 == 0
    }

    pub fn is_collection(&self) -> bool {
        !self.is_document()
    }

    /// The trailing segment when this path addresses a document
    pub fn document_id(&self) -> Option<&str> {
        if self.is_document() {
            self.segments.last().map(String::as_str)
        } else {
            None
        }
    }

    /// The path one level down
    #[must_use]
    pub fn child(&self, segment: &str) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment.to_string());
        Self { segments }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }
}

impl fmt::Display for DocumentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("/"))
    }
}

fn checked_segment(value: &str) -> Result<&str> {
    let value = value.trim();
    if value.is_empty() || value.contains('/') {
        return Err(Error::InvalidInput(format!("invalid path segment: '{value}'")));
    }
    Ok(value)
}

/// Create-or-replace, read, list and delete against a document collection.
///
/// Implementations never panic across this boundary: every failure is
/// returned as an [`Error`], with a missing document reported as
/// [`Error::NotFound`].
pub trait RemoteStore: Send + Sync {
    /// Write `fields` at `path`, replacing any existing document. A
    /// collection path stores the document under a generated id.
    fn set_document(
        &self,
        path: &DocumentPath,
        fields: Fields,
    ) -> impl Future<Output = Result<Document>> + Send;

    fn get_document(&self, path: &DocumentPath) -> impl Future<Output = Result<Document>> + Send;

    fn list_documents(
        &self,
        path: &DocumentPath,
    ) -> impl Future<Output = Result<Vec<Document>>> + Send;

    fn delete_document(&self, path: &DocumentPath) -> impl Future<Output = Result<()>> + Send;
}

/// Note-shaped operations over a [`RemoteStore`], scoped per user
#[derive(Clone)]
pub struct RemoteNotes<R> {
    store: R,
}

impl<R: RemoteStore> RemoteNotes<R> {
    pub const fn new(store: R) -> Self {
        Self { store }
    }

    pub const fn store(&self) -> &R {
        &self.store
    }

    pub async fn put_note(&self, uid: &str, note: &Note) -> Result<()> {
        let path = DocumentPath::note(uid, &note.id)?;
        tracing::debug!("Writing note to {}", path);
        self.store.set_document(&path, note_to_fields(note)).await?;
        Ok(())
    }

    pub async fn fetch_note(&self, uid: &str, id: &NoteId) -> Result<Note> {
        let path = DocumentPath::note(uid, id)?;
        let document = self.store.get_document(&path).await?;
        note_from_document(&document)
    }

    /// Every decodable note in the user's collection; undecodable
    /// documents are skipped with a warning.
    pub async fn fetch_notes(&self, uid: &str) -> Result<Vec<Note>> {
        let path = DocumentPath::notes_collection(uid)?;
        let documents = self.store.list_documents(&path).await?;
        let notes = documents
            .iter()
            .filter_map(|document| match note_from_document(document) {
                Ok(note) => Some(note),
                Err(error) => {
                    tracing::warn!("Skipping remote document {}: {}", document.id, error);
                    None
                }
            })
            .collect();
        Ok(notes)
    }

    pub async fn remove_note(&self, uid: &str, id: &NoteId) -> Result<()> {
        let path = DocumentPath::note(uid, id)?;
        tracing::debug!("Deleting note at {}", path);
        self.store.delete_document(&path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_parity_distinguishes_documents_and_collections() {
        let collection = DocumentPath::parse("users/u1/notes").unwrap();
        assert!(collection.is_collection());
        assert_eq!(collection.document_id(), None);

        let document = DocumentPath::parse("/users/u1/notes/n1/").unwrap();
        assert!(document.is_document());
        assert_eq!(document.document_id(), Some("n1"));
        assert_eq!(document.to_string(), "users/u1/notes/n1");
    }

    #[test]
    fn note_path_is_scoped_to_user() {
        let id: NoteId = "n1".parse().unwrap();
        let path = DocumentPath::note("u1", &id).unwrap();
        assert_eq!(path.to_string(), "users/u1/notes/n1");
    }

    #[test]
    fn rejects_empty_segments() {
        assert!(DocumentPath::parse("users//notes").is_err());
        assert!(DocumentPath::notes_collection("").is_err());
        assert!(DocumentPath::notes_collection("a/b").is_err());
    }

    #[tokio::test]
    async fn list_skips_undecodable_documents() {
        let store = MemoryRemoteStore::new();
        let notes = RemoteNotes::new(store.clone());
        let good = Note::with_id("n1".parse().unwrap(), "Good", "");
        notes.put_note("u1", &good).await.unwrap();

        let mut broken = Fields::new();
        broken.insert("title".to_string(), FieldValue::Integer(7));
        store.insert_raw("users/u1/notes/bad", broken);

        let fetched = notes.fetch_notes("u1").await.unwrap();
        assert_eq!(fetched, vec![good]);
    }

    #[tokio::test]
    async fn fetch_note_reports_not_found() {
        let notes = RemoteNotes::new(MemoryRemoteStore::new());
        let result = notes.fetch_note("u1", &"missing".parse().unwrap()).await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }
}
