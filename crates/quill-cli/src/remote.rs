//! Remote store selected from configuration.

use quill_core::remote::{Document, DocumentPath, Fields, FirestoreStore, RemoteStore};
use quill_core::{Error, Result};

#[derive(Clone)]
pub enum CliRemote {
    Firestore(FirestoreStore),
    /// No Firebase project configured; the CLI works local-only
    Disabled,
}

impl CliRemote {
    pub fn set_id_token(&self, token: Option<String>) {
        if let Self::Firestore(store) = self {
            store.set_id_token(token);
        }
    }

    pub const fn is_enabled(&self) -> bool {
        matches!(self, Self::Firestore(_))
    }
}

impl RemoteStore for CliRemote {
    async fn set_document(&self, path: &DocumentPath, fields: Fields) -> Result<Document> {
        match self {
            Self::Firestore(store) => store.set_document(path, fields).await,
            Self::Disabled => Err(Error::AuthRequired),
        }
    }

    async fn get_document(&self, path: &DocumentPath) -> Result<Document> {
        match self {
            Self::Firestore(store) => store.get_document(path).await,
            Self::Disabled => Err(Error::AuthRequired),
        }
    }

    async fn list_documents(&self, path: &DocumentPath) -> Result<Vec<Document>> {
        match self {
            Self::Firestore(store) => store.list_documents(path).await,
            Self::Disabled => Err(Error::AuthRequired),
        }
    }

    async fn delete_document(&self, path: &DocumentPath) -> Result<()> {
        match self {
            Self::Firestore(store) => store.delete_document(path).await,
            Self::Disabled => Err(Error::AuthRequired),
        }
    }
}
