//! In-process remote store with a call log and failure injection

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use uuid::Uuid;

use super::{Document, DocumentPath, Fields, RemoteStore};
use crate::error::{Error, Result};

/// One call observed by [`MemoryRemoteStore`]
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteCall {
    Set { path: String, fields: Fields },
    Get(String),
    List(String),
    Delete(String),
}

#[derive(Debug, Default)]
struct MemoryState {
    documents: BTreeMap<String, Fields>,
    unreachable: bool,
    failing_paths: HashSet<String>,
    calls: Vec<RemoteCall>,
}

/// A document tree held in memory. Clones share the same tree.
#[derive(Debug, Clone, Default)]
pub struct MemoryRemoteStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryRemoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make every call fail with a network error while `false`
    pub fn set_reachable(&self, reachable: bool) {
        self.state().unreachable = !reachable;
    }

    /// Make calls touching `path` fail with a network error
    pub fn fail_path(&self, path: impl Into<String>) {
        self.state().failing_paths.insert(path.into());
    }

    pub fn clear_failures(&self) {
        let mut state = self.state();
        state.unreachable = false;
        state.failing_paths.clear();
    }

    pub fn calls(&self) -> Vec<RemoteCall> {
        self.state().calls.clone()
    }

    /// Paths and payloads of every `set_document` call, in order
    pub fn writes(&self) -> Vec<(String, Fields)> {
        self.state()
            .calls
            .iter()
            .filter_map(|call| match call {
                RemoteCall::Set { path, fields } => Some((path.clone(), fields.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    pub fn document(&self, path: &str) -> Option<Fields> {
        self.state().documents.get(path).cloned()
    }

    /// Store a document without recording a call
    pub fn insert_raw(&self, path: &str, fields: Fields) {
        self.state().documents.insert(path.to_string(), fields);
    }

    fn check(state: &MemoryState, path: &str) -> Result<()> {
        if state.unreachable || state.failing_paths.contains(path) {
            return Err(Error::Network(format!("remote store unreachable: {path}")));
        }
        Ok(())
    }
}

impl RemoteStore for MemoryRemoteStore {
    async fn set_document(&self, path: &DocumentPath, fields: Fields) -> Result<Document> {
        let mut state = self.state();
        state.calls.push(RemoteCall::Set {
            path: path.to_string(),
            fields: fields.clone(),
        });
        Self::check(&state, &path.to_string())?;

        let path = if path.is_collection() {
            path.child(&Uuid::now_v7().to_string())
        } else {
            path.clone()
        };
        state.documents.insert(path.to_string(), fields.clone());
        Ok(Document {
            id: path.document_id().unwrap_or_default().to_string(),
            fields,
        })
    }

    async fn get_document(&self, path: &DocumentPath) -> Result<Document> {
        let mut state = self.state();
        let key = path.to_string();
        state.calls.push(RemoteCall::Get(key.clone()));
        Self::check(&state, &key)?;

        let id = path
            .document_id()
            .ok_or_else(|| Error::InvalidInput(format!("not a document path: {key}")))?;
        state
            .documents
            .get(&key)
            .map(|fields| Document {
                id: id.to_string(),
                fields: fields.clone(),
            })
            .ok_or(Error::NotFound(key))
    }

    async fn list_documents(&self, path: &DocumentPath) -> Result<Vec<Document>> {
        let mut state = self.state();
        let key = path.to_string();
        state.calls.push(RemoteCall::List(key.clone()));
        Self::check(&state, &key)?;

        let prefix = format!("{key}/");
        let documents = state
            .documents
            .iter()
            .filter_map(|(doc_path, fields)| {
                let id = doc_path.strip_prefix(&prefix)?;
                (!id.contains('/')).then(|| Document {
                    id: id.to_string(),
                    fields: fields.clone(),
                })
            })
            .collect();
        Ok(documents)
    }

    async fn delete_document(&self, path: &DocumentPath) -> Result<()> {
        let mut state = self.state();
        let key = path.to_string();
        state.calls.push(RemoteCall::Delete(key.clone()));
        Self::check(&state, &key)?;

        state.documents.remove(&key);
        Ok(())
    }
}
