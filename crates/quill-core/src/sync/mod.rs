//! Routing of note operations and replay of offline edits.
//!
//! Every call takes a [`SessionContext`] and picks a [`Route`]:
//!
//! - signed out: the local store is the only store
//! - signed in and online: the remote store, with a `synced` copy written
//!   through to the local cache
//! - signed in and offline: the local store, with the note marked `pending`
//!   and queued for the next drain
//!
//! Reads by a signed-in user go to the remote store first and fall back to
//! the local cache on any failure.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;

use crate::error::{Error, Result};
use crate::local::LocalStore;
use crate::models::{sort_for_display, LocalNote, Note, NoteEdit, NoteId, Timestamp};
use crate::remote::{DocumentPath, RemoteNotes, RemoteStore};
use crate::session::{Route, Session, SessionContext};

/// A queued change the remote store rejected during a drain
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncFailure {
    pub id: NoteId,
    pub reason: String,
}

/// What one drain of the pending queue did
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DrainReport {
    /// Notes written to the remote store and removed from the queue
    pub synced: Vec<NoteId>,
    /// Notes written to the remote store but edited again mid-drain, so a
    /// newer snapshot stays queued
    pub requeued: Vec<NoteId>,
    /// Entries left queued for the next drain
    pub failed: Vec<SyncFailure>,
    /// Offline deletions applied remotely
    pub deleted: Vec<NoteId>,
}

impl DrainReport {
    pub fn is_empty(&self) -> bool {
        self.synced.is_empty()
            && self.requeued.is_empty()
            && self.failed.is_empty()
            && self.deleted.is_empty()
    }

    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }
}

/// Note operations over a local cache and a remote store
pub struct SyncEngine<R> {
    local: LocalStore,
    remote: RemoteNotes<R>,
    drain_lock: Arc<Mutex<()>>,
}

impl<R: Clone> Clone for SyncEngine<R> {
    fn clone(&self) -> Self {
        Self {
            local: self.local.clone(),
            remote: self.remote.clone(),
            drain_lock: self.drain_lock.clone(),
        }
    }
}

impl<R: RemoteStore> SyncEngine<R> {
    pub fn new(local: LocalStore, remote: R) -> Self {
        Self {
            local,
            remote: RemoteNotes::new(remote),
            drain_lock: Arc::new(Mutex::new(())),
        }
    }

    pub const fn local(&self) -> &LocalStore {
        &self.local
    }

    pub const fn remote(&self) -> &RemoteNotes<R> {
        &self.remote
    }

    /// All visible notes in display order
    pub async fn list_notes(&self, ctx: &SessionContext) -> Result<Vec<LocalNote>> {
        let mut notes = match ctx.route().uid() {
            None => self.local.get_all(),
            Some(uid) => match self.remote.fetch_notes(uid).await {
                Ok(remote_notes) => self.overlay_remote(remote_notes),
                Err(error) => {
                    tracing::warn!("Remote list failed, using local cache: {}", error);
                    self.visible_local_notes()
                }
            },
        };
        sort_for_display(&mut notes);
        Ok(notes)
    }

    pub async fn get_note(&self, ctx: &SessionContext, id: &NoteId) -> Result<LocalNote> {
        let Some(uid) = ctx.route().uid().map(str::to_string) else {
            return self.local_note(id);
        };

        if self.local.get_pending_deletions().contains(id) {
            return Err(Error::NotFound(id.to_string()));
        }
        if let Some(pending) = self.pending_snapshot(id) {
            return Ok(pending);
        }

        match self.remote.fetch_note(&uid, id).await {
            Ok(note) => {
                let cached = LocalNote::synced(note);
                self.local.save(&cached);
                Ok(cached)
            }
            Err(error) => {
                tracing::warn!("Remote read of {} failed, using local cache: {}", id, error);
                self.local_note(id)
            }
        }
    }

    pub async fn create_note(&self, ctx: &SessionContext, note: Note) -> Result<LocalNote> {
        note.validate()?;
        self.write(&ctx.route(), note).await
    }

    /// Merge `edit` into the current version of the note and store the result
    pub async fn update_note(
        &self,
        ctx: &SessionContext,
        id: &NoteId,
        edit: NoteEdit,
    ) -> Result<LocalNote> {
        if edit.is_empty() {
            return Err(Error::InvalidInput("edit changes no fields".to_string()));
        }
        let route = ctx.route();
        let current = match route {
            Route::Offline { .. } => self.offline_note(id)?,
            _ => self.get_note(ctx, id).await?,
        };
        let updated = current.note.apply_edit(&edit, Timestamp::now());
        updated.validate()?;
        self.write(&route, updated).await
    }

    pub async fn delete_note(&self, ctx: &SessionContext, id: &NoteId) -> Result<()> {
        match ctx.route() {
            Route::LocalOnly => {
                self.local.delete(id);
                self.local.remove_pending(id);
            }
            Route::Remote { uid } => {
                self.remote.remove_note(&uid, id).await?;
                self.local.delete(id);
                self.local.remove_pending(id);
                self.local.remove_pending_deletion(id);
            }
            Route::Offline { .. } => {
                self.local.delete(id);
                self.local.remove_pending(id);
                self.local.add_pending_deletion(id);
                tracing::info!("Queued deletion of {} for next sync", id);
            }
        }
        Ok(())
    }

    /// Give each note in `ids` its index as display position.
    ///
    /// Notes are written one at a time; a failure part way through leaves
    /// the earlier writes in place.
    pub async fn reorder_notes(
        &self,
        ctx: &SessionContext,
        ids: &[NoteId],
    ) -> Result<Vec<LocalNote>> {
        let mut seen = HashSet::new();
        if let Some(duplicate) = ids.iter().find(|id| !seen.insert(*id)) {
            return Err(Error::InvalidInput(format!(
                "note {duplicate} appears more than once"
            )));
        }

        let route = ctx.route();
        let current = match route {
            Route::Offline { .. } => self.offline_notes(),
            _ => self.list_notes(ctx).await?,
        };
        let now = Timestamp::now();
        let mut moved = Vec::with_capacity(ids.len());
        for (index, id) in ids.iter().enumerate() {
            let note = current
                .iter()
                .find(|note| note.id() == id)
                .ok_or_else(|| Error::NotFound(id.to_string()))?;
            let order = u32::try_from(index)
                .map_err(|_| Error::InvalidInput("too many notes to reorder".to_string()))?;
            moved.push(note.note.with_order(order, now));
        }

        let mut written = Vec::with_capacity(moved.len());
        for note in moved {
            written.push(self.write(&route, note).await?);
        }
        Ok(written)
    }

    /// Replay queued edits, then queued deletions, against the remote store.
    ///
    /// Does nothing unless the context is signed in and online. Concurrent
    /// drains run one after another, so the second finds an empty queue.
    pub async fn sync_pending_notes(&self, ctx: &SessionContext) -> Result<DrainReport> {
        let Route::Remote { uid } = ctx.route() else {
            tracing::debug!("Skipping sync: not signed in and online");
            return Ok(DrainReport::default());
        };
        DocumentPath::notes_collection(&uid)?;

        let _guard = self.drain_lock.lock().await;
        let pending = self.local.get_all_pending();
        let mut report = DrainReport::default();

        if !pending.is_empty() {
            tracing::info!("Syncing {} pending notes", pending.len());
        }
        for snapshot in pending {
            let id = snapshot.id().clone();
            match self.remote.put_note(&uid, &snapshot.note).await {
                Ok(()) => {
                    if self.local.remove_pending_if_unchanged(&snapshot) {
                        self.mark_synced(&snapshot);
                        report.synced.push(id);
                    } else {
                        tracing::debug!("Note {} changed during sync; keeping it queued", id);
                        report.requeued.push(id);
                    }
                }
                Err(error) => {
                    tracing::warn!("Failed to sync note {}: {}", id, error);
                    report.failed.push(SyncFailure {
                        id,
                        reason: error.to_string(),
                    });
                }
            }
        }

        // Read after the upserts so deletions queued meanwhile are included
        for id in self.local.get_pending_deletions() {
            match self.remote.remove_note(&uid, &id).await {
                Ok(()) => {
                    self.local.remove_pending_deletion(&id);
                    report.deleted.push(id);
                }
                Err(error) => {
                    tracing::warn!("Failed to sync deletion of {}: {}", id, error);
                    report.failed.push(SyncFailure {
                        id,
                        reason: error.to_string(),
                    });
                }
            }
        }

        if !report.is_empty() {
            tracing::info!(
                "Sync finished: {} synced, {} requeued, {} deleted, {} failed",
                report.synced.len(),
                report.requeued.len(),
                report.deleted.len(),
                report.failed.len()
            );
        }
        Ok(report)
    }

    /// Drain once on every offline to online transition of the session.
    ///
    /// Runs until the session's connectivity monitor is dropped.
    pub async fn run_auto_sync(&self, session: &Session) {
        let mut receiver = session.connectivity().subscribe();
        while receiver.changed().await.is_ok() {
            let online = *receiver.borrow_and_update();
            if !online {
                continue;
            }

            let ctx = session.context();
            match self.sync_pending_notes(&ctx).await {
                Ok(report) if report.has_failures() => {
                    tracing::warn!(
                        "Reconnect sync left {} changes queued",
                        report.failed.len()
                    );
                }
                Ok(_) => {}
                Err(error) => tracing::warn!("Reconnect sync failed: {}", error),
            }
        }
    }

    async fn write(&self, route: &Route, note: Note) -> Result<LocalNote> {
        match route {
            Route::LocalOnly => {
                let stored = LocalNote::new(note);
                self.local.save(&stored);
                Ok(stored)
            }
            Route::Remote { uid } => {
                self.remote.put_note(uid, &note).await?;
                let stored = LocalNote::synced(note);
                self.local.save(&stored);
                // a newer write supersedes anything still queued for this id
                self.local.remove_pending(stored.id());
                self.local.remove_pending_deletion(stored.id());
                Ok(stored)
            }
            Route::Offline { .. } => {
                let stored = LocalNote::pending(note);
                self.local.save(&stored);
                self.local.add_pending(&stored);
                self.local.remove_pending_deletion(stored.id());
                tracing::debug!("Queued note {} for next sync", stored.id());
                Ok(stored)
            }
        }
    }

    fn local_note(&self, id: &NoteId) -> Result<LocalNote> {
        self.local
            .get(id)
            .ok_or_else(|| Error::NotFound(id.to_string()))
    }

    fn pending_snapshot(&self, id: &NoteId) -> Option<LocalNote> {
        self.local
            .get_all_pending()
            .into_iter()
            .find(|note| note.id() == id)
    }

    /// Current version of a note from local state alone: the queued
    /// snapshot, then the cache. A queued deletion hides the note.
    fn offline_note(&self, id: &NoteId) -> Result<LocalNote> {
        if self.local.get_pending_deletions().contains(id) {
            return Err(Error::NotFound(id.to_string()));
        }
        self.pending_snapshot(id).map_or_else(|| self.local_note(id), Ok)
    }

    /// Visible notes from local state alone, queued versions winning
    fn offline_notes(&self) -> Vec<LocalNote> {
        let deletions = self.local.get_pending_deletions();
        let mut pending = self.local.get_all_pending();
        let mut notes = self.visible_local_notes();
        for note in &mut notes {
            if let Some(index) = pending.iter().position(|queued| queued.id() == note.id()) {
                *note = pending.swap_remove(index);
            }
        }
        notes.extend(
            pending
                .into_iter()
                .filter(|queued| !deletions.contains(queued.id())),
        );
        notes
    }

    fn visible_local_notes(&self) -> Vec<LocalNote> {
        let deletions = self.local.get_pending_deletions();
        let mut notes = self.local.get_all();
        notes.retain(|note| !deletions.contains(note.id()));
        notes
    }

    /// Cache remote notes locally, letting pending local versions win
    fn overlay_remote(&self, remote_notes: Vec<Note>) -> Vec<LocalNote> {
        let mut pending = self.local.get_all_pending();
        let deletions = self.local.get_pending_deletions();
        let mut visible = Vec::with_capacity(remote_notes.len() + pending.len());

        for note in remote_notes {
            if deletions.contains(&note.id) {
                continue;
            }
            if let Some(index) = pending.iter().position(|queued| queued.id() == &note.id) {
                visible.push(pending.swap_remove(index));
                continue;
            }
            let cached = LocalNote::synced(note);
            self.local.save(&cached);
            visible.push(cached);
        }

        // created offline and not yet synced
        visible.extend(
            pending
                .into_iter()
                .filter(|queued| !deletions.contains(queued.id())),
        );
        visible
    }

    fn mark_synced(&self, snapshot: &LocalNote) {
        let still_current = self
            .local
            .get(snapshot.id())
            .is_some_and(|current| current.note == snapshot.note);
        if still_current {
            self.local.save(&LocalNote::synced(snapshot.note.clone()));
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::connectivity::ConnectivityMonitor;
    use crate::models::SyncStatus;
    use crate::remote::{Document, FieldValue, Fields, MemoryRemoteStore, RemoteCall};
    use crate::session::Identity;
    use pretty_assertions::assert_eq;

    fn engine() -> (SyncEngine<MemoryRemoteStore>, MemoryRemoteStore) {
        let remote = MemoryRemoteStore::new();
        (SyncEngine::new(LocalStore::in_memory(), remote.clone()), remote)
    }

    fn online() -> SessionContext {
        SessionContext::signed_in(Identity::new("u1"), true)
    }

    fn offline() -> SessionContext {
        SessionContext::signed_in(Identity::new("u1"), false)
    }

    fn id(raw: &str) -> NoteId {
        raw.parse().unwrap()
    }

    fn note(raw_id: &str, title: &str) -> Note {
        Note::with_id(id(raw_id), title, "")
    }

    fn remote_title(remote: &MemoryRemoteStore, raw_id: &str) -> Option<String> {
        match remote.document(&format!("users/u1/notes/{raw_id}"))?.get("title") {
            Some(FieldValue::String(title)) => Some(title.clone()),
            _ => None,
        }
    }

    #[tokio::test]
    async fn signed_out_writes_stay_local() {
        let (engine, remote) = engine();
        let ctx = SessionContext::signed_out(true);
        let created = engine
            .create_note(&ctx, Note::with_id(id("n1"), "Groceries", "milk"))
            .await
            .unwrap();

        assert_eq!(created.sync_status, SyncStatus::Unset);
        assert_eq!(engine.local().get(&id("n1")).unwrap().note.title, "Groceries");
        assert!(engine.local().get_all_pending().is_empty());
        assert!(remote.calls().is_empty());

        let listed = engine.list_notes(&ctx).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert!(remote.calls().is_empty());
    }

    #[tokio::test]
    async fn create_rejects_blank_title() {
        let (engine, remote) = engine();
        let result = engine.create_note(&online(), note("n1", "  ")).await;
        assert!(matches!(result, Err(Error::InvalidInput(_))));
        assert!(remote.calls().is_empty());
    }

    #[tokio::test]
    async fn offline_create_reaches_remote_after_drain() {
        let (engine, remote) = engine();
        let created = engine
            .create_note(&offline(), note("n1", "Draft"))
            .await
            .unwrap();

        assert!(created.is_pending());
        assert_eq!(engine.local().get_all_pending(), vec![created.clone()]);
        assert!(remote.writes().is_empty());

        let report = engine.sync_pending_notes(&online()).await.unwrap();
        assert_eq!(report.synced, vec![id("n1")]);
        assert_eq!(remote_title(&remote, "n1").as_deref(), Some("Draft"));
        assert!(engine.local().get_all_pending().is_empty());
        assert_eq!(
            engine.local().get(&id("n1")).unwrap().sync_status,
            SyncStatus::Synced
        );
    }

    #[tokio::test]
    async fn drain_twice_writes_once() {
        let (engine, remote) = engine();
        engine.create_note(&offline(), note("n1", "Draft")).await.unwrap();

        engine.sync_pending_notes(&online()).await.unwrap();
        remote.clear_calls();
        let second = engine.sync_pending_notes(&online()).await.unwrap();

        assert!(second.is_empty());
        assert!(remote.calls().is_empty());
    }

    #[tokio::test]
    async fn drain_is_skipped_unless_signed_in_and_online() {
        let (engine, remote) = engine();
        engine.create_note(&offline(), note("n1", "Draft")).await.unwrap();

        assert!(engine.sync_pending_notes(&offline()).await.unwrap().is_empty());
        assert!(engine
            .sync_pending_notes(&SessionContext::signed_out(true))
            .await
            .unwrap()
            .is_empty());
        assert!(remote.calls().is_empty());
        assert_eq!(engine.local().get_all_pending().len(), 1);
    }

    #[tokio::test]
    async fn queue_keeps_only_the_latest_offline_edit() {
        let (engine, remote) = engine();
        engine.create_note(&offline(), note("n1", "v1")).await.unwrap();
        engine
            .update_note(&offline(), &id("n1"), NoteEdit::default().title("v2"))
            .await
            .unwrap();

        let pending = engine.local().get_all_pending();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].note.title, "v2");

        engine.sync_pending_notes(&online()).await.unwrap();
        assert_eq!(remote.writes().len(), 1);
        assert_eq!(remote_title(&remote, "n1").as_deref(), Some("v2"));
    }

    #[tokio::test]
    async fn failed_sync_stays_queued_until_next_drain() {
        let (engine, remote) = engine();
        engine.create_note(&offline(), note("n1", "Draft")).await.unwrap();
        remote.fail_path("users/u1/notes/n1");

        let report = engine.sync_pending_notes(&online()).await.unwrap();
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].id, id("n1"));
        assert_eq!(engine.local().get_all_pending().len(), 1);
        assert!(engine.local().get(&id("n1")).unwrap().is_pending());

        remote.clear_failures();
        let retry = engine.sync_pending_notes(&online()).await.unwrap();
        assert_eq!(retry.synced, vec![id("n1")]);
        assert!(engine.local().get_all_pending().is_empty());
    }

    /// Remote store that queues a newer offline edit of the note it is
    /// writing, the way a concurrent caller would mid-drain
    struct EditDuringWrite {
        inner: MemoryRemoteStore,
        local: LocalStore,
        edit: LocalNote,
    }

    impl RemoteStore for EditDuringWrite {
        async fn set_document(&self, path: &DocumentPath, fields: Fields) -> Result<Document> {
            let written = self.inner.set_document(path, fields).await?;
            self.local.save(&self.edit);
            self.local.add_pending(&self.edit);
            Ok(written)
        }

        async fn get_document(&self, path: &DocumentPath) -> Result<Document> {
            self.inner.get_document(path).await
        }

        async fn list_documents(&self, path: &DocumentPath) -> Result<Vec<Document>> {
            self.inner.list_documents(path).await
        }

        async fn delete_document(&self, path: &DocumentPath) -> Result<()> {
            self.inner.delete_document(path).await
        }
    }

    #[tokio::test]
    async fn note_edited_mid_drain_is_reported_requeued() {
        let local = LocalStore::in_memory();
        let edit = LocalNote::pending(note("n1", "v2"));
        let engine = SyncEngine::new(
            local.clone(),
            EditDuringWrite {
                inner: MemoryRemoteStore::new(),
                local: local.clone(),
                edit: edit.clone(),
            },
        );
        engine.create_note(&offline(), note("n1", "v1")).await.unwrap();

        let report = engine.sync_pending_notes(&online()).await.unwrap();

        assert_eq!(report.synced, Vec::<NoteId>::new());
        assert_eq!(report.requeued, vec![id("n1")]);
        assert!(!report.is_empty());
        assert_eq!(local.get_all_pending(), vec![edit.clone()]);
        assert_eq!(local.get(&id("n1")), Some(edit));
    }

    #[tokio::test]
    async fn online_write_failure_is_returned_without_local_fallback() {
        let (engine, remote) = engine();
        remote.set_reachable(false);

        let result = engine.create_note(&online(), note("n1", "Lost")).await;
        assert!(matches!(result, Err(Error::Network(_))));
        assert!(engine.local().get_all().is_empty());
        assert!(engine.local().get_all_pending().is_empty());
    }

    #[tokio::test]
    async fn online_write_goes_through_to_local_cache() {
        let (engine, remote) = engine();
        let created = engine.create_note(&online(), note("n1", "Live")).await.unwrap();

        assert_eq!(created.sync_status, SyncStatus::Synced);
        assert_eq!(remote_title(&remote, "n1").as_deref(), Some("Live"));
        assert_eq!(engine.local().get(&id("n1")), Some(created));
    }

    #[tokio::test]
    async fn online_write_supersedes_queued_snapshot() {
        let (engine, remote) = engine();
        engine.create_note(&offline(), note("n1", "old")).await.unwrap();
        engine
            .update_note(&online(), &id("n1"), NoteEdit::default().title("new"))
            .await
            .unwrap();

        assert!(engine.local().get_all_pending().is_empty());
        engine.sync_pending_notes(&online()).await.unwrap();
        assert_eq!(remote_title(&remote, "n1").as_deref(), Some("new"));
    }

    #[tokio::test]
    async fn reads_fall_back_to_local_cache() {
        let (engine, remote) = engine();
        let cached = engine.create_note(&online(), note("n1", "Cached")).await.unwrap();
        remote.set_reachable(false);

        assert_eq!(engine.get_note(&online(), &id("n1")).await.unwrap(), cached);
        assert_eq!(engine.list_notes(&online()).await.unwrap(), vec![cached]);
        assert!(matches!(
            engine.get_note(&online(), &id("missing")).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn remote_list_refreshes_cache_and_keeps_pending_versions() {
        let (engine, remote) = engine();
        let seeded = RemoteNotes::new(remote.clone());
        seeded.put_note("u1", &note("n1", "Remote")).await.unwrap();
        seeded.put_note("u1", &note("n2", "Elsewhere")).await.unwrap();

        engine
            .local()
            .add_pending(&LocalNote::pending(note("n1", "Local edit")));
        engine
            .local()
            .add_pending(&LocalNote::pending(note("n3", "Offline only")));

        let listed = engine.list_notes(&online()).await.unwrap();
        let titles: Vec<&str> = listed.iter().map(|n| n.note.title.as_str()).collect();
        assert_eq!(titles.len(), 3);
        assert!(titles.contains(&"Local edit"));
        assert!(titles.contains(&"Offline only"));
        assert!(titles.contains(&"Elsewhere"));

        let refreshed = engine.local().get(&id("n2")).unwrap();
        assert_eq!(refreshed.sync_status, SyncStatus::Synced);
    }

    #[tokio::test]
    async fn offline_update_merges_into_existing_note() {
        let (engine, _remote) = engine();
        let original = engine
            .create_note(&online(), Note::with_id(id("n2"), "Plan", "steps"))
            .await
            .unwrap();

        let updated = engine
            .update_note(&offline(), &id("n2"), NoteEdit::default().title("Plan v2"))
            .await
            .unwrap();

        assert_eq!(updated.note.title, "Plan v2");
        assert_eq!(updated.note.description, "steps");
        assert_eq!(updated.note.created_at, original.note.created_at);
        assert!(updated.note.updated_at.is_some());
        assert_eq!(engine.local().get(&id("n2")), Some(updated.clone()));
        assert_eq!(engine.local().get_all_pending(), vec![updated]);
    }

    #[tokio::test]
    async fn offline_update_and_reorder_make_no_remote_calls() {
        let (engine, remote) = engine();
        for raw in ["n1", "n2"] {
            engine.create_note(&online(), note(raw, raw)).await.unwrap();
        }
        remote.clear_calls();

        engine
            .update_note(&offline(), &id("n2"), NoteEdit::default().title("n2 v2"))
            .await
            .unwrap();
        engine
            .reorder_notes(&offline(), &[id("n2"), id("n1")])
            .await
            .unwrap();

        assert_eq!(remote.calls(), Vec::new());
        let pending = engine.local().get_all_pending();
        let n2 = pending.iter().find(|queued| queued.id() == &id("n2")).unwrap();
        assert_eq!(n2.note.title, "n2 v2");
        assert_eq!(n2.note.order, Some(0));
        assert_eq!(pending.len(), 2);
    }

    #[tokio::test]
    async fn offline_update_of_note_queued_for_deletion_is_not_found() {
        let (engine, remote) = engine();
        engine.create_note(&online(), note("n1", "Doomed")).await.unwrap();
        engine.delete_note(&offline(), &id("n1")).await.unwrap();
        remote.clear_calls();

        assert!(matches!(
            engine
                .update_note(&offline(), &id("n1"), NoteEdit::default().title("x"))
                .await,
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            engine.reorder_notes(&offline(), &[id("n1")]).await,
            Err(Error::NotFound(_))
        ));
        assert!(remote.calls().is_empty());
    }

    #[tokio::test]
    async fn update_rejects_empty_edit_and_missing_note() {
        let (engine, _remote) = engine();
        let ctx = SessionContext::signed_out(true);
        assert!(matches!(
            engine.update_note(&ctx, &id("n1"), NoteEdit::default()).await,
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            engine
                .update_note(&ctx, &id("n1"), NoteEdit::default().title("x"))
                .await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn reorder_writes_each_note_in_sequence() {
        let (engine, remote) = engine();
        for raw in ["a", "b", "c"] {
            engine.create_note(&online(), note(raw, raw)).await.unwrap();
        }
        remote.clear_calls();

        engine
            .reorder_notes(&online(), &[id("c"), id("a"), id("b")])
            .await
            .unwrap();

        let writes: Vec<(String, Option<FieldValue>)> = remote
            .writes()
            .into_iter()
            .map(|(path, fields)| (path, fields.get("order").cloned()))
            .collect();
        assert_eq!(
            writes,
            vec![
                ("users/u1/notes/c".to_string(), Some(FieldValue::Integer(0))),
                ("users/u1/notes/a".to_string(), Some(FieldValue::Integer(1))),
                ("users/u1/notes/b".to_string(), Some(FieldValue::Integer(2))),
            ]
        );

        let listed: Vec<String> = engine
            .list_notes(&online())
            .await
            .unwrap()
            .iter()
            .map(|n| n.id().to_string())
            .collect();
        assert_eq!(listed, vec!["c", "a", "b"]);
    }

    #[tokio::test]
    async fn reorder_offline_queues_every_note() {
        let (engine, remote) = engine();
        for raw in ["a", "b"] {
            engine.create_note(&online(), note(raw, raw)).await.unwrap();
        }
        remote.set_reachable(false);

        let moved = engine
            .reorder_notes(&offline(), &[id("b"), id("a")])
            .await
            .unwrap();
        assert!(moved.iter().all(LocalNote::is_pending));
        assert_eq!(engine.local().get_all_pending().len(), 2);
        assert_eq!(engine.local().get(&id("b")).unwrap().note.order, Some(0));
    }

    #[tokio::test]
    async fn reorder_rejects_unknown_and_duplicate_ids() {
        let (engine, _remote) = engine();
        let ctx = SessionContext::signed_out(true);
        engine.create_note(&ctx, note("a", "a")).await.unwrap();

        assert!(matches!(
            engine.reorder_notes(&ctx, &[id("a"), id("a")]).await,
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            engine.reorder_notes(&ctx, &[id("a"), id("zz")]).await,
            Err(Error::NotFound(_))
        ));
        assert_eq!(engine.local().get(&id("a")).unwrap().note.order, None);
    }

    #[tokio::test]
    async fn offline_delete_is_replayed_on_drain() {
        let (engine, remote) = engine();
        engine.create_note(&online(), note("n1", "Doomed")).await.unwrap();

        engine.delete_note(&offline(), &id("n1")).await.unwrap();
        assert!(engine.local().get(&id("n1")).is_none());
        assert_eq!(engine.local().get_pending_deletions(), vec![id("n1")]);

        // still stored remotely, but hidden until the deletion is applied
        assert!(engine.list_notes(&online()).await.unwrap().is_empty());
        assert!(matches!(
            engine.get_note(&online(), &id("n1")).await,
            Err(Error::NotFound(_))
        ));

        let report = engine.sync_pending_notes(&online()).await.unwrap();
        assert_eq!(report.deleted, vec![id("n1")]);
        assert!(remote.document("users/u1/notes/n1").is_none());
        assert!(engine.local().get_pending_deletions().is_empty());
    }

    #[tokio::test]
    async fn online_delete_removes_both_copies() {
        let (engine, remote) = engine();
        engine.create_note(&online(), note("n1", "Gone")).await.unwrap();
        engine.delete_note(&online(), &id("n1")).await.unwrap();

        assert!(engine.local().get(&id("n1")).is_none());
        assert!(remote.document("users/u1/notes/n1").is_none());
        assert!(remote
            .calls()
            .contains(&RemoteCall::Delete("users/u1/notes/n1".to_string())));
    }

    #[tokio::test]
    async fn auto_sync_drains_on_reconnect() {
        let (engine, remote) = engine();
        let session = Session::new(ConnectivityMonitor::new(false));
        session.set_identity(Some(Identity::new("u1")));
        engine
            .create_note(&session.context(), note("n1", "Queued"))
            .await
            .unwrap();

        let task = tokio::spawn({
            let engine = engine.clone();
            let session = session.clone();
            async move { engine.run_auto_sync(&session).await }
        });
        tokio::task::yield_now().await;

        session.connectivity().set_online(true);
        tokio::time::timeout(Duration::from_secs(5), async {
            while remote_title(&remote, "n1").is_none() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        assert!(engine.local().get_all_pending().is_empty());
        task.abort();
    }

    #[tokio::test]
    async fn reconnect_drains_once_per_transition() {
        let (engine, remote) = engine();
        let session = Session::new(ConnectivityMonitor::new(false));
        session.set_identity(Some(Identity::new("u1")));
        engine
            .create_note(&session.context(), note("n1", "Queued"))
            .await
            .unwrap();

        // two watchers of the same session share one queue
        let tasks = [engine.clone(), engine.clone()].map(|engine| {
            let session = session.clone();
            tokio::spawn(async move { engine.run_auto_sync(&session).await })
        });
        tokio::task::yield_now().await;

        let writes_to = |raw_id: &str| {
            let path = format!("users/u1/notes/{raw_id}");
            remote
                .writes()
                .into_iter()
                .filter(|(written, _)| *written == path)
                .count()
        };

        assert!(session.connectivity().set_online(true));
        tokio::time::timeout(Duration::from_secs(5), async {
            while remote_title(&remote, "n1").is_none() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(writes_to("n1"), 1);

        // already online: no transition, so nothing drains
        engine
            .local()
            .add_pending(&LocalNote::pending(note("n2", "Later")));
        assert!(!session.connectivity().set_online(true));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(writes_to("n2"), 0);

        session.connectivity().set_online(false);
        session.connectivity().set_online(true);
        tokio::time::timeout(Duration::from_secs(5), async {
            while remote_title(&remote, "n2").is_none() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(writes_to("n1"), 1);
        assert_eq!(writes_to("n2"), 1);

        for task in tasks {
            task.abort();
        }
    }

    #[tokio::test]
    async fn going_offline_does_not_drain() {
        let (engine, remote) = engine();
        let session = Session::new(ConnectivityMonitor::new(true));
        session.set_identity(Some(Identity::new("u1")));
        engine
            .local()
            .add_pending(&LocalNote::pending(note("n1", "Queued")));

        let task = tokio::spawn({
            let engine = engine.clone();
            let session = session.clone();
            async move { engine.run_auto_sync(&session).await }
        });
        tokio::task::yield_now().await;

        session.connectivity().set_online(false);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(remote.calls().is_empty());
        task.abort();
    }
}
