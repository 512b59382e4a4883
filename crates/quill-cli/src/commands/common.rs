use std::env;
use std::io::{self, IsTerminal, Read};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::Utc;
use quill_core::config::ClientConfig;
use quill_core::connectivity::{ConnectivityMonitor, HttpProbe};
use quill_core::local::{LocalStore, SqliteMedium};
use quill_core::remote::{FirestoreStore, RemoteStore};
use quill_core::{LocalNote, NoteId, Outcome, Session, SessionContext, SyncEngine, SyncStatus};
use serde::Serialize;

use crate::auth::{AuthSession, FirebaseAuthService};
use crate::config::load_client_config;
use crate::error::CliError;
use crate::remote::CliRemote;

/// Everything a note command needs, opened once per invocation
pub struct Workspace {
    pub engine: SyncEngine<CliRemote>,
    pub session: Session,
    pub remote: CliRemote,
    pub auth: Option<FirebaseAuthService>,
    pub config: ClientConfig,
    pub db_path: PathBuf,
}

impl Workspace {
    pub fn context(&self) -> SessionContext {
        self.session.context()
    }
}

pub async fn open_workspace(db_path: &Path, offline: bool) -> Result<Workspace, CliError> {
    let config = load_client_config()?;
    let local = LocalStore::new(SqliteMedium::open(db_path)?);
    let auth = FirebaseAuthService::from_config(&config)?;

    let remote = match &auth {
        Some(service) => CliRemote::Firestore(FirestoreStore::new(
            Some(config.firestore_base_url()),
            service.project_id(),
            config.api_key(),
        )?),
        None => CliRemote::Disabled,
    };

    let monitor = if offline || !remote.is_enabled() {
        ConnectivityMonitor::new(false)
    } else {
        probe_connectivity(&config).await
    };
    let stored = restore_identity(auth.as_ref(), monitor.is_online()).await?;
    remote.set_id_token(stored.as_ref().map(|session| session.id_token.clone()));

    let session = Session::new(monitor);
    session.set_identity(stored.map(|session| session.user));

    Ok(Workspace {
        engine: SyncEngine::new(local, remote.clone()),
        session,
        remote,
        auth,
        config,
        db_path: db_path.to_path_buf(),
    })
}

pub async fn probe_connectivity(config: &ClientConfig) -> ConnectivityMonitor {
    match HttpProbe::new(config.reachability_url()) {
        Ok(probe) => ConnectivityMonitor::from_probe(&probe).await,
        Err(error) => {
            tracing::warn!("Invalid reachability URL, assuming offline: {}", error);
            ConnectivityMonitor::new(false)
        }
    }
}

/// Refresh the stored session when online; offline, use it as-is so queued
/// writes still belong to the signed-in user.
async fn restore_identity(
    auth: Option<&FirebaseAuthService>,
    online: bool,
) -> Result<Option<AuthSession>, CliError> {
    let Some(auth) = auth else {
        return Ok(None);
    };
    if online {
        Ok(auth.restore_session().await?)
    } else {
        Ok(auth.stored_session()?)
    }
}

#[derive(Debug, Serialize)]
pub struct NoteListItem {
    pub id: String,
    pub title: String,
    pub description: String,
    pub created_at: String,
    pub updated_at: Option<String>,
    pub order: Option<u32>,
    pub sync_status: SyncStatus,
    pub relative_time: String,
}

pub fn note_to_list_item(note: &LocalNote) -> NoteListItem {
    let now_ms = Utc::now().timestamp_millis();
    NoteListItem {
        id: note.id().to_string(),
        title: note.note.title.clone(),
        description: note.note.description.clone(),
        created_at: note.note.created_at.to_rfc3339(),
        updated_at: note.note.updated_at.map(|updated_at| updated_at.to_rfc3339()),
        order: note.note.order,
        sync_status: note.sync_status,
        relative_time: format_relative_time(last_modified_ms(note), now_ms),
    }
}

pub fn format_note_lines(notes: &[LocalNote]) -> Vec<String> {
    let now_ms = Utc::now().timestamp_millis();
    notes
        .iter()
        .map(|note| {
            let short_id = short_id(note.id());
            let preview = note_preview(&note.note.title, 40);
            let relative_time = format_relative_time(last_modified_ms(note), now_ms);

            if note.is_pending() {
                format!("{short_id:<13}  {preview:<40}  {relative_time:<10}  (pending sync)")
            } else {
                format!("{short_id:<13}  {preview:<40}  {relative_time}")
            }
        })
        .collect()
}

pub fn short_id(id: &NoteId) -> String {
    id.as_str().chars().take(13).collect()
}

fn last_modified_ms(note: &LocalNote) -> i64 {
    note.note.last_modified().as_datetime().timestamp_millis()
}

pub fn note_preview(text: &str, max_chars: usize) -> String {
    let first_line = text.lines().next().unwrap_or("").trim();
    let collapsed = first_line.split_whitespace().collect::<Vec<_>>().join(" ");

    if collapsed.chars().count() <= max_chars {
        collapsed
    } else {
        let take_len = max_chars.saturating_sub(3);
        let mut truncated = collapsed.chars().take(take_len).collect::<String>();
        truncated.push_str("...");
        truncated
    }
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;
    let month = 30 * day;
    let year = 365 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else if diff < month {
        format!("{}w ago", diff / week)
    } else if diff < year {
        format!("{}mo ago", diff / month)
    } else {
        format!("{}y ago", diff / year)
    }
}

/// Print `data` wrapped in a success envelope
pub fn print_json<T: Serialize>(data: T) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(&Outcome::ok(data))?);
    Ok(())
}

/// Find a note by exact id, falling back to a unique id prefix
pub async fn resolve_note<R: RemoteStore>(
    engine: &SyncEngine<R>,
    ctx: &SessionContext,
    note_query: &str,
) -> Result<LocalNote, CliError> {
    let note_query = normalize_note_identifier(note_query)?;
    if let Ok(note_id) = note_query.parse::<NoteId>() {
        match engine.get_note(ctx, &note_id).await {
            Ok(note) => return Ok(note),
            Err(quill_core::Error::NotFound(_)) => {}
            Err(error) => return Err(error.into()),
        }
    }

    let notes = engine.list_notes(ctx).await?;
    let matching = notes
        .iter()
        .filter(|note| note.id().as_str().starts_with(&note_query))
        .collect::<Vec<_>>();

    match matching.as_slice() {
        [] => Err(CliError::NoteNotFound(note_query)),
        [only] => Ok((*only).clone()),
        _ => {
            let options = matching
                .iter()
                .take(3)
                .map(|note| short_id(note.id()))
                .collect::<Vec<_>>()
                .join(", ");

            Err(CliError::AmbiguousNoteId(format!(
                "ID prefix '{note_query}' is ambiguous; matches: {options}"
            )))
        }
    }
}

pub fn normalize_content(content: &str) -> Option<String> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

pub fn normalize_note_identifier(id: &str) -> Result<String, CliError> {
    let trimmed = id.trim();
    if trimmed.is_empty() {
        Err(CliError::EmptyNoteId)
    } else {
        Ok(trimmed.to_string())
    }
}

pub fn read_piped_stdin() -> Result<Option<String>, CliError> {
    let stdin = io::stdin();
    if stdin.is_terminal() {
        return Ok(None);
    }

    let mut buffer = String::new();
    stdin.lock().read_to_string(&mut buffer)?;
    Ok(normalize_content(&buffer))
}

pub fn capture_editor_input_with_initial(
    initial_content: &str,
) -> Result<Option<String>, CliError> {
    let editor = preferred_editor();
    let temp_file = create_temp_note_file_path();
    std::fs::write(&temp_file, initial_content)?;

    let launch_result = launch_editor(&editor, &temp_file);
    let note_content = std::fs::read_to_string(&temp_file)?;
    let _ = std::fs::remove_file(&temp_file);

    launch_result?;
    Ok(normalize_content(&note_content))
}

pub fn launch_editor(editor: &str, file_path: &Path) -> Result<(), CliError> {
    match Command::new(editor).arg(file_path).status() {
        Ok(status) => {
            if status.success() {
                Ok(())
            } else {
                Err(CliError::EditorFailed(format!(
                    "`{editor}` exited with status {status}"
                )))
            }
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            // EDITOR may carry arguments, e.g. "code --wait"
            let mut parts = editor.split_whitespace();
            let Some(program) = parts.next() else {
                return Err(CliError::EditorFailed("empty EDITOR command".into()));
            };

            let status = Command::new(program).args(parts).arg(file_path).status()?;
            if status.success() {
                Ok(())
            } else {
                Err(CliError::EditorFailed(format!(
                    "`{editor}` exited with status {status}"
                )))
            }
        }
        Err(err) => Err(CliError::Io(err)),
    }
}

pub fn preferred_editor() -> String {
    env::var("VISUAL")
        .or_else(|_| env::var("EDITOR"))
        .unwrap_or_else(|_| default_editor().to_string())
}

pub const fn default_editor() -> &'static str {
    if cfg!(windows) {
        "notepad"
    } else {
        "vi"
    }
}

fn create_temp_note_file_path() -> PathBuf {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| duration.as_nanos());
    env::temp_dir().join(format!("quill-note-{}-{now}.md", std::process::id()))
}
