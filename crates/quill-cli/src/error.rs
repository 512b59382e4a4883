use std::io;

use quill_core::auth::AuthError;
use quill_core::outcome::OutcomeError;
use quill_core::ErrorKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] quill_core::Error),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Note title cannot be empty")]
    EmptyTitle,
    #[error("Nothing to change: pass --title or --description, or edit in $EDITOR")]
    EmptyEdit,
    #[error("Note ID cannot be empty")]
    EmptyNoteId,
    #[error("Note not found for id/prefix: {0}")]
    NoteNotFound(String),
    #[error("{0}")]
    AmbiguousNoteId(String),
    #[error("Editor command failed: {0}")]
    EditorFailed(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error(
        "Cloud sync is not configured. Set firebase_project_id and firebase_api_key in the config file or QUILL_FIREBASE_PROJECT_ID and QUILL_FIREBASE_API_KEY."
    )]
    RemoteNotConfigured,
    #[error("Not signed in. Run `quill auth login` first.")]
    NotSignedIn,
}

impl CliError {
    /// Error half of the `--json` envelope
    pub fn to_outcome_error(&self) -> OutcomeError {
        let kind = match self {
            Self::Core(error) => return error.into(),
            Self::Auth(_) | Self::NotSignedIn => ErrorKind::AuthRequired,
            Self::Io(_) => ErrorKind::Storage,
            Self::Serialization(_) => ErrorKind::SerializationFailure,
            Self::NoteNotFound(_) => ErrorKind::NotFound,
            Self::EmptyTitle
            | Self::EmptyEdit
            | Self::EmptyNoteId
            | Self::AmbiguousNoteId(_)
            | Self::EditorFailed(_)
            | Self::Config(_)
            | Self::RemoteNotConfigured => ErrorKind::InvalidInput,
        };
        OutcomeError {
            kind,
            message: self.to_string(),
        }
    }
}
