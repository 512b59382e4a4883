//! quill-core - Core library for Quill
//!
//! This crate contains the note model, the local and remote stores, the
//! connectivity monitor and the sync engine that routes every note operation
//! to the right store and drains offline edits once the network is back.

pub mod auth;
pub mod config;
pub mod connectivity;
pub mod error;
pub mod local;
pub mod models;
pub mod outcome;
pub mod remote;
pub mod session;
pub mod sync;
pub mod util;

pub use error::{Error, ErrorKind, Result};
pub use models::{LocalNote, Note, NoteEdit, NoteId, SyncStatus, Timestamp};
pub use outcome::Outcome;
pub use session::{Identity, Route, Session, SessionContext};
pub use sync::{DrainReport, SyncEngine};
