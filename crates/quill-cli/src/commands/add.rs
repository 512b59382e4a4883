use std::path::Path;

use quill_core::Note;

use crate::commands::common::{
    normalize_content, note_to_list_item, open_workspace, print_json, read_piped_stdin,
};
use crate::error::CliError;

pub async fn run_add(
    title_parts: &[String],
    description: Option<&str>,
    offline: bool,
    as_json: bool,
    db_path: &Path,
) -> Result<(), CliError> {
    let title = normalize_content(&title_parts.join(" ")).ok_or(CliError::EmptyTitle)?;
    let description = match description {
        Some(description) => description.trim().to_string(),
        None => read_piped_stdin()?.unwrap_or_default(),
    };

    let workspace = open_workspace(db_path, offline).await?;
    let note = workspace
        .engine
        .create_note(&workspace.context(), Note::new(title, description))
        .await?;

    if as_json {
        print_json(note_to_list_item(&note))
    } else {
        if note.is_pending() {
            eprintln!("Offline: queued for the next sync");
        }
        println!("{}", note.id());
        Ok(())
    }
}
