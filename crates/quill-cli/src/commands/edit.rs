use std::path::Path;

use quill_core::NoteEdit;

use crate::commands::common::{
    capture_editor_input_with_initial, note_to_list_item, open_workspace, print_json,
    resolve_note,
};
use crate::error::CliError;

pub async fn run_edit(
    id: &str,
    title: Option<&str>,
    description: Option<&str>,
    offline: bool,
    as_json: bool,
    db_path: &Path,
) -> Result<(), CliError> {
    let workspace = open_workspace(db_path, offline).await?;
    let ctx = workspace.context();
    let note = resolve_note(&workspace.engine, &ctx, id).await?;

    let mut edit = NoteEdit::default();
    if let Some(title) = title {
        edit = edit.title(title);
    }
    if let Some(description) = description {
        edit = edit.description(description);
    }

    if title.is_none() && description.is_none() {
        let edited = capture_editor_input_with_initial(&note.note.description)?
            .unwrap_or_default();
        if edited == note.note.description {
            println!("{}", note.id());
            return Ok(());
        }
        edit = edit.description(edited);
    }

    if edit.is_empty() {
        return Err(CliError::EmptyEdit);
    }

    let updated = workspace.engine.update_note(&ctx, note.id(), edit).await?;
    if as_json {
        print_json(note_to_list_item(&updated))
    } else {
        println!("{}", updated.id());
        Ok(())
    }
}
