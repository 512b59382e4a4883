use std::path::Path;

use crate::commands::common::{
    format_note_lines, note_to_list_item, open_workspace, print_json, NoteListItem,
};
use crate::error::CliError;

pub async fn run_list(offline: bool, as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let workspace = open_workspace(db_path, offline).await?;
    let notes = workspace.engine.list_notes(&workspace.context()).await?;

    if as_json {
        let json_items = notes
            .iter()
            .map(note_to_list_item)
            .collect::<Vec<NoteListItem>>();
        return print_json(json_items);
    }

    if notes.is_empty() {
        println!("No notes yet.");
        return Ok(());
    }

    for line in format_note_lines(&notes) {
        println!("{line}");
    }
    Ok(())
}
