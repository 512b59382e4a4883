use std::path::Path;

use crate::commands::common::{
    format_note_lines, note_to_list_item, open_workspace, print_json, resolve_note,
    NoteListItem,
};
use crate::error::CliError;

pub async fn run_reorder(
    ids: &[String],
    offline: bool,
    as_json: bool,
    db_path: &Path,
) -> Result<(), CliError> {
    let workspace = open_workspace(db_path, offline).await?;
    let ctx = workspace.context();

    let mut resolved = Vec::with_capacity(ids.len());
    for id in ids {
        let note = resolve_note(&workspace.engine, &ctx, id).await?;
        resolved.push(note.id().clone());
    }

    let reordered = workspace.engine.reorder_notes(&ctx, &resolved).await?;
    if as_json {
        let json_items = reordered
            .iter()
            .map(note_to_list_item)
            .collect::<Vec<NoteListItem>>();
        return print_json(json_items);
    }

    for line in format_note_lines(&reordered) {
        println!("{line}");
    }
    Ok(())
}
