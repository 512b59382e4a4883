use std::path::Path;

use crate::commands::common::{
    format_relative_time, note_to_list_item, open_workspace, print_json, resolve_note,
};
use crate::error::CliError;

pub async fn run_show(
    id: &str,
    offline: bool,
    as_json: bool,
    db_path: &Path,
) -> Result<(), CliError> {
    let workspace = open_workspace(db_path, offline).await?;
    let note = resolve_note(&workspace.engine, &workspace.context(), id).await?;

    if as_json {
        return print_json(note_to_list_item(&note));
    }

    let modified_ms = note.note.last_modified().as_datetime().timestamp_millis();
    let now_ms = chrono::Utc::now().timestamp_millis();
    println!("{}", note.note.title);
    println!(
        "{}  {}{}",
        note.id(),
        format_relative_time(modified_ms, now_ms),
        if note.is_pending() { "  (pending sync)" } else { "" }
    );
    if !note.note.description.is_empty() {
        println!();
        println!("{}", note.note.description);
    }
    Ok(())
}
