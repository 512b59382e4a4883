use std::path::Path;

use serde_json::json;

use crate::commands::common::{open_workspace, print_json, resolve_note};
use crate::error::CliError;

pub async fn run_delete(
    id: &str,
    offline: bool,
    as_json: bool,
    db_path: &Path,
) -> Result<(), CliError> {
    let workspace = open_workspace(db_path, offline).await?;
    let ctx = workspace.context();
    let note = resolve_note(&workspace.engine, &ctx, id).await?;

    workspace.engine.delete_note(&ctx, note.id()).await?;

    if as_json {
        print_json(json!({ "id": note.id().to_string() }))
    } else {
        println!("{}", note.id());
        Ok(())
    }
}
