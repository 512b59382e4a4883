use std::path::Path;

use crate::commands::common::{open_workspace, print_json};
use crate::error::CliError;

pub async fn run_sync(offline: bool, as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let workspace = open_workspace(db_path, offline).await?;
    if !workspace.remote.is_enabled() {
        return Err(CliError::RemoteNotConfigured);
    }
    let ctx = workspace.context();
    if ctx.identity.is_none() {
        return Err(CliError::NotSignedIn);
    }

    let report = workspace.engine.sync_pending_notes(&ctx).await?;
    if as_json {
        return print_json(report);
    }

    if !ctx.online {
        let queued = workspace.engine.local().get_all_pending().len()
            + workspace.engine.local().get_pending_deletions().len();
        println!("Offline: {queued} changes stay queued");
        return Ok(());
    }

    if report.is_empty() {
        println!("Nothing to sync");
        return Ok(());
    }

    println!(
        "Synced {} notes, applied {} deletions",
        report.synced.len(),
        report.deleted.len()
    );
    for id in &report.requeued {
        println!("Edited during sync, queued again: {id}");
    }
    for failure in &report.failed {
        eprintln!("Still queued: {} ({})", failure.id, failure.reason);
    }
    Ok(())
}
