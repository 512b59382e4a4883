use std::path::Path;

use quill_core::Identity;
use serde::Serialize;

use crate::commands::common::{open_workspace, print_json};
use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub online: bool,
    pub remote_configured: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signed_in_as: Option<Identity>,
    pub pending_changes: usize,
    pub pending_deletions: usize,
    pub db_path: String,
}

pub async fn run_status(offline: bool, as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let workspace = open_workspace(db_path, offline).await?;
    let local = workspace.engine.local();
    let report = StatusReport {
        online: workspace.session.is_online(),
        remote_configured: workspace.remote.is_enabled(),
        signed_in_as: workspace.session.identity(),
        pending_changes: local.get_all_pending().len(),
        pending_deletions: local.get_pending_deletions().len(),
        db_path: workspace.db_path.display().to_string(),
    };

    if as_json {
        return print_json(report);
    }

    for line in format_status_lines(&report) {
        println!("{line}");
    }
    Ok(())
}

pub fn format_status_lines(report: &StatusReport) -> Vec<String> {
    let network = match (report.remote_configured, report.online) {
        (false, _) => "local only (cloud sync not configured)",
        (true, true) => "online",
        (true, false) => "offline",
    };
    let account = report.signed_in_as.as_ref().map_or_else(
        || "not signed in".to_string(),
        |identity| identity.email.clone().unwrap_or_else(|| identity.uid.clone()),
    );

    vec![
        format!("Network:   {network}"),
        format!("Account:   {account}"),
        format!(
            "Queued:    {} changes, {} deletions",
            report.pending_changes, report.pending_deletions
        ),
        format!("Database:  {}", report.db_path),
    ]
}
