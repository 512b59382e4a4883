use std::path::Path;
use std::time::Duration;

use quill_core::connectivity::{watch_reachability, HttpProbe};

use crate::commands::common::{open_workspace, Workspace};
use crate::error::CliError;

const TOKEN_CHECK_INTERVAL: Duration = Duration::from_secs(60);

/// Poll connectivity and drain queued changes on every reconnect until Ctrl-C
pub async fn run_watch(offline: bool, db_path: &Path) -> Result<(), CliError> {
    let workspace = open_workspace(db_path, offline).await?;
    if !workspace.remote.is_enabled() {
        return Err(CliError::RemoteNotConfigured);
    }
    if workspace.session.identity().is_none() {
        return Err(CliError::NotSignedIn);
    }

    let probe = HttpProbe::new(workspace.config.reachability_url())?;
    let poller = tokio::spawn(watch_reachability(
        workspace.session.connectivity().clone(),
        probe,
        workspace.config.probe_interval(),
    ));

    let auto_sync = {
        let engine = workspace.engine.clone();
        let session = workspace.session.clone();
        tokio::spawn(async move { engine.run_auto_sync(&session).await })
    };

    println!(
        "Watching for connectivity changes every {}s (Ctrl-C to stop)",
        workspace.config.probe_interval().as_secs()
    );

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    let mut token_check = tokio::time::interval(TOKEN_CHECK_INTERVAL);

    let result = loop {
        tokio::select! {
            signal = &mut shutdown => break signal.map_err(CliError::from),
            _ = token_check.tick() => refresh_and_retry(&workspace).await,
        }
    };

    poller.abort();
    auto_sync.abort();
    result
}

/// Keep the id token fresh and retry whatever the last drain left queued
async fn refresh_and_retry(workspace: &Workspace) {
    if !workspace.session.is_online() {
        return;
    }

    if let Some(auth) = &workspace.auth {
        match auth.restore_session().await {
            Ok(Some(session)) => {
                workspace.remote.set_id_token(Some(session.id_token));
                workspace.session.set_identity(Some(session.user));
            }
            Ok(None) => {
                tracing::warn!("Stored session disappeared; stopping sync");
                workspace.remote.set_id_token(None);
                workspace.session.set_identity(None);
            }
            Err(error) => tracing::warn!("Failed to refresh session: {}", error),
        }
    }

    let local = workspace.engine.local();
    if local.get_all_pending().is_empty() && local.get_pending_deletions().is_empty() {
        return;
    }
    if let Err(error) = workspace
        .engine
        .sync_pending_notes(&workspace.context())
        .await
    {
        tracing::warn!("Retrying queued changes failed: {}", error);
    }
}
