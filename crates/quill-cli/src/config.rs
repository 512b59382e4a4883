//! CLI configuration file plus `QUILL_*` environment overrides.

use std::env;
use std::path::{Path, PathBuf};

use quill_core::config::ClientConfig;
use quill_core::util::non_blank;

use crate::error::CliError;

const CONFIG_FILE_NAME: &str = "config.json";

pub const ENV_PROJECT_ID: &str = "QUILL_FIREBASE_PROJECT_ID";
pub const ENV_API_KEY: &str = "QUILL_FIREBASE_API_KEY";
pub const ENV_FIRESTORE_URL: &str = "QUILL_FIRESTORE_URL";
pub const ENV_AUTH_URL: &str = "QUILL_AUTH_URL";
pub const ENV_REACHABILITY_URL: &str = "QUILL_REACHABILITY_URL";
pub const ENV_PROBE_INTERVAL: &str = "QUILL_PROBE_INTERVAL_SECS";
pub const ENV_DB_PATH: &str = "QUILL_DB_PATH";

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("quill").join(CONFIG_FILE_NAME))
}

/// File config (if any) overlaid with environment overrides
pub fn load_client_config() -> Result<ClientConfig, CliError> {
    let from_file = match default_config_path() {
        Some(path) => load_from_path(&path)?,
        None => ClientConfig::default(),
    };
    let merged = from_file.merged_with(env_overrides(|name| env::var(name).ok())?);
    merged
        .validate()
        .map_err(|error| CliError::Config(error.to_string()))?;
    Ok(merged)
}

pub fn load_from_path(path: &Path) -> Result<ClientConfig, CliError> {
    if !path.exists() {
        return Ok(ClientConfig::default());
    }

    let raw = std::fs::read_to_string(path).map_err(|error| {
        CliError::Config(format!(
            "Failed to read config at {}: {}",
            path.display(),
            error
        ))
    })?;
    ClientConfig::from_json(&raw).map_err(|error| {
        CliError::Config(format!(
            "Failed to parse config at {}: {}",
            path.display(),
            error
        ))
    })
}

/// Collect overrides through `lookup` so tests need not touch the process env
pub fn env_overrides(
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<ClientConfig, CliError> {
    let read = |name: &str| non_blank(lookup(name));
    let probe_interval_secs = read(ENV_PROBE_INTERVAL)
        .map(|raw| {
            raw.parse::<u64>().map_err(|_| {
                CliError::Config(format!(
                    "{ENV_PROBE_INTERVAL} must be a whole number of seconds"
                ))
            })
        })
        .transpose()?;

    Ok(ClientConfig {
        firebase_project_id: read(ENV_PROJECT_ID),
        firebase_api_key: read(ENV_API_KEY),
        firestore_base_url: read(ENV_FIRESTORE_URL),
        auth_base_url: read(ENV_AUTH_URL),
        reachability_url: read(ENV_REACHABILITY_URL),
        probe_interval_secs,
    })
}

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> PathBuf {
    cli_db_path
        .or_else(|| env::var_os(ENV_DB_PATH).map(PathBuf::from))
        .unwrap_or_else(default_db_path)
}

pub fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("quill")
        .join("quill.db")
}
