//! Client configuration shared by every Quill front end.
//!
//! Holds the public Firebase project settings needed to reach the document
//! store and the identity service, plus connectivity probing knobs. Secret
//! credentials never belong here.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::remote::DEFAULT_FIRESTORE_URL;
use crate::util::{non_blank, parse_endpoint};

const DEFAULT_PROBE_INTERVAL_SECS: u64 = 15;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    #[serde(default)]
    pub firebase_project_id: Option<String>,
    #[serde(default)]
    pub firebase_api_key: Option<String>,
    /// Overrides the Firestore endpoint, e.g. for the local emulator
    #[serde(default)]
    pub firestore_base_url: Option<String>,
    /// Overrides the Identity Toolkit and Secure Token endpoints
    #[serde(default)]
    pub auth_base_url: Option<String>,
    #[serde(default)]
    pub reachability_url: Option<String>,
    #[serde(default)]
    pub probe_interval_secs: Option<u64>,
}

impl ClientConfig {
    pub fn from_json(payload: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(payload)?;
        config.validate()?;
        Ok(config)
    }

    /// Field-wise overlay: values present in `overrides` win
    #[must_use]
    pub fn merged_with(self, overrides: Self) -> Self {
        Self {
            firebase_project_id: overrides.firebase_project_id.or(self.firebase_project_id),
            firebase_api_key: overrides.firebase_api_key.or(self.firebase_api_key),
            firestore_base_url: overrides.firestore_base_url.or(self.firestore_base_url),
            auth_base_url: overrides.auth_base_url.or(self.auth_base_url),
            reachability_url: overrides.reachability_url.or(self.reachability_url),
            probe_interval_secs: overrides.probe_interval_secs.or(self.probe_interval_secs),
        }
    }

    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("firestore_base_url", &self.firestore_base_url),
            ("auth_base_url", &self.auth_base_url),
            ("reachability_url", &self.reachability_url),
        ] {
            if let Some(url) = non_blank(value.clone()) {
                parse_endpoint(&url).map_err(|reason| {
                    Error::InvalidInput(format!("config field '{field}' {reason}"))
                })?;
            }
        }
        if self.probe_interval_secs == Some(0) {
            return Err(Error::InvalidInput(
                "config field 'probe_interval_secs' must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn project_id(&self) -> Option<String> {
        non_blank(self.firebase_project_id.clone())
    }

    pub fn api_key(&self) -> Option<String> {
        non_blank(self.firebase_api_key.clone())
    }

    /// Whether enough is configured to talk to the remote store at all
    pub fn remote_enabled(&self) -> bool {
        self.project_id().is_some() && self.api_key().is_some()
    }

    pub fn firestore_base_url(&self) -> String {
        non_blank(self.firestore_base_url.clone())
            .unwrap_or_else(|| DEFAULT_FIRESTORE_URL.to_string())
    }

    pub fn auth_base_url(&self) -> Option<String> {
        non_blank(self.auth_base_url.clone())
    }

    /// Probe target; defaults to the Firestore endpoint itself
    pub fn reachability_url(&self) -> String {
        non_blank(self.reachability_url.clone())
            .unwrap_or_else(|| self.firestore_base_url())
    }

    pub fn probe_interval(&self) -> Duration {
        Duration::from_secs(
            self.probe_interval_secs
                .filter(|secs| *secs > 0)
                .unwrap_or(DEFAULT_PROBE_INTERVAL_SECS),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_fall_back_to_public_endpoints() {
        let config = ClientConfig::default();
        assert!(!config.remote_enabled());
        assert_eq!(config.firestore_base_url(), DEFAULT_FIRESTORE_URL);
        assert_eq!(config.reachability_url(), DEFAULT_FIRESTORE_URL);
        assert_eq!(config.probe_interval(), Duration::from_secs(15));
    }

    #[test]
    fn from_json_rejects_unknown_fields_and_bad_urls() {
        assert!(ClientConfig::from_json(r#"{"database_url":"https://x"}"#).is_err());
        assert!(ClientConfig::from_json(r#"{"firestore_base_url":"localhost:8080"}"#).is_err());
        assert!(ClientConfig::from_json(r#"{"probe_interval_secs":0}"#).is_err());

        let config = ClientConfig::from_json(
            r#"{"firebase_project_id":" demo ","firebase_api_key":"key","firestore_base_url":"http://localhost:8080/v1"}"#,
        )
        .unwrap();
        assert!(config.remote_enabled());
        assert_eq!(config.project_id().as_deref(), Some("demo"));
        assert_eq!(config.reachability_url(), "http://localhost:8080/v1");
    }

    #[test]
    fn merged_with_prefers_overrides() {
        let base = ClientConfig {
            firebase_project_id: Some("file".into()),
            firebase_api_key: Some("file-key".into()),
            probe_interval_secs: Some(30),
            ..ClientConfig::default()
        };
        let overrides = ClientConfig {
            firebase_project_id: Some("env".into()),
            ..ClientConfig::default()
        };

        let merged = base.merged_with(overrides);
        assert_eq!(merged.firebase_project_id.as_deref(), Some("env"));
        assert_eq!(merged.firebase_api_key.as_deref(), Some("file-key"));
        assert_eq!(merged.probe_interval(), Duration::from_secs(30));
    }
}
