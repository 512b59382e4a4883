//! Who is signed in and whether the network is usable.
//!
//! Engine calls take a [`SessionContext`] snapshot instead of reading global
//! state, so routing is decided once per call from explicit inputs.

use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};

use crate::connectivity::ConnectivityMonitor;

/// The signed-in user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub uid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
}

impl Identity {
    pub fn new(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            display_name: None,
            email: None,
            photo_url: None,
        }
    }
}

/// Where note operations go for one call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// No identity: the local store is the only store
    LocalOnly,
    /// Signed in and online
    Remote { uid: String },
    /// Signed in but offline: write locally and queue
    Offline { uid: String },
}

impl Route {
    pub fn uid(&self) -> Option<&str> {
        match self {
            Self::LocalOnly => None,
            Self::Remote { uid } | Self::Offline { uid } => Some(uid),
        }
    }
}

/// Identity and connectivity at the moment a call is made
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionContext {
    pub identity: Option<Identity>,
    pub online: bool,
}

impl SessionContext {
    pub const fn signed_out(online: bool) -> Self {
        Self {
            identity: None,
            online,
        }
    }

    pub const fn signed_in(identity: Identity, online: bool) -> Self {
        Self {
            identity: Some(identity),
            online,
        }
    }

    pub fn route(&self) -> Route {
        match (&self.identity, self.online) {
            (None, _) => Route::LocalOnly,
            (Some(identity), true) => Route::Remote {
                uid: identity.uid.clone(),
            },
            (Some(identity), false) => Route::Offline {
                uid: identity.uid.clone(),
            },
        }
    }
}

/// Live session shared between the UI and background tasks
#[derive(Debug, Clone, Default)]
pub struct Session {
    identity: Arc<RwLock<Option<Identity>>>,
    connectivity: ConnectivityMonitor,
}

impl Session {
    pub fn new(connectivity: ConnectivityMonitor) -> Self {
        Self {
            identity: Arc::new(RwLock::new(None)),
            connectivity,
        }
    }

    pub fn set_identity(&self, identity: Option<Identity>) {
        match &identity {
            Some(identity) => tracing::debug!("Session identity set to {}", identity.uid),
            None => tracing::debug!("Session identity cleared"),
        }
        *self.identity.write().unwrap_or_else(PoisonError::into_inner) = identity;
    }

    pub fn identity(&self) -> Option<Identity> {
        self.identity
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_online(&self) -> bool {
        self.connectivity.is_online()
    }

    pub const fn connectivity(&self) -> &ConnectivityMonitor {
        &self.connectivity
    }

    pub fn context(&self) -> SessionContext {
        SessionContext {
            identity: self.identity(),
            online: self.is_online(),
        }
    }
}
