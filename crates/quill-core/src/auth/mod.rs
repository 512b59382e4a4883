//! Firebase email/password auth over the Identity Toolkit REST API.

use std::fmt;

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::Timestamp;
use crate::session::Identity;
use crate::util::{describe_http_failure, non_blank, parse_endpoint};

const EXPIRY_SKEW_SECONDS: i64 = 60;
const IDENTITY_TOOLKIT_HOST: &str = "identitytoolkit.googleapis.com";
const SECURE_TOKEN_HOST: &str = "securetoken.googleapis.com";

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSession {
    pub id_token: String,
    pub refresh_token: String,
    pub expires_at: i64,
    pub user: Identity,
}

impl AuthSession {
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires_at <= Timestamp::now().unix_seconds() + EXPIRY_SKEW_SECONDS
    }
}

impl fmt::Debug for AuthSession {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("AuthSession")
            .field("id_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .field("user", &self.user)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Firebase auth is not configured.")]
    NotConfigured,
    #[error("Invalid auth configuration: {0}")]
    InvalidConfiguration(&'static str),
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Failed to parse JSON payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Auth API error: {0}")]
    Api(String),
    #[error("Secure storage error: {0}")]
    SecureStorage(String),
}

pub type AuthResult<T> = Result<T, AuthError>;

/// Where a signed-in session survives between runs
pub trait SessionPersistence: Clone + Send + Sync + 'static {
    fn load_session(&self) -> AuthResult<Option<AuthSession>>;
    fn save_session(&self, session: &AuthSession) -> AuthResult<()>;
    fn clear_session(&self) -> AuthResult<()>;
}

#[derive(Clone)]
pub struct FirebaseAuthClient<S: SessionPersistence> {
    identity_url: String,
    token_url: String,
    api_key: String,
    client: Client,
    store: S,
}

impl<S: SessionPersistence> FirebaseAuthClient<S> {
    /// `base_url` redirects both auth services, e.g. to
    /// `http://localhost:9099` for the emulator.
    pub fn new(api_key: impl Into<String>, base_url: Option<&str>, store: S) -> AuthResult<Self> {
        let api_key = api_key.into().trim().to_string();
        if api_key.is_empty() {
            return Err(AuthError::InvalidConfiguration(
                "Firebase API key must not be empty",
            ));
        }
        let (identity_url, token_url) = auth_endpoints(base_url)?;

        Ok(Self {
            identity_url,
            token_url,
            api_key,
            client: Client::builder().build()?,
            store,
        })
    }

    pub async fn restore_session(&self) -> AuthResult<Option<AuthSession>> {
        let Some(stored_session) = self.store.load_session()? else {
            return Ok(None);
        };

        if !stored_session.is_expired() {
            return Ok(Some(stored_session));
        }

        match self.refresh_session(&stored_session).await {
            Ok(refreshed) => Ok(Some(refreshed)),
            // unreachable token service: keep the session for a later retry
            Err(AuthError::Http(error)) => {
                tracing::warn!("Could not reach token service, keeping session: {}", error);
                Ok(Some(stored_session))
            }
            Err(error) => {
                tracing::warn!("Failed to refresh persisted session: {}", error);
                self.store.clear_session()?;
                Ok(None)
            }
        }
    }

    pub async fn sign_up(&self, email: &str, password: &str) -> AuthResult<AuthSession> {
        validate_credentials(email, password)?;
        let response: PasswordAuthResponse = self
            .post(
                &format!("{}/accounts:signUp", self.identity_url),
                &credentials_payload(email, password),
            )
            .await?;
        let session = response.into_session()?;
        self.store.save_session(&session)?;
        tracing::info!("Created account {}", session.user.uid);
        Ok(session)
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> AuthResult<AuthSession> {
        validate_credentials(email, password)?;
        let response: PasswordAuthResponse = self
            .post(
                &format!("{}/accounts:signInWithPassword", self.identity_url),
                &credentials_payload(email, password),
            )
            .await?;
        let session = response.into_session()?;
        self.store.save_session(&session)?;
        Ok(session)
    }

    /// Exchange the refresh token for a new ID token, keeping the profile
    pub async fn refresh_session(&self, session: &AuthSession) -> AuthResult<AuthSession> {
        if session.refresh_token.trim().is_empty() {
            return Err(AuthError::InvalidConfiguration(
                "Refresh token must not be empty",
            ));
        }

        let payload = serde_json::json!({
            "grant_type": "refresh_token",
            "refresh_token": session.refresh_token,
        });
        let response: RefreshResponse = self.post(&self.token_url, &payload).await?;
        let refreshed = response.into_session(session.user.clone())?;
        self.store.save_session(&refreshed)?;
        Ok(refreshed)
    }

    /// Current profile for the holder of `id_token`
    pub async fn lookup_user(&self, id_token: &str) -> AuthResult<Identity> {
        let payload = serde_json::json!({ "idToken": id_token });
        let response: LookupResponse = self
            .post(&format!("{}/accounts:lookup", self.identity_url), &payload)
            .await?;
        response
            .users
            .into_iter()
            .next()
            .map(Into::into)
            .ok_or_else(|| AuthError::Api("Lookup response did not include a user".to_string()))
    }

    /// ID tokens are stateless, so signing out only forgets the session
    pub fn sign_out(&self) -> AuthResult<()> {
        self.store.clear_session()
    }

    async fn post<T: DeserializeOwned>(
        &self,
        url: &str,
        payload: &serde_json::Value,
    ) -> AuthResult<T> {
        let response = self
            .client
            .post(url)
            .query(&[("key", &self.api_key)])
            .header("Accept", "application/json")
            .json(payload)
            .send()
            .await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Api(parse_api_error(status, &body)));
        }
        Ok(response.json::<T>().await?)
    }
}

/// Identity Toolkit base and Secure Token endpoint for an optional override
pub fn auth_endpoints(base_url: Option<&str>) -> AuthResult<(String, String)> {
    let Some(base) = non_blank(base_url.map(str::to_string)) else {
        return Ok((
            format!("https://{IDENTITY_TOOLKIT_HOST}/v1"),
            format!("https://{SECURE_TOKEN_HOST}/v1/token"),
        ));
    };
    let base = parse_endpoint(&base).map_err(|_| {
        AuthError::InvalidConfiguration("Auth URL must include http:// or https://")
    })?;
    Ok((
        format!("{base}/{IDENTITY_TOOLKIT_HOST}/v1"),
        format!("{base}/{SECURE_TOKEN_HOST}/v1/token"),
    ))
}

/// Both the project id and the API key, or neither
pub fn resolve_optional_firebase_config(
    project_id: Option<String>,
    api_key: Option<String>,
) -> AuthResult<Option<(String, String)>> {
    match (non_blank(project_id), non_blank(api_key)) {
        (None, None) => Ok(None),
        (Some(project_id), Some(api_key)) => Ok(Some((project_id, api_key))),
        _ => Err(AuthError::NotConfigured),
    }
}

fn validate_credentials(email: &str, password: &str) -> AuthResult<()> {
    if email.trim().is_empty() {
        return Err(AuthError::Api("Email is required".to_string()));
    }
    if password.trim().is_empty() {
        return Err(AuthError::Api("Password is required".to_string()));
    }
    Ok(())
}

fn credentials_payload(email: &str, password: &str) -> serde_json::Value {
    serde_json::json!({
        "email": email.trim(),
        "password": password,
        "returnSecureToken": true,
    })
}

fn expires_at_from(expires_in: Option<&str>) -> AuthResult<i64> {
    let seconds = expires_in
        .and_then(|raw| raw.trim().parse::<i64>().ok())
        .ok_or_else(|| AuthError::Api("Auth response did not include expiresIn".to_string()))?;
    Ok(Timestamp::now().unix_seconds().saturating_add(seconds))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PasswordAuthResponse {
    id_token: Option<String>,
    refresh_token: Option<String>,
    expires_in: Option<String>,
    local_id: Option<String>,
    email: Option<String>,
    display_name: Option<String>,
    profile_picture: Option<String>,
}

impl PasswordAuthResponse {
    fn into_session(self) -> AuthResult<AuthSession> {
        let expires_at = expires_at_from(self.expires_in.as_deref())?;
        match (self.id_token, self.refresh_token, self.local_id) {
            (Some(id_token), Some(refresh_token), Some(uid)) => Ok(AuthSession {
                id_token,
                refresh_token,
                expires_at,
                user: Identity {
                    uid,
                    display_name: non_blank(self.display_name),
                    email: non_blank(self.email),
                    photo_url: non_blank(self.profile_picture),
                },
            }),
            _ => Err(AuthError::Api(
                "Auth response did not include enough session fields".to_string(),
            )),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    id_token: Option<String>,
    refresh_token: Option<String>,
    expires_in: Option<String>,
    user_id: Option<String>,
}

impl RefreshResponse {
    fn into_session(self, user: Identity) -> AuthResult<AuthSession> {
        if self.user_id.as_deref().is_some_and(|uid| uid != user.uid) {
            return Err(AuthError::Api(
                "Refresh response belongs to a different user".to_string(),
            ));
        }
        let expires_at = expires_at_from(self.expires_in.as_deref())?;
        match (self.id_token, self.refresh_token) {
            (Some(id_token), Some(refresh_token)) => Ok(AuthSession {
                id_token,
                refresh_token,
                expires_at,
                user,
            }),
            _ => Err(AuthError::Api(
                "Refresh response did not include enough session fields".to_string(),
            )),
        }
    }
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    #[serde(default)]
    users: Vec<LookupUser>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LookupUser {
    local_id: String,
    email: Option<String>,
    display_name: Option<String>,
    photo_url: Option<String>,
}

impl From<LookupUser> for Identity {
    fn from(value: LookupUser) -> Self {
        Self {
            uid: value.local_id,
            display_name: non_blank(value.display_name),
            email: non_blank(value.email),
            photo_url: non_blank(value.photo_url),
        }
    }
}

#[derive(Debug, Deserialize)]
struct FirebaseErrorResponse {
    error: Option<FirebaseErrorBody>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FirebaseErrorBody {
    Detailed { message: Option<String> },
    Code(String),
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(FirebaseErrorResponse { error: Some(error) }) =
        serde_json::from_str::<FirebaseErrorResponse>(body)
    {
        let message = match error {
            FirebaseErrorBody::Detailed { message } => message,
            FirebaseErrorBody::Code(code) => Some(code),
        };
        return describe_http_failure(status, message, body);
    }
    describe_http_failure(status, None, body)
}
