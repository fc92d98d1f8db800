//! Session manager: bearer credential lifecycle and auth endpoints.
//!
//! The credential is a JWT whose `exp` claim is decoded locally to judge
//! validity; the backend remains the authority, we never verify signatures.
//! The token is persisted as a single-line file (e.g. `~/.docbot/token`) so a
//! login survives restarts until logout or expiry.

use crate::backend::error_detail;
use base64::Engine;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Bad credentials or signup conflict; the message is the backend's
    /// `detail` field and is safe to show to the user.
    #[error("{0}")]
    Credentials(String),

    /// The backend rejected a stored credential; caller should log out.
    #[error("session expired")]
    SessionExpired,

    #[error("auth request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("storing credential: {0}")]
    Storage(#[from] std::io::Error),
}

/// Opaque bearer token with an embedded `exp` claim (seconds since epoch).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Expiry claim in seconds since epoch, if the payload segment decodes.
    pub fn expires_at(&self) -> Option<i64> {
        #[derive(Deserialize)]
        struct Claims {
            exp: i64,
        }
        let payload = self.0.split('.').nth(1)?;
        let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(payload.trim_end_matches('='))
            .ok()?;
        let claims: Claims = serde_json::from_slice(&bytes).ok()?;
        Some(claims.exp)
    }

    /// True iff the payload decodes and `exp` is strictly in the future.
    /// Malformed tokens read as invalid, not as an error.
    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now().timestamp())
    }

    fn is_valid_at(&self, now: i64) -> bool {
        self.expires_at().map(|exp| exp > now).unwrap_or(false)
    }
}

/// File-backed credential store.
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Store at the default location (~/.docbot/token).
    pub fn default_store() -> Self {
        Self::new(crate::config::default_token_path())
    }

    /// Load the stored credential if present and non-empty.
    pub fn load(&self) -> Option<Credential> {
        let s = std::fs::read_to_string(&self.path).ok()?;
        let t = s.trim().to_string();
        if t.is_empty() {
            None
        } else {
            Some(Credential::new(t))
        }
    }

    /// Load the stored credential only if it is still valid; malformed or
    /// expired tokens read as absent.
    pub fn load_valid(&self) -> Option<Credential> {
        self.load().filter(|c| c.is_valid())
    }

    /// Persist the credential. Creates parent dirs if needed.
    pub fn save(&self, credential: &Credential) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, credential.as_str())?;
        Ok(())
    }

    /// Remove the stored credential. Idempotent; a missing file is fine.
    pub fn clear(&self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                log::warn!("removing token file {}: {}", self.path.display(), e);
            }
        }
    }
}

/// Current user as returned by the backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub is_active: bool,
}

/// At most one per running client: the authenticated user and their
/// credential. Passed explicitly into gateway calls that need auth.
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub user: Option<UserRecord>,
    pub credential: Option<Credential>,
}

impl Session {
    /// True iff a valid credential is held and the user record was fetched.
    pub fn authenticated(&self) -> bool {
        self.user.is_some()
            && self
                .credential
                .as_ref()
                .map(|c| c.is_valid())
                .unwrap_or(false)
    }

    pub fn username(&self) -> Option<&str> {
        self.user.as_ref().map(|u| u.username.as_str())
    }
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    access_token: String,
}

/// Client for the backend auth endpoints, plus the local token store.
#[derive(Clone)]
pub struct AuthClient {
    base_url: String,
    client: reqwest::Client,
    store: TokenStore,
}

impl AuthClient {
    pub fn new(base_url: impl Into<String>, store: TokenStore) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
            store,
        }
    }

    /// True iff a stored credential exists, decodes, and has not expired.
    pub fn is_authenticated(&self) -> bool {
        self.store.load().map(|c| c.is_valid()).unwrap_or(false)
    }

    /// The stored credential, if still valid.
    pub fn credential(&self) -> Option<Credential> {
        self.store.load_valid()
    }

    /// POST /api/auth/login — on success the token is stored and a populated
    /// session is returned.
    pub async fn login(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let url = format!("{}/api/auth/login", self.base_url);
        let res = self
            .client
            .post(&url)
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await?;
        if !res.status().is_success() {
            return Err(AuthError::Credentials(
                error_detail(res, "Login failed").await,
            ));
        }
        let data: LoginResponse = res.json().await?;
        let credential = Credential::new(data.access_token);
        self.store.save(&credential)?;
        let user = self.current_user(&credential).await?;
        log::info!("logged in as {}", user.username);
        Ok(Session {
            user: Some(user),
            credential: Some(credential),
        })
    }

    /// POST /api/auth/signup — returns the created user record. Does not
    /// establish a session; the caller must log in afterwards.
    pub async fn signup(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<UserRecord, AuthError> {
        let url = format!("{}/api/auth/signup", self.base_url);
        let res = self
            .client
            .post(&url)
            .json(&serde_json::json!({
                "username": username,
                "email": email,
                "password": password,
            }))
            .send()
            .await?;
        if !res.status().is_success() {
            return Err(AuthError::Credentials(
                error_detail(res, "Registration failed").await,
            ));
        }
        Ok(res.json().await?)
    }

    /// GET /api/auth/me with the given bearer credential.
    pub async fn current_user(&self, credential: &Credential) -> Result<UserRecord, AuthError> {
        let url = format!("{}/api/auth/me", self.base_url);
        let res = self
            .client
            .get(&url)
            .bearer_auth(credential.as_str())
            .send()
            .await?;
        if !res.status().is_success() {
            return Err(AuthError::SessionExpired);
        }
        Ok(res.json().await?)
    }

    /// Delete the stored credential unconditionally. Idempotent, no network.
    pub fn logout(&self) {
        self.store.clear();
    }

    /// Startup check: restore the session from a stored credential. Any
    /// failure logs the user out and yields an unauthenticated session.
    pub async fn restore_session(&self) -> Session {
        let Some(credential) = self.store.load_valid() else {
            return Session::default();
        };
        match self.current_user(&credential).await {
            Ok(user) => Session {
                user: Some(user),
                credential: Some(credential),
            },
            Err(e) => {
                log::warn!("stored session rejected ({}); logging out", e);
                self.logout();
                Session::default()
            }
        }
    }
}
