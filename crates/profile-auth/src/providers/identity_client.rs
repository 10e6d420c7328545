//! Client for the hosted identity service
//!
//! Talks to an Identity Toolkit compatible REST API: password sign-up and
//! sign-in, account lookup and secure-token refresh. The client owns the
//! backend-side session, persists it when a durable store is attached, and
//! notifies its own listeners whenever the signed-in principal changes.

use crate::config::RemoteIdentityConfig;
use crate::listeners::{AuthStateCallback, ListenerRegistry, Subscription};
use crate::storage::SessionStore;
use crate::types::{AuthError, AuthResult, AuthUser, UserMetadata};
use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use url::Url;

/// Storage key prefix for the persisted backend session
pub const SESSION_KEY_PREFIX: &str = "identity_session";

/// Tokens this close to expiry are refreshed before being handed out
const TOKEN_REFRESH_MARGIN_SECS: i64 = 300;

/// Lifetime assumed when the backend omits `expiresIn`
const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 3600;

/// Upper bound accepted for a backend-supplied `expiresIn`
const MAX_TOKEN_LIFETIME_SECS: i64 = DEFAULT_TOKEN_LIFETIME_SECS * 24;

/// Failure of a backend call
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum IdentityError {
    /// The backend understood the request and refused it (e.g. `EMAIL_EXISTS`)
    #[error("identity backend rejected the request: {code}")]
    Rejected { code: String },

    /// Transport, decoding or storage failure
    #[error(transparent)]
    Failed(#[from] AuthError),
}

/// Session as persisted between process runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredSession {
    pub user: AuthUser,
    pub id_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

impl StoredSession {
    /// Check if the ID token is expired or expires within the refresh margin
    pub fn needs_refresh(&self) -> bool {
        Utc::now() + Duration::seconds(TOKEN_REFRESH_MARGIN_SECS) >= self.expires_at
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PasswordRequest<'a> {
    email: &'a str,
    password: &'a str,
    return_secure_token: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PasswordResponse {
    id_token: String,
    refresh_token: String,
    #[serde(default)]
    expires_in: Option<String>,
    local_id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    display_name: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LookupRequest<'a> {
    id_token: &'a str,
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    #[serde(default)]
    users: Vec<AccountInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountInfo {
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    email_verified: bool,
    #[serde(default)]
    display_name: Option<String>,
    /// Milliseconds since the epoch, encoded as a string
    #[serde(default)]
    created_at: Option<String>,
    #[serde(default)]
    last_login_at: Option<String>,
}

/// The secure-token endpoint answers in snake_case
#[derive(Debug, Deserialize)]
struct RefreshResponse {
    id_token: String,
    refresh_token: String,
    #[serde(default)]
    expires_in: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// Extract the error code from messages like `WEAK_PASSWORD : Password should be ...`
fn error_code(message: &str) -> String {
    message
        .split(" : ")
        .next()
        .unwrap_or(message)
        .trim()
        .to_string()
}

fn parse_lifetime(expires_in: Option<&str>) -> i64 {
    expires_in
        .and_then(|s| s.trim().parse::<i64>().ok())
        .map(|secs| secs.clamp(0, MAX_TOKEN_LIFETIME_SECS))
        .unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS)
}

fn parse_millis(value: Option<&str>) -> Option<DateTime<Utc>> {
    value
        .and_then(|s| s.parse::<i64>().ok())
        .and_then(DateTime::from_timestamp_millis)
}

/// HTTP client and session holder for the hosted identity service
pub struct IdentityClient {
    config: RemoteIdentityConfig,
    http: reqwest::Client,
    session: RwLock<Option<StoredSession>>,
    store: RwLock<Option<Arc<dyn SessionStore>>>,
    listeners: ListenerRegistry,
}

impl IdentityClient {
    /// Create a client; fails when the endpoints are not valid URLs
    pub fn new(config: RemoteIdentityConfig) -> AuthResult<Self> {
        for (name, value) in [
            ("identity_base_url", &config.identity_base_url),
            ("token_base_url", &config.token_base_url),
        ] {
            Url::parse(value)
                .map_err(|e| AuthError::Config(format!("Invalid {}: '{}' ({})", name, value, e)))?;
        }

        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| AuthError::Config(format!("Failed to build HTTP client: {}", e)))?;

        debug!(
            "Identity client created for project '{}'",
            config.project_id
        );

        Ok(Self {
            config,
            http,
            session: RwLock::new(None),
            store: RwLock::new(None),
            listeners: ListenerRegistry::new(),
        })
    }

    fn session_key(&self) -> String {
        format!("{}:{}", SESSION_KEY_PREFIX, self.config.api_key)
    }

    /// Attach a durable store and restore any session persisted in it
    pub fn set_persistence(&self, store: Arc<dyn SessionStore>) -> AuthResult<()> {
        let key = self.session_key();
        let restored = match store.get(&key) {
            Ok(Some(raw)) => match serde_json::from_str::<StoredSession>(&raw) {
                Ok(session) => {
                    info!("Restored identity session for {}", session.user.email);
                    Some(session)
                }
                Err(e) => {
                    error!("Failed to parse persisted identity session: {}", e);
                    store.remove(&key)?;
                    None
                }
            },
            Ok(None) => {
                debug!("No persisted identity session");
                None
            }
            Err(e) => {
                error!("Failed to read persisted identity session: {}", e);
                store.remove(&key)?;
                None
            }
        };

        *self.store.write() = Some(store);
        if let Some(session) = restored {
            let user = session.user.clone();
            *self.session.write() = Some(session);
            self.listeners.notify(Some(&user));
        }
        Ok(())
    }

    /// Current principal according to the backend session
    pub fn current_user(&self) -> Option<AuthUser> {
        self.session.read().as_ref().map(|s| s.user.clone())
    }

    /// Subscribe to principal changes; the callback runs immediately with the current state
    pub fn on_state_changed(&self, callback: AuthStateCallback) -> Subscription {
        let current = self.current_user();
        self.listeners.subscribe(callback, current.as_ref())
    }

    pub async fn sign_up(&self, email: &str, password: &str) -> Result<AuthUser, IdentityError> {
        info!("Registering account: {}", email);
        self.password_flow("accounts:signUp", email, password).await
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<AuthUser, IdentityError> {
        info!("Signing in account: {}", email);
        self.password_flow("accounts:signInWithPassword", email, password)
            .await
    }

    async fn password_flow(
        &self,
        endpoint: &str,
        email: &str,
        password: &str,
    ) -> Result<AuthUser, IdentityError> {
        let request = PasswordRequest {
            email,
            password,
            return_secure_token: true,
        };
        let response: PasswordResponse = self.post_account(endpoint, &request).await?;

        let mut user = AuthUser {
            uid: response.local_id,
            email: response.email.unwrap_or_else(|| email.to_string()),
            email_verified: false,
            display_name: response.display_name.filter(|name| !name.is_empty()),
            metadata: UserMetadata::default(),
        };

        match self.lookup(&response.id_token).await {
            Ok(Some(info)) => {
                if let Some(email) = info.email {
                    user.email = email;
                }
                user.email_verified = info.email_verified;
                if info.display_name.as_deref().is_some_and(|n| !n.is_empty()) {
                    user.display_name = info.display_name;
                }
                user.metadata = UserMetadata {
                    created_at: parse_millis(info.created_at.as_deref()),
                    last_login_at: parse_millis(info.last_login_at.as_deref()),
                };
            }
            Ok(None) => warn!("Account lookup returned no users for {}", user.uid),
            Err(e) => warn!("Account lookup failed (non-fatal): {}", e),
        }

        let session = StoredSession {
            user: user.clone(),
            id_token: response.id_token,
            refresh_token: response.refresh_token,
            expires_at: Utc::now()
                + Duration::seconds(parse_lifetime(response.expires_in.as_deref())),
        };
        self.replace_session(Some(session));

        Ok(user)
    }

    async fn lookup(&self, id_token: &str) -> Result<Option<AccountInfo>, IdentityError> {
        let response: LookupResponse = self
            .post_account("accounts:lookup", &LookupRequest { id_token })
            .await?;
        Ok(response.users.into_iter().next())
    }

    /// Clear the session and its persisted copy
    ///
    /// Listeners see the sign-out even when the persisted copy cannot be removed.
    pub async fn sign_out(&self) -> AuthResult<()> {
        let had_session = self.session.write().take().is_some();

        if had_session {
            info!("Signed out of identity session");
            self.listeners.notify(None);
        } else {
            debug!("Sign out requested with no active session");
        }

        let store = self.store.read().clone();
        if let Some(store) = store {
            store.remove(&self.session_key())?;
        }
        Ok(())
    }

    /// ID token for the current session, refreshed when stale or when forced
    pub async fn id_token(&self, force_refresh: bool) -> AuthResult<Option<String>> {
        let session = match self.session.read().clone() {
            Some(session) => session,
            None => return Ok(None),
        };

        if !force_refresh && !session.needs_refresh() {
            return Ok(Some(session.id_token));
        }

        debug!(
            "Refreshing ID token (forced: {}, expires at: {})",
            force_refresh, session.expires_at
        );
        match self.refresh(&session.refresh_token).await {
            Ok(response) => {
                let refreshed = StoredSession {
                    user: session.user,
                    id_token: response.id_token.clone(),
                    refresh_token: response.refresh_token,
                    expires_at: Utc::now()
                        + Duration::seconds(parse_lifetime(response.expires_in.as_deref())),
                };
                *self.session.write() = Some(refreshed.clone());
                self.persist(Some(&refreshed));
                Ok(Some(response.id_token))
            }
            Err(IdentityError::Rejected { code }) => {
                warn!("Refresh token rejected ({}); ending session", code);
                self.replace_session(None);
                Ok(None)
            }
            Err(IdentityError::Failed(e)) => Err(e),
        }
    }

    async fn refresh(&self, refresh_token: &str) -> Result<RefreshResponse, IdentityError> {
        let url = format!(
            "{}/token",
            self.config.token_base_url.trim_end_matches('/')
        );
        let response = self
            .http
            .post(&url)
            .query(&[("key", self.config.api_key.as_str())])
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
            ])
            .send()
            .await
            .map_err(|e| AuthError::Network(format!("Failed to refresh token: {}", e)))?;

        Self::parse_response(response).await
    }

    async fn post_account<B, T>(&self, endpoint: &str, body: &B) -> Result<T, IdentityError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = format!(
            "{}/{}",
            self.config.identity_base_url.trim_end_matches('/'),
            endpoint
        );
        let response = self
            .http
            .post(&url)
            .query(&[("key", self.config.api_key.as_str())])
            .json(body)
            .send()
            .await
            .map_err(|e| AuthError::Network(format!("Request to {} failed: {}", endpoint, e)))?;

        Self::parse_response(response).await
    }

    async fn parse_response<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, IdentityError> {
        let status = response.status();
        if status.is_success() {
            return response.json::<T>().await.map_err(|e| {
                IdentityError::from(AuthError::InvalidResponse(format!(
                    "Failed to parse response: {}",
                    e
                )))
            });
        }

        let body = response.text().await.unwrap_or_default();
        if status.is_client_error() {
            if let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(&body) {
                return Err(IdentityError::Rejected {
                    code: error_code(&envelope.error.message),
                });
            }
        }

        Err(IdentityError::from(AuthError::Network(format!(
            "HTTP {}: {}",
            status, body
        ))))
    }

    /// Swap the session, persist it and tell listeners
    fn replace_session(&self, session: Option<StoredSession>) {
        let user = session.as_ref().map(|s| s.user.clone());
        *self.session.write() = session.clone();
        self.persist(session.as_ref());
        self.listeners.notify(user.as_ref());
    }

    fn persist(&self, session: Option<&StoredSession>) {
        let store = match self.store.read().clone() {
            Some(store) => store,
            None => return,
        };
        let key = self.session_key();

        let result = match session {
            Some(session) => serde_json::to_string(session)
                .map_err(AuthError::from)
                .and_then(|json| store.set(&key, &json)),
            None => store.remove(&key),
        };
        if let Err(e) = result {
            warn!("Failed to persist identity session: {}", e);
        }
    }
}
