//! Local mock provider
//!
//! Keeps a credential registry in memory and the current user in a
//! [`SessionStore`] under a single key. Tokens are unsigned base64 JSON and
//! only meant for development and tests.

use crate::config::{MockConfig, MockCredential};
use crate::listeners::{AuthStateCallback, ListenerRegistry, Subscription};
use crate::provider::AuthProvider;
use crate::storage::SessionStore;
use crate::types::{AuthError, AuthOutcome, AuthResult, AuthUser, SignOutOutcome, UserMetadata};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info};

/// Storage key for the persisted mock user
pub const MOCK_SESSION_KEY: &str = "mock_auth_user";

/// Lifetime written into mock tokens
const MOCK_TOKEN_LIFETIME_SECS: i64 = 3600;

pub const DUPLICATE_EMAIL_MESSAGE: &str = "A user with this email address already exists";
pub const INVALID_CREDENTIALS_MESSAGE: &str = "Invalid email or password";

/// Payload of a mock token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MockTokenClaims {
    pub sub: String,
    pub email: String,
    pub name: Option<String>,
    pub iat: i64,
    pub exp: i64,
}

impl MockTokenClaims {
    fn for_user(user: &AuthUser) -> Self {
        let iat = Utc::now().timestamp();
        Self {
            sub: user.uid.clone(),
            email: user.email.clone(),
            name: user.display_name.clone(),
            iat,
            exp: iat + MOCK_TOKEN_LIFETIME_SECS,
        }
    }

    pub fn encode(&self) -> AuthResult<String> {
        Ok(STANDARD.encode(serde_json::to_vec(self)?))
    }

    pub fn decode(token: &str) -> AuthResult<Self> {
        let bytes = STANDARD
            .decode(token)
            .map_err(|e| AuthError::Serialization(format!("Invalid mock token: {}", e)))?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// Provider for development and tests; no network involved
pub struct LocalMockProvider {
    registry: Mutex<Vec<MockCredential>>,
    store: Arc<dyn SessionStore>,
    current_user: RwLock<Option<AuthUser>>,
    listeners: ListenerRegistry,
    init_guard: tokio::sync::Mutex<bool>,
}

impl LocalMockProvider {
    pub fn new(config: MockConfig, store: Arc<dyn SessionStore>) -> Self {
        Self {
            registry: Mutex::new(config.users),
            store,
            current_user: RwLock::new(None),
            listeners: ListenerRegistry::new(),
            init_guard: tokio::sync::Mutex::new(false),
        }
    }

    /// Number of registered credentials
    pub fn registered_users(&self) -> usize {
        self.registry.lock().len()
    }

    /// Drop all subscribers
    pub fn cleanup(&self) {
        self.listeners.clear();
    }

    fn restore(&self) -> Option<AuthUser> {
        let raw = match self.store.get(MOCK_SESSION_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                error!("Failed to read persisted mock user: {}", e);
                self.discard_session();
                return None;
            }
        };

        match serde_json::from_str::<AuthUser>(&raw) {
            Ok(user) => Some(user),
            Err(e) => {
                error!("Failed to parse persisted mock user: {}", e);
                self.discard_session();
                None
            }
        }
    }

    fn discard_session(&self) {
        if let Err(e) = self.store.remove(MOCK_SESSION_KEY) {
            error!("Failed to remove corrupt mock user entry: {}", e);
        }
    }

    /// Cache, persist and broadcast the new current user
    fn set_current(&self, user: Option<AuthUser>) {
        *self.current_user.write() = user.clone();

        let persisted = match &user {
            Some(user) => serde_json::to_string(user)
                .map_err(AuthError::from)
                .and_then(|json| self.store.set(MOCK_SESSION_KEY, &json)),
            None => self.store.remove(MOCK_SESSION_KEY),
        };
        if let Err(e) = persisted {
            error!("Failed to persist mock session: {}", e);
        }

        self.listeners.notify(user.as_ref());
    }
}

#[async_trait]
impl AuthProvider for LocalMockProvider {
    async fn initialize(&self) -> AuthResult<()> {
        let mut initialized = self.init_guard.lock().await;
        if *initialized {
            return Ok(());
        }
        *initialized = true;

        if let Some(user) = self.restore() {
            info!("Restored mock session for {}", user.email);
            *self.current_user.write() = Some(user.clone());
            self.listeners.notify(Some(&user));
        }

        info!(
            "Mock authentication provider initialized with {} registered users",
            self.registered_users()
        );
        Ok(())
    }

    async fn sign_up(&self, email: &str, password: &str) -> AuthResult<AuthOutcome> {
        {
            let mut registry = self.registry.lock();
            if registry.iter().any(|entry| entry.email == email) {
                debug!("Mock sign up rejected, {} already registered", email);
                return Ok(AuthOutcome::failure(DUPLICATE_EMAIL_MESSAGE));
            }
            registry.push(MockCredential::new(email, password));
        }

        let user = AuthUser {
            uid: format!("mock-{}", uuid::Uuid::new_v4()),
            email: email.to_string(),
            email_verified: false,
            display_name: Some(AuthUser::local_part(email).to_string()),
            metadata: UserMetadata {
                created_at: Some(Utc::now()),
                last_login_at: None,
            },
        };

        info!("Mock sign up for {}", email);
        self.set_current(Some(user.clone()));
        Ok(AuthOutcome::success(user))
    }

    async fn sign_in(&self, email: &str, password: &str) -> AuthResult<AuthOutcome> {
        let matched = self
            .registry
            .lock()
            .iter()
            .any(|entry| entry.email == email && entry.password == password);
        if !matched {
            debug!("Mock sign in rejected for {}", email);
            return Ok(AuthOutcome::failure(INVALID_CREDENTIALS_MESSAGE));
        }

        let local_part = AuthUser::local_part(email);
        let user = AuthUser {
            uid: format!("mock-{}", local_part),
            email: email.to_string(),
            email_verified: true,
            display_name: Some(local_part.to_string()),
            metadata: UserMetadata {
                created_at: None,
                last_login_at: Some(Utc::now()),
            },
        };

        info!("Mock sign in for {}", email);
        self.set_current(Some(user.clone()));
        Ok(AuthOutcome::success(user))
    }

    async fn sign_out(&self) -> AuthResult<SignOutOutcome> {
        self.set_current(None);
        Ok(SignOutOutcome::ok())
    }

    fn current_user(&self) -> Option<AuthUser> {
        self.current_user.read().clone()
    }

    fn is_authenticated(&self) -> bool {
        self.current_user.read().is_some()
    }

    async fn auth_token(&self, _force_refresh: bool) -> AuthResult<Option<String>> {
        match self.current_user() {
            Some(user) => MockTokenClaims::for_user(&user).encode().map(Some),
            None => Ok(None),
        }
    }

    fn on_auth_state_changed(&self, callback: AuthStateCallback) -> Subscription {
        let current = self.current_user();
        self.listeners.subscribe(callback, current.as_ref())
    }

    fn name(&self) -> &str {
        "mock"
    }
}
