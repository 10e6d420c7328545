//! Remote identity provider
//!
//! Implements [`AuthProvider`] on top of the hosted identity service. The
//! provider keeps its own cached principal, fed by a listener attached to
//! the [`IdentityClient`], so `current_user()` never blocks on the network.

use super::identity_client::{IdentityClient, IdentityError};
use crate::config::{RemoteIdentityConfig, StorageConfig};
use crate::listeners::{AuthStateCallback, ListenerRegistry, Subscription};
use crate::provider::AuthProvider;
use crate::storage::MemoryStore;
use crate::types::{AuthError, AuthOutcome, AuthResult, AuthUser, SignOutOutcome};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Human readable message for a backend rejection code
pub fn describe_rejection(code: &str) -> String {
    let message = match code {
        "EMAIL_EXISTS" => "A user with this email address already exists",
        "WEAK_PASSWORD" => "Password should be at least 6 characters",
        "INVALID_EMAIL" => "The email address is badly formatted",
        "MISSING_EMAIL" => "An email address is required",
        "MISSING_PASSWORD" => "A password is required",
        "EMAIL_NOT_FOUND" | "INVALID_PASSWORD" | "INVALID_LOGIN_CREDENTIALS" => {
            "Invalid email or password"
        }
        "USER_DISABLED" => "This account has been disabled",
        "TOO_MANY_ATTEMPTS_TRY_LATER" => "Too many attempts. Please try again later",
        "OPERATION_NOT_ALLOWED" => "Email and password sign-in is not enabled for this project",
        code if code.starts_with("API key not valid") || code == "API_KEY_INVALID" => {
            "The identity service rejected the configured API key"
        }
        other => return format!("Authentication failed ({})", other),
    };
    message.to_string()
}

/// Provider backed by the hosted identity service
pub struct RemoteIdentityProvider {
    config: RemoteIdentityConfig,
    storage: StorageConfig,
    client: RwLock<Option<Arc<IdentityClient>>>,
    current_user: Arc<RwLock<Option<AuthUser>>>,
    listeners: Arc<ListenerRegistry>,
    backend_subscription: Mutex<Option<Subscription>>,
    init_guard: tokio::sync::Mutex<bool>,
}

impl RemoteIdentityProvider {
    pub fn new(config: RemoteIdentityConfig, storage: StorageConfig) -> Self {
        Self {
            config,
            storage,
            client: RwLock::new(None),
            current_user: Arc::new(RwLock::new(None)),
            listeners: Arc::new(ListenerRegistry::new()),
            backend_subscription: Mutex::new(None),
            init_guard: tokio::sync::Mutex::new(false),
        }
    }

    pub fn config(&self) -> &RemoteIdentityConfig {
        &self.config
    }

    /// True once a backend client (real or degraded) is installed
    pub fn has_client(&self) -> bool {
        self.client.read().is_some()
    }

    fn bring_up(&self) -> AuthResult<Arc<IdentityClient>> {
        let client = IdentityClient::new(self.config.clone())?;
        let store = self.storage.open()?;
        client.set_persistence(store)?;
        info!("Durable session persistence enabled");
        Ok(Arc::new(client))
    }

    fn degraded_client() -> AuthResult<Arc<IdentityClient>> {
        let client = IdentityClient::new(RemoteIdentityConfig::degraded())?;
        client.set_persistence(Arc::new(MemoryStore::new()))?;
        Ok(Arc::new(client))
    }

    /// Install `client` and mirror its session changes into the local cache
    fn attach(&self, client: Arc<IdentityClient>) {
        let cache = self.current_user.clone();
        let listeners = self.listeners.clone();
        let subscription = client.on_state_changed(Arc::new(move |user: Option<&AuthUser>| {
            let changed = {
                let mut cached = cache.write();
                if cached.as_ref() == user {
                    false
                } else {
                    *cached = user.cloned();
                    true
                }
            };
            if changed {
                debug!(
                    "Identity session changed: {}",
                    user.map(|u| u.email.as_str()).unwrap_or("<signed out>")
                );
                listeners.notify(user);
            }
        }));

        if let Some(previous) = self.backend_subscription.lock().replace(subscription) {
            previous.unsubscribe();
        }
        *self.client.write() = Some(client);
    }

    fn client(&self) -> AuthResult<Arc<IdentityClient>> {
        self.client
            .read()
            .clone()
            .ok_or_else(|| AuthError::ProviderNotInitialized(self.name().to_string()))
    }

    fn outcome(
        &self,
        result: Result<AuthUser, IdentityError>,
        action: &str,
    ) -> AuthResult<AuthOutcome> {
        match result {
            Ok(user) => {
                info!("{} succeeded for {}", action, user.email);
                Ok(AuthOutcome::success(user))
            }
            Err(IdentityError::Rejected { code }) => {
                warn!("{} rejected by identity service: {}", action, code);
                Ok(AuthOutcome::failure(describe_rejection(&code)))
            }
            Err(IdentityError::Failed(e)) => {
                error!("{} failed: {}", action, e);
                Err(e)
            }
        }
    }

    /// Detach from the backend client
    pub fn cleanup(&self) {
        if let Some(subscription) = self.backend_subscription.lock().take() {
            subscription.unsubscribe();
        }
        self.listeners.clear();
    }
}

#[async_trait]
impl AuthProvider for RemoteIdentityProvider {
    async fn initialize(&self) -> AuthResult<()> {
        let mut initialized = self.init_guard.lock().await;
        if *initialized {
            debug!("Remote identity provider already initialized");
            return Ok(());
        }

        match self.bring_up() {
            Ok(client) => {
                self.attach(client);
                *initialized = true;
                info!(
                    "Remote identity provider initialized for project '{}'",
                    self.config.project_id
                );
                Ok(())
            }
            Err(e) => {
                error!("Remote identity provider initialization failed: {}", e);
                if !self.has_client() {
                    match Self::degraded_client() {
                        Ok(fallback) => {
                            warn!("Installed degraded identity client (demo-project)");
                            self.attach(fallback);
                        }
                        Err(fallback_err) => {
                            error!("Degraded identity client unavailable: {}", fallback_err)
                        }
                    }
                }
                Err(e)
            }
        }
    }

    async fn sign_up(&self, email: &str, password: &str) -> AuthResult<AuthOutcome> {
        let client = self.client()?;
        let result = client.sign_up(email, password).await;
        self.outcome(result, "Sign up")
    }

    async fn sign_in(&self, email: &str, password: &str) -> AuthResult<AuthOutcome> {
        let client = self.client()?;
        let result = client.sign_in(email, password).await;
        self.outcome(result, "Sign in")
    }

    async fn sign_out(&self) -> AuthResult<SignOutOutcome> {
        let client = self.client()?;
        match client.sign_out().await {
            Ok(()) => Ok(SignOutOutcome::ok()),
            Err(e) => {
                error!("Sign out failed: {}", e);
                Ok(SignOutOutcome::failure(e.to_string()))
            }
        }
    }

    fn current_user(&self) -> Option<AuthUser> {
        self.current_user.read().clone()
    }

    fn is_authenticated(&self) -> bool {
        self.current_user.read().is_some()
    }

    async fn auth_token(&self, force_refresh: bool) -> AuthResult<Option<String>> {
        if !self.is_authenticated() {
            warn!("No user is currently signed in");
            return Ok(None);
        }

        let client = self.client()?;
        match client.id_token(force_refresh).await {
            Ok(token) => Ok(token),
            Err(e) => {
                error!("Failed to obtain ID token: {}", e);
                Ok(None)
            }
        }
    }

    fn on_auth_state_changed(&self, callback: AuthStateCallback) -> Subscription {
        let current = self.current_user();
        self.listeners.subscribe(callback, current.as_ref())
    }

    fn name(&self) -> &str {
        "remote"
    }
}
