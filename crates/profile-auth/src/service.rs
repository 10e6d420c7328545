//! Authentication service
//!
//! [`AuthService`] owns exactly one provider, chosen from configuration, and
//! forwards every operation to it once initialization has completed.
//! Initialization is single-flight: concurrent callers share one attempt, and
//! a failed attempt leaves the service uninitialized so it can be retried.

use crate::config::AuthConfig;
use crate::factory::{DefaultProviderFactory, ProviderFactory, ProviderKind};
use crate::listeners::Subscription;
use crate::provider::AuthProvider;
use crate::types::{AuthError, AuthOutcome, AuthResult, AuthUser, SignOutOutcome};
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, error, info};

type InitFuture = Shared<BoxFuture<'static, AuthResult<Arc<dyn AuthProvider>>>>;

enum ServiceState {
    Uninitialized,
    Initializing {
        kind: ProviderKind,
        attempt: InitFuture,
    },
    Ready {
        kind: ProviderKind,
        provider: Arc<dyn AuthProvider>,
    },
}

/// Application-facing authentication façade
///
/// Construct once and share it as `Arc<AuthService>`.
pub struct AuthService {
    config: Mutex<AuthConfig>,
    factory: Arc<dyn ProviderFactory>,
    state: Arc<Mutex<ServiceState>>,
}

impl AuthService {
    /// Create a service using the built-in providers
    pub fn new(config: AuthConfig) -> Self {
        Self::with_factory(config, Arc::new(DefaultProviderFactory))
    }

    /// Create a service with a custom provider factory
    pub fn with_factory(config: AuthConfig, factory: Arc<dyn ProviderFactory>) -> Self {
        Self {
            config: Mutex::new(config),
            factory,
            state: Arc::new(Mutex::new(ServiceState::Uninitialized)),
        }
    }

    /// Snapshot of the configuration the next attempt will use
    pub fn config(&self) -> AuthConfig {
        self.config.lock().clone()
    }

    /// Initialize the configured provider
    ///
    /// Returns immediately once ready. While an attempt is running, callers
    /// wait for that attempt and observe its result.
    pub async fn initialize(&self) -> AuthResult<()> {
        let attempt = {
            let mut state = self.state.lock();
            match &*state {
                ServiceState::Ready { .. } => return Ok(()),
                ServiceState::Initializing { attempt, .. } => {
                    debug!("Authentication service initialization already in progress");
                    attempt.clone()
                }
                ServiceState::Uninitialized => {
                    let config = self.config.lock().clone();
                    let kind = ProviderKind::resolve(config.provider.as_deref()).map_err(|e| {
                        error!("Failed to initialize authentication service: {}", e);
                        e
                    })?;

                    info!("Initializing authentication service with {} provider", kind);
                    let attempt = Self::run_attempt(
                        kind,
                        config,
                        self.factory.clone(),
                        self.state.clone(),
                    )
                    .boxed()
                    .shared();

                    *state = ServiceState::Initializing {
                        kind,
                        attempt: attempt.clone(),
                    };
                    attempt
                }
            }
        };

        attempt.await.map(|_| ())
    }

    /// Replace the configuration, then initialize
    ///
    /// The new configuration only applies while no provider has been chosen.
    pub async fn initialize_with(&self, config: AuthConfig) -> AuthResult<()> {
        if matches!(&*self.state.lock(), ServiceState::Uninitialized) {
            *self.config.lock() = config;
        } else {
            debug!("Ignoring replacement configuration; provider already chosen");
        }
        self.initialize().await
    }

    async fn run_attempt(
        kind: ProviderKind,
        config: AuthConfig,
        factory: Arc<dyn ProviderFactory>,
        state: Arc<Mutex<ServiceState>>,
    ) -> AuthResult<Arc<dyn AuthProvider>> {
        let result = Self::build_provider(kind, &config, factory.as_ref()).await;

        let mut state = state.lock();
        match &result {
            Ok(provider) => {
                info!(
                    "Authentication service ready ({} provider)",
                    provider.name()
                );
                *state = ServiceState::Ready {
                    kind,
                    provider: provider.clone(),
                };
            }
            Err(e) => {
                error!("Failed to initialize authentication service: {}", e);
                *state = ServiceState::Uninitialized;
            }
        }
        result
    }

    async fn build_provider(
        kind: ProviderKind,
        config: &AuthConfig,
        factory: &dyn ProviderFactory,
    ) -> AuthResult<Arc<dyn AuthProvider>> {
        let provider = factory.create(kind, config)?;
        provider.initialize().await?;
        Ok(provider)
    }

    fn provider(&self) -> AuthResult<Arc<dyn AuthProvider>> {
        match &*self.state.lock() {
            ServiceState::Ready { provider, .. } => Ok(provider.clone()),
            _ => Err(AuthError::NotInitialized),
        }
    }

    pub fn is_initialized(&self) -> bool {
        matches!(&*self.state.lock(), ServiceState::Ready { .. })
    }

    /// Kind chosen for the current or completed attempt
    pub fn provider_kind(&self) -> Option<ProviderKind> {
        match &*self.state.lock() {
            ServiceState::Uninitialized => None,
            ServiceState::Initializing { kind, .. } | ServiceState::Ready { kind, .. } => {
                Some(*kind)
            }
        }
    }

    /// Name reported by the active provider
    pub fn provider_name(&self) -> Option<String> {
        self.provider().ok().map(|p| p.name().to_string())
    }

    pub async fn sign_up(&self, email: &str, password: &str) -> AuthResult<AuthOutcome> {
        self.provider()?.sign_up(email, password).await
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> AuthResult<AuthOutcome> {
        self.provider()?.sign_in(email, password).await
    }

    pub async fn sign_out(&self) -> AuthResult<SignOutOutcome> {
        self.provider()?.sign_out().await
    }

    /// Current principal; `None` before initialization
    pub fn current_user(&self) -> Option<AuthUser> {
        self.provider().ok().and_then(|p| p.current_user())
    }

    pub fn is_authenticated(&self) -> bool {
        self.provider().map(|p| p.is_authenticated()).unwrap_or(false)
    }

    pub async fn auth_token(&self, force_refresh: bool) -> AuthResult<Option<String>> {
        self.provider()?.auth_token(force_refresh).await
    }

    /// Subscribe to session transitions of the active provider
    pub fn on_auth_state_changed<F>(&self, callback: F) -> AuthResult<Subscription>
    where
        F: Fn(Option<&AuthUser>) + Send + Sync + 'static,
    {
        Ok(self.provider()?.on_auth_state_changed(Arc::new(callback)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_operations_require_initialization() {
        let service = AuthService::new(AuthConfig::mock());

        assert!(!service.is_initialized());
        assert_eq!(service.provider_kind(), None);
        assert_eq!(service.current_user(), None);
        assert!(!service.is_authenticated());
        assert_eq!(
            service.sign_in("test@example.com", "password123").await,
            Err(AuthError::NotInitialized)
        );
        assert_eq!(service.sign_out().await, Err(AuthError::NotInitialized));
        assert_eq!(service.auth_token(false).await, Err(AuthError::NotInitialized));
        assert!(matches!(
            service.on_auth_state_changed(|_| {}),
            Err(AuthError::NotInitialized)
        ));
    }

    #[tokio::test]
    async fn test_initialize_mock() {
        let service = AuthService::new(AuthConfig::mock());
        service.initialize().await.unwrap();
        service.initialize().await.unwrap();

        assert!(service.is_initialized());
        assert_eq!(service.provider_kind(), Some(ProviderKind::Mock));
        assert_eq!(service.provider_name().as_deref(), Some("mock"));
    }

    #[tokio::test]
    async fn test_unsupported_provider_leaves_service_uninitialized() {
        let config = AuthConfig {
            provider: Some("cognito".to_string()),
            ..AuthConfig::mock()
        };
        let service = AuthService::new(config);

        assert_eq!(
            service.initialize().await,
            Err(AuthError::UnsupportedProvider("cognito".to_string()))
        );
        assert!(!service.is_initialized());
        assert_eq!(service.provider_kind(), None);

        service.initialize_with(AuthConfig::mock()).await.unwrap();
        assert_eq!(service.provider_kind(), Some(ProviderKind::Mock));
    }
}
