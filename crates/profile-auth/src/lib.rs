//! # profile-auth
//!
//! Pluggable client-side authentication for the profile application.
//!
//! Application code talks to [`AuthService`], which owns exactly one
//! [`AuthProvider`] chosen by configuration:
//! - `remote`: a hosted identity service (Identity Toolkit compatible REST API)
//! - `mock`: a local registry with a persisted session, for development and tests
//!
//! ```no_run
//! use profile_auth::{AuthConfig, AuthService};
//!
//! # async fn run() -> profile_auth::AuthResult<()> {
//! let service = AuthService::new(AuthConfig::mock());
//! service.initialize().await?;
//!
//! let _subscription = service.on_auth_state_changed(|user| {
//!     println!("signed in: {}", user.is_some());
//! })?;
//! let outcome = service.sign_in("test@example.com", "password123").await?;
//! assert!(outcome.is_success());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod factory;
pub mod listeners;
pub mod logging;
pub mod provider;
pub mod providers;
pub mod service;
pub mod storage;
pub mod types;

// Re-export commonly used types
pub use config::{AuthConfig, MockConfig, MockCredential, RemoteIdentityConfig, StorageConfig};
pub use factory::{create_provider, DefaultProviderFactory, ProviderFactory, ProviderKind};
pub use listeners::{AuthStateCallback, Subscription};
pub use provider::AuthProvider;
pub use providers::{LocalMockProvider, RemoteIdentityProvider};
pub use service::AuthService;
pub use storage::{FileStore, MemoryStore, SessionStore};
pub use types::{AuthError, AuthOutcome, AuthResult, AuthUser, SignOutOutcome, UserMetadata};
