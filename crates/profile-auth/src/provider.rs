//! Authentication provider trait
//!
//! This module defines the core AuthProvider trait that every identity
//! backend must implement, giving the application a single interface
//! regardless of which backend is configured.

use crate::listeners::{AuthStateCallback, Subscription};
use crate::types::{AuthOutcome, AuthResult, AuthUser, SignOutOutcome};
use async_trait::async_trait;

/// Core trait for authentication providers
///
/// Expected failures (duplicate email, weak password, wrong credentials)
/// are returned inside [`AuthOutcome`]; `Err` is reserved for unexpected or
/// infrastructure failures.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Prepare the provider (backend client setup, session restore)
    ///
    /// Only the first call does any work; later or concurrent calls wait for
    /// it and return without repeating it.
    async fn initialize(&self) -> AuthResult<()>;

    /// Register a new principal and make it the current user
    async fn sign_up(&self, email: &str, password: &str) -> AuthResult<AuthOutcome>;

    /// Authenticate existing credentials and make them the current user
    async fn sign_in(&self, email: &str, password: &str) -> AuthResult<AuthOutcome>;

    /// Clear the session. Signing out while signed out succeeds.
    async fn sign_out(&self) -> AuthResult<SignOutOutcome>;

    /// Cached current principal, `None` when signed out
    fn current_user(&self) -> Option<AuthUser>;

    /// Equivalent to `current_user().is_some()`
    fn is_authenticated(&self) -> bool;

    /// Bearer credential for the current session, `None` when signed out
    ///
    /// `force_refresh` bypasses any cached token.
    async fn auth_token(&self, force_refresh: bool) -> AuthResult<Option<String>>;

    /// Subscribe to session transitions
    ///
    /// The callback runs immediately with the current state and then on
    /// every sign-in, sign-out and session restore.
    fn on_auth_state_changed(&self, callback: AuthStateCallback) -> Subscription;

    /// Provider name for logging/debugging
    fn name(&self) -> &str;
}
