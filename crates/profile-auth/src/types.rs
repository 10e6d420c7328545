//! Authentication-related types and data structures
//!
//! This module defines the principal, the boundary result records returned
//! by every provider, and the error type shared across the crate.

use chrono::{DateTime, Utc};
use etcetera::{choose_base_strategy, BaseStrategy};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Result type for authentication operations
pub type AuthResult<T> = Result<T, AuthError>;

/// The authenticated principal for the active session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthUser {
    /// Unique identifier assigned by the provider
    pub uid: String,
    /// Email address used to sign in
    pub email: String,
    /// Whether the email address has been verified
    #[serde(default)]
    pub email_verified: bool,
    /// Human readable name, if known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Creation and last sign-in timestamps
    #[serde(default)]
    pub metadata: UserMetadata,
}

impl AuthUser {
    /// Local part of the email address (everything before `@`)
    pub fn local_part(email: &str) -> &str {
        email.split('@').next().unwrap_or(email)
    }
}

/// Account timestamps reported by the provider
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_login_at: Option<DateTime<Utc>>,
}

/// Result of `sign_up` / `sign_in`
///
/// Expected failures (duplicate registration, weak password, bad
/// credentials) are reported through `error` so callers can render them
/// without treating them as faults.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuthOutcome {
    pub user: Option<AuthUser>,
    pub error: Option<String>,
}

impl AuthOutcome {
    pub fn success(user: AuthUser) -> Self {
        Self {
            user: Some(user),
            error: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            user: None,
            error: Some(message.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.user.is_some() && self.error.is_none()
    }
}

/// Result of `sign_out`
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SignOutOutcome {
    pub error: Option<String>,
}

impl SignOutOutcome {
    pub fn ok() -> Self {
        Self { error: None }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
        }
    }
}

/// Authentication errors
///
/// These are contract and infrastructure failures. Domain failures never
/// use this type; they travel in [`AuthOutcome::error`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AuthError {
    /// The service was used before `initialize()` completed
    #[error("Authentication service is not initialized. Call initialize() first")]
    NotInitialized,

    /// A provider operation ran before the provider itself was initialized
    #[error("Provider '{0}' is not initialized")]
    ProviderNotInitialized(String),

    /// Unknown provider tag
    #[error("Unsupported authentication provider type: {0}")]
    UnsupportedProvider(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Network error talking to the identity backend
    #[error("Network error: {0}")]
    Network(String),

    /// The identity backend answered with something we could not use
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Session storage error
    #[error("Session storage error: {0}")]
    Storage(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for AuthError {
    fn from(err: serde_json::Error) -> Self {
        AuthError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for AuthError {
    fn from(err: std::io::Error) -> Self {
        AuthError::Storage(err.to_string())
    }
}

/// Get the default data directory for persisted sessions
/// Returns platform-specific data directory (e.g., ~/.local/share/profile-auth on Linux)
pub fn get_data_dir() -> AuthResult<PathBuf> {
    let strategy = choose_base_strategy().map_err(|e| {
        AuthError::Config(format!("Failed to determine base directories: {}", e))
    })?;

    Ok(strategy.data_dir().join("profile-auth"))
}
