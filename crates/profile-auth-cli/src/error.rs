//! Error types for the profile-auth CLI

use color_eyre::eyre::Report;
use thiserror::Error;

/// CLI error type
#[derive(Debug, Error)]
pub enum CliError {
    /// Authentication service failures
    #[error(transparent)]
    Auth(#[from] profile_auth::AuthError),

    /// Terminal interaction failures
    #[error("Prompt failed: {0}")]
    Prompt(#[from] dialoguer::Error),

    /// Output serialization
    #[error("Failed to format output: {0}")]
    Output(#[from] serde_json::Error),

    /// A domain failure reported by the provider (bad credentials, duplicate account)
    #[error("{0}")]
    Rejected(String),

    /// Everything else
    #[error(transparent)]
    Internal(#[from] Report),
}

impl CliError {
    pub fn internal(message: impl Into<String>) -> Self {
        CliError::Internal(Report::msg(message.into()))
    }
}

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
