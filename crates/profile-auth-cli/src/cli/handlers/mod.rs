//! Command handlers for the profile-auth CLI

pub mod auth;
pub mod config;

use crate::error::Result;
use profile_auth::{AuthConfig, AuthService};
use std::path::PathBuf;
use tracing::debug;

/// Where to load configuration from and which provider to force
#[derive(Debug, Clone, Default)]
pub struct ServiceTarget {
    pub config_path: Option<PathBuf>,
    pub provider: Option<String>,
}

impl ServiceTarget {
    /// Load layered configuration and apply the `--provider` override
    pub fn load_config(&self) -> Result<AuthConfig> {
        let mut config = AuthConfig::load(self.config_path.as_deref())?;
        if let Some(provider) = &self.provider {
            config.provider = Some(provider.clone());
        }
        Ok(config)
    }

    /// Build and initialize a service for one command
    pub async fn connect(&self) -> Result<AuthService> {
        let config = self.load_config()?;
        debug!(
            "Connecting with provider {:?}",
            config.provider.as_deref().unwrap_or("remote")
        );

        let service = AuthService::new(config);
        service.initialize().await?;
        Ok(service)
    }
}
