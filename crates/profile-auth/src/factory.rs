//! Provider selection and construction

use crate::config::{AuthConfig, RemoteIdentityConfig};
use crate::provider::AuthProvider;
use crate::providers::{LocalMockProvider, RemoteIdentityProvider};
use crate::types::{AuthError, AuthResult};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, error};

/// Which concrete provider backs the service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ProviderKind {
    Remote,
    Mock,
}

impl ProviderKind {
    /// Resolve a configured tag; an absent or empty tag selects the remote provider
    pub fn resolve(tag: Option<&str>) -> AuthResult<Self> {
        match tag.map(str::trim) {
            None | Some("") => Ok(ProviderKind::Remote),
            Some(tag) => tag.parse(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Remote => "remote",
            ProviderKind::Mock => "mock",
        }
    }
}

impl FromStr for ProviderKind {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "remote" | "firebase" => Ok(ProviderKind::Remote),
            "mock" => Ok(ProviderKind::Mock),
            other => Err(AuthError::UnsupportedProvider(other.to_string())),
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Builds providers for the service
pub trait ProviderFactory: Send + Sync {
    fn create(&self, kind: ProviderKind, config: &AuthConfig)
        -> AuthResult<Arc<dyn AuthProvider>>;
}

/// Factory for the built-in providers
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultProviderFactory;

impl ProviderFactory for DefaultProviderFactory {
    fn create(
        &self,
        kind: ProviderKind,
        config: &AuthConfig,
    ) -> AuthResult<Arc<dyn AuthProvider>> {
        debug!("Creating {} authentication provider", kind);

        match kind {
            ProviderKind::Remote => {
                let remote = config
                    .remote
                    .clone()
                    .unwrap_or_else(RemoteIdentityConfig::from_env);

                let missing = remote.missing_keys();
                if !missing.is_empty() {
                    error!(
                        "Remote identity configuration is incomplete (missing: {}). Set {} or [remote] in the config file",
                        missing.join(", "),
                        crate::config::env_keys::API_KEY
                    );
                }

                Ok(Arc::new(RemoteIdentityProvider::new(
                    remote,
                    config.storage.clone(),
                )))
            }
            ProviderKind::Mock => {
                let store = config.storage.open()?;
                Ok(Arc::new(LocalMockProvider::new(config.mock.clone(), store)))
            }
        }
    }
}

/// Resolve `tag` and build the matching provider with the default factory
pub fn create_provider(
    tag: Option<&str>,
    config: &AuthConfig,
) -> AuthResult<Arc<dyn AuthProvider>> {
    let kind = ProviderKind::resolve(tag)?;
    DefaultProviderFactory.create(kind, config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_tags() {
        assert_eq!(ProviderKind::resolve(None).unwrap(), ProviderKind::Remote);
        assert_eq!(ProviderKind::resolve(Some("")).unwrap(), ProviderKind::Remote);
        assert_eq!(
            ProviderKind::resolve(Some("firebase")).unwrap(),
            ProviderKind::Remote
        );
        assert_eq!(ProviderKind::resolve(Some("mock")).unwrap(), ProviderKind::Mock);
        assert_eq!(
            ProviderKind::resolve(Some("cognito")),
            Err(AuthError::UnsupportedProvider("cognito".to_string()))
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(ProviderKind::Remote.to_string(), "remote");
        assert_eq!(ProviderKind::Mock.to_string(), "mock");
    }

    #[test]
    fn test_create_mock_provider() {
        let provider = create_provider(Some("mock"), &AuthConfig::mock()).unwrap();
        assert_eq!(provider.name(), "mock");
        assert!(!provider.is_authenticated());
    }

    #[test]
    fn test_remote_provider_constructed_with_placeholder_key() {
        let config = AuthConfig::remote(RemoteIdentityConfig {
            api_key: crate::config::PLACEHOLDER_API_KEY.to_string(),
            ..Default::default()
        });
        let provider = create_provider(None, &config).unwrap();
        assert_eq!(provider.name(), "remote");
    }

    #[test]
    fn test_unknown_tag_is_rejected() {
        let result = create_provider(Some("ldap"), &AuthConfig::mock());
        assert!(matches!(result, Err(AuthError::UnsupportedProvider(tag)) if tag == "ldap"));
    }
}
