//! Configuration for the authentication service
//!
//! Values are layered with figment: built-in defaults, then an optional
//! TOML file, then `PROFILE_AUTH__`-prefixed environment variables
//! (`__` separates nesting levels, e.g. `PROFILE_AUTH__REMOTE__API_KEY`).

use crate::storage::{FileStore, MemoryStore, SessionStore};
use crate::types::{get_data_dir, AuthError, AuthResult};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Default configuration file name, looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "profile-auth.toml";

/// Prefix for layered environment overrides
pub const ENV_PREFIX: &str = "PROFILE_AUTH__";

/// Flat provider selector, honoured when no provider is configured
pub const PROVIDER_ENV: &str = "PROFILE_AUTH_PROVIDER";

/// Placeholder API key shipped in example configuration
pub const PLACEHOLDER_API_KEY: &str = "YOUR_API_KEY";

pub const DEFAULT_IDENTITY_BASE_URL: &str = "https://identitytoolkit.googleapis.com/v1";
pub const DEFAULT_TOKEN_BASE_URL: &str = "https://securetoken.googleapis.com/v1";

/// Environment variables used to synthesize remote configuration
pub mod env_keys {
    pub const API_KEY: &str = "PROFILE_AUTH_API_KEY";
    pub const AUTH_DOMAIN: &str = "PROFILE_AUTH_AUTH_DOMAIN";
    pub const PROJECT_ID: &str = "PROFILE_AUTH_PROJECT_ID";
    pub const STORAGE_BUCKET: &str = "PROFILE_AUTH_STORAGE_BUCKET";
    pub const MESSAGING_SENDER_ID: &str = "PROFILE_AUTH_MESSAGING_SENDER_ID";
    pub const APP_ID: &str = "PROFILE_AUTH_APP_ID";
}

/// Top-level configuration handed to the service and the provider factory
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Provider tag (`remote` or `mock`); defaults to remote when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,

    /// Hosted identity service settings; synthesized from the environment when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote: Option<RemoteIdentityConfig>,

    /// Local mock provider settings
    #[serde(default)]
    pub mock: MockConfig,

    /// Where providers persist their session
    #[serde(default)]
    pub storage: StorageConfig,
}

impl AuthConfig {
    /// Load configuration from an optional file path and the environment
    pub fn load(path: Option<&Path>) -> AuthResult<Self> {
        let file = path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
        debug!("Loading auth configuration from: {}", file.display());

        let figment = Figment::from(Serialized::defaults(AuthConfig::default()))
            .merge(Toml::file(&file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"));

        Self::extract(figment)
    }

    /// Load configuration from the environment only
    pub fn from_env() -> AuthResult<Self> {
        let figment = Figment::from(Serialized::defaults(AuthConfig::default()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"));

        Self::extract(figment)
    }

    fn extract(figment: Figment) -> AuthResult<Self> {
        let mut config: AuthConfig = figment
            .extract()
            .map_err(|e| AuthError::Config(e.to_string()))?;

        if let Some(remote) = config.remote.as_mut() {
            remote.restore_raw_env_credentials();
        }

        if config.provider.is_none() {
            config.provider = std::env::var(PROVIDER_ENV)
                .ok()
                .filter(|value| !value.trim().is_empty());
        }

        Ok(config)
    }

    /// Configuration selecting the mock provider with in-memory storage
    pub fn mock() -> Self {
        Self {
            provider: Some("mock".to_string()),
            storage: StorageConfig::memory(),
            ..Default::default()
        }
    }

    /// Configuration selecting the remote provider
    pub fn remote(remote: RemoteIdentityConfig) -> Self {
        Self {
            provider: Some("remote".to_string()),
            remote: Some(remote),
            ..Default::default()
        }
    }

    pub fn with_storage(mut self, storage: StorageConfig) -> Self {
        self.storage = storage;
        self
    }

    pub fn with_mock_users(mut self, users: Vec<MockCredential>) -> Self {
        self.mock.users = users;
        self
    }

    /// Generate example configuration file
    pub fn generate_example() -> AuthResult<String> {
        let example = AuthConfig {
            provider: Some("remote".to_string()),
            remote: Some(RemoteIdentityConfig {
                api_key: PLACEHOLDER_API_KEY.to_string(),
                auth_domain: "your-project.firebaseapp.com".to_string(),
                project_id: "your-project".to_string(),
                ..Default::default()
            }),
            ..Default::default()
        };

        toml::to_string_pretty(&example)
            .map_err(|e| AuthError::Config(format!("Failed to serialize config: {e}")))
    }
}

/// Hosted identity service configuration
///
/// The six credential values are opaque and passed through unmodified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteIdentityConfig {
    #[serde(deserialize_with = "opaque_string")]
    pub api_key: String,
    #[serde(deserialize_with = "opaque_string")]
    pub auth_domain: String,
    #[serde(deserialize_with = "opaque_string")]
    pub project_id: String,
    #[serde(deserialize_with = "opaque_string")]
    pub storage_bucket: String,
    #[serde(deserialize_with = "opaque_string")]
    pub messaging_sender_id: String,
    #[serde(deserialize_with = "opaque_string")]
    pub app_id: String,

    /// Base URL of the account endpoints (`accounts:signUp`, ...)
    pub identity_base_url: String,
    /// Base URL of the token refresh endpoint
    pub token_base_url: String,
    /// HTTP request timeout in seconds
    pub request_timeout_secs: u64,
}

impl Default for RemoteIdentityConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            auth_domain: String::new(),
            project_id: String::new(),
            storage_bucket: String::new(),
            messaging_sender_id: String::new(),
            app_id: String::new(),
            identity_base_url: DEFAULT_IDENTITY_BASE_URL.to_string(),
            token_base_url: DEFAULT_TOKEN_BASE_URL.to_string(),
            request_timeout_secs: 30,
        }
    }
}

impl RemoteIdentityConfig {
    /// Build configuration from the flat `PROFILE_AUTH_*` environment variables
    pub fn from_env() -> Self {
        let var = |key: &str| std::env::var(key).unwrap_or_default();

        Self {
            api_key: var(env_keys::API_KEY),
            auth_domain: var(env_keys::AUTH_DOMAIN),
            project_id: var(env_keys::PROJECT_ID),
            storage_bucket: var(env_keys::STORAGE_BUCKET),
            messaging_sender_id: var(env_keys::MESSAGING_SENDER_ID),
            app_id: var(env_keys::APP_ID),
            ..Default::default()
        }
    }

    /// Re-read the credentials set through `PROFILE_AUTH__REMOTE__*` verbatim
    ///
    /// The env layer coerces numeric-looking text (`0123456` becomes `123456`).
    fn restore_raw_env_credentials(&mut self) {
        for (field, value) in [
            ("API_KEY", &mut self.api_key),
            ("AUTH_DOMAIN", &mut self.auth_domain),
            ("PROJECT_ID", &mut self.project_id),
            ("STORAGE_BUCKET", &mut self.storage_bucket),
            ("MESSAGING_SENDER_ID", &mut self.messaging_sender_id),
            ("APP_ID", &mut self.app_id),
        ] {
            if let Ok(raw) = std::env::var(format!("{ENV_PREFIX}REMOTE__{field}")) {
                *value = raw;
            }
        }
    }

    /// Minimal configuration used when the real one could not be brought up
    pub fn degraded() -> Self {
        Self {
            project_id: "demo-project".to_string(),
            ..Default::default()
        }
    }

    /// Required keys that are missing or still hold a placeholder
    pub fn missing_keys(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.api_key.trim().is_empty() || self.api_key == PLACEHOLDER_API_KEY {
            missing.push("api_key");
        }
        missing
    }

    pub fn is_complete(&self) -> bool {
        self.missing_keys().is_empty()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Accept strings, numbers and booleans for opaque credential values
///
/// Environment layering parses `PROFILE_AUTH__REMOTE__MESSAGING_SENDER_ID=1234`
/// as a number before it reaches serde.
fn opaque_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        serde_json::Value::Bool(b) => Ok(b.to_string()),
        serde_json::Value::Null => Ok(String::new()),
        other => Err(D::Error::custom(format!(
            "expected a string value, found {other}"
        ))),
    }
}

/// A registry entry for the mock provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MockCredential {
    pub email: String,
    pub password: String,
}

impl MockCredential {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

/// Mock provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MockConfig {
    /// Seed user registry
    #[serde(default = "default_mock_users")]
    pub users: Vec<MockCredential>,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            users: default_mock_users(),
        }
    }
}

fn default_mock_users() -> Vec<MockCredential> {
    vec![MockCredential::new("test@example.com", "password123")]
}

/// Session storage backend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    File,
    Memory,
}

/// Session storage configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,

    /// Directory for the file backend; defaults to the platform data directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,
}

impl StorageConfig {
    pub fn memory() -> Self {
        Self {
            backend: StorageBackend::Memory,
            directory: None,
        }
    }

    pub fn file(directory: impl Into<PathBuf>) -> Self {
        Self {
            backend: StorageBackend::File,
            directory: Some(directory.into()),
        }
    }

    /// Open the configured store
    pub fn open(&self) -> AuthResult<Arc<dyn SessionStore>> {
        match self.backend {
            StorageBackend::Memory => Ok(Arc::new(MemoryStore::new())),
            StorageBackend::File => {
                let dir = match &self.directory {
                    Some(dir) => dir.clone(),
                    None => get_data_dir()?,
                };
                Ok(Arc::new(FileStore::new(dir)?))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = AuthConfig::default();
        assert!(config.provider.is_none());
        assert!(config.remote.is_none());
        assert_eq!(config.mock.users.len(), 1);
        assert_eq!(config.mock.users[0].email, "test@example.com");
        assert_eq!(config.storage.backend, StorageBackend::File);
    }

    #[test]
    #[serial]
    fn test_load_from_toml_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("auth.toml");
        std::fs::write(
            &path,
            r#"
provider = "mock"

[[mock.users]]
email = "alice@example.com"
password = "secret1"

[storage]
backend = "memory"
"#,
        )
        .unwrap();

        let config = AuthConfig::load(Some(&path)).unwrap();
        assert_eq!(config.provider.as_deref(), Some("mock"));
        assert_eq!(
            config.mock.users,
            vec![MockCredential::new("alice@example.com", "secret1")]
        );
        assert_eq!(config.storage.backend, StorageBackend::Memory);
    }

    #[test]
    #[serial]
    fn test_env_overrides_nested_remote_values() {
        std::env::set_var("PROFILE_AUTH__REMOTE__API_KEY", "AIza-test");
        std::env::set_var("PROFILE_AUTH__REMOTE__MESSAGING_SENDER_ID", "123456789");

        let config = AuthConfig::from_env();

        std::env::remove_var("PROFILE_AUTH__REMOTE__API_KEY");
        std::env::remove_var("PROFILE_AUTH__REMOTE__MESSAGING_SENDER_ID");

        let remote = config.unwrap().remote.unwrap();
        assert_eq!(remote.api_key, "AIza-test");
        assert_eq!(remote.messaging_sender_id, "123456789");
        assert_eq!(remote.identity_base_url, DEFAULT_IDENTITY_BASE_URL);
    }

    #[test]
    #[serial]
    fn test_env_credentials_keep_leading_zeros() {
        std::env::set_var("PROFILE_AUTH__REMOTE__MESSAGING_SENDER_ID", "0123456");
        std::env::set_var("PROFILE_AUTH__REMOTE__APP_ID", "1:0042:web:00ff");

        let config = AuthConfig::from_env();

        std::env::remove_var("PROFILE_AUTH__REMOTE__MESSAGING_SENDER_ID");
        std::env::remove_var("PROFILE_AUTH__REMOTE__APP_ID");

        let remote = config.unwrap().remote.unwrap();
        assert_eq!(remote.messaging_sender_id, "0123456");
        assert_eq!(remote.app_id, "1:0042:web:00ff");
    }

    #[test]
    #[serial]
    fn test_flat_provider_selector() {
        std::env::set_var(PROVIDER_ENV, "mock");
        let config = AuthConfig::from_env();
        std::env::remove_var(PROVIDER_ENV);

        assert_eq!(config.unwrap().provider.as_deref(), Some("mock"));
    }

    #[test]
    #[serial]
    fn test_remote_from_env() {
        std::env::set_var(env_keys::API_KEY, "key-1");
        std::env::set_var(env_keys::PROJECT_ID, "proj-1");
        let remote = RemoteIdentityConfig::from_env();
        std::env::remove_var(env_keys::API_KEY);
        std::env::remove_var(env_keys::PROJECT_ID);

        assert_eq!(remote.api_key, "key-1");
        assert_eq!(remote.project_id, "proj-1");
        assert_eq!(remote.app_id, "");
        assert!(remote.is_complete());
    }

    #[test]
    fn test_missing_keys() {
        let mut remote = RemoteIdentityConfig::default();
        assert_eq!(remote.missing_keys(), vec!["api_key"]);

        remote.api_key = PLACEHOLDER_API_KEY.to_string();
        assert!(!remote.is_complete());

        remote.api_key = "real".to_string();
        assert!(remote.is_complete());
        assert_eq!(RemoteIdentityConfig::degraded().project_id, "demo-project");
    }

    #[test]
    fn test_generate_example_round_trips() {
        let example = AuthConfig::generate_example().unwrap();
        assert!(example.contains("YOUR_API_KEY"));

        let parsed: AuthConfig = toml::from_str(&example).unwrap();
        assert_eq!(parsed.provider.as_deref(), Some("remote"));
        assert_eq!(parsed.remote.unwrap().project_id, "your-project");
    }

    #[test]
    fn test_storage_open() {
        let temp = TempDir::new().unwrap();
        let store = StorageConfig::file(temp.path().join("sessions"))
            .open()
            .unwrap();
        store.set("k", "v").unwrap();
        assert!(temp.path().join("sessions").join("k.json").exists());

        let memory = StorageConfig::memory().open().unwrap();
        assert_eq!(memory.get("k").unwrap(), None);
    }
}
