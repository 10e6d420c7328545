//! Remote provider tests against a mock identity backend

use parking_lot::Mutex;
use profile_auth::providers::IdentityClient;
use profile_auth::{
    AuthError, AuthProvider, AuthResult, AuthService, AuthUser, MemoryStore, RemoteIdentityConfig,
    RemoteIdentityProvider, SessionStore, StorageConfig,
};
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;
use wiremock::matchers::{body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn remote_config(server: &MockServer) -> RemoteIdentityConfig {
    RemoteIdentityConfig {
        api_key: "test-key".to_string(),
        project_id: "test-project".to_string(),
        identity_base_url: format!("{}/v1", server.uri()),
        token_base_url: format!("{}/token-v1", server.uri()),
        ..Default::default()
    }
}

fn password_response(uid: &str, email: &str, id_token: &str, expires_in: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "kind": "identitytoolkit#VerifyPasswordResponse",
        "localId": uid,
        "email": email,
        "displayName": "",
        "idToken": id_token,
        "refreshToken": format!("refresh-{}", id_token),
        "expiresIn": expires_in,
    }))
}

fn rejection(message: &str) -> ResponseTemplate {
    ResponseTemplate::new(400).set_body_json(json!({
        "error": {
            "code": 400,
            "message": message,
            "errors": [{ "message": message, "domain": "global", "reason": "invalid" }]
        }
    }))
}

async fn mount_lookup(server: &MockServer, email: &str, verified: bool) {
    Mock::given(method("POST"))
        .and(path("/v1/accounts:lookup"))
        .and(query_param("key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "users": [{
                "localId": "uid-1",
                "email": email,
                "emailVerified": verified,
                "displayName": "Alice",
                "createdAt": "1700000000000",
                "lastLoginAt": "1700000500000",
            }]
        })))
        .mount(server)
        .await;
}

async fn initialized_provider(server: &MockServer) -> RemoteIdentityProvider {
    let provider = RemoteIdentityProvider::new(remote_config(server), StorageConfig::memory());
    provider.initialize().await.unwrap();
    provider
}

fn recorder() -> (
    Arc<Mutex<Vec<Option<String>>>>,
    impl Fn(Option<&AuthUser>) + Send + Sync + 'static,
) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    (seen, move |user: Option<&AuthUser>| {
        sink.lock().push(user.map(|u| u.email.clone()))
    })
}

#[tokio::test]
async fn test_sign_up_populates_user_from_lookup() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/accounts:signUp"))
        .and(query_param("key", "test-key"))
        .and(body_string_contains("\"returnSecureToken\":true"))
        .respond_with(password_response("uid-1", "alice@example.com", "id-1", "3600"))
        .expect(1)
        .mount(&server)
        .await;
    mount_lookup(&server, "alice@example.com", false).await;

    let provider = initialized_provider(&server).await;
    let (seen, callback) = recorder();
    let _subscription = provider.on_auth_state_changed(Arc::new(callback));

    let outcome = provider.sign_up("alice@example.com", "secret1").await.unwrap();
    assert!(outcome.error.is_none());

    let user = outcome.user.unwrap();
    assert_eq!(user.uid, "uid-1");
    assert_eq!(user.display_name.as_deref(), Some("Alice"));
    assert!(!user.email_verified);
    assert_eq!(
        user.metadata.created_at.map(|t| t.timestamp()),
        Some(1_700_000_000)
    );
    assert_eq!(provider.current_user(), Some(user));
    assert_eq!(
        *seen.lock(),
        vec![None, Some("alice@example.com".to_string())]
    );

    assert_eq!(
        provider.auth_token(false).await.unwrap().as_deref(),
        Some("id-1")
    );
}

#[tokio::test]
async fn test_duplicate_email_is_a_domain_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/accounts:signUp"))
        .respond_with(rejection("EMAIL_EXISTS"))
        .mount(&server)
        .await;

    let provider = initialized_provider(&server).await;
    let outcome = provider.sign_up("alice@example.com", "secret1").await.unwrap();

    assert!(outcome.user.is_none());
    assert_eq!(
        outcome.error.as_deref(),
        Some("A user with this email address already exists")
    );
    assert!(!provider.is_authenticated());
}

#[tokio::test]
async fn test_weak_password_message_is_translated() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/accounts:signUp"))
        .respond_with(rejection(
            "WEAK_PASSWORD : Password should be at least 6 characters",
        ))
        .mount(&server)
        .await;

    let provider = initialized_provider(&server).await;
    let outcome = provider.sign_up("alice@example.com", "123").await.unwrap();

    assert_eq!(
        outcome.error.as_deref(),
        Some("Password should be at least 6 characters")
    );
}

#[tokio::test]
async fn test_invalid_credentials() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/accounts:signInWithPassword"))
        .respond_with(rejection("INVALID_LOGIN_CREDENTIALS"))
        .mount(&server)
        .await;

    let provider = initialized_provider(&server).await;
    let outcome = provider.sign_in("alice@example.com", "wrong").await.unwrap();

    assert!(outcome.user.is_none());
    assert_eq!(outcome.error.as_deref(), Some("Invalid email or password"));
    assert_eq!(provider.auth_token(false).await.unwrap(), None);
}

#[tokio::test]
async fn test_server_error_is_propagated() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/accounts:signInWithPassword"))
        .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
        .mount(&server)
        .await;

    let provider = initialized_provider(&server).await;
    let result = provider.sign_in("alice@example.com", "secret1").await;

    assert!(matches!(result, Err(AuthError::Network(_))));
    assert!(!provider.is_authenticated());
}

#[tokio::test]
async fn test_lookup_failure_is_not_fatal() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/accounts:signInWithPassword"))
        .respond_with(password_response("uid-1", "alice@example.com", "id-1", "3600"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/accounts:lookup"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let provider = initialized_provider(&server).await;
    let outcome = provider.sign_in("alice@example.com", "secret1").await.unwrap();

    let user = outcome.user.unwrap();
    assert_eq!(user.uid, "uid-1");
    assert_eq!(user.email, "alice@example.com");
    assert!(user.display_name.is_none());
    assert!(user.metadata.created_at.is_none());
    assert!(provider.is_authenticated());
}

#[tokio::test]
async fn test_force_refresh_fetches_new_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/accounts:signInWithPassword"))
        .respond_with(password_response("uid-1", "alice@example.com", "id-1", "3600"))
        .mount(&server)
        .await;
    mount_lookup(&server, "alice@example.com", true).await;
    Mock::given(method("POST"))
        .and(path("/token-v1/token"))
        .and(query_param("key", "test-key"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=refresh-id-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id_token": "id-2",
            "refresh_token": "refresh-id-2",
            "expires_in": "3600",
            "token_type": "Bearer",
            "user_id": "uid-1",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = initialized_provider(&server).await;
    provider.sign_in("alice@example.com", "secret1").await.unwrap();

    assert_eq!(
        provider.auth_token(false).await.unwrap().as_deref(),
        Some("id-1")
    );
    assert_eq!(
        provider.auth_token(true).await.unwrap().as_deref(),
        Some("id-2")
    );
    assert_eq!(
        provider.auth_token(false).await.unwrap().as_deref(),
        Some("id-2")
    );
}

#[tokio::test]
async fn test_token_close_to_expiry_is_refreshed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/accounts:signInWithPassword"))
        .respond_with(password_response("uid-1", "alice@example.com", "id-1", "60"))
        .mount(&server)
        .await;
    mount_lookup(&server, "alice@example.com", true).await;
    Mock::given(method("POST"))
        .and(path("/token-v1/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id_token": "id-2",
            "refresh_token": "refresh-id-2",
            "expires_in": "3600",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = initialized_provider(&server).await;
    provider.sign_in("alice@example.com", "secret1").await.unwrap();

    assert_eq!(
        provider.auth_token(false).await.unwrap().as_deref(),
        Some("id-2")
    );
}

#[tokio::test]
async fn test_rejected_refresh_ends_session() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/accounts:signInWithPassword"))
        .respond_with(password_response("uid-1", "alice@example.com", "id-1", "3600"))
        .mount(&server)
        .await;
    mount_lookup(&server, "alice@example.com", true).await;
    Mock::given(method("POST"))
        .and(path("/token-v1/token"))
        .respond_with(rejection("TOKEN_EXPIRED"))
        .mount(&server)
        .await;

    let provider = initialized_provider(&server).await;
    let (seen, callback) = recorder();
    let _subscription = provider.on_auth_state_changed(Arc::new(callback));
    provider.sign_in("alice@example.com", "secret1").await.unwrap();

    assert_eq!(provider.auth_token(true).await.unwrap(), None);
    assert!(!provider.is_authenticated());
    assert_eq!(
        *seen.lock(),
        vec![None, Some("alice@example.com".to_string()), None]
    );
}

#[tokio::test]
async fn test_session_restored_across_instances() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/accounts:signInWithPassword"))
        .respond_with(password_response("uid-1", "alice@example.com", "id-1", "3600"))
        .mount(&server)
        .await;
    mount_lookup(&server, "alice@example.com", true).await;

    let temp = TempDir::new().unwrap();
    let storage = StorageConfig::file(temp.path());

    let first = RemoteIdentityProvider::new(remote_config(&server), storage.clone());
    first.initialize().await.unwrap();
    let signed_in = first
        .sign_in("alice@example.com", "secret1")
        .await
        .unwrap()
        .user
        .unwrap();

    let second = RemoteIdentityProvider::new(remote_config(&server), storage.clone());
    let (seen, callback) = recorder();
    let _subscription = second.on_auth_state_changed(Arc::new(callback));
    second.initialize().await.unwrap();

    assert_eq!(second.current_user(), Some(signed_in));
    assert_eq!(
        second.auth_token(false).await.unwrap().as_deref(),
        Some("id-1")
    );
    assert_eq!(
        *seen.lock(),
        vec![None, Some("alice@example.com".to_string())]
    );

    second.sign_out().await.unwrap();
    let third = RemoteIdentityProvider::new(remote_config(&server), storage);
    third.initialize().await.unwrap();
    assert!(third.current_user().is_none());
}

#[tokio::test]
async fn test_corrupt_persisted_session_is_discarded() {
    let server = MockServer::start().await;
    let temp = TempDir::new().unwrap();
    std::fs::write(temp.path().join("identity_session_test-key.json"), "{broken").unwrap();

    let provider =
        RemoteIdentityProvider::new(remote_config(&server), StorageConfig::file(temp.path()));
    provider.initialize().await.unwrap();

    assert!(!provider.is_authenticated());
    assert!(!temp.path().join("identity_session_test-key.json").exists());
}

#[tokio::test]
async fn test_unreadable_persisted_session_is_discarded() {
    let server = MockServer::start().await;
    let temp = TempDir::new().unwrap();
    let session_file = temp.path().join("identity_session_test-key.json");
    std::fs::write(&session_file, [0xff, 0xfe, 0x00]).unwrap();

    let provider =
        RemoteIdentityProvider::new(remote_config(&server), StorageConfig::file(temp.path()));
    provider.initialize().await.unwrap();

    assert!(!provider.is_authenticated());
    assert!(!session_file.exists());
    assert!(provider.sign_out().await.unwrap().error.is_none());
}

#[tokio::test]
async fn test_oversized_token_lifetime_is_clamped() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/accounts:signInWithPassword"))
        .respond_with(password_response(
            "uid-1",
            "alice@example.com",
            "id-1",
            "9223372036854775807",
        ))
        .mount(&server)
        .await;
    mount_lookup(&server, "alice@example.com", true).await;
    Mock::given(method("POST"))
        .and(path("/token-v1/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id_token": "id-2",
            "refresh_token": "refresh-id-2",
            "expires_in": "-9223372036854775808",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = initialized_provider(&server).await;
    let outcome = provider.sign_in("alice@example.com", "secret1").await.unwrap();
    assert!(outcome.is_success());
    assert_eq!(
        provider.auth_token(false).await.unwrap().as_deref(),
        Some("id-1")
    );

    assert_eq!(
        provider.auth_token(true).await.unwrap().as_deref(),
        Some("id-2")
    );
}

#[tokio::test]
async fn test_listener_observes_updated_current_user() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/accounts:signInWithPassword"))
        .respond_with(password_response("uid-1", "alice@example.com", "id-1", "3600"))
        .mount(&server)
        .await;
    mount_lookup(&server, "alice@example.com", true).await;

    let provider = Arc::new(initialized_provider(&server).await);
    let observed = Arc::new(Mutex::new(Vec::new()));

    let weak = Arc::downgrade(&provider);
    let sink = observed.clone();
    let _subscription = provider.on_auth_state_changed(Arc::new(move |user: Option<&AuthUser>| {
        if let Some(provider) = weak.upgrade() {
            sink.lock().push(provider.current_user().as_ref() == user);
        }
    }));

    provider.sign_in("alice@example.com", "secret1").await.unwrap();
    provider.sign_out().await.unwrap();

    assert_eq!(*observed.lock(), vec![true, true, true]);
}

/// Store whose removals always fail
#[derive(Default)]
struct StickyStore {
    inner: MemoryStore,
}

impl SessionStore for StickyStore {
    fn get(&self, key: &str) -> AuthResult<Option<String>> {
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> AuthResult<()> {
        self.inner.set(key, value)
    }

    fn remove(&self, _key: &str) -> AuthResult<()> {
        Err(AuthError::Storage("disk".to_string()))
    }
}

#[tokio::test]
async fn test_sign_out_notifies_even_when_store_removal_fails() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/accounts:signInWithPassword"))
        .respond_with(password_response("uid-1", "alice@example.com", "id-1", "3600"))
        .mount(&server)
        .await;
    mount_lookup(&server, "alice@example.com", true).await;

    let client = IdentityClient::new(remote_config(&server)).unwrap();
    client
        .set_persistence(Arc::new(StickyStore::default()))
        .unwrap();
    let (seen, callback) = recorder();
    let _subscription = client.on_state_changed(Arc::new(callback));

    client.sign_in("alice@example.com", "secret1").await.unwrap();
    assert_eq!(
        client.sign_out().await,
        Err(AuthError::Storage("disk".to_string()))
    );

    assert!(client.current_user().is_none());
    assert_eq!(
        *seen.lock(),
        vec![None, Some("alice@example.com".to_string()), None]
    );
}

#[tokio::test]
async fn test_sign_out_is_idempotent() {
    let server = MockServer::start().await;
    let provider = initialized_provider(&server).await;

    let (seen, callback) = recorder();
    let _subscription = provider.on_auth_state_changed(Arc::new(callback));

    assert!(provider.sign_out().await.unwrap().error.is_none());
    assert!(provider.sign_out().await.unwrap().error.is_none());
    assert_eq!(*seen.lock(), vec![None]);
}

#[tokio::test]
async fn test_failed_initialization_keeps_provider_usable() {
    let config = RemoteIdentityConfig {
        api_key: "test-key".to_string(),
        identity_base_url: "not a url".to_string(),
        ..Default::default()
    };
    let provider = RemoteIdentityProvider::new(config, StorageConfig::memory());

    assert!(matches!(
        provider.initialize().await,
        Err(AuthError::Config(_))
    ));
    assert!(provider.current_user().is_none());
    assert!(provider.sign_out().await.unwrap().error.is_none());
    assert_eq!(provider.auth_token(false).await.unwrap(), None);
}

#[tokio::test]
async fn test_service_with_remote_provider() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/accounts:signInWithPassword"))
        .respond_with(password_response("uid-1", "alice@example.com", "id-1", "3600"))
        .mount(&server)
        .await;
    mount_lookup(&server, "alice@example.com", true).await;

    let config = profile_auth::AuthConfig::remote(remote_config(&server))
        .with_storage(StorageConfig::memory());
    let service = AuthService::new(config);
    service.initialize().await.unwrap();

    assert_eq!(
        service.provider_kind(),
        Some(profile_auth::ProviderKind::Remote)
    );
    let outcome = service.sign_in("alice@example.com", "secret1").await.unwrap();
    assert!(outcome.user.unwrap().email_verified);
    assert!(service.is_authenticated());
    assert_eq!(
        service.auth_token(false).await.unwrap().as_deref(),
        Some("id-1")
    );
}
