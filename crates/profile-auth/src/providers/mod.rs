//! Authentication provider implementations

pub mod identity_client;
pub mod mock;
pub mod remote;

pub use identity_client::IdentityClient;
pub use mock::LocalMockProvider;
pub use remote::RemoteIdentityProvider;
