//! Outbound seam to the target Couchbase cluster.
//!
//! The administrative session is modelled in three steps, mirroring how a
//! Couchbase SDK exposes it:
//!
//! 1. [`ClusterConnector::connect`] reaches the cluster and returns a
//!    [`ClusterConnection`].
//! 2. The connection is authenticated and the configured bucket is opened.
//!    Servers older than 5.5 refuse cluster-level administrative calls until a
//!    bucket has been opened on the connection.
//! 3. [`ClusterConnection::manager`] derives a [`UserManager`] scoped to the
//!    admin identity, which performs the RBAC calls.
//!
//! Two backends ship with the crate: [`http::HttpConnector`] talks to the
//! cluster's admin REST API, and [`memory::InMemoryCluster`] keeps identities
//! in process for tests and dry runs.

pub mod error;
pub mod http;
pub mod memory;
pub mod types;

pub use error::{ClusterError, Result};
pub use http::HttpConnector;
pub use memory::InMemoryCluster;
pub use types::{
    AuthDomain, ConnectionSettings, User, UserRole, UserSettings, CONNECT_TIMEOUT,
    SERVER_CONNECT_TIMEOUT,
};

use async_trait::async_trait;

use crate::secrets::SecretString;

/// Opens administrative connections to a cluster.
#[async_trait]
pub trait ClusterConnector: Send + Sync {
    /// Reach the cluster named by the connection string.
    ///
    /// Implementations must bound the attempt by the timeouts in `settings`.
    async fn connect(&self, settings: &ConnectionSettings) -> Result<Box<dyn ClusterConnection>>;
}

/// A live, exclusively owned session with the cluster.
#[async_trait]
pub trait ClusterConnection: Send + Sync {
    /// Authenticate the session with admin credentials.
    async fn authenticate(&mut self, username: &str, password: &SecretString) -> Result<()>;

    /// Open a bucket on the session.
    async fn open_bucket(&mut self, bucket: &str) -> Result<()>;

    /// Derive a user manager acting as the given identity.
    fn manager(&self, username: &str, password: &SecretString) -> Box<dyn UserManager>;

    /// Release the session. Further calls on it fail with [`ClusterError::Closed`].
    async fn close(&mut self) -> Result<()>;
}

/// RBAC user administration.
#[async_trait]
pub trait UserManager: Send + Sync {
    /// Create the identity, or replace its password and role set if it exists.
    async fn upsert_user(
        &self,
        domain: AuthDomain,
        username: &str,
        settings: &UserSettings,
    ) -> Result<()>;

    /// Remove the identity. Fails with [`ClusterError::UnknownUser`] if absent.
    async fn remove_user(&self, domain: AuthDomain, username: &str) -> Result<()>;

    /// Look up an identity.
    async fn get_user(&self, domain: AuthDomain, username: &str) -> Result<User>;
}
