//! In-process cluster backend.
//!
//! Keeps RBAC users in memory and enforces the same preconditions as a real
//! cluster: the endpoint must be reachable, the admin credentials must match
//! and the bucket must exist. Used by the test suites and by the CLI's
//! `--dry-run` mode.
//!
//! Call counters let tests observe what the lifecycle manager did, including
//! the maximum number of RBAC calls that were ever in flight at once.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use super::error::{ClusterError, Result};
use super::types::{AuthDomain, ConnectionSettings, User, UserSettings};
use super::{ClusterConnection, ClusterConnector, UserManager};
use crate::secrets::SecretString;

#[derive(Debug, Clone)]
struct StoredUser {
    name: String,
    password: SecretString,
    roles: Vec<super::types::UserRole>,
}

#[derive(Debug, Default)]
struct ClusterState {
    admin_username: String,
    admin_password: SecretString,
    buckets: HashSet<String>,
    users: HashMap<(AuthDomain, String), StoredUser>,
}

#[derive(Debug, Default)]
struct Shared {
    state: Mutex<ClusterState>,
    reachable: AtomicBool,
    close_fails: AtomicBool,
    latency_ms: AtomicU64,
    connections_opened: AtomicUsize,
    connections_closed: AtomicUsize,
    upsert_calls: AtomicUsize,
    remove_calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, ClusterState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Marks one RBAC call as in flight for as long as it lives.
struct InFlight<'a>(&'a Shared);

impl<'a> InFlight<'a> {
    fn enter(shared: &'a Shared) -> Self {
        let now = shared.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        shared.max_in_flight.fetch_max(now, Ordering::SeqCst);
        Self(shared)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// An in-memory cluster. Clones share the same state.
#[derive(Debug, Clone)]
pub struct InMemoryCluster {
    shared: Arc<Shared>,
}

impl InMemoryCluster {
    /// Create a reachable cluster administered by the given identity.
    pub fn new(admin_username: impl Into<String>, admin_password: impl Into<String>) -> Self {
        let shared = Shared {
            state: Mutex::new(ClusterState {
                admin_username: admin_username.into(),
                admin_password: SecretString::new(admin_password),
                ..Default::default()
            }),
            reachable: AtomicBool::new(true),
            ..Default::default()
        };
        Self { shared: Arc::new(shared) }
    }

    /// Add a bucket that connections may open.
    pub fn with_bucket(self, bucket: impl Into<String>) -> Self {
        self.shared.state().buckets.insert(bucket.into());
        self
    }

    /// Delay every RBAC call, to widen race windows in concurrency tests.
    pub fn with_latency(self, latency: Duration) -> Self {
        self.shared.latency_ms.store(latency.as_millis() as u64, Ordering::SeqCst);
        self
    }

    /// Make subsequent connection attempts fail (or succeed again).
    pub fn set_reachable(&self, reachable: bool) {
        self.shared.reachable.store(reachable, Ordering::SeqCst);
    }

    /// Make closing a connection fail (or succeed again).
    pub fn set_close_fails(&self, fails: bool) {
        self.shared.close_fails.store(fails, Ordering::SeqCst);
    }

    /// Change the admin password the cluster accepts.
    pub fn set_admin_password(&self, password: impl Into<String>) {
        self.shared.state().admin_password = SecretString::new(password);
    }

    /// Look up a user without going through a connection.
    pub fn user(&self, domain: AuthDomain, username: &str) -> Option<User> {
        self.shared.state().users.get(&(domain, username.to_string())).map(|stored| User {
            id: username.to_string(),
            name: stored.name.clone(),
            domain,
            roles: stored.roles.clone(),
        })
    }

    /// True if a local user exists with exactly this password.
    pub fn check_password(&self, username: &str, password: &str) -> bool {
        self.shared
            .state()
            .users
            .get(&(AuthDomain::Local, username.to_string()))
            .is_some_and(|u| u.password.expose_secret() == password)
    }

    pub fn user_count(&self) -> usize {
        self.shared.state().users.len()
    }

    pub fn connections_opened(&self) -> usize {
        self.shared.connections_opened.load(Ordering::SeqCst)
    }

    pub fn connections_closed(&self) -> usize {
        self.shared.connections_closed.load(Ordering::SeqCst)
    }

    pub fn upsert_calls(&self) -> usize {
        self.shared.upsert_calls.load(Ordering::SeqCst)
    }

    pub fn remove_calls(&self) -> usize {
        self.shared.remove_calls.load(Ordering::SeqCst)
    }

    /// Highest number of RBAC calls observed running concurrently.
    pub fn max_in_flight(&self) -> usize {
        self.shared.max_in_flight.load(Ordering::SeqCst)
    }

    async fn simulate_latency(&self) {
        let millis = self.shared.latency_ms.load(Ordering::SeqCst);
        if millis > 0 {
            tokio::time::sleep(Duration::from_millis(millis)).await;
        }
    }
}

#[async_trait]
impl ClusterConnector for InMemoryCluster {
    async fn connect(&self, settings: &ConnectionSettings) -> Result<Box<dyn ClusterConnection>> {
        if !self.shared.reachable.load(Ordering::SeqCst) {
            return Err(ClusterError::Transport(format!(
                "could not reach {}: connection refused",
                settings.connection_string
            )));
        }

        self.shared.connections_opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(InMemoryConnection {
            cluster: self.clone(),
            authenticated: false,
            closed: false,
        }))
    }
}

struct InMemoryConnection {
    cluster: InMemoryCluster,
    authenticated: bool,
    closed: bool,
}

#[async_trait]
impl ClusterConnection for InMemoryConnection {
    async fn authenticate(&mut self, username: &str, password: &SecretString) -> Result<()> {
        if self.closed {
            return Err(ClusterError::Closed);
        }

        let state = self.cluster.shared.state();
        if state.admin_username != username || &state.admin_password != password {
            return Err(ClusterError::authentication(format!(
                "cluster refused credentials for '{}'",
                username
            )));
        }
        drop(state);

        self.authenticated = true;
        Ok(())
    }

    async fn open_bucket(&mut self, bucket: &str) -> Result<()> {
        if self.closed {
            return Err(ClusterError::Closed);
        }
        if !self.authenticated {
            return Err(ClusterError::authentication("connection is not authenticated"));
        }
        if !self.cluster.shared.state().buckets.contains(bucket) {
            return Err(ClusterError::bucket_unavailable(bucket, "bucket does not exist"));
        }
        Ok(())
    }

    fn manager(&self, username: &str, _password: &SecretString) -> Box<dyn UserManager> {
        Box::new(InMemoryUserManager {
            cluster: self.cluster.clone(),
            acting_as: username.to_string(),
        })
    }

    async fn close(&mut self) -> Result<()> {
        if self.cluster.shared.close_fails.load(Ordering::SeqCst) {
            return Err(ClusterError::Transport("connection reset while closing".to_string()));
        }
        if !self.closed {
            self.closed = true;
            self.cluster.shared.connections_closed.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

struct InMemoryUserManager {
    cluster: InMemoryCluster,
    acting_as: String,
}

#[async_trait]
impl UserManager for InMemoryUserManager {
    async fn upsert_user(
        &self,
        domain: AuthDomain,
        username: &str,
        settings: &UserSettings,
    ) -> Result<()> {
        let _in_flight = InFlight::enter(&self.cluster.shared);
        self.cluster.shared.upsert_calls.fetch_add(1, Ordering::SeqCst);
        self.cluster.simulate_latency().await;

        if settings.roles.is_empty() {
            return Err(ClusterError::rejected(400, "{\"errors\":{\"roles\":\"required\"}}"));
        }

        let stored = StoredUser {
            name: settings.name.clone(),
            password: settings.password.clone(),
            roles: settings.roles.clone(),
        };
        self.cluster.shared.state().users.insert((domain, username.to_string()), stored);

        tracing::trace!(acting_as = %self.acting_as, username = %username, "in-memory upsert");
        Ok(())
    }

    async fn remove_user(&self, domain: AuthDomain, username: &str) -> Result<()> {
        let _in_flight = InFlight::enter(&self.cluster.shared);
        self.cluster.shared.remove_calls.fetch_add(1, Ordering::SeqCst);
        self.cluster.simulate_latency().await;

        match self.cluster.shared.state().users.remove(&(domain, username.to_string())) {
            Some(_) => Ok(()),
            None => Err(ClusterError::unknown_user(username)),
        }
    }

    async fn get_user(&self, domain: AuthDomain, username: &str) -> Result<User> {
        self.cluster.user(domain, username).ok_or_else(|| ClusterError::unknown_user(username))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::UserRole;

    async fn manager(cluster: &InMemoryCluster) -> Box<dyn UserManager> {
        let mut conn =
            cluster.connect(&ConnectionSettings::new("couchbase://localhost")).await.unwrap();
        let password = SecretString::new("pw");
        conn.authenticate("admin", &password).await.unwrap();
        conn.open_bucket("Test").await.unwrap();
        conn.manager("admin", &password)
    }

    #[tokio::test]
    async fn test_upsert_replaces_roles() {
        let cluster = InMemoryCluster::new("admin", "pw").with_bucket("Test");
        let manager = manager(&cluster).await;

        let first = UserSettings {
            name: "u".into(),
            password: "one".into(),
            roles: vec![UserRole::new("data_reader", "Test"), UserRole::new("admin", "")],
        };
        manager.upsert_user(AuthDomain::Local, "u", &first).await.unwrap();

        let second = UserSettings {
            name: "u".into(),
            password: "two".into(),
            roles: vec![UserRole::new("data_writer", "Test")],
        };
        manager.upsert_user(AuthDomain::Local, "u", &second).await.unwrap();

        let user = cluster.user(AuthDomain::Local, "u").unwrap();
        assert_eq!(user.roles, vec![UserRole::new("data_writer", "Test")]);
        assert!(cluster.check_password("u", "two"));
        assert!(!cluster.check_password("u", "one"));
        assert_eq!(cluster.user_count(), 1);
    }

    #[tokio::test]
    async fn test_remove_unknown_user_fails() {
        let cluster = InMemoryCluster::new("admin", "pw").with_bucket("Test");
        let manager = manager(&cluster).await;

        let err = manager.remove_user(AuthDomain::Local, "ghost").await.unwrap_err();
        assert!(err.is_unknown_user());
    }

    #[tokio::test]
    async fn test_connection_preconditions() {
        let cluster = InMemoryCluster::new("admin", "pw").with_bucket("Test");
        let settings = ConnectionSettings::new("couchbase://localhost");

        let mut conn = cluster.connect(&settings).await.unwrap();
        assert!(conn.open_bucket("Test").await.is_err());
        assert!(conn.authenticate("admin", &"wrong".into()).await.is_err());
        conn.authenticate("admin", &"pw".into()).await.unwrap();
        assert!(matches!(
            conn.open_bucket("Missing").await,
            Err(ClusterError::BucketUnavailable { .. })
        ));

        conn.close().await.unwrap();
        conn.close().await.unwrap();
        assert_eq!(cluster.connections_closed(), 1);

        cluster.set_reachable(false);
        assert!(matches!(cluster.connect(&settings).await, Err(ClusterError::Transport(_))));
    }
}
