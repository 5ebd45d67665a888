//! Lazily established administrative connection.
//!
//! [`ConnectionManager`] owns the configuration and the (at most one) live
//! connection behind a single async mutex. The only way to reach that state is
//! [`ConnectionManager::lock`], which returns a [`ConnectionGuard`]; holding the
//! guard is the proof of exclusive access that `acquire` and `close` need.
//! Callers keep the guard for the whole of an operation, network round-trips
//! included, so credential operations on one instance never interleave.
//!
//! The lock is a `tokio::sync::Mutex`: waiting for it is cancel-safe, so a
//! host that drops an operation's future (deadline, cancellation) leaves the
//! state untouched.

use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};

use crate::cluster::{ClusterConnection, ClusterConnector, ConnectionSettings, UserManager};
use crate::config::ConnectionConfig;
use crate::errors::{Error, Result};
use crate::secrets::scrub;

/// Placeholder substituted for the admin password in error messages.
pub const PASSWORD_PLACEHOLDER: &str = "[password]";

/// A live admin session and the user manager derived from it.
struct LiveConnection {
    cluster: Box<dyn ClusterConnection>,
    manager: Box<dyn UserManager>,
}

#[derive(Default)]
struct ConnectionState {
    config: ConnectionConfig,
    raw_config: Map<String, Value>,
    initialized: bool,
    connection: Option<LiveConnection>,
}

/// Owner of the configuration and the cached admin connection.
pub struct ConnectionManager {
    connector: Arc<dyn ClusterConnector>,
    state: Mutex<ConnectionState>,
}

impl ConnectionManager {
    pub fn new(connector: Arc<dyn ClusterConnector>) -> Self {
        Self { connector, state: Mutex::new(ConnectionState::default()) }
    }

    /// Wait for exclusive access to the configuration and connection.
    pub async fn lock(&self) -> ConnectionGuard<'_> {
        ConnectionGuard { state: self.state.lock().await, connector: self.connector.as_ref() }
    }
}

/// Exclusive access to the connection state, held for a whole operation.
pub struct ConnectionGuard<'a> {
    state: MutexGuard<'a, ConnectionState>,
    connector: &'a dyn ClusterConnector,
}

impl ConnectionGuard<'_> {
    /// Decode, validate and store a new configuration.
    ///
    /// A cached connection built from the previous configuration is dropped.
    /// With `verify`, a connection is established immediately and any failure
    /// is returned wrapped as a connection error.
    pub async fn init(&mut self, raw: Map<String, Value>, verify: bool) -> Result<Map<String, Value>> {
        let config = ConnectionConfig::from_raw(&raw)?;
        config.validate()?;

        if self.state.connection.is_some() {
            if let Err(e) = self.close().await {
                tracing::warn!(
                    error = %self.redact(&e.to_string()),
                    "Failed to close connection from previous configuration"
                );
            }
        }

        self.state.config = config;
        self.state.raw_config = raw.clone();
        self.state.initialized = true;

        tracing::info!(
            connection_string = %self.redact(&self.state.config.connection_string),
            username = %self.state.config.username,
            bucket = %self.state.config.bucket,
            verify,
            "Connection configuration initialized"
        );

        if verify {
            if let Err(e) = self.acquire().await {
                let message = format!("error verifying connection: {}", e);
                let source = match e {
                    Error::Connection { source, .. } => source,
                    _ => None,
                };
                return Err(Error::Connection { message, source });
            }
        }

        Ok(raw)
    }

    pub fn is_initialized(&self) -> bool {
        self.state.initialized
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.state.config
    }

    pub fn raw_config(&self) -> &Map<String, Value> {
        &self.state.raw_config
    }

    /// True while a connection is cached.
    pub fn is_connected(&self) -> bool {
        self.state.connection.is_some()
    }

    /// Secret values mapped to the placeholder that replaces them in messages.
    pub fn secret_values(&self) -> HashMap<String, String> {
        let mut secrets = HashMap::new();
        let password = self.state.config.password.expose_secret();
        if !password.is_empty() {
            secrets.insert(password.to_string(), PASSWORD_PLACEHOLDER.to_string());
        }
        secrets
    }

    /// Replace every secret value in `text` with its placeholder. Log fields
    /// built from the connection string or cluster errors go through here.
    pub fn redact(&self, text: &str) -> String {
        scrub(text, &self.secret_values())
    }

    /// Return the user manager of the cached connection, connecting first if
    /// there is none.
    ///
    /// Connecting runs connect, authenticate, open bucket and derive manager
    /// in order. A failure at any step discards the half-built connection.
    pub async fn acquire(&mut self) -> Result<&dyn UserManager> {
        if !self.state.initialized {
            return Err(Error::NotInitialized);
        }

        if self.state.connection.is_none() {
            let live = self.connect().await?;
            self.state.connection = Some(live);
        }

        match self.state.connection.as_ref() {
            Some(live) => Ok(live.manager.as_ref()),
            None => Err(Error::internal("connection missing after connect")),
        }
    }

    async fn connect(&self) -> Result<LiveConnection> {
        let config = &self.state.config;
        let settings = ConnectionSettings::new(&config.connection_string);

        let mut cluster = self.connector.connect(&settings).await.map_err(|e| {
            Error::connection_with_source(
                format!("could not connect to {}: {}", config.connection_string, e),
                e,
            )
        })?;

        if let Err(e) = cluster.authenticate(&config.username, &config.password).await {
            self.discard(cluster).await;
            return Err(Error::connection_with_source(
                format!("could not authenticate as {}: {}", config.username, e),
                e,
            ));
        }

        if let Err(e) = cluster.open_bucket(&config.bucket).await {
            self.discard(cluster).await;
            return Err(Error::connection_with_source(
                format!("could not open bucket {}: {}", config.bucket, e),
                e,
            ));
        }

        let manager = cluster.manager(&config.username, &config.password);

        tracing::info!(
            connection_string = %self.redact(&config.connection_string),
            bucket = %config.bucket,
            "Established administrative connection"
        );

        Ok(LiveConnection { cluster, manager })
    }

    async fn discard(&self, mut cluster: Box<dyn ClusterConnection>) {
        if let Err(e) = cluster.close().await {
            tracing::debug!(
                error = %self.redact(&e.to_string()),
                "Failed to close partially established connection"
            );
        }
    }

    /// Close the cached connection, if any. The cached reference is cleared
    /// even when closing fails.
    pub async fn close(&mut self) -> Result<()> {
        let Some(mut live) = self.state.connection.take() else {
            return Ok(());
        };

        live.cluster.close().await.map_err(|e| {
            Error::connection_with_source(format!("error closing connection: {}", e), e)
        })?;

        tracing::debug!("Closed administrative connection");
        Ok(())
    }
}
