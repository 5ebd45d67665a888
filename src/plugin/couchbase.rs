//! Couchbase implementation of the [`Database`] contract.
//!
//! All operations that touch the cluster hold the connection lock from start
//! to finish, so calls on one instance are serialised. `renew_user` and
//! `rotate_root_credentials` never take the lock.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::Instrument;

use super::{Database, StaticUserConfig, Statements};
use crate::cluster::{AuthDomain, ClusterConnector, HttpConnector, User, UserManager, UserSettings};
use crate::connection::ConnectionManager;
use crate::credentials::{CredentialsProducer, TemplateCredentialsProducer, UsernameConfig};
use crate::errors::{Error, Result};
use crate::secrets::SecretString;
use crate::statement;

/// Identifier reported by [`Database::type_name`].
pub const COUCHBASE_TYPE_NAME: &str = "couchbase";

/// Every identity this plugin manages lives in the cluster's local domain.
const AUTH_DOMAIN: AuthDomain = AuthDomain::Local;

/// Dynamic credential manager for a Couchbase cluster.
pub struct Couchbase {
    connections: ConnectionManager,
    producer: Arc<dyn CredentialsProducer>,
}

impl Couchbase {
    /// Manager talking to the cluster's admin REST API with the default
    /// credential policy.
    pub fn new() -> Self {
        Self::with_connector(Arc::new(HttpConnector::new()))
    }

    /// Manager using the given cluster backend.
    pub fn with_connector(connector: Arc<dyn ClusterConnector>) -> Self {
        Self {
            connections: ConnectionManager::new(connector),
            producer: Arc::new(TemplateCredentialsProducer::default()),
        }
    }

    /// Replace the credentials producer.
    pub fn with_producer(mut self, producer: Arc<dyn CredentialsProducer>) -> Self {
        self.producer = producer;
        self
    }

    /// Look up an identity in the local domain.
    pub async fn get_user(&self, username: &str) -> Result<User> {
        let span = crate::credential_span!("get_user", username = %username);
        async move {
            let mut guard = self.connections.lock().await;
            let manager = guard.acquire().await?;

            manager.get_user(AUTH_DOMAIN, username).await.map_err(|e| {
                let message = format!("error looking up user '{}': {}", username, e);
                Error::connection_with_source(message, e)
            })
        }
        .instrument(span)
        .await
    }
}

impl Default for Couchbase {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse the creation statement and create or replace the identity.
///
/// The statement is parsed before the cluster is touched, so a malformed
/// statement never produces a partial identity.
async fn upsert_user(
    manager: &dyn UserManager,
    creation_statement: &str,
    username: String,
    password: String,
) -> Result<(String, String)> {
    let statement = statement::parse(creation_statement)?;

    let settings = UserSettings {
        name: username.clone(),
        password: SecretString::new(password.clone()),
        roles: statement.to_user_roles(),
    };

    if let Err(source) = manager.upsert_user(AUTH_DOMAIN, &username, &settings).await {
        return Err(Error::Upsert { username, source });
    }

    tracing::info!(
        username = %username,
        roles = %settings.roles_param(),
        "Upserted database user"
    );

    Ok((username, password))
}

#[async_trait]
impl Database for Couchbase {
    fn type_name(&self) -> &'static str {
        COUCHBASE_TYPE_NAME
    }

    async fn init(&self, config: Map<String, Value>, verify: bool) -> Result<Map<String, Value>> {
        let span = crate::credential_span!("init", verify = verify);
        async move {
            let mut guard = self.connections.lock().await;
            guard.init(config, verify).await
        }
        .instrument(span)
        .await
    }

    async fn create_user(
        &self,
        statements: &Statements,
        username_config: &UsernameConfig,
        _expiration: DateTime<Utc>,
    ) -> Result<(String, String)> {
        let span = crate::credential_span!("create_user");
        async move {
            let mut guard = self.connections.lock().await;

            let statements = statements.normalized();
            let creation = statements.first_creation().ok_or(Error::EmptyStatement)?;

            let manager = guard.acquire().await?;

            let username = self.producer.generate_username(username_config)?;
            let password = self.producer.generate_password()?;

            upsert_user(manager, creation, username, password).await
        }
        .instrument(span)
        .await
    }

    async fn set_credentials(
        &self,
        statements: &Statements,
        static_user: &StaticUserConfig,
    ) -> Result<(String, String)> {
        let span = crate::credential_span!("set_credentials", username = %static_user.username);
        async move {
            let mut guard = self.connections.lock().await;

            let statements = statements.normalized();
            let creation = statements.first_creation().ok_or(Error::EmptyStatement)?;

            let manager = guard.acquire().await?;

            upsert_user(
                manager,
                creation,
                static_user.username.clone(),
                static_user.password.expose_secret().to_string(),
            )
            .await
        }
        .instrument(span)
        .await
    }

    async fn renew_user(
        &self,
        _statements: &Statements,
        username: &str,
        _expiration: DateTime<Utc>,
    ) -> Result<()> {
        // Couchbase identities carry no expiry.
        let _span = crate::credential_span!("renew_user", username = %username).entered();
        tracing::debug!(username = %username, "Renewal is a no-op for couchbase");
        Ok(())
    }

    async fn revoke_user(&self, _statements: &Statements, username: &str) -> Result<()> {
        let span = crate::credential_span!("revoke_user", username = %username);
        async move {
            let mut guard = self.connections.lock().await;
            let manager = guard.acquire().await?;

            manager
                .remove_user(AUTH_DOMAIN, username)
                .await
                .map(|()| tracing::info!(username = %username, "Revoked database user"))
                .map_err(|source| Error::Revoke { username: username.to_string(), source })
        }
        .instrument(span)
        .await
    }

    async fn rotate_root_credentials(&self, _statements: &[String]) -> Result<Map<String, Value>> {
        let _span = crate::credential_span!("rotate_root_credentials").entered();
        tracing::warn!("Root credential rotation requested but not supported");
        Err(Error::unsupported("root credential rotation"))
    }

    async fn close(&self) -> Result<()> {
        let span = crate::credential_span!("close");
        async move {
            let mut guard = self.connections.lock().await;
            guard.close().await
        }
        .instrument(span)
        .await
    }

    async fn secret_values(&self) -> HashMap<String, String> {
        self.connections.lock().await.secret_values()
    }
}
