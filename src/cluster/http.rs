//! Couchbase admin REST backend.
//!
//! Implements the cluster seam over the management port (8091, or 18091 for
//! TLS). RBAC users live under `/settings/rbac/users/{domain}/{name}`.
//!
//! # Connection strings
//!
//! | Connection string           | Admin endpoint              |
//! |-----------------------------|-----------------------------|
//! | `couchbase://db1,db2`       | `http://db1:8091/`          |
//! | `couchbases://db1`          | `https://db1:18091/`        |
//! | `db1`                       | `http://db1:8091/`          |
//! | `http://127.0.0.1:9000`     | used verbatim               |
//!
//! Query parameters and userinfo are ignored and the first listed host is
//! used. Credentials always come from the connection configuration.

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use url::Url;

use super::error::{ClusterError, Result};
use super::types::{AuthDomain, ConnectionSettings, User, UserSettings};
use super::{ClusterConnection, ClusterConnector, UserManager};
use crate::secrets::SecretString;

const MANAGEMENT_PORT: u16 = 8091;
const MANAGEMENT_TLS_PORT: u16 = 18091;

/// Resolve a Couchbase connection string to the admin REST base URL.
pub fn admin_endpoint(connection_string: &str) -> Result<Url> {
    let trimmed = connection_string.trim();
    if trimmed.is_empty() {
        return Err(ClusterError::invalid_connection_string(connection_string, "empty"));
    }

    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        let mut url = Url::parse(trimmed).map_err(|e| {
            ClusterError::invalid_connection_string(connection_string, e.to_string())
        })?;
        // Both only fail for URLs that cannot carry credentials.
        let _ = url.set_username("");
        let _ = url.set_password(None);
        return Ok(url);
    }

    let (scheme, port, rest) = if let Some(rest) = trimmed.strip_prefix("couchbases://") {
        ("https", MANAGEMENT_TLS_PORT, rest)
    } else if let Some(rest) = trimmed.strip_prefix("couchbase://") {
        ("http", MANAGEMENT_PORT, rest)
    } else if trimmed.contains("://") {
        return Err(ClusterError::invalid_connection_string(
            connection_string,
            "unsupported scheme",
        ));
    } else {
        ("http", MANAGEMENT_PORT, trimmed)
    };

    let hosts = rest.split(['/', '?']).next().unwrap_or_default();
    let hosts = hosts.rsplit_once('@').map_or(hosts, |(_, hosts)| hosts);
    let host = hosts.split(',').map(str::trim).find(|h| !h.is_empty()).ok_or_else(|| {
        ClusterError::invalid_connection_string(connection_string, "no host given")
    })?;

    // Data-service ports in couchbase:// strings do not apply to the management API.
    let host = strip_port(host);

    Url::parse(&format!("{}://{}:{}/", scheme, host, port))
        .map_err(|e| ClusterError::invalid_connection_string(connection_string, e.to_string()))
}

fn strip_port(host: &str) -> &str {
    if host.starts_with('[') {
        return match host.find(']') {
            Some(end) => &host[..=end],
            None => host,
        };
    }
    match host.rsplit_once(':') {
        Some((name, port)) if port.chars().all(|c| c.is_ascii_digit()) => name,
        _ => host,
    }
}

fn endpoint(base: &Url, segments: &[&str]) -> Result<Url> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| ClusterError::invalid_connection_string(base.as_str(), "cannot be a base URL"))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

async fn rejected(response: Response) -> ClusterError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    ClusterError::rejected(status, body)
}

/// Connector for the Couchbase admin REST API.
#[derive(Debug, Clone, Default)]
pub struct HttpConnector;

impl HttpConnector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ClusterConnector for HttpConnector {
    async fn connect(&self, settings: &ConnectionSettings) -> Result<Box<dyn ClusterConnection>> {
        let base_url = admin_endpoint(&settings.connection_string)?;

        // No total request timeout: RBAC calls may take as long as the cluster needs.
        let client = Client::builder()
            .connect_timeout(settings.server_connect_timeout)
            .build()
            .map_err(|e| ClusterError::Transport(format!("failed to build HTTP client: {}", e)))?;

        let pools = client.get(endpoint(&base_url, &["pools"])?).send();
        let response = tokio::time::timeout(settings.connect_timeout, pools).await.map_err(|_| {
            ClusterError::Transport(format!(
                "timed out after {:?} reaching {}",
                settings.connect_timeout, base_url
            ))
        })??;
        if !response.status().is_success() {
            return Err(rejected(response).await);
        }

        tracing::debug!(endpoint = %base_url, "Reached cluster management endpoint");

        Ok(Box::new(HttpConnection { client, base_url, admin: None, closed: false }))
    }
}

/// Session with the admin REST API.
pub struct HttpConnection {
    client: Client,
    base_url: Url,
    admin: Option<(String, SecretString)>,
    closed: bool,
}

impl HttpConnection {
    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            Err(ClusterError::Closed)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ClusterConnection for HttpConnection {
    async fn authenticate(&mut self, username: &str, password: &SecretString) -> Result<()> {
        self.ensure_open()?;

        let response = self
            .client
            .get(endpoint(&self.base_url, &["pools", "default"])?)
            .basic_auth(username, Some(password.expose_secret()))
            .send()
            .await?;

        match response.status() {
            s if s.is_success() => {
                self.admin = Some((username.to_string(), password.clone()));
                Ok(())
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(ClusterError::authentication(
                format!("cluster refused credentials for '{}' ({})", username, response.status()),
            )),
            _ => Err(rejected(response).await),
        }
    }

    async fn open_bucket(&mut self, bucket: &str) -> Result<()> {
        self.ensure_open()?;

        if bucket.is_empty() {
            return Err(ClusterError::bucket_unavailable(bucket, "bucket name is empty"));
        }

        let (username, password) = self
            .admin
            .as_ref()
            .ok_or_else(|| ClusterError::authentication("connection is not authenticated"))?;

        let response = self
            .client
            .get(endpoint(&self.base_url, &["pools", "default", "buckets", bucket])?)
            .basic_auth(username, Some(password.expose_secret()))
            .send()
            .await?;

        match response.status() {
            s if s.is_success() => Ok(()),
            StatusCode::NOT_FOUND => {
                Err(ClusterError::bucket_unavailable(bucket, "bucket does not exist"))
            }
            _ => Err(rejected(response).await),
        }
    }

    fn manager(&self, username: &str, password: &SecretString) -> Box<dyn UserManager> {
        Box::new(HttpUserManager {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            username: username.to_string(),
            password: password.clone(),
        })
    }

    async fn close(&mut self) -> Result<()> {
        self.closed = true;
        self.admin = None;
        Ok(())
    }
}

/// RBAC calls against `/settings/rbac/users`.
pub struct HttpUserManager {
    client: Client,
    base_url: Url,
    username: String,
    password: SecretString,
}

impl HttpUserManager {
    fn user_url(&self, domain: AuthDomain, username: &str) -> Result<Url> {
        endpoint(&self.base_url, &["settings", "rbac", "users", domain.as_str(), username])
    }
}

#[async_trait]
impl UserManager for HttpUserManager {
    async fn upsert_user(
        &self,
        domain: AuthDomain,
        username: &str,
        settings: &UserSettings,
    ) -> Result<()> {
        let roles = settings.roles_param();
        let form = [
            ("name", settings.name.as_str()),
            ("password", settings.password.expose_secret()),
            ("roles", roles.as_str()),
        ];

        let response = self
            .client
            .put(self.user_url(domain, username)?)
            .basic_auth(&self.username, Some(self.password.expose_secret()))
            .form(&form)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(rejected(response).await);
        }

        tracing::debug!(username = %username, domain = %domain, "Upserted RBAC user");
        Ok(())
    }

    async fn remove_user(&self, domain: AuthDomain, username: &str) -> Result<()> {
        let response = self
            .client
            .delete(self.user_url(domain, username)?)
            .basic_auth(&self.username, Some(self.password.expose_secret()))
            .send()
            .await?;

        match response.status() {
            s if s.is_success() => {
                tracing::debug!(username = %username, domain = %domain, "Removed RBAC user");
                Ok(())
            }
            StatusCode::NOT_FOUND => Err(ClusterError::unknown_user(username)),
            _ => Err(rejected(response).await),
        }
    }

    async fn get_user(&self, domain: AuthDomain, username: &str) -> Result<User> {
        let response = self
            .client
            .get(self.user_url(domain, username)?)
            .basic_auth(&self.username, Some(self.password.expose_secret()))
            .send()
            .await?;

        match response.status() {
            s if s.is_success() => Ok(response.json::<User>().await?),
            StatusCode::NOT_FOUND => Err(ClusterError::unknown_user(username)),
            _ => Err(rejected(response).await),
        }
    }
}
