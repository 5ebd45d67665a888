//! # Database Plugin Contract
//!
//! The interface a secrets-management host drives to issue and revoke
//! short-lived identities, plus the Couchbase implementation and a
//! secret-scrubbing wrapper.
//!
//! ```rust,ignore
//! use couchbase_dbplugin::plugin::{Couchbase, Database, SanitizedDatabase};
//!
//! let db = SanitizedDatabase::new(Couchbase::new());
//! db.init(raw_config, true).await?;
//! let (username, password) = db.create_user(&statements, &username_config, expiration).await?;
//! ```

pub mod couchbase;
pub mod sanitize;

pub use crate::credentials::UsernameConfig;
pub use couchbase::{Couchbase, COUCHBASE_TYPE_NAME};
pub use sanitize::{scrub, SanitizedDatabase};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::errors::Result;
use crate::secrets::SecretString;

/// Statements supplied by the host with each request.
///
/// The single-string fields are the deprecated form of the lists. Call
/// [`Statements::normalized`] before reading the lists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statements {
    #[serde(default)]
    pub creation: Vec<String>,
    #[serde(default)]
    pub revocation: Vec<String>,
    #[serde(default)]
    pub rollback: Vec<String>,
    #[serde(default)]
    pub renewal: Vec<String>,
    #[serde(default)]
    pub rotation: Vec<String>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub creation_statements: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub revocation_statements: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub rollback_statements: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub renew_statements: String,
}

impl Statements {
    /// Statements with only a creation statement.
    pub fn creation(statement: impl Into<String>) -> Self {
        Self { creation: vec![statement.into()], ..Default::default() }
    }

    /// Copy each non-empty deprecated field into its list when the list is empty.
    pub fn normalized(&self) -> Self {
        fn merge(list: &[String], legacy: &str) -> Vec<String> {
            if list.is_empty() && !legacy.is_empty() {
                vec![legacy.to_string()]
            } else {
                list.to_vec()
            }
        }

        Self {
            creation: merge(&self.creation, &self.creation_statements),
            revocation: merge(&self.revocation, &self.revocation_statements),
            rollback: merge(&self.rollback, &self.rollback_statements),
            renewal: merge(&self.renewal, &self.renew_statements),
            rotation: self.rotation.clone(),
            ..Default::default()
        }
    }

    /// The statement used for creation. Only the first one counts.
    pub fn first_creation(&self) -> Option<&str> {
        self.creation.first().map(String::as_str).filter(|s| !s.trim().is_empty())
    }
}

/// Caller-supplied credentials for [`Database::set_credentials`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticUserConfig {
    pub username: String,
    pub password: SecretString,
}

impl StaticUserConfig {
    pub fn new(username: impl Into<String>, password: impl Into<SecretString>) -> Self {
        Self { username: username.into(), password: password.into() }
    }
}

/// Operations a host invokes on a database plugin.
///
/// Implementations are shared across concurrent host requests.
#[async_trait]
pub trait Database: Send + Sync {
    /// Short identifier of the database kind.
    fn type_name(&self) -> &'static str;

    /// Store and validate the connection configuration, optionally verifying
    /// connectivity. Returns the configuration as received.
    async fn init(&self, config: Map<String, Value>, verify: bool) -> Result<Map<String, Value>>;

    /// Legacy form of [`Database::init`] that discards the returned map.
    async fn initialize(&self, config: Map<String, Value>, verify: bool) -> Result<()> {
        self.init(config, verify).await.map(|_| ())
    }

    /// Create a new identity and return its generated `(username, password)`.
    async fn create_user(
        &self,
        statements: &Statements,
        username_config: &UsernameConfig,
        expiration: DateTime<Utc>,
    ) -> Result<(String, String)>;

    /// Create or overwrite an identity with caller-chosen credentials.
    async fn set_credentials(
        &self,
        statements: &Statements,
        static_user: &StaticUserConfig,
    ) -> Result<(String, String)>;

    /// Extend the lifetime of an identity.
    async fn renew_user(
        &self,
        statements: &Statements,
        username: &str,
        expiration: DateTime<Utc>,
    ) -> Result<()>;

    /// Remove an identity.
    async fn revoke_user(&self, statements: &Statements, username: &str) -> Result<()>;

    /// Rotate the admin credentials held in the configuration.
    async fn rotate_root_credentials(&self, statements: &[String]) -> Result<Map<String, Value>>;

    /// Release the cached connection.
    async fn close(&self) -> Result<()>;

    /// Secret values mapped to the placeholder that replaces them in messages.
    async fn secret_values(&self) -> HashMap<String, String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalized_copies_deprecated_fields() {
        let statements = Statements {
            creation_statements: r#"{"roles":[{"role":"admin"}]}"#.into(),
            revocation_statements: "revoke".into(),
            renew_statements: "renew".into(),
            ..Default::default()
        };

        let normalized = statements.normalized();
        assert_eq!(normalized.creation, vec![r#"{"roles":[{"role":"admin"}]}"#.to_string()]);
        assert_eq!(normalized.revocation, vec!["revoke".to_string()]);
        assert_eq!(normalized.renewal, vec!["renew".to_string()]);
        assert!(normalized.rollback.is_empty());
        assert!(normalized.creation_statements.is_empty());
    }

    #[test]
    fn test_normalized_prefers_lists() {
        let statements = Statements {
            creation: vec!["first".into(), "second".into()],
            creation_statements: "legacy".into(),
            ..Default::default()
        };

        let normalized = statements.normalized();
        assert_eq!(normalized.creation, vec!["first".to_string(), "second".to_string()]);
        assert_eq!(normalized.first_creation(), Some("first"));
    }

    #[test]
    fn test_first_creation_ignores_blank() {
        assert_eq!(Statements::default().first_creation(), None);
        assert_eq!(Statements::creation("  ").first_creation(), None);
    }

    #[test]
    fn test_statements_deserialize_partial() {
        let statements: Statements =
            serde_json::from_str(r#"{"creation":["{\"roles\":[]}"]}"#).unwrap();
        assert_eq!(statements.creation.len(), 1);
        assert!(statements.revocation.is_empty());
    }

    #[test]
    fn test_static_user_debug_hides_password() {
        let user = StaticUserConfig::new("app", "hunter2");
        assert!(!format!("{:?}", user).contains("hunter2"));
    }
}
