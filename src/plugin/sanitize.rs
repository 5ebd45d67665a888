//! Secret scrubbing for errors leaving the plugin.
//!
//! [`SanitizedDatabase`] wraps any [`Database`] and rewrites errors whose
//! message contains one of the inner database's secret values. Errors that
//! contain no secret are returned untouched so callers can still match on
//! their variants.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::collections::HashMap;

use super::{Database, StaticUserConfig, Statements, UsernameConfig};
use crate::errors::{Error, Result};
pub use crate::secrets::scrub;

/// Decorator that scrubs secrets from the errors of an inner database.
pub struct SanitizedDatabase<D: Database> {
    inner: D,
}

impl<D: Database> SanitizedDatabase<D> {
    pub fn new(inner: D) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &D {
        &self.inner
    }

    pub fn into_inner(self) -> D {
        self.inner
    }

    /// Scrub the error of `result`, if any, against the inner secret values.
    pub async fn sanitize<T>(&self, result: Result<T>) -> Result<T> {
        match result {
            Ok(value) => Ok(value),
            Err(e) => {
                let secrets = self.inner.secret_values().await;
                let message = e.to_string();
                let leaked = secrets
                    .keys()
                    .any(|secret| !secret.is_empty() && message.contains(secret.as_str()));
                if leaked {
                    tracing::debug!(kind = e.kind(), "Scrubbed secret from error");
                    Err(Error::Sanitized { message: scrub(&message, &secrets) })
                } else {
                    Err(e)
                }
            }
        }
    }
}

#[async_trait]
impl<D: Database> Database for SanitizedDatabase<D> {
    fn type_name(&self) -> &'static str {
        self.inner.type_name()
    }

    async fn init(&self, config: Map<String, Value>, verify: bool) -> Result<Map<String, Value>> {
        let result = self.inner.init(config, verify).await;
        self.sanitize(result).await
    }

    async fn create_user(
        &self,
        statements: &Statements,
        username_config: &UsernameConfig,
        expiration: DateTime<Utc>,
    ) -> Result<(String, String)> {
        let result = self.inner.create_user(statements, username_config, expiration).await;
        self.sanitize(result).await
    }

    async fn set_credentials(
        &self,
        statements: &Statements,
        static_user: &StaticUserConfig,
    ) -> Result<(String, String)> {
        let result = self.inner.set_credentials(statements, static_user).await;
        self.sanitize(result).await
    }

    async fn renew_user(
        &self,
        statements: &Statements,
        username: &str,
        expiration: DateTime<Utc>,
    ) -> Result<()> {
        let result = self.inner.renew_user(statements, username, expiration).await;
        self.sanitize(result).await
    }

    async fn revoke_user(&self, statements: &Statements, username: &str) -> Result<()> {
        let result = self.inner.revoke_user(statements, username).await;
        self.sanitize(result).await
    }

    async fn rotate_root_credentials(&self, statements: &[String]) -> Result<Map<String, Value>> {
        let result = self.inner.rotate_root_credentials(statements).await;
        self.sanitize(result).await
    }

    async fn close(&self) -> Result<()> {
        let result = self.inner.close().await;
        self.sanitize(result).await
    }

    async fn secret_values(&self) -> HashMap<String, String> {
        self.inner.secret_values().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct LeakyDatabase;

    #[async_trait]
    impl Database for LeakyDatabase {
        fn type_name(&self) -> &'static str {
            "leaky"
        }

        async fn init(&self, _: Map<String, Value>, _: bool) -> Result<Map<String, Value>> {
            Err(Error::connection("could not authenticate admin:s3cret@db1"))
        }

        async fn create_user(
            &self,
            _statements: &Statements,
            _username_config: &UsernameConfig,
            _expiration: DateTime<Utc>,
        ) -> Result<(String, String)> {
            Err(Error::EmptyStatement)
        }

        async fn set_credentials(
            &self,
            _statements: &Statements,
            _static_user: &StaticUserConfig,
        ) -> Result<(String, String)> {
            Ok(("user".into(), "pw".into()))
        }

        async fn renew_user(&self, _: &Statements, _: &str, _: DateTime<Utc>) -> Result<()> {
            Ok(())
        }

        async fn revoke_user(&self, _: &Statements, _: &str) -> Result<()> {
            Ok(())
        }

        async fn rotate_root_credentials(&self, _: &[String]) -> Result<Map<String, Value>> {
            Err(Error::unsupported("root credential rotation"))
        }

        async fn close(&self) -> Result<()> {
            Ok(())
        }

        async fn secret_values(&self) -> HashMap<String, String> {
            HashMap::from([("s3cret".to_string(), "[password]".to_string())])
        }
    }

    #[tokio::test]
    async fn test_error_with_secret_is_sanitized() {
        let db = SanitizedDatabase::new(LeakyDatabase);
        let err = db.init(Map::new(), false).await.unwrap_err();

        assert!(matches!(err, Error::Sanitized { .. }));
        assert_eq!(err.to_string(), "could not authenticate admin:[password]@db1");
    }

    #[tokio::test]
    async fn test_error_without_secret_passes_through() {
        let db = SanitizedDatabase::new(LeakyDatabase);

        let err = db
            .create_user(&Statements::default(), &UsernameConfig::default(), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::EmptyStatement));

        let err = db.rotate_root_credentials(&[]).await.unwrap_err();
        assert!(matches!(err, Error::UnsupportedOperation { .. }));
    }

    #[tokio::test]
    async fn test_success_is_untouched() {
        let db = SanitizedDatabase::new(LeakyDatabase);
        let (username, password) = db
            .set_credentials(&Statements::default(), &StaticUserConfig::new("user", "pw"))
            .await
            .unwrap();
        assert_eq!((username.as_str(), password.as_str()), ("user", "pw"));
        assert_eq!(db.type_name(), "leaky");
    }
}
