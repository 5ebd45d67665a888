//! # couchbase-dbplugin
//!
//! Dynamic credential adapter for Couchbase clusters. A secrets-management host
//! drives the [`plugin::Database`] contract to create short-lived RBAC users,
//! overwrite static ones and revoke them, while this crate keeps one lazily
//! established admin connection per configured cluster.
//!
//! ## Architecture
//!
//! ```text
//! host ─▶ SanitizedDatabase ─▶ Couchbase ─▶ ConnectionManager ─▶ cluster::UserManager
//!                                  │                                   │
//!                          CredentialsProducer                 HTTP admin API / in-memory
//!                          statement::parse
//! ```
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use couchbase_dbplugin::plugin::{Couchbase, Database, SanitizedDatabase, Statements};
//! use couchbase_dbplugin::{Result, UsernameConfig};
//!
//! # async fn run() -> Result<()> {
//! let db = SanitizedDatabase::new(Couchbase::new());
//!
//! let config = serde_json::json!({
//!     "connection_string": "couchbase://db1",
//!     "username": "Administrator",
//!     "password": "password",
//!     "bucket": "travel-sample"
//! });
//! db.init(config.as_object().cloned().unwrap_or_default(), true).await?;
//!
//! let statements = Statements::creation(
//!     r#"{"roles":[{"role":"bucket_full_access","bucket_name":"travel-sample"}]}"#,
//! );
//! let (username, _password) = db
//!     .create_user(&statements, &UsernameConfig::new("app", "reader"), chrono::Utc::now())
//!     .await?;
//! db.revoke_user(&statements, &username).await?;
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod cluster;
pub mod config;
pub mod connection;
pub mod credentials;
pub mod errors;
pub mod observability;
pub mod plugin;
pub mod secrets;
pub mod statement;

// Re-export commonly used types and traits
pub use credentials::UsernameConfig;
pub use errors::{Error, Result};
pub use plugin::{Couchbase, Database, SanitizedDatabase, StaticUserConfig, Statements};

/// Application version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name from Cargo.toml
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
