//! Creation statement parsing.
//!
//! A creation statement names the roles a new identity receives:
//!
//! ```json
//! {
//!   "roles": [
//!     { "role": "bucket_admin", "bucket_name": "Products" },
//!     { "role": "ro_admin" }
//!   ]
//! }
//! ```
//!
//! `resource_scope` is accepted as an alias of `bucket_name`. Cluster-wide
//! roles omit the bucket.

use serde::{Deserialize, Serialize};

use crate::cluster::UserRole;
use crate::errors::{Error, Result};

/// One role entry of a creation statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub role: String,
    #[serde(default, alias = "resource_scope")]
    pub bucket_name: String,
}

/// Decoded creation statement.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RoleStatement {
    #[serde(default)]
    pub roles: Vec<Role>,
}

impl RoleStatement {
    pub fn to_user_roles(&self) -> Vec<UserRole> {
        self.roles.iter().map(|r| UserRole::new(&r.role, &r.bucket_name)).collect()
    }
}

/// Parse a creation statement.
///
/// Malformed JSON yields [`Error::StatementParse`]; a statement without roles
/// yields [`Error::NoRole`]. Callers run this before any mutation of the cluster.
pub fn parse(statement: &str) -> Result<RoleStatement> {
    let parsed: RoleStatement = serde_json::from_str(statement).map_err(Error::StatementParse)?;

    if parsed.roles.is_empty() {
        return Err(Error::NoRole);
    }

    Ok(parsed)
}
