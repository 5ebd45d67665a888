//! Identity and role types exchanged with the cluster.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::secrets::SecretString;

/// Bound on reaching the cluster when establishing the admin connection.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Bound on opening a socket to a single node. It does not limit how long a
/// request may run once connected.
pub const SERVER_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Namespace an identity's username is resolved against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthDomain {
    /// Users defined by the cluster itself.
    Local,
    /// Users resolved through an external directory (LDAP, PAM).
    External,
}

impl AuthDomain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::External => "external",
        }
    }
}

impl FromStr for AuthDomain {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "local" => Ok(Self::Local),
            "external" => Ok(Self::External),
            _ => Err(format!("Unknown authentication domain: {}", s)),
        }
    }
}

impl fmt::Display for AuthDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A role granted to an identity, optionally scoped to a bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRole {
    pub role: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub bucket_name: String,
}

impl UserRole {
    pub fn new(role: impl Into<String>, bucket_name: impl Into<String>) -> Self {
        Self { role: role.into(), bucket_name: bucket_name.into() }
    }
}

impl fmt::Display for UserRole {
    /// Renders the `role[bucket]` form used by the RBAC endpoints.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.bucket_name.is_empty() {
            write!(f, "{}", self.role)
        } else {
            write!(f, "{}[{}]", self.role, self.bucket_name)
        }
    }
}

/// Desired state of an identity for a create-or-replace call.
#[derive(Debug, Clone)]
pub struct UserSettings {
    pub name: String,
    pub password: SecretString,
    pub roles: Vec<UserRole>,
}

impl UserSettings {
    /// Comma separated role list, e.g. `bucket_full_access[Test],admin`.
    pub fn roles_param(&self) -> String {
        self.roles.iter().map(ToString::to_string).collect::<Vec<_>>().join(",")
    }
}

/// An identity as reported by a lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub domain: AuthDomain,
    #[serde(default)]
    pub roles: Vec<UserRole>,
}

/// Endpoint and timeouts used to establish a connection.
#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    pub connection_string: String,
    /// Limits the whole connect step, not later RBAC calls.
    pub connect_timeout: Duration,
    /// Limits each socket connect to a node.
    pub server_connect_timeout: Duration,
}

impl ConnectionSettings {
    pub fn new(connection_string: impl Into<String>) -> Self {
        Self {
            connection_string: connection_string.into(),
            connect_timeout: CONNECT_TIMEOUT,
            server_connect_timeout: SERVER_CONNECT_TIMEOUT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_rendering() {
        assert_eq!(UserRole::new("bucket_full_access", "Test").to_string(), "bucket_full_access[Test]");
        assert_eq!(UserRole::new("admin", "").to_string(), "admin");
    }

    #[test]
    fn test_roles_param_joins_roles() {
        let settings = UserSettings {
            name: "v_user".to_string(),
            password: SecretString::new("pw"),
            roles: vec![UserRole::new("data_reader", "Products"), UserRole::new("ro_admin", "")],
        };
        assert_eq!(settings.roles_param(), "data_reader[Products],ro_admin");
    }

    #[test]
    fn test_user_deserializes_rbac_payload() {
        let json = r#"{
            "id": "v_test_role_abc",
            "domain": "local",
            "roles": [{"role": "bucket_full_access", "bucket_name": "Test"}],
            "name": "v_test_role_abc",
            "password_change_date": "2024-01-01T00:00:00.000Z"
        }"#;
        let user: User = serde_json::from_str(json).unwrap();
        assert_eq!(user.domain, AuthDomain::Local);
        assert_eq!(user.roles, vec![UserRole::new("bucket_full_access", "Test")]);
    }

    #[test]
    fn test_auth_domain_roundtrip() {
        for domain in [AuthDomain::Local, AuthDomain::External] {
            let parsed: AuthDomain = domain.as_str().parse().unwrap();
            assert_eq!(parsed, domain);
        }
        assert!("ldap".parse::<AuthDomain>().is_err());
    }

    #[test]
    fn test_connection_settings_use_fixed_timeouts() {
        let settings = ConnectionSettings::new("couchbase://localhost");
        assert_eq!(settings.connect_timeout, Duration::from_secs(30));
        assert_eq!(settings.server_connect_timeout, Duration::from_secs(30));
    }
}
