//! # Configuration Settings
//!
//! Connection configuration supplied by the host, the credential generation
//! policy, and logging settings.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use validator::{Validate, ValidationError};

use crate::errors::{Error, Result};
use crate::secrets::SecretString;

/// Keys recognised in the host's raw connection configuration.
pub const CONNECTION_STRING_KEY: &str = "connection_string";
pub const USERNAME_KEY: &str = "username";
pub const PASSWORD_KEY: &str = "password";
pub const BUCKET_KEY: &str = "bucket";

fn validate_secret_present(value: &SecretString) -> std::result::Result<(), ValidationError> {
    if value.is_empty() {
        return Err(ValidationError::new("length"));
    }
    Ok(())
}

/// Administrative connection configuration.
///
/// `bucket` is opened on every new connection because servers older than 5.5
/// refuse cluster-level calls on a connection without an open bucket.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct ConnectionConfig {
    /// Couchbase connection string, e.g. `couchbase://db1,db2`
    #[validate(length(min = 1, message = "cannot be empty"))]
    pub connection_string: String,

    /// Admin username
    #[validate(length(min = 1, message = "cannot be empty"))]
    pub username: String,

    /// Admin password
    #[validate(custom(function = "validate_secret_present", message = "cannot be empty"))]
    pub password: SecretString,

    /// Bucket opened to permit cluster-level administrative calls
    #[serde(default)]
    pub bucket: String,
}

impl ConnectionConfig {
    /// Fields in the order they are reported when several are invalid.
    const FIELD_ORDER: [&'static str; 3] = [CONNECTION_STRING_KEY, USERNAME_KEY, PASSWORD_KEY];

    /// Decode a loosely typed host configuration map.
    ///
    /// Strings are taken as-is, numbers and booleans are stringified, `null`
    /// and missing keys become empty. Unknown keys are ignored. Arrays and
    /// objects are rejected.
    pub fn from_raw(raw: &Map<String, Value>) -> Result<Self> {
        Ok(Self {
            connection_string: weak_string(raw, CONNECTION_STRING_KEY)?,
            username: weak_string(raw, USERNAME_KEY)?,
            password: SecretString::new(weak_string(raw, PASSWORD_KEY)?),
            bucket: weak_string(raw, BUCKET_KEY)?,
        })
    }

    /// Check required fields. No network access happens here.
    pub fn validate(&self) -> Result<()> {
        if let Err(errors) = Validate::validate(self) {
            let field_errors = errors.field_errors();
            for field in Self::FIELD_ORDER {
                if let Some(errs) = field_errors.get(field) {
                    let message = errs
                        .first()
                        .and_then(|e| e.message.as_ref())
                        .map_or_else(|| "is invalid".to_string(), |m| m.to_string());
                    return Err(Error::config_validation(field, message));
                }
            }
            return Err(Error::from(errors));
        }
        Ok(())
    }
}

fn weak_string(raw: &Map<String, Value>, key: &str) -> Result<String> {
    match raw.get(key) {
        None | Some(Value::Null) => Ok(String::new()),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(Value::Bool(b)) => Ok(b.to_string()),
        Some(Value::Array(_)) | Some(Value::Object(_)) => {
            Err(Error::config_validation(key, "must be a string"))
        }
    }
}

/// Policy for generated usernames and passwords.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct CredentialPolicy {
    /// Maximum characters kept from the display name
    pub display_name_len: usize,

    /// Maximum characters kept from the role name
    pub role_name_len: usize,

    /// Maximum total username length
    #[validate(range(min = 1, max = 128, message = "Username length must be between 1 and 128"))]
    pub username_len: usize,

    /// Separator placed between username fragments
    #[validate(length(min = 1, max = 4, message = "Separator must be 1 to 4 characters"))]
    pub separator: String,

    /// Number of random characters after the fixed password prefix
    #[validate(range(min = 8, max = 100, message = "Password length must be between 8 and 100"))]
    pub password_len: usize,
}

impl Default for CredentialPolicy {
    fn default() -> Self {
        Self {
            display_name_len: 15,
            role_name_len: 15,
            username_len: 100,
            separator: "_".to_string(),
            password_len: 20,
        }
    }
}

impl CredentialPolicy {
    /// Load overrides from `CB_PLUGIN_*` environment variables.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let policy = Self {
            display_name_len: env_usize("CB_PLUGIN_DISPLAY_NAME_LEN", defaults.display_name_len)?,
            role_name_len: env_usize("CB_PLUGIN_ROLE_NAME_LEN", defaults.role_name_len)?,
            username_len: env_usize("CB_PLUGIN_USERNAME_LEN", defaults.username_len)?,
            separator: std::env::var("CB_PLUGIN_USERNAME_SEPARATOR")
                .unwrap_or(defaults.separator),
            password_len: env_usize("CB_PLUGIN_PASSWORD_LEN", defaults.password_len)?,
        };
        Validate::validate(&policy)?;
        Ok(policy)
    }
}

fn env_usize(name: &str, default: usize) -> Result<usize> {
    match std::env::var(name) {
        Ok(value) => value
            .parse::<usize>()
            .map_err(|e| Error::config_validation(name, format!("is not a number: {}", e))),
        Err(_) => Ok(default),
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ObservabilityConfig {
    /// Service name attached to log records
    #[validate(length(min = 1, message = "cannot be empty"))]
    pub service_name: String,

    /// Log filter directive (trace, debug, info, warn, error, or an env-filter expression)
    #[validate(length(min = 1, message = "cannot be empty"))]
    pub log_level: String,

    /// Enable JSON structured logging
    pub json_logging: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            service_name: crate::APP_NAME.to_string(),
            log_level: "info".to_string(),
            json_logging: false,
        }
    }
}

impl ObservabilityConfig {
    /// Load from `CB_PLUGIN_LOG_LEVEL` and `CB_PLUGIN_JSON_LOGS`.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            service_name: defaults.service_name,
            log_level: std::env::var("CB_PLUGIN_LOG_LEVEL").unwrap_or(defaults.log_level),
            json_logging: std::env::var("CB_PLUGIN_JSON_LOGS")
                .map(|s| s.to_lowercase() == "true" || s == "1")
                .unwrap_or(defaults.json_logging),
        }
    }
}
