//! Username and password generation for dynamic credentials.
//!
//! Generated usernames follow the template
//!
//! ```text
//! v_<display name>_<role name>_<20 random alphanumerics>_<unix seconds>
//! ```
//!
//! with each name fragment truncated to its configured length and the whole
//! username truncated to `username_len` characters. Empty fragments are
//! skipped together with their separator.
//!
//! Passwords are `A1a-` followed by `password_len` random alphanumerics; the
//! fixed prefix covers the upper, lower, digit and symbol classes that
//! cluster password policies commonly demand.

use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::CredentialPolicy;
use crate::errors::{Error, Result};

const USERNAME_PREFIX: &str = "v";
const USERNAME_RANDOM_LEN: usize = 20;
const PASSWORD_PREFIX: &str = "A1a-";

/// Names supplied by the host to make generated usernames traceable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsernameConfig {
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub role_name: String,
}

impl UsernameConfig {
    pub fn new(display_name: impl Into<String>, role_name: impl Into<String>) -> Self {
        Self { display_name: display_name.into(), role_name: role_name.into() }
    }
}

/// Produces usernames and passwords for new identities.
///
/// Implementations are pure and hold no shared state, so they are safe to call
/// without the connection lock.
pub trait CredentialsProducer: Send + Sync {
    fn generate_username(&self, config: &UsernameConfig) -> Result<String>;

    fn generate_password(&self) -> Result<String>;
}

/// Template-based producer configured by a [`CredentialPolicy`].
#[derive(Debug, Clone, Default)]
pub struct TemplateCredentialsProducer {
    policy: CredentialPolicy,
}

impl TemplateCredentialsProducer {
    pub fn new(policy: CredentialPolicy) -> Result<Self> {
        if policy.username_len == 0 {
            return Err(Error::config_validation("username_len", "must be greater than zero"));
        }
        if policy.password_len == 0 {
            return Err(Error::config_validation("password_len", "must be greater than zero"));
        }
        Ok(Self { policy })
    }

    pub fn policy(&self) -> &CredentialPolicy {
        &self.policy
    }
}

fn truncate_chars(value: &str, max: usize) -> &str {
    match value.char_indices().nth(max) {
        Some((idx, _)) => &value[..idx],
        None => value,
    }
}

fn random_alphanumeric(len: usize) -> String {
    rand::thread_rng().sample_iter(&Alphanumeric).take(len).map(char::from).collect()
}

impl CredentialsProducer for TemplateCredentialsProducer {
    fn generate_username(&self, config: &UsernameConfig) -> Result<String> {
        let sep = self.policy.separator.as_str();
        let mut username = USERNAME_PREFIX.to_string();

        for (fragment, max) in [
            (config.display_name.as_str(), self.policy.display_name_len),
            (config.role_name.as_str(), self.policy.role_name_len),
        ] {
            let fragment = truncate_chars(fragment, max);
            if !fragment.is_empty() {
                username.push_str(sep);
                username.push_str(fragment);
            }
        }

        username.push_str(sep);
        username.push_str(&random_alphanumeric(USERNAME_RANDOM_LEN));
        username.push_str(sep);
        username.push_str(&chrono::Utc::now().timestamp().to_string());

        Ok(truncate_chars(&username, self.policy.username_len).to_string())
    }

    fn generate_password(&self) -> Result<String> {
        let mut password = String::with_capacity(PASSWORD_PREFIX.len() + self.policy.password_len);
        password.push_str(PASSWORD_PREFIX);
        password.push_str(&random_alphanumeric(self.policy.password_len));
        Ok(password)
    }
}
