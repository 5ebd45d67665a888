//! # Configuration Management
//!
//! The connection configuration arrives from the host as a loosely typed map
//! and is decoded and validated by [`ConnectionConfig`]. Credential generation
//! and logging are configured from `CB_PLUGIN_*` environment variables.

pub mod settings;

pub use settings::{
    ConnectionConfig, CredentialPolicy, ObservabilityConfig, BUCKET_KEY, CONNECTION_STRING_KEY,
    PASSWORD_KEY, USERNAME_KEY,
};

// Serialize tests that read or modify environment variables
#[cfg(test)]
pub(crate) static ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());
