//! # Error Handling
//!
//! Error taxonomy for the credential lifecycle. Every failure carries the
//! operation context and, where one exists, the underlying cluster error.
//! Nothing here is retried internally; retry policy belongs to the host.

use crate::cluster::ClusterError;

/// Custom result type for plugin operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the Couchbase database plugin
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// A required configuration field is missing or invalid. No network call was made.
    #[error("{field} {message}")]
    ConfigValidation { field: String, message: String },

    /// An operation was attempted before a successful `init`.
    #[error("connection has not been initialized")]
    NotInitialized,

    /// Connecting, authenticating or opening the bucket failed.
    #[error("{message}")]
    Connection {
        message: String,
        #[source]
        source: Option<ClusterError>,
    },

    /// The creation statement is not valid JSON for the role statement model.
    #[error("invalid creation statement: {0}")]
    StatementParse(#[source] serde_json::Error),

    /// No creation statement was supplied.
    #[error("empty creation statement")]
    EmptyStatement,

    /// The creation statement decoded but lists no roles.
    #[error("at least one role should be given in creation statement")]
    NoRole,

    /// The cluster rejected the create-or-replace of an identity.
    #[error("error when upserting user '{username}': {source}")]
    Upsert {
        username: String,
        #[source]
        source: ClusterError,
    },

    /// The cluster rejected removal of an identity (including unknown users).
    #[error("error when revoking user '{username}': {source}")]
    Revoke {
        username: String,
        #[source]
        source: ClusterError,
    },

    /// The operation is deliberately not implemented for this database.
    #[error("{operation} is not currently implemented in couchbase")]
    UnsupportedOperation { operation: String },

    /// An error whose message contained a secret value, with the secret replaced.
    #[error("{message}")]
    Sanitized { message: String },

    /// Internal errors
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl Error {
    /// Create a configuration validation error for a named field
    pub fn config_validation<F: Into<String>, S: Into<String>>(field: F, message: S) -> Self {
        Self::ConfigValidation { field: field.into(), message: message.into() }
    }

    /// Create a connection error without an underlying cluster error
    pub fn connection<S: Into<String>>(message: S) -> Self {
        Self::Connection { message: message.into(), source: None }
    }

    /// Create a connection error wrapping a cluster error
    pub fn connection_with_source<S: Into<String>>(message: S, source: ClusterError) -> Self {
        Self::Connection { message: message.into(), source: Some(source) }
    }

    /// Create an unsupported operation error
    pub fn unsupported<S: Into<String>>(operation: S) -> Self {
        Self::UnsupportedOperation { operation: operation.into() }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal { message: message.into() }
    }

    /// Short machine-readable name of the error kind, used in log fields and CLI output.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ConfigValidation { .. } => "config_validation",
            Self::NotInitialized => "not_initialized",
            Self::Connection { .. } => "connection",
            Self::StatementParse(_) => "statement_parse",
            Self::EmptyStatement => "empty_statement",
            Self::NoRole => "no_role",
            Self::Upsert { .. } => "upsert",
            Self::Revoke { .. } => "revoke",
            Self::UnsupportedOperation { .. } => "unsupported_operation",
            Self::Sanitized { .. } => "sanitized",
            Self::Internal { .. } => "internal",
        }
    }
}

impl From<validator::ValidationErrors> for Error {
    fn from(errors: validator::ValidationErrors) -> Self {
        let field_errors = errors.field_errors();
        let mut fields: Vec<_> = field_errors.iter().collect();
        fields.sort_by(|a, b| a.0.cmp(b.0));

        match fields.first() {
            Some((field, errs)) => {
                let message = errs
                    .iter()
                    .map(|e| {
                        e.message.as_ref().map_or("is invalid".to_string(), |m| m.to_string())
                    })
                    .collect::<Vec<_>>()
                    .join(", ");
                Self::config_validation(field.to_string(), message)
            }
            None => Self::config_validation("config", "is invalid"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::config_validation("connection_string", "cannot be empty");
        assert_eq!(err.to_string(), "connection_string cannot be empty");

        assert_eq!(Error::NoRole.to_string(), "at least one role should be given in creation statement");
        assert_eq!(
            Error::unsupported("root credential rotation").to_string(),
            "root credential rotation is not currently implemented in couchbase"
        );
    }

    #[test]
    fn test_connection_error_keeps_source() {
        let err = Error::connection_with_source(
            "could not open bucket Test",
            ClusterError::bucket_unavailable("Test", "404 Not Found"),
        );
        assert!(std::error::Error::source(&err).is_some());
        assert!(err.to_string().contains("Test"));
    }

    #[test]
    fn test_error_kind() {
        assert_eq!(Error::NotInitialized.kind(), "not_initialized");
        assert_eq!(Error::EmptyStatement.kind(), "empty_statement");
        assert_eq!(
            Error::Revoke { username: "u".into(), source: ClusterError::unknown_user("u") }.kind(),
            "revoke"
        );
    }
}
