//! Error types for cluster administration calls.

use thiserror::Error;

/// Result type for cluster operations.
pub type Result<T> = std::result::Result<T, ClusterError>;

/// Errors returned by a cluster backend.
#[derive(Error, Debug)]
pub enum ClusterError {
    /// The connection string could not be turned into an admin endpoint.
    #[error("invalid connection string '{connection_string}': {reason}")]
    InvalidConnectionString { connection_string: String, reason: String },

    /// The request never produced a response (refused, timed out, TLS failure).
    #[error("transport error: {0}")]
    Transport(String),

    /// The cluster refused the admin credentials.
    #[error("authentication failed: {message}")]
    Authentication { message: String },

    /// The bucket does not exist or cannot be opened.
    #[error("bucket '{bucket}' unavailable: {message}")]
    BucketUnavailable { bucket: String, message: String },

    /// No identity with that name exists in the domain.
    #[error("Unknown user: {username}")]
    UnknownUser { username: String },

    /// The cluster answered with a non-success status.
    #[error("request rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },

    /// The cluster answered with a body we could not decode.
    #[error("could not decode response: {0}")]
    Decode(String),

    /// The connection was used after it was closed.
    #[error("connection is closed")]
    Closed,
}

impl ClusterError {
    /// Create an invalid connection string error.
    pub fn invalid_connection_string(
        connection_string: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidConnectionString {
            connection_string: connection_string.into(),
            reason: reason.into(),
        }
    }

    /// Create an authentication error.
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication { message: message.into() }
    }

    /// Create a bucket unavailable error.
    pub fn bucket_unavailable(bucket: impl Into<String>, message: impl Into<String>) -> Self {
        Self::BucketUnavailable { bucket: bucket.into(), message: message.into() }
    }

    /// Create an unknown user error.
    pub fn unknown_user(username: impl Into<String>) -> Self {
        Self::UnknownUser { username: username.into() }
    }

    /// Create a rejected request error.
    pub fn rejected(status: u16, body: impl Into<String>) -> Self {
        Self::Rejected { status, body: body.into() }
    }

    /// True when the error reports a missing identity.
    pub fn is_unknown_user(&self) -> bool {
        matches!(self, Self::UnknownUser { .. })
    }
}

impl From<reqwest::Error> for ClusterError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_constructors() {
        let err = ClusterError::unknown_user("alice");
        assert!(err.is_unknown_user());
        assert_eq!(err.to_string(), "Unknown user: alice");

        let err = ClusterError::rejected(400, "{\"errors\":{}}");
        assert!(!err.is_unknown_user());
        assert!(err.to_string().contains("400"));

        let err = ClusterError::bucket_unavailable("Test", "not found");
        assert!(matches!(err, ClusterError::BucketUnavailable { .. }));
    }
}
