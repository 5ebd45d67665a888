//! Types that keep credential material out of logs and error messages.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Placeholder written wherever a secret would otherwise be rendered.
pub const REDACTED: &str = "[REDACTED]";

/// A password or token that never renders its contents.
///
/// - `Debug` prints `SecretString([REDACTED])`, `Display` prints `[REDACTED]`
/// - serializing writes `"[REDACTED]"`; deserializing accepts the real value so
///   host configuration can be decoded into it
/// - the buffer is zeroed on drop
///
/// Read the value with [`SecretString::expose_secret`] at the point it is sent
/// to the cluster, and nowhere else.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretString(String);

impl SecretString {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// Borrow the raw value. Never log the result.
    pub fn expose_secret(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for SecretString {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(REDACTED)
    }
}

impl<'de> Deserialize<'de> for SecretString {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        String::deserialize(deserializer).map(SecretString)
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretString({})", REDACTED)
    }
}

impl fmt::Display for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(REDACTED)
    }
}

impl PartialEq for SecretString {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for SecretString {}

impl From<String> for SecretString {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for SecretString {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl Default for SecretString {
    fn default() -> Self {
        Self::new("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_string_never_renders_value() {
        let secret = SecretString::new("hunter2");

        assert_eq!(format!("{:?}", secret), "SecretString([REDACTED])");
        assert_eq!(format!("{}", secret), "[REDACTED]");
        assert_eq!(serde_json::to_string(&secret).unwrap(), "\"[REDACTED]\"");
        assert_eq!(secret.expose_secret(), "hunter2");
    }

    #[test]
    fn test_secret_string_deserializes_real_value() {
        let secret: SecretString = serde_json::from_str("\"from-host-config\"").unwrap();
        assert_eq!(secret.expose_secret(), "from-host-config");
        assert_eq!(secret.len(), 16);
        assert!(SecretString::default().is_empty());
    }

    #[test]
    fn test_secret_string_redacted_inside_struct() {
        #[derive(Serialize)]
        struct Credential {
            username: String,
            password: SecretString,
        }

        let json = serde_json::to_string(&Credential {
            username: "v_app".to_string(),
            password: SecretString::new("A1a-secret"),
        })
        .unwrap();

        assert!(json.contains("v_app"));
        assert!(!json.contains("A1a-secret"));
    }
}
