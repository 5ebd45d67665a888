//! Removal of secret values from free-form text.
//!
//! Used on every error returned to the host and on every log field that may
//! carry a connection string or a cluster error message.

use std::collections::HashMap;

/// Replace every occurrence of each secret in `message` with its placeholder.
///
/// Longer secrets are replaced first so a secret that contains another one is
/// never partially exposed.
pub fn scrub(message: &str, secrets: &HashMap<String, String>) -> String {
    let mut ordered: Vec<_> = secrets.iter().filter(|(secret, _)| !secret.is_empty()).collect();
    ordered.sort_by(|a, b| b.0.len().cmp(&a.0.len()));

    ordered.into_iter().fold(message.to_string(), |acc, (secret, placeholder)| {
        acc.replace(secret.as_str(), placeholder)
    })
}
