//! Handling of credential material.
//!
//! Admin passwords and generated passwords are carried as [`SecretString`] so
//! they cannot leak through `Debug`, `Display`, serialization or tracing
//! fields. Text that may still embed a secret, such as a connection string with
//! userinfo or a backend echoing a request body, goes through [`scrub`] before
//! it is logged or returned.

pub mod scrub;
pub mod types;

pub use scrub::scrub;
pub use types::{SecretString, REDACTED};
