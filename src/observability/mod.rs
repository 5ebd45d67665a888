//! # Observability
//!
//! Structured logging for the plugin. Operations run inside
//! [`credential_span!`](crate::credential_span) spans; the binary installs
//! the subscriber with [`init_logging`].

pub mod logging;

pub use logging::init_logging;
