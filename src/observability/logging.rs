//! # Structured Logging
//!
//! Subscriber initialisation and span macros for plugin operations.
//!
//! Log records are written to stderr so that stdout stays free for command
//! output. The filter comes from `RUST_LOG` when set, otherwise from the
//! configured log level.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use validator::Validate;

use crate::config::ObservabilityConfig;
use crate::errors::Result;

/// Create a tracing span for a credential lifecycle operation.
///
/// Every span carries a fresh `operation_id` so that the events of one host
/// request can be correlated. Extra fields are passed through:
///
/// ```rust,ignore
/// let span = credential_span!("revoke_user", username = %username);
/// ```
#[macro_export]
macro_rules! credential_span {
    ($operation:expr) => {
        tracing::info_span!(
            "credential_operation",
            operation = %$operation,
            operation_id = %uuid::Uuid::new_v4(),
            database = "couchbase"
        )
    };
    ($operation:expr, $($field:tt)*) => {
        tracing::info_span!(
            "credential_operation",
            operation = %$operation,
            operation_id = %uuid::Uuid::new_v4(),
            database = "couchbase",
            $($field)*
        )
    };
}

/// Install the global subscriber.
///
/// The configuration is validated first; nothing is installed when it is
/// invalid. Returns `Ok(false)` when a subscriber was already installed, which
/// happens when the crate is embedded in a host that configures logging itself.
pub fn init_logging(config: &ObservabilityConfig) -> Result<bool> {
    config.validate()?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let installed = if config.json_logging {
        let subscriber = tracing_subscriber::registry().with(filter).with(
            fmt::layer()
                .json()
                .with_current_span(true)
                .with_target(true)
                .with_writer(std::io::stderr),
        );
        tracing::subscriber::set_global_default(subscriber).is_ok()
    } else {
        let subscriber = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr));
        tracing::subscriber::set_global_default(subscriber).is_ok()
    };

    if installed {
        tracing::debug!(
            service_name = %config.service_name,
            log_level = %config.log_level,
            json = config.json_logging,
            "Logging initialized"
        );
    }

    Ok(installed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_macros_compile() {
        let username = "v_test";
        let _span = credential_span!("create_user");
        let _span = credential_span!("revoke_user", username = %username);
        let _span = credential_span!("init", verify = true);
    }

    #[test]
    fn test_init_logging_twice() {
        let config = ObservabilityConfig::default();
        let _ = init_logging(&config);
        // A second install is always refused.
        assert!(!init_logging(&config).unwrap());
    }

    #[test]
    fn test_init_logging_rejects_invalid_config() {
        let config = ObservabilityConfig { log_level: String::new(), ..Default::default() };
        let err = init_logging(&config).unwrap_err();
        assert_eq!(err.to_string(), "log_level cannot be empty");

        let config = ObservabilityConfig { service_name: String::new(), ..Default::default() };
        assert!(init_logging(&config).is_err());
    }
}
