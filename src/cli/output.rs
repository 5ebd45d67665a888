//! JSON output for CLI commands.

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::json;

use crate::errors::Error;

/// Print data as pretty JSON on stdout
pub fn print_json<T: Serialize>(data: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(data).context("Failed to serialize to JSON")?;
    println!("{}", json);
    Ok(())
}

/// JSON document describing a failed command.
///
/// The error must already be sanitised; it is rendered as-is.
pub fn error_document(error: &Error) -> serde_json::Value {
    json!({
        "error": {
            "kind": error.kind(),
            "message": error.to_string(),
        }
    })
}
