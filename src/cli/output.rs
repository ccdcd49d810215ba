//! JSON envelope and error rendering shared by all commands.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::cli::args::OutputFormat;
use crate::error::{HistoryError, Result};

pub const SCHEMA_VERSION: &str = "vpnhist.v1";

/// Top-level JSON envelope for command output.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope<T> {
    pub schema_version: &'static str,
    pub generated_at: DateTime<Utc>,
    pub command: String,
    pub data: T,
}

impl<T: Serialize> Envelope<T> {
    pub fn new(command: impl Into<String>, generated_at: DateTime<Utc>, data: T) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            generated_at,
            command: command.into(),
            data,
        }
    }

    /// Serialize, honouring `--pretty`.
    ///
    /// # Errors
    /// Returns an error if serialization fails.
    pub fn render(&self, pretty: bool) -> Result<String> {
        let json = if pretty {
            serde_json::to_string_pretty(self)?
        } else {
            serde_json::to_string(self)?
        };
        Ok(json)
    }
}

/// JSON representation of an error for machine consumption.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorJson {
    schema_version: &'static str,
    error_code: &'static str,
    category: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    slot: Option<&'static str>,
}

/// Render an error for stderr.
#[must_use]
pub fn render_error(error: &HistoryError, format: OutputFormat, pretty: bool) -> String {
    match format {
        OutputFormat::Human => render_simple(error),
        OutputFormat::Json => {
            let json = ErrorJson {
                schema_version: SCHEMA_VERSION,
                error_code: error.error_code(),
                category: error.category().to_string(),
                message: error.to_string(),
                slot: error.slot().map(|slot| slot.file_name()),
            };
            let rendered = if pretty {
                serde_json::to_string_pretty(&json)
            } else {
                serde_json::to_string(&json)
            };
            rendered.unwrap_or_else(|_| render_simple(error))
        }
    }
}

fn render_simple(error: &HistoryError) -> String {
    format!("Error [{}]: {}", error.error_code(), error)
}
