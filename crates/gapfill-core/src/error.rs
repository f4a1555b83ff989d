//! Error types for gapfill-core

use std::fmt::Write;
use thiserror::Error;

/// Remediation command for resolving an error
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RemediationCommand {
    /// Short label describing the command purpose
    pub label: String,
    /// Command to run
    pub command: String,
}

/// Actionable remediation guidance for an error
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Remediation {
    /// One-line summary of how to fix the issue
    pub summary: String,
    /// Suggested commands to resolve or diagnose the issue
    pub commands: Vec<RemediationCommand>,
    /// Additional alternative guidance
    pub alternatives: Vec<String>,
}

impl Remediation {
    /// Create a new remediation with a summary
    #[must_use]
    pub fn new(summary: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
            commands: Vec::new(),
            alternatives: Vec::new(),
        }
    }

    /// Add a command
    #[must_use]
    pub fn command(mut self, label: impl Into<String>, command: impl Into<String>) -> Self {
        self.commands.push(RemediationCommand {
            label: label.into(),
            command: command.into(),
        });
        self
    }

    /// Add an alternative suggestion
    #[must_use]
    pub fn alternative(mut self, alternative: impl Into<String>) -> Self {
        self.alternatives.push(alternative.into());
        self
    }

    /// Render remediation text for human-readable output
    #[must_use]
    pub fn render_plain(&self) -> String {
        let mut output = String::new();
        let _ = writeln!(output, "To fix:");
        let _ = writeln!(output, "  {}", self.summary);

        if !self.commands.is_empty() {
            let _ = writeln!(output, "  Commands:");
            for cmd in &self.commands {
                let _ = writeln!(output, "    - {}: {}", cmd.label, cmd.command);
            }
        }

        if !self.alternatives.is_empty() {
            let _ = writeln!(output, "  Alternatives:");
            for alt in &self.alternatives {
                let _ = writeln!(output, "    - {alt}");
            }
        }

        output
    }
}

/// Result type alias using the library's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for gapfill-core
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// Remote or local store errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Runtime errors (task join failures, runtime construction, etc.)
    #[error("Runtime error: {0}")]
    Runtime(String),
}

/// Coarse classification used by the CLI to pick exit behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitClass {
    /// Missing or invalid configuration; nothing was read or written.
    Configuration,
    /// The store could not be reached.
    Connection,
    /// Anything else.
    Unhandled,
}

impl Error {
    /// Return remediation guidance when available.
    #[must_use]
    pub fn remediation(&self) -> Option<Remediation> {
        match self {
            Self::Config(err) => Some(err.remediation()),
            Self::Store(err) => Some(err.remediation()),
            Self::Io(_) => Some(
                Remediation::new("Check filesystem permissions and paths, then retry.")
                    .alternative("Verify the store file and log file directories are writable."),
            ),
            Self::Json(_) => Some(
                Remediation::new("Validate the JSON input and retry.")
                    .command("Validate JSON", "python -m json.tool < rows.json"),
            ),
            Self::Runtime(_) => Some(Remediation::new(
                "Retry the command. Completed repairs are kept and will not be repeated.",
            )),
        }
    }

    /// Classify the error for exit-code selection.
    #[must_use]
    pub fn exit_class(&self) -> ExitClass {
        match self {
            Self::Config(_) => ExitClass::Configuration,
            Self::Store(StoreError::Connection(_)) => ExitClass::Connection,
            _ => ExitClass::Unhandled,
        }
    }
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {0}: {1}")]
    ReadFailed(String, String),

    #[error("Failed to parse config: {0}")]
    ParseFailed(String),

    #[error("Missing required setting: {0}")]
    Missing(String),

    #[error("Invalid setting {field}: {reason}")]
    Invalid { field: String, reason: String },
}

impl ConfigError {
    #[must_use]
    pub fn remediation(&self) -> Remediation {
        match self {
            Self::ReadFailed(path, _) => Remediation::new(format!(
                "Failed to read config file: {path}. Check the path and permissions."
            ))
            .command("Check path", format!("ls -l \"{path}\""))
            .alternative("Pass --config with the correct path."),
            Self::ParseFailed(_) => {
                Remediation::new("Config parse failed. Fix the TOML syntax and retry.")
                    .alternative("Compare against the sections [store], [columns], [engine], [logging].")
            }
            Self::Missing(field) => Remediation::new(format!("Set `{field}` in gapfill.toml."))
                .alternative("The access token may also be supplied via GAPFILL_ACCESS_TOKEN."),
            Self::Invalid { field, .. } => {
                Remediation::new(format!("Correct the value of `{field}` in gapfill.toml."))
            }
        }
    }
}

/// Store adapter errors
#[derive(Error, Debug)]
pub enum StoreError {
    /// The store could not be reached or opened.
    #[error("Cannot reach store: {0}")]
    Connection(String),

    /// The remote API rejected a request.
    #[error("API error ({status}): {body}")]
    Api { status: u16, body: String },

    /// The store answered with something we could not interpret.
    #[error("Invalid store response: {0}")]
    InvalidResponse(String),

    /// A write targeted a row that does not exist.
    #[error("Position {position} is outside the log (length {len})")]
    PositionOutOfRange { position: usize, len: usize },

    /// Local persistence failure (file backend).
    #[error("Store I/O error: {0}")]
    Io(String),
}

impl StoreError {
    #[must_use]
    pub fn remediation(&self) -> Remediation {
        match self {
            Self::Connection(_) => Remediation::new(
                "Check network access, the spreadsheet id and the access token, then retry.",
            )
            .command("Refresh token", "gcloud auth print-access-token")
            .alternative("For offline repair use `backend = \"file\"` with an exported log."),
            Self::Api { status, .. } if *status == 429 => Remediation::new(
                "The store rate limit was exceeded. Raise engine.write_interval_ms and retry.",
            ),
            Self::Api { status, .. } if *status == 401 || *status == 403 => Remediation::new(
                "The access token was rejected. Refresh it and confirm the sheet is shared.",
            )
            .command("Refresh token", "gcloud auth print-access-token"),
            Self::Api { .. } | Self::InvalidResponse(_) => Remediation::new(
                "The store rejected the request. Check the worksheet name and column layout.",
            ),
            Self::PositionOutOfRange { .. } => Remediation::new(
                "The log changed during the run. Re-run; positions are re-derived on start.",
            ),
            Self::Io(_) => Remediation::new("Check that the store file is writable."),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_plain_includes_summary_and_commands() {
        let r = Remediation::new("Fix it").command("Refresh", "gcloud auth print-access-token");
        let output = r.render_plain();
        assert!(output.contains("To fix:"));
        assert!(output.contains("Fix it"));
        assert!(output.contains("Refresh: gcloud auth print-access-token"));
    }

    #[test]
    fn render_plain_omits_empty_sections() {
        let output = Remediation::new("Fix it").render_plain();
        assert!(!output.contains("Commands:"));
        assert!(!output.contains("Alternatives:"));
    }

    #[test]
    fn exit_class_separates_fatal_kinds() {
        let err: Error = ConfigError::Missing("store.spreadsheet_id".to_string()).into();
        assert_eq!(err.exit_class(), ExitClass::Configuration);

        let err: Error = StoreError::Connection("dns".to_string()).into();
        assert_eq!(err.exit_class(), ExitClass::Connection);

        let err: Error = StoreError::Api {
            status: 500,
            body: "boom".to_string(),
        }
        .into();
        assert_eq!(err.exit_class(), ExitClass::Unhandled);

        let err = Error::Runtime("task panicked".to_string());
        assert_eq!(err.exit_class(), ExitClass::Unhandled);
    }

    #[test]
    fn store_error_display_includes_context() {
        let err = StoreError::PositionOutOfRange {
            position: 40,
            len: 12,
        };
        let msg = err.to_string();
        assert!(msg.contains("40") && msg.contains("12"));
    }

    #[test]
    fn rate_limit_remediation_mentions_interval() {
        let r = StoreError::Api {
            status: 429,
            body: String::new(),
        }
        .remediation();
        assert!(r.summary.contains("write_interval_ms"));
    }

    #[test]
    fn runtime_failure_suggests_rerun() {
        let r = Error::Runtime("task panicked".to_string())
            .remediation()
            .unwrap();
        assert!(r.summary.contains("Retry"));
    }
}
