//! Error types for vpn-history.
//!
//! Uses `thiserror` for structured error types that map to exit codes.
//!
//! ## Error Taxonomy
//!
//! Lookups never fail: a missing cache entry, token or profile is `None`.
//! The errors below only come from the ambient layers:
//! - **Configuration**: config file parsing, validation, or bad values
//! - **Persistence**: the backing store could not read or write a slot
//! - **Internal**: I/O, serialization, or unclassified issues
//!
//! Each error has a stable error code (e.g., `VPNH-C001`) for programmatic handling.

use thiserror::Error;

use crate::storage::backend::Slot;

// =============================================================================
// Error Categories
// =============================================================================

/// High-level error categories for classification and routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Configuration issues (parse errors, invalid values).
    Configuration,
    /// The persistence backend failed to load or store a slot.
    Persistence,
    /// Internal errors (I/O, serialization, unclassified).
    Internal,
}

impl ErrorCategory {
    /// Returns a human-readable description of the category.
    #[must_use]
    pub const fn description(&self) -> &'static str {
        match self {
            Self::Configuration => "Configuration error",
            Self::Persistence => "Persistence error",
            Self::Internal => "Internal error",
        }
    }

    /// Returns a short code prefix for this category.
    #[must_use]
    pub const fn code_prefix(&self) -> &'static str {
        match self {
            Self::Configuration => "C",
            Self::Persistence => "P",
            Self::Internal => "X",
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.description())
    }
}

// =============================================================================
// Exit Codes
// =============================================================================

/// Process exit codes for the `vpnhist` binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExitCode {
    /// Success
    Success = 0,
    /// Unexpected failure
    GeneralError = 1,
    /// Invalid or unreadable configuration
    ConfigError = 2,
    /// Backing store could not be read or written
    StorageError = 3,
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as Self
    }
}

/// Main error type for vpn-history operations.
#[derive(Error, Debug)]
pub enum HistoryError {
    // ==========================================================================
    // Configuration errors (Category: Configuration)
    // ==========================================================================
    /// Generic configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Error parsing configuration file.
    #[error("config parse error at {path}: {message}")]
    ConfigParse { path: String, message: String },

    /// Invalid value in configuration.
    #[error("invalid config value for '{key}': {message}")]
    ConfigInvalid {
        key: String,
        value: String,
        message: String,
    },

    // ==========================================================================
    // Persistence errors (Category: Persistence)
    // ==========================================================================
    /// The backend failed to load or store a slot.
    #[error("persistence failed for {slot}: {source}")]
    Persistence {
        slot: Slot,
        #[source]
        source: std::io::Error,
    },

    // ==========================================================================
    // Internal errors (Category: Internal)
    // ==========================================================================
    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Catch-all for other errors.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl HistoryError {
    /// Wrap an I/O failure of the backing store for `slot`.
    #[must_use]
    pub const fn persistence(slot: Slot, source: std::io::Error) -> Self {
        Self::Persistence { slot, source }
    }

    /// Map error to a process exit code.
    #[must_use]
    pub const fn exit_code(&self) -> ExitCode {
        match self.category() {
            ErrorCategory::Configuration => ExitCode::ConfigError,
            ErrorCategory::Persistence => ExitCode::StorageError,
            ErrorCategory::Internal => ExitCode::GeneralError,
        }
    }

    /// Returns the error category for classification and routing.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::Config(_) | Self::ConfigParse { .. } | Self::ConfigInvalid { .. } => {
                ErrorCategory::Configuration
            }
            Self::Persistence { .. } => ErrorCategory::Persistence,
            Self::Io(_) | Self::Json(_) | Self::Other(_) => ErrorCategory::Internal,
        }
    }

    /// Returns a stable error code for programmatic handling.
    ///
    /// Format: `VPNH-{category}{number}`.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::ConfigParse { .. } => "VPNH-C001",
            Self::ConfigInvalid { .. } => "VPNH-C002",
            Self::Config(_) => "VPNH-C003",
            Self::Persistence { .. } => "VPNH-P001",
            Self::Io(_) => "VPNH-X001",
            Self::Json(_) => "VPNH-X002",
            Self::Other(_) => "VPNH-X099",
        }
    }

    /// Returns the persistence slot involved, if any.
    #[must_use]
    pub const fn slot(&self) -> Option<Slot> {
        match self {
            Self::Persistence { slot, .. } => Some(*slot),
            _ => None,
        }
    }
}

/// Result type alias for vpn-history operations.
pub type Result<T> = std::result::Result<T, HistoryError>;

// =============================================================================
// Tests
// =============================================================================
