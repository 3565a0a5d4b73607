//! CLI-specific error types
//!
//! All CLI errors are FATAL: the process exits non-zero. Per-input
//! resolution failures are not CLI errors; they are written as responses.

use std::fmt;
use std::io;

use crate::schema::LoaderError;

/// CLI error codes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliErrorCode {
    /// Configuration file error
    ConfigError,
    /// I/O error (stdin/stdout)
    IoError,
    /// Definitions could not be loaded
    LoadFailed,
    /// Requested root is not loaded
    UnknownRoot,
    /// An input line is not JSON
    MalformedRequest,
}

impl CliErrorCode {
    /// Get the error code string
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConfigError => "AERO_CLI_CONFIG_ERROR",
            Self::IoError => "AERO_CLI_IO_ERROR",
            Self::LoadFailed => "AERO_CLI_LOAD_FAILED",
            Self::UnknownRoot => "AERO_CLI_UNKNOWN_ROOT",
            Self::MalformedRequest => "AERO_CLI_MALFORMED_REQUEST",
        }
    }
}

/// CLI error
#[derive(Debug)]
pub struct CliError {
    code: CliErrorCode,
    message: String,
}

impl CliError {
    /// Create a new CLI error
    pub fn new(code: CliErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Config error
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::ConfigError, msg)
    }

    /// I/O error
    pub fn io_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::IoError, msg)
    }

    /// Root not found among loaded hierarchies
    pub fn unknown_root(root: &str) -> Self {
        Self::new(
            CliErrorCode::UnknownRoot,
            format!("No hierarchy with root [{}] is loaded", root),
        )
    }

    /// No `--root` and no configured default
    pub fn missing_root() -> Self {
        Self::new(
            CliErrorCode::UnknownRoot,
            "No root given. Pass --root or set 'root' in the configuration.",
        )
    }

    /// Get the error code
    pub fn code(&self) -> &CliErrorCode {
        &self.code
    }

    /// Get the error code string
    pub fn code_str(&self) -> &'static str {
        self.code.code()
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.code(), self.message)
    }
}

impl std::error::Error for CliError {}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        Self::io_error(e.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        Self::io_error(format!("JSON error: {}", e))
    }
}

impl From<LoaderError> for CliError {
    fn from(e: LoaderError) -> Self {
        Self::new(CliErrorCode::LoadFailed, format!("{} ({})", e, e.code()))
    }
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;
