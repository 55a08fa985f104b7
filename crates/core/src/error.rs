//! Error types for document conversion.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Main error type for the doc-converter library.
#[derive(Error, Debug)]
pub enum ConversionError {
    /// Input file or directory not found.
    #[error("Input not found: {0}")]
    InputNotFound(PathBuf),

    /// No operation exists for this extension/target pair.
    #[error("Cannot convert '{extension}' files to {target}")]
    UnsupportedConversion { extension: String, target: String },

    /// The external tool failed or produced no output.
    #[error("Conversion failed for '{path}': {message}")]
    ConversionFailed { path: PathBuf, message: String },

    /// The external tool is not installed or not found in PATH.
    #[error("{tool} not found. {hint}")]
    ToolNotFound { tool: &'static str, hint: &'static str },

    /// External process failed to start.
    #[error("Failed to start external process: {0}")]
    ProcessStartFailed(#[from] std::io::Error),

    /// Unit of work exceeded its time budget.
    #[error("Conversion timed out after {timeout:?} for '{path}'")]
    Timeout { path: PathBuf, timeout: Duration },

    /// Output location cannot be created or written.
    #[error("Permission denied for '{path}': {message}")]
    PermissionDenied { path: PathBuf, message: String },

    /// Output file could not be placed at its destination.
    #[error("Failed to write output '{path}': {message}")]
    OutputDirError { path: PathBuf, message: String },

    /// Invalid configuration or options.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Batch was cancelled before this unit was dispatched.
    #[error("Cancelled before '{path}' was converted")]
    Cancelled { path: PathBuf },

    /// Channel communication error.
    #[error("Internal channel error: {0}")]
    ChannelError(String),
}

/// Coarse classification of a [`ConversionError`], stable enough to put in
/// summaries and to map onto process exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    UnsupportedConversion,
    Conversion,
    Timeout,
    Permission,
    InvalidConfig,
    Cancelled,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::NotFound => "not found",
            ErrorKind::UnsupportedConversion => "unsupported conversion",
            ErrorKind::Conversion => "conversion error",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Permission => "permission denied",
            ErrorKind::InvalidConfig => "invalid configuration",
            ErrorKind::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

impl ConversionError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ConversionError::InputNotFound(_) => ErrorKind::NotFound,
            ConversionError::UnsupportedConversion { .. } => ErrorKind::UnsupportedConversion,
            ConversionError::ConversionFailed { .. }
            | ConversionError::ToolNotFound { .. }
            | ConversionError::ProcessStartFailed(_)
            | ConversionError::OutputDirError { .. }
            | ConversionError::ChannelError(_) => ErrorKind::Conversion,
            ConversionError::Timeout { .. } => ErrorKind::Timeout,
            ConversionError::PermissionDenied { .. } => ErrorKind::Permission,
            ConversionError::InvalidConfig(_) => ErrorKind::InvalidConfig,
            ConversionError::Cancelled { .. } => ErrorKind::Cancelled,
        }
    }

    /// Build an error for reading `path` on the input side. A missing path
    /// means the input is gone.
    pub fn from_io(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        let path = path.into();
        match err.kind() {
            std::io::ErrorKind::NotFound => ConversionError::InputNotFound(path),
            _ => Self::output_io(path, err),
        }
    }

    /// Build an error for creating or writing `path` on the output side.
    pub fn output_io(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        let path = path.into();
        match err.kind() {
            std::io::ErrorKind::PermissionDenied => ConversionError::PermissionDenied {
                path,
                message: err.to_string(),
            },
            _ => ConversionError::OutputDirError {
                path,
                message: err.to_string(),
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, ConversionError>;

impl From<async_channel::RecvError> for ConversionError {
    fn from(_: async_channel::RecvError) -> Self {
        ConversionError::ChannelError("receiver found the channel closed".to_string())
    }
}
