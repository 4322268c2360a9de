//! Error types for Tollgate configuration and tool dispatch.

use thiserror::Error;

/// Main error type for Tollgate operations
#[derive(Error, Debug)]
pub enum TollgateError {
    /// Configuration failed validation
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// Configuration source could not be read or parsed
    #[error("failed to parse config: {0}")]
    ConfigParse(String),

    /// No tool registered under the requested name
    #[error("unknown tool '{0}'")]
    UnknownTool(String),

    /// Arguments did not match the tool's input schema
    #[error("invalid arguments for tool '{0}': {1}")]
    InvalidArguments(String, String),

    /// Tool ran but failed to produce a result
    #[error("tool '{0}' failed: {1}")]
    ToolFailed(String, String),
}

/// Result type alias for Tollgate operations
pub type Result<T> = std::result::Result<T, TollgateError>;
