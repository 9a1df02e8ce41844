//! Error types for the MCP toolkit
//!
//! This module defines the error hierarchy for all operations in the server.
//! Tool and validation errors are displayed without a category prefix because
//! their messages are returned verbatim to the calling model.

use thiserror::Error;

/// Main error type for the MCP toolkit
#[derive(Error, Debug)]
pub enum ToolkitError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Argument validation errors
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Failures raised by a tool while executing
    #[error(transparent)]
    Tool(#[from] ToolError),

    /// MCP protocol errors
    #[error("MCP protocol error: {0}")]
    Mcp(#[from] McpError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {message}")]
    InvalidValue { var: String, message: String },

    #[error("Unknown toolset: {name}")]
    UnknownToolset { name: String },

    #[error("No usable allowed directories")]
    NoAllowedDirectories,
}

/// Validation errors
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Invalid arguments: {message}")]
    InvalidArguments { message: String },

    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid parameter: {name} - {message}")]
    InvalidParameter { name: String, message: String },
}

/// Errors raised by tool implementations
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("Access denied to {path}")]
    AccessDenied { path: String },

    #[error("File not found: {path}")]
    FileNotFound { path: String },

    #[error("Directory not found: {path}")]
    DirectoryNotFound { path: String },

    #[error("Path not found: {path}")]
    PathNotFound { path: String },

    #[error("{path} is not a file")]
    NotAFile { path: String },

    #[error("{path} is not a directory")]
    NotADirectory { path: String },

    #[error("Cannot read {path} as text (binary file?)")]
    BinaryFile { path: String },

    #[error("Invalid glob pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Birth year cannot be in the future")]
    BirthYearInFuture,

    #[error("Age for birth year {birth_year} is out of range")]
    AgeOutOfRange { birth_year: i32 },

    #[error("{message}")]
    Failed { message: String },
}

/// MCP protocol errors
#[derive(Error, Debug)]
pub enum McpError {
    #[error("Unknown tool: {name}")]
    UnknownTool { name: String },

    #[error("Protocol error: {message}")]
    ProtocolError { message: String },

    #[error("Server returned error {code}: {message}")]
    ServerError { code: i32, message: String },

    #[error("Transport error: {message}")]
    TransportError { message: String },

    #[error("Timed out waiting for response to {method}")]
    Timeout { method: String },
}

/// Result type alias for toolkit operations
pub type Result<T> = std::result::Result<T, ToolkitError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_error_is_unprefixed() {
        let err: ToolkitError = ToolError::AccessDenied {
            path: "/etc/passwd".to_string(),
        }
        .into();
        assert_eq!(err.to_string(), "Access denied to /etc/passwd");
    }

    #[test]
    fn test_error_conversion() {
        let err: ToolkitError = McpError::UnknownTool {
            name: "nope".to_string(),
        }
        .into();
        assert!(matches!(err, ToolkitError::Mcp(_)));
        assert!(err.to_string().contains("Unknown tool: nope"));
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::InvalidValue {
            var: "MCP_TOOLKIT_RATE_LIMIT".to_string(),
            message: "not a number".to_string(),
        };
        assert!(err.to_string().contains("MCP_TOOLKIT_RATE_LIMIT"));
    }
}
