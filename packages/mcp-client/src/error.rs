//! Error types for the MCP client.

use thiserror::Error;

/// Result type for MCP client operations.
pub type Result<T> = std::result::Result<T, McpError>;

/// MCP client errors.
#[derive(Debug, Error)]
pub enum McpError {
    /// Network error (connection refused, reset, DNS)
    #[error("Network error: {0}")]
    Network(String),

    /// The call did not complete within the configured timeout
    #[error("MCP tool '{tool}' timed out")]
    Timeout { tool: String },

    /// Non-2xx response from the tool endpoint
    #[error("MCP tool '{tool}' failed with status {status}: {body}")]
    Status {
        tool: String,
        status: u16,
        body: String,
    },

    /// Parse error (invalid JSON, unexpected response shape)
    #[error("Parse error: {0}")]
    Parse(String),
}

impl McpError {
    /// HTTP status code, when the failure came from a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            McpError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}
