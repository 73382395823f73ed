//! Errors from the sandbox HTTP API.

use std::fmt;

/// Category of a sandbox request failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SandboxErrorKind {
    /// Connection refused, DNS failure, broken body stream
    Transport,
    /// Non-2xx response
    HttpStatus,
    /// Body was not the JSON we expected
    Parse,
    /// Request exceeded the configured timeout
    Timeout,
}

impl fmt::Display for SandboxErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SandboxErrorKind::Transport => write!(f, "transport"),
            SandboxErrorKind::HttpStatus => write!(f, "http_status"),
            SandboxErrorKind::Parse => write!(f, "parse"),
            SandboxErrorKind::Timeout => write!(f, "timeout"),
        }
    }
}

/// Structured sandbox error. `message` is what the terminal shows.
#[derive(Debug, Clone)]
pub struct SandboxError {
    pub kind: SandboxErrorKind,
    pub message: String,
    pub details: Option<String>,
}

impl SandboxError {
    pub const COMMAND_FAILED_TO_START: &str = "Command failed to start";
    pub const MALFORMED_JSON: &str = "Malformed JSON response from sandbox";

    pub fn new(kind: SandboxErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: None,
        }
    }

    /// Creates an HTTP status error; the body text is the message.
    pub fn http_status(status: u16, body: &str) -> Self {
        let message = if body.is_empty() {
            Self::COMMAND_FAILED_TO_START.to_string()
        } else {
            body.to_string()
        };
        Self {
            kind: SandboxErrorKind::HttpStatus,
            message,
            details: Some(format!("HTTP {status}")),
        }
    }

    pub fn malformed_json(err: &serde_json::Error) -> Self {
        Self {
            kind: SandboxErrorKind::Parse,
            message: Self::MALFORMED_JSON.to_string(),
            details: Some(err.to_string()),
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(SandboxErrorKind::Timeout, message)
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(SandboxErrorKind::Transport, message)
    }
}

impl fmt::Display for SandboxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for SandboxError {}

impl From<reqwest::Error> for SandboxError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            SandboxError::timeout(format!("Request timed out: {e}"))
        } else if e.is_connect() {
            SandboxError::transport(format!("Connection failed: {e}"))
        } else if e.is_decode() || e.is_body() {
            SandboxError::transport(format!("Failed to read response: {e}"))
        } else {
            SandboxError::transport(format!("Network error: {e}"))
        }
    }
}

/// Result type for sandbox operations.
pub type SandboxResult<T> = std::result::Result<T, SandboxError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_status_uses_body_as_message() {
        let err = SandboxError::http_status(500, "sandbox exploded");
        assert_eq!(err.kind, SandboxErrorKind::HttpStatus);
        assert_eq!(err.to_string(), "sandbox exploded");
        assert_eq!(err.details.as_deref(), Some("HTTP 500"));
    }

    #[test]
    fn test_http_status_empty_body() {
        let err = SandboxError::http_status(502, "");
        assert_eq!(err.message, "Command failed to start");
    }
}
