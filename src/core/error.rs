//! Custom error types for autoheal
//!
//! Provides a unified error handling system across all modules.

use thiserror::Error;

/// Main error type for autoheal operations
#[derive(Error, Debug)]
pub enum AutohealError {
    /// LLM service connection or API errors
    #[error("LLM error: {0}")]
    Llm(String),

    /// Browser automation errors
    #[error("Browser error: {0}")]
    Browser(String),

    /// Element could not be located
    #[error("Locator error: {0}")]
    Locator(String),

    /// Tool execution errors
    #[error("Tool execution error: {0}")]
    ToolExecution(String),

    /// Configuration errors (missing credentials, unreadable config)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Durable storage errors
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// JSON parsing errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Browser driver binary not installed
    #[error("agent-browser not found. Install with: npm install -g agent-browser && agent-browser install")]
    DriverNotFound,

    /// Model not available
    #[error("Model '{0}' not available from the configured LLM provider")]
    ModelNotFound(String),

    /// Generic error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Generic error for other cases
    #[error("{0}")]
    Other(String),
}

/// Convenience Result type for autoheal operations
pub type Result<T> = std::result::Result<T, AutohealError>;

impl AutohealError {
    /// Create an LLM error
    pub fn llm(msg: impl Into<String>) -> Self {
        Self::Llm(msg.into())
    }

    /// Create a browser error
    pub fn browser(msg: impl Into<String>) -> Self {
        Self::Browser(msg.into())
    }

    /// Create a locator error
    pub fn locator(msg: impl Into<String>) -> Self {
        Self::Locator(msg.into())
    }

    /// Create a tool execution error
    pub fn tool(msg: impl Into<String>) -> Self {
        Self::ToolExecution(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a persistence error
    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::Persistence(msg.into())
    }

    /// Wrap an error with additional context
    pub fn with_context<E>(context: impl Into<String>, error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::WithContext {
            context: context.into(),
            source: Box::new(error),
        }
    }

    /// Whether this error must abort construction instead of being folded into a result
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    /// Errors that end a run outright instead of becoming a failed step
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Config(_) | Self::DriverNotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AutohealError::config("missing OPENAI_API_KEY");
        assert_eq!(
            err.to_string(),
            "Configuration error: missing OPENAI_API_KEY"
        );
        assert!(err.is_config());
        assert!(err.is_fatal());
        assert!(AutohealError::DriverNotFound.is_fatal());
        assert!(!AutohealError::browser("timeout").is_fatal());
        assert!(!AutohealError::browser("timeout").is_config());
    }

    #[test]
    fn test_with_context() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
        let err = AutohealError::with_context("saving memory", io);
        assert_eq!(err.to_string(), "saving memory: disk full");
    }
}
