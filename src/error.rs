// src/error.rs

//! Unified error handling for the watcher.

use std::fmt;

use thiserror::Error;

/// Result type alias for watcher operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed (connection, timeout or error status)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// CSS selector parsing failed
    #[error("Invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },

    /// Expected markup or date pattern was missing or malformed
    #[error("Parse error in {context}: {message}")]
    Parse { context: String, message: String },

    /// Backend rejected the login or its outcome could not be determined
    #[error("Login failed: {0}")]
    Login(String),

    /// Backend reported an error while renting
    #[error("Rent failed: {0}")]
    Rent(String),

    /// Backend reported an error while reserving
    #[error("Reserve failed: {0}")]
    Reserve(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Coarse classification of an [`AppError`], used when logging action failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    /// Network, timeout or HTTP status failure
    Transport,
    /// Page structure or date text did not match expectations
    Parse,
    /// Backend-reported business error
    Domain,
    /// Anything else (I/O, configuration, ...)
    Other,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureKind::Transport => "transport",
            FailureKind::Parse => "parse",
            FailureKind::Domain => "domain",
            FailureKind::Other => "other",
        };
        f.write_str(name)
    }
}

impl AppError {
    /// Create a selector parsing error.
    pub fn selector(selector: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Selector {
            selector: selector.into(),
            message: message.to_string(),
        }
    }

    /// Create a parse error with context.
    pub fn parse(context: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Parse {
            context: context.into(),
            message: message.to_string(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Classify this error.
    pub fn kind(&self) -> FailureKind {
        match self {
            AppError::Http(_) => FailureKind::Transport,
            AppError::Parse { .. } | AppError::Selector { .. } | AppError::Url(_) => {
                FailureKind::Parse
            }
            AppError::Login(_) | AppError::Rent(_) | AppError::Reserve(_) => FailureKind::Domain,
            _ => FailureKind::Other,
        }
    }

    /// True for network-level failures that should only skip the affected request.
    pub fn is_transport(&self) -> bool {
        self.kind() == FailureKind::Transport
    }
}
