// src/error.rs

//! Unified error handling for the storefront.

use std::fmt;

use thiserror::Error;

/// Result type alias for storefront operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization failed
    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Input rejected at the boundary
    #[error("Validation error: {0}")]
    Validation(String),

    /// Requested entity does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Illegal state transition or uniqueness violation
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Email transport provider failed
    #[error("Provider error for {provider}: {message}")]
    Provider { provider: String, message: String },

    /// Catalog folder could not be scanned
    #[error("Scan error for {path}: {message}")]
    Scan { path: String, message: String },

    /// Order store failure
    #[error("Storage error: {0}")]
    Storage(String),
}

impl AppError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a not-found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Create a conflict error.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    /// Create a storage error.
    pub fn storage(message: impl fmt::Display) -> Self {
        Self::Storage(message.to_string())
    }

    /// Create a provider error with context.
    pub fn provider(provider: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.to_string(),
        }
    }

    /// Create a scan error with context.
    pub fn scan(path: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Scan {
            path: path.into(),
            message: message.to_string(),
        }
    }

    /// Whether the error was caused by the client rather than the server.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::NotFound(_) | Self::Conflict(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_are_classified() {
        assert!(AppError::validation("bad email").is_client_error());
        assert!(AppError::conflict("already paid").is_client_error());
        assert!(!AppError::storage("disk full").is_client_error());
        assert!(!AppError::provider("resend", "timeout").is_client_error());
    }

    #[test]
    fn provider_error_message_names_provider() {
        let err = AppError::provider("mailersend", "HTTP 422");
        assert_eq!(err.to_string(), "Provider error for mailersend: HTTP 422");
    }
}
