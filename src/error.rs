//! Configuration error types for the API client core.
//!
//! This module contains the error type returned when a client configuration
//! or one of its validated newtypes cannot be constructed.
//!
//! # Error Handling
//!
//! All configuration constructors return `Result<T, ConfigError>` to enable
//! fail-fast validation. Error messages are designed to be clear and actionable.
//!
//! # Example
//!
//! ```rust
//! use api_client::{BaseUrl, ConfigError};
//!
//! let result = BaseUrl::new("not a url");
//! assert!(matches!(result, Err(ConfigError::InvalidBaseUrl { .. })));
//! ```

use thiserror::Error;

/// Errors that can occur while configuring a client.
///
/// Each variant provides a clear, actionable error message.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Base URL is invalid.
    #[error("Invalid base URL '{url}'. Please provide an absolute http(s) URL (e.g., 'https://api.example.com/v2').")]
    InvalidBaseUrl {
        /// The invalid URL that was provided.
        url: String,
    },

    /// The concurrency ceiling must admit at least one operation.
    #[error("Maximum concurrent tasks must be at least 1.")]
    InvalidMaxConcurrentTasks,

    /// A required field is missing.
    #[error("Missing required field: '{field}'. This field must be set before building the configuration.")]
    MissingRequiredField {
        /// The name of the missing field.
        field: &'static str,
    },

    /// The client was created outside of a Tokio runtime.
    #[error("HttpClient must be created from within a Tokio runtime.")]
    MissingRuntime,

    /// The default transport could not be initialized.
    #[error("Failed to initialize the HTTP transport: {message}")]
    TransportInit {
        /// Description of the underlying failure.
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_base_url_error_message() {
        let error = ConfigError::InvalidBaseUrl {
            url: "bad url!".to_string(),
        };
        let message = error.to_string();
        assert!(message.contains("bad url!"));
        assert!(message.contains("absolute http(s) URL"));
    }

    #[test]
    fn test_missing_required_field_error_message() {
        let error = ConfigError::MissingRequiredField { field: "base_url" };
        let message = error.to_string();
        assert!(message.contains("base_url"));
        assert!(message.contains("must be set"));
    }

    #[test]
    fn test_error_implements_std_error() {
        let error = ConfigError::MissingRuntime;
        let _: &dyn std::error::Error = &error;
    }
}
