//! Configuration types for the API client core.
//!
//! This module provides the configuration used to construct an
//! [`HttpClient`](crate::HttpClient).
//!
//! # Overview
//!
//! The main types in this module are:
//!
//! - [`ClientConfig`]: The configuration struct holding all client settings
//! - [`ClientConfigBuilder`]: A builder for constructing [`ClientConfig`] instances
//! - [`BaseUrl`]: A validated base address for request endpoints
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use api_client::{BaseUrl, ClientConfig};
//!
//! let config = ClientConfig::builder()
//!     .base_url(BaseUrl::new("https://api.example.com").unwrap())
//!     .max_concurrent_tasks(8)
//!     .request_timeout(Duration::from_secs(30))
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(config.max_concurrent_tasks(), 8);
//! ```

mod newtypes;

pub use newtypes::BaseUrl;

use std::time::Duration;

use crate::error::ConfigError;

/// Crate version from Cargo.toml.
pub const SDK_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default ceiling on simultaneously running transport operations.
pub const DEFAULT_MAX_CONCURRENT_TASKS: usize = 4;

/// Default per-attempt timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Default timeout for a whole `perform` call (seven days).
pub const DEFAULT_RESOURCE_TIMEOUT: Duration = Duration::from_secs(604_800);

/// Default bound on a single authentication refresh.
pub const DEFAULT_AUTHENTICATION_TIMEOUT: Duration = Duration::from_secs(60);

/// Default number of post-refresh retries a single request may go through.
pub const DEFAULT_MAX_AUTHENTICATION_RETRIES: u32 = 3;

/// Configuration for an [`HttpClient`](crate::HttpClient).
///
/// # Thread Safety
///
/// `ClientConfig` is `Clone`, `Send`, and `Sync`, making it safe to share
/// across threads and async tasks.
///
/// # Example
///
/// ```rust
/// use api_client::{BaseUrl, ClientConfig};
///
/// let config = ClientConfig::builder()
///     .base_url(BaseUrl::new("https://api.example.com").unwrap())
///     .header("X-Api-Key", "secret")
///     .build()
///     .unwrap();
///
/// assert!(config
///     .default_headers()
///     .iter()
///     .any(|(name, _)| name == "X-Api-Key"));
/// ```
#[derive(Clone, Debug)]
pub struct ClientConfig {
    base_url: BaseUrl,
    default_headers: Vec<(String, String)>,
    user_agent_prefix: Option<String>,
    request_timeout: Duration,
    resource_timeout: Duration,
    max_concurrent_tasks: usize,
    authentication_timeout: Option<Duration>,
    max_authentication_retries: u32,
}

impl ClientConfig {
    /// Creates a new builder for constructing a `ClientConfig`.
    #[must_use]
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::new()
    }

    /// Returns the base address requests are resolved against.
    #[must_use]
    pub const fn base_url(&self) -> &BaseUrl {
        &self.base_url
    }

    /// Returns the headers sent with every request, including `User-Agent`
    /// and `Accept`.
    #[must_use]
    pub fn default_headers(&self) -> &[(String, String)] {
        &self.default_headers
    }

    /// Returns the user agent prefix, if configured.
    #[must_use]
    pub fn user_agent_prefix(&self) -> Option<&str> {
        self.user_agent_prefix.as_deref()
    }

    /// Returns the timeout applied to each transport attempt.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Returns the timeout applied to a whole `perform` call, including time
    /// spent queued or waiting for re-authentication.
    #[must_use]
    pub const fn resource_timeout(&self) -> Duration {
        self.resource_timeout
    }

    /// Returns the ceiling on simultaneously running operations.
    #[must_use]
    pub const fn max_concurrent_tasks(&self) -> usize {
        self.max_concurrent_tasks
    }

    /// Returns the bound on a single authentication refresh, if any.
    #[must_use]
    pub const fn authentication_timeout(&self) -> Option<Duration> {
        self.authentication_timeout
    }

    /// Returns how many times one request may be replayed after refreshes.
    #[must_use]
    pub const fn max_authentication_retries(&self) -> u32 {
        self.max_authentication_retries
    }
}

// Verify ClientConfig is Send + Sync at compile time
const _: fn() = || {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<ClientConfig>();
};

/// Builder for constructing [`ClientConfig`] instances.
///
/// The only required field is `base_url`. All other fields have sensible
/// defaults.
///
/// # Defaults
///
/// - `max_concurrent_tasks`: 4
/// - `request_timeout`: 60 seconds
/// - `resource_timeout`: 7 days
/// - `authentication_timeout`: 60 seconds
/// - `max_authentication_retries`: 3
/// - `user_agent_prefix`: `None`
#[derive(Debug, Default)]
pub struct ClientConfigBuilder {
    base_url: Option<BaseUrl>,
    headers: Vec<(String, String)>,
    user_agent_prefix: Option<String>,
    request_timeout: Option<Duration>,
    resource_timeout: Option<Duration>,
    max_concurrent_tasks: Option<usize>,
    #[allow(clippy::option_option)]
    authentication_timeout: Option<Option<Duration>>,
    max_authentication_retries: Option<u32>,
}

impl ClientConfigBuilder {
    /// Creates a new builder with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the base address (required).
    #[must_use]
    pub fn base_url(mut self, base_url: BaseUrl) -> Self {
        self.base_url = Some(base_url);
        self
    }

    /// Adds a header sent with every request.
    ///
    /// A header with the same (case-insensitive) name replaces the default.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Sets the user agent prefix.
    #[must_use]
    pub fn user_agent_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.user_agent_prefix = Some(prefix.into());
        self
    }

    /// Sets the per-attempt timeout.
    #[must_use]
    pub const fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Sets the whole-call timeout.
    #[must_use]
    pub const fn resource_timeout(mut self, timeout: Duration) -> Self {
        self.resource_timeout = Some(timeout);
        self
    }

    /// Sets the ceiling on simultaneously running operations.
    #[must_use]
    pub const fn max_concurrent_tasks(mut self, max: usize) -> Self {
        self.max_concurrent_tasks = Some(max);
        self
    }

    /// Bounds a single authentication refresh. `None` waits indefinitely.
    #[must_use]
    pub const fn authentication_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.authentication_timeout = Some(timeout);
        self
    }

    /// Sets how many times one request may be replayed after refreshes.
    #[must_use]
    pub const fn max_authentication_retries(mut self, retries: u32) -> Self {
        self.max_authentication_retries = Some(retries);
        self
    }

    /// Builds the [`ClientConfig`], validating that required fields are set.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingRequiredField`] if `base_url` is not set,
    /// or [`ConfigError::InvalidMaxConcurrentTasks`] if the ceiling is zero.
    pub fn build(self) -> Result<ClientConfig, ConfigError> {
        let base_url = self
            .base_url
            .ok_or(ConfigError::MissingRequiredField { field: "base_url" })?;

        let max_concurrent_tasks = self
            .max_concurrent_tasks
            .unwrap_or(DEFAULT_MAX_CONCURRENT_TASKS);
        if max_concurrent_tasks == 0 {
            return Err(ConfigError::InvalidMaxConcurrentTasks);
        }

        let user_agent_prefix = self
            .user_agent_prefix
            .as_deref()
            .map_or(String::new(), |prefix| format!("{prefix} | "));
        let rust_version = env!("CARGO_PKG_RUST_VERSION");
        let user_agent =
            format!("{user_agent_prefix}api-client-core v{SDK_VERSION} | Rust {rust_version}");

        let mut default_headers = vec![
            ("User-Agent".to_string(), user_agent),
            ("Accept".to_string(), "application/json".to_string()),
        ];
        for (name, value) in self.headers {
            default_headers.retain(|(existing, _)| !existing.eq_ignore_ascii_case(&name));
            default_headers.push((name, value));
        }

        Ok(ClientConfig {
            base_url,
            default_headers,
            user_agent_prefix: self.user_agent_prefix,
            request_timeout: self.request_timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT),
            resource_timeout: self.resource_timeout.unwrap_or(DEFAULT_RESOURCE_TIMEOUT),
            max_concurrent_tasks,
            authentication_timeout: self
                .authentication_timeout
                .unwrap_or(Some(DEFAULT_AUTHENTICATION_TIMEOUT)),
            max_authentication_retries: self
                .max_authentication_retries
                .unwrap_or(DEFAULT_MAX_AUTHENTICATION_RETRIES),
        })
    }
}
