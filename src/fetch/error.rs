//! Error types for record fetching.
//!
//! Errors name the endpoint (never the full query URL, which may carry an API
//! key) and end with a suggestion line.

use thiserror::Error;

/// Errors raised while retrieving records from the literature database.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level failure (DNS, connection refused, TLS, body read).
    #[error(
        "network error calling {endpoint}: {source}\n  Suggestion: Check network connectivity and retry"
    )]
    Network {
        /// Endpoint URL without query parameters.
        endpoint: String,
        /// Underlying client error.
        #[source]
        source: reqwest::Error,
    },

    /// The request did not complete within the configured timeout.
    #[error("timeout calling {endpoint}\n  Suggestion: Retry later or raise read_timeout_secs")]
    Timeout {
        /// Endpoint URL without query parameters.
        endpoint: String,
    },

    /// Non-success HTTP status.
    #[error("HTTP {status} from {endpoint}\n  Suggestion: {}", status_suggestion(*status))]
    HttpStatus {
        /// Endpoint URL without query parameters.
        endpoint: String,
        /// HTTP status code.
        status: u16,
        /// Raw Retry-After header, if the server sent one.
        retry_after: Option<String>,
    },

    /// The service answered but reported an error in its payload.
    #[error(
        "{endpoint} reported an error: {message}\n  Suggestion: Check the query terms and API key"
    )]
    Api {
        /// Endpoint URL without query parameters.
        endpoint: String,
        /// Error text from the response body.
        message: String,
    },

    /// The response body could not be interpreted.
    #[error(
        "unexpected response from {endpoint}: {reason}\n  Suggestion: Retry later; the service may be degraded"
    )]
    MalformedResponse {
        /// Endpoint URL without query parameters.
        endpoint: String,
        /// What was wrong with the body.
        reason: String,
    },

    /// Fetcher configuration is unusable.
    #[error("invalid fetcher configuration: {reason}\n  Suggestion: Fix the value in CLI flags or config.toml")]
    InvalidConfig {
        /// Which value was rejected and why.
        reason: String,
    },

    /// The HTTP client could not be constructed.
    #[error("HTTP client construction failed: {reason}")]
    ClientBuild {
        /// Builder error text.
        reason: String,
    },
}

impl FetchError {
    /// Maps a client error, separating timeouts from other network failures.
    pub fn from_reqwest(endpoint: impl Into<String>, source: reqwest::Error) -> Self {
        let endpoint = endpoint.into();
        if source.is_timeout() {
            Self::Timeout { endpoint }
        } else {
            Self::Network { endpoint, source }
        }
    }

    /// Creates an HTTP status error.
    pub fn http_status(
        endpoint: impl Into<String>,
        status: u16,
        retry_after: Option<String>,
    ) -> Self {
        Self::HttpStatus {
            endpoint: endpoint.into(),
            status,
            retry_after,
        }
    }

    /// Creates an API-reported error.
    pub fn api(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Api {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }

    /// Creates a malformed response error.
    pub fn malformed(endpoint: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedResponse {
            endpoint: endpoint.into(),
            reason: reason.into(),
        }
    }

    /// Creates a configuration error.
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Returns the Retry-After header value carried by a status error.
    #[must_use]
    pub fn retry_after(&self) -> Option<&str> {
        match self {
            Self::HttpStatus { retry_after, .. } => retry_after.as_deref(),
            _ => None,
        }
    }
}

fn status_suggestion(status: u16) -> &'static str {
    match status {
        429 => "NCBI rate limit exceeded; lower --concurrency or configure an API key",
        400 => "The search term was rejected; check company and topic spelling",
        s if s >= 500 => "E-utilities is unavailable; try again later",
        _ => "Check the request parameters and retry",
    }
}
