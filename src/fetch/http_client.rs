//! HTTP client construction policy for E-utilities requests.
//!
//! Timeouts come from the fetcher configuration rather than process-wide
//! state, so two fetchers in one process can use different settings.

use std::time::Duration;

use reqwest::Client;
use tracing::debug;

use crate::user_agent;

use super::FetchError;

/// Default connect timeout for E-utilities requests.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default whole-request timeout for E-utilities requests.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Builds the shared client used for esearch and efetch calls.
///
/// # Errors
///
/// Returns [`FetchError::ClientBuild`] when the TLS backend or proxy
/// configuration cannot be initialised.
pub fn build_http_client(
    connect_timeout: Duration,
    read_timeout: Duration,
) -> Result<Client, FetchError> {
    debug!(
        connect_ms = connect_timeout.as_millis(),
        read_ms = read_timeout.as_millis(),
        "building E-utilities HTTP client"
    );

    Client::builder()
        .connect_timeout(connect_timeout)
        .timeout(read_timeout)
        .user_agent(user_agent::default_user_agent())
        .gzip(true)
        .build()
        .map_err(|error| FetchError::ClientBuild {
            reason: error.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_http_client_with_defaults_succeeds() {
        assert!(build_http_client(DEFAULT_CONNECT_TIMEOUT, DEFAULT_READ_TIMEOUT).is_ok());
    }
}
