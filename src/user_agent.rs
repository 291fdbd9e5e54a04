//! Shared User-Agent string for E-utilities traffic.
//!
//! NCBI asks clients to identify themselves; the `tool` and `email` query
//! parameters carry the contact identity, this header carries the software.

/// Project URL for User-Agent identification (good citizenship; RFC 9308).
const PROJECT_UA_URL: &str = "https://github.com/fierce/mesh-trends";

/// Default User-Agent for E-utilities requests.
#[must_use]
pub(crate) fn default_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("mesh-trends/{version} (research-tool; +{PROJECT_UA_URL})")
}
