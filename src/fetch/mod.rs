//! Retrieval of publication records from a literature database.
//!
//! # Architecture
//!
//! - [`RecordFetcher`] - async trait the pipeline depends on
//! - [`FetchQuery`] - affiliation, topic filter and inclusive year window
//! - [`PubMedFetcher`] - NCBI E-utilities implementation (esearch + efetch)
//! - [`RateLimiter`] / [`RetryPolicy`] - request spacing and backoff
//!
//! Fetch failures are always surfaced as [`FetchError`]; a fetcher never
//! returns partial data after an error.

mod efetch_xml;
mod error;
mod http_client;
mod pubmed;
mod rate_limiter;
mod retry;

pub use efetch_xml::{EfetchParseError, parse_efetch_xml};
pub use error::FetchError;
pub use http_client::{DEFAULT_CONNECT_TIMEOUT, DEFAULT_READ_TIMEOUT, build_http_client};
pub use pubmed::{
    DEFAULT_BATCH_SIZE, DEFAULT_CONCURRENCY, DEFAULT_EUTILS_BASE_URL, DEFAULT_MAX_RESULTS,
    DEFAULT_TOOL, PubMedConfig, PubMedFetcher,
};
pub use rate_limiter::{RateLimiter, extract_host, parse_retry_after};
pub use retry::{DEFAULT_MAX_ATTEMPTS, FailureType, RetryDecision, RetryPolicy, classify_error};

use async_trait::async_trait;
use serde::Serialize;

use crate::trends::RawRecord;

/// Topic filter used when none is configured.
pub const DEFAULT_TOPICS: [&str; 5] = [
    "cosmetics",
    "skincare",
    "skin care",
    "beauty",
    "dermatology",
];

/// Default length of the trailing analysis window, in calendar years.
pub const DEFAULT_WINDOW_YEARS: u16 = 10;

/// Search parameters for one company.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchQuery {
    /// Institution or company name matched against author affiliations.
    pub affiliation: String,
    /// Topic terms OR-ed together; empty means no topic restriction.
    pub topics: Vec<String>,
    /// First publication year, inclusive.
    pub year_start: i32,
    /// Last publication year, inclusive.
    pub year_end: i32,
}

impl FetchQuery {
    /// Creates a query for an explicit inclusive year range.
    #[must_use]
    pub fn new(
        affiliation: impl Into<String>,
        topics: Vec<String>,
        year_start: i32,
        year_end: i32,
    ) -> Self {
        Self {
            affiliation: affiliation.into(),
            topics,
            year_start,
            year_end,
        }
    }

    /// Creates a query covering `years` calendar years ending at `end_year`.
    #[must_use]
    pub fn trailing_window(
        affiliation: impl Into<String>,
        topics: Vec<String>,
        end_year: i32,
        years: u16,
    ) -> Self {
        let span = i32::from(years.max(1)) - 1;
        Self::new(affiliation, topics, end_year - span, end_year)
    }

    /// Returns a copy of this query for another affiliation.
    #[must_use]
    pub fn for_affiliation(&self, affiliation: impl Into<String>) -> Self {
        Self {
            affiliation: affiliation.into(),
            ..self.clone()
        }
    }

    /// Whether `year` lies inside the inclusive window.
    #[must_use]
    pub fn contains_year(&self, year: i32) -> bool {
        (self.year_start..=self.year_end).contains(&year)
    }

    /// Builds the PubMed search expression.
    ///
    /// ```
    /// use mesh_trends::fetch::FetchQuery;
    ///
    /// let query = FetchQuery::new("Cosmax", vec!["beauty".into(), "skin care".into()], 2016, 2025);
    /// assert_eq!(
    ///     query.to_search_term(),
    ///     r#"("Cosmax"[Affiliation]) AND (beauty OR "skin care") AND ("2016"[PDAT] : "2025"[PDAT])"#
    /// );
    /// ```
    #[must_use]
    pub fn to_search_term(&self) -> String {
        let affiliation = self.affiliation.replace('"', "");
        let mut clauses = vec![format!("(\"{}\"[Affiliation])", affiliation.trim())];

        let topics: Vec<String> = self
            .topics
            .iter()
            .map(|topic| topic.trim().replace('"', ""))
            .filter(|topic| !topic.is_empty())
            .map(|topic| {
                if topic.contains(char::is_whitespace) {
                    format!("\"{topic}\"")
                } else {
                    topic
                }
            })
            .collect();
        if !topics.is_empty() {
            clauses.push(format!("({})", topics.join(" OR ")));
        }

        clauses.push(format!(
            "(\"{}\"[PDAT] : \"{}\"[PDAT])",
            self.year_start, self.year_end
        ));
        clauses.join(" AND ")
    }
}

/// Returns [`DEFAULT_TOPICS`] as owned strings.
#[must_use]
pub fn default_topics() -> Vec<String> {
    DEFAULT_TOPICS.iter().map(|topic| (*topic).to_string()).collect()
}

/// Source of publication records for the trend pipeline.
#[async_trait]
pub trait RecordFetcher: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Retrieves every record matching the query.
    ///
    /// Zero matches is `Ok(vec![])`, not an error.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] on network, HTTP or payload failures.
    async fn fetch(&self, query: &FetchQuery) -> Result<Vec<RawRecord>, FetchError>;
}
