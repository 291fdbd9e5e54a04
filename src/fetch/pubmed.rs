//! PubMed record fetcher backed by NCBI E-utilities.
//!
//! A fetch is two phases:
//! 1. `esearch.fcgi` (JSON) turns the search term into a PMID list
//! 2. `efetch.fcgi` (XML) retrieves MeSH headings and publication years in
//!    batches, several batches in flight at once
//!
//! Every request goes through the shared [`RateLimiter`] and [`RetryPolicy`].

use std::time::Duration;

use async_trait::async_trait;
use futures_util::{StreamExt, TryStreamExt, stream};
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::Client;
use reqwest::header::RETRY_AFTER;
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};

use crate::trends::RawRecord;

use super::efetch_xml::{EfetchParseError, parse_efetch_xml};
use super::http_client::{DEFAULT_CONNECT_TIMEOUT, DEFAULT_READ_TIMEOUT, build_http_client};
use super::rate_limiter::parse_retry_after;
use super::retry::DEFAULT_MAX_ATTEMPTS;
use super::{
    FetchError, FetchQuery, RateLimiter, RecordFetcher, RetryDecision, RetryPolicy,
    classify_error,
};

/// Production E-utilities endpoint.
pub const DEFAULT_EUTILS_BASE_URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils";

/// Value of the `tool` parameter sent with every request.
pub const DEFAULT_TOOL: &str = "mesh-trends";

/// Maximum PMIDs requested from esearch per company.
pub const DEFAULT_MAX_RESULTS: u32 = 5000;

/// PMIDs per efetch request.
pub const DEFAULT_BATCH_SIZE: usize = 200;

/// efetch requests in flight at once.
pub const DEFAULT_CONCURRENCY: usize = 3;

/// esearch refuses `retmax` above this value.
const ESEARCH_RETMAX_LIMIT: u32 = 10_000;

/// NCBI allowance without an API key: 3 requests per second.
const ANONYMOUS_REQUEST_INTERVAL: Duration = Duration::from_millis(334);

/// NCBI allowance with an API key: 10 requests per second.
const KEYED_REQUEST_INTERVAL: Duration = Duration::from_millis(100);

/// Explicit configuration for [`PubMedFetcher`].
#[derive(Clone)]
pub struct PubMedConfig {
    /// E-utilities base URL (overridable for tests).
    pub base_url: String,
    /// `tool` parameter identifying the software to NCBI.
    pub tool: String,
    /// Contact e-mail NCBI uses to reach heavy users.
    pub email: Option<String>,
    /// NCBI API key; raises the request allowance.
    pub api_key: Option<String>,
    /// esearch `retmax`.
    pub max_results: u32,
    /// PMIDs per efetch request.
    pub batch_size: usize,
    /// efetch requests in flight at once.
    pub concurrency: usize,
    /// Minimum spacing between requests; `None` follows NCBI policy.
    pub request_interval: Option<Duration>,
    /// Attempts per request, initial one included.
    pub max_attempts: u32,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    /// Draw an efetch progress bar on stderr.
    pub show_progress: bool,
}

impl Default for PubMedConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_EUTILS_BASE_URL.to_string(),
            tool: DEFAULT_TOOL.to_string(),
            email: None,
            api_key: None,
            max_results: DEFAULT_MAX_RESULTS,
            batch_size: DEFAULT_BATCH_SIZE,
            concurrency: DEFAULT_CONCURRENCY,
            request_interval: None,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            read_timeout: DEFAULT_READ_TIMEOUT,
            show_progress: false,
        }
    }
}

impl std::fmt::Debug for PubMedConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PubMedConfig")
            .field("base_url", &self.base_url)
            .field("tool", &self.tool)
            .field("email", &self.email)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("max_results", &self.max_results)
            .field("batch_size", &self.batch_size)
            .field("concurrency", &self.concurrency)
            .field("request_interval", &self.request_interval)
            .field("max_attempts", &self.max_attempts)
            .finish_non_exhaustive()
    }
}

impl PubMedConfig {
    /// Request spacing actually applied: explicit value, else NCBI policy.
    #[must_use]
    pub fn effective_request_interval(&self) -> Duration {
        self.request_interval.unwrap_or(if self.api_key.is_some() {
            KEYED_REQUEST_INTERVAL
        } else {
            ANONYMOUS_REQUEST_INTERVAL
        })
    }

    fn validate(&self) -> Result<(), FetchError> {
        for (field, value) in [
            ("tool", Some(self.tool.as_str())),
            ("email", self.email.as_deref()),
            ("api_key", self.api_key.as_deref()),
        ] {
            if let Some(value) = value
                && value.chars().any(|c| c == '\n' || c == '\r' || c == '\0')
            {
                return Err(FetchError::invalid_config(format!(
                    "{field} contains invalid control characters"
                )));
            }
        }
        if self.tool.trim().is_empty() {
            return Err(FetchError::invalid_config("tool must not be empty"));
        }
        if !(1..=ESEARCH_RETMAX_LIMIT).contains(&self.max_results) {
            return Err(FetchError::invalid_config(format!(
                "max_results must be within 1..={ESEARCH_RETMAX_LIMIT}, got {}",
                self.max_results
            )));
        }
        if self.batch_size == 0 {
            return Err(FetchError::invalid_config("batch_size must be at least 1"));
        }
        if self.concurrency == 0 {
            return Err(FetchError::invalid_config("concurrency must be at least 1"));
        }
        url::Url::parse(&self.base_url).map_err(|error| {
            FetchError::invalid_config(format!("base_url '{}' is invalid: {error}", self.base_url))
        })?;
        Ok(())
    }
}

// ==================== esearch Response Types ====================

#[derive(Debug, Deserialize)]
struct ESearchResponse {
    esearchresult: Option<ESearchResult>,
    /// Top-level error, e.g. for rejected API keys.
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ESearchResult {
    count: Option<String>,
    #[serde(default)]
    idlist: Vec<String>,
    #[serde(rename = "ERROR")]
    error: Option<String>,
}

// ==================== PubMedFetcher ====================

/// [`RecordFetcher`] for PubMed.
pub struct PubMedFetcher {
    client: Client,
    config: PubMedConfig,
    rate_limiter: RateLimiter,
    retry_policy: RetryPolicy,
}

impl std::fmt::Debug for PubMedFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PubMedFetcher")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl PubMedFetcher {
    /// Creates a fetcher from explicit configuration.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::InvalidConfig`] for unusable settings and
    /// [`FetchError::ClientBuild`] when the HTTP client cannot be built.
    #[tracing::instrument(skip_all, fields(base_url = %config.base_url))]
    pub fn new(config: PubMedConfig) -> Result<Self, FetchError> {
        let retry_policy = RetryPolicy::with_max_attempts(config.max_attempts);
        Self::with_retry_policy(config, retry_policy)
    }

    /// Creates a fetcher with a custom backoff policy.
    ///
    /// # Errors
    ///
    /// Same as [`PubMedFetcher::new`].
    pub fn with_retry_policy(
        config: PubMedConfig,
        retry_policy: RetryPolicy,
    ) -> Result<Self, FetchError> {
        config.validate()?;
        if config.email.is_none() {
            warn!("no contact e-mail configured; NCBI asks E-utilities clients to provide one");
        }
        let client = build_http_client(config.connect_timeout, config.read_timeout)?;
        let rate_limiter = RateLimiter::new(config.effective_request_interval());

        Ok(Self {
            client,
            config,
            rate_limiter,
            retry_policy,
        })
    }

    /// Returns the active configuration.
    #[must_use]
    pub fn config(&self) -> &PubMedConfig {
        &self.config
    }

    fn endpoint(&self, utility: &str) -> String {
        format!("{}/{utility}", self.config.base_url.trim_end_matches('/'))
    }

    /// Appends tool/email/api_key parameters.
    fn identity_params(&self) -> String {
        let mut params = format!("&tool={}", urlencoding::encode(&self.config.tool));
        if let Some(email) = &self.config.email {
            params.push_str(&format!("&email={}", urlencoding::encode(email)));
        }
        if let Some(api_key) = &self.config.api_key {
            params.push_str(&format!("&api_key={}", urlencoding::encode(api_key)));
        }
        params
    }

    /// Runs esearch and returns the PMID list in relevance order.
    #[instrument(skip(self, query), fields(affiliation = %query.affiliation))]
    async fn search_ids(&self, query: &FetchQuery) -> Result<Vec<String>, FetchError> {
        let endpoint = self.endpoint("esearch.fcgi");
        let term = query.to_search_term();
        let url = format!(
            "{endpoint}?db=pubmed&term={}&retmax={}&retmode=json{}",
            urlencoding::encode(&term),
            self.config.max_results,
            self.identity_params()
        );

        debug!(%term, "calling esearch");
        let body = self.get_with_retry(&endpoint, &url).await?;
        let response: ESearchResponse = serde_json::from_str(&body).map_err(|error| {
            warn!(error = %error, "failed to parse esearch JSON");
            FetchError::malformed(&endpoint, format!("esearch JSON could not be parsed: {error}"))
        })?;

        if let Some(message) = response.error {
            return Err(FetchError::api(&endpoint, message));
        }
        let Some(result) = response.esearchresult else {
            return Err(FetchError::malformed(&endpoint, "missing esearchresult object"));
        };
        if let Some(message) = result.error {
            return Err(FetchError::api(&endpoint, message));
        }

        let reported = result
            .count
            .as_deref()
            .and_then(|count| count.parse::<usize>().ok())
            .unwrap_or(result.idlist.len());
        if reported > result.idlist.len() {
            warn!(
                reported,
                retrieved = result.idlist.len(),
                max_results = self.config.max_results,
                "search matched more records than max_results; analysing the first batch only"
            );
        }
        info!(count = result.idlist.len(), "esearch complete");

        Ok(result.idlist)
    }

    /// Retrieves records for `ids` in batches, preserving PMID order.
    #[instrument(skip(self, ids), fields(ids = ids.len()))]
    async fn fetch_records(&self, ids: &[String]) -> Result<Vec<RawRecord>, FetchError> {
        // Owned batches: borrowed slices here break the `Send` bound on
        // `RecordFetcher::fetch`.
        let batches: Vec<Vec<String>> = ids
            .chunks(self.config.batch_size)
            .map(<[String]>::to_vec)
            .collect();
        let progress = self.progress_bar(batches.len());

        let fetched: Vec<Vec<RawRecord>> = stream::iter(batches)
            .map(|batch| {
                let progress = progress.clone();
                async move {
                    let records = self.fetch_batch(&batch).await?;
                    progress.inc(1);
                    Ok::<_, FetchError>(records)
                }
            })
            .buffered(self.config.concurrency)
            .try_collect()
            .await
            .inspect_err(|_| progress.abandon())?;

        progress.finish_and_clear();
        Ok(fetched.into_iter().flatten().collect())
    }

    async fn fetch_batch(&self, ids: &[String]) -> Result<Vec<RawRecord>, FetchError> {
        let endpoint = self.endpoint("efetch.fcgi");
        let url = format!(
            "{endpoint}?db=pubmed&id={}&rettype=medline&retmode=xml{}",
            ids.join(","),
            self.identity_params()
        );

        debug!(batch = ids.len(), "calling efetch");
        let body = self.get_with_retry(&endpoint, &url).await?;
        parse_efetch_xml(&body).map_err(|error| match error {
            EfetchParseError::Service(message) => FetchError::api(&endpoint, message),
            EfetchParseError::Xml(reason) => FetchError::malformed(&endpoint, reason),
        })
    }

    fn progress_bar(&self, batches: usize) -> ProgressBar {
        if !self.config.show_progress || batches < 2 {
            return ProgressBar::hidden();
        }
        let bar = ProgressBar::new(batches as u64);
        if let Ok(style) =
            ProgressStyle::with_template("{spinner} efetch [{bar:30}] {pos}/{len} batches")
        {
            bar.set_style(style.progress_chars("=> "));
        }
        bar
    }

    /// GETs `url`, retrying transient failures per the retry policy.
    async fn get_with_retry(&self, endpoint: &str, url: &str) -> Result<String, FetchError> {
        let mut attempt = 1;
        loop {
            self.rate_limiter.acquire(url).await;

            let error = match self.get_text(endpoint, url).await {
                Ok(body) => return Ok(body),
                Err(error) => error,
            };

            match self
                .retry_policy
                .should_retry(classify_error(&error), attempt)
            {
                RetryDecision::Retry {
                    delay,
                    attempt: next,
                } => {
                    let delay = error
                        .retry_after()
                        .and_then(parse_retry_after)
                        .map_or(delay, |server_delay| server_delay.max(delay));
                    warn!(
                        error = %error,
                        attempt,
                        delay_ms = delay.as_millis(),
                        "E-utilities request failed; retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt = next;
                }
                RetryDecision::DoNotRetry { reason } => {
                    debug!(%reason, "not retrying E-utilities request");
                    return Err(error);
                }
            }
        }
    }

    async fn get_text(&self, endpoint: &str, url: &str) -> Result<String, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|error| FetchError::from_reqwest(endpoint, error.without_url()))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string);
            return Err(FetchError::http_status(
                endpoint,
                status.as_u16(),
                retry_after,
            ));
        }

        response
            .text()
            .await
            .map_err(|error| FetchError::from_reqwest(endpoint, error.without_url()))
    }
}

#[async_trait]
impl RecordFetcher for PubMedFetcher {
    fn name(&self) -> &str {
        "pubmed"
    }

    #[instrument(skip(self, query), fields(fetcher = "pubmed", affiliation = %query.affiliation))]
    async fn fetch(&self, query: &FetchQuery) -> Result<Vec<RawRecord>, FetchError> {
        let ids = self.search_ids(query).await?;
        if ids.is_empty() {
            info!("no publications matched");
            return Ok(Vec::new());
        }

        let fetched = self.fetch_records(&ids).await?;
        let fetched_count = fetched.len();
        let records: Vec<RawRecord> = fetched
            .into_iter()
            .filter(|record| record.valid_year().is_none_or(|year| query.contains_year(year)))
            .collect();

        let outside_window = fetched_count - records.len();
        if outside_window > 0 {
            debug!(outside_window, "dropped records published outside the window");
        }
        info!(records = records.len(), "efetch complete");
        Ok(records)
    }
}
