//! Fetch → aggregate → present, once per company.
//!
//! Companies run sequentially. A failed fetch is reported to every sink and
//! counted; the remaining companies still run. A sink error aborts the run,
//! since later output would be incomplete anyway.

use tracing::{error, info, instrument};

use crate::fetch::{FetchError, FetchQuery, RecordFetcher};
use crate::render::{CompanyAnalysis, PresentationSink, RenderError};
use crate::trends::aggregate;

/// Process outcome of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessExit {
    /// Every company was analysed.
    Success,
    /// Some companies failed, at least one succeeded.
    Partial,
    /// Every company failed.
    Failure,
}

impl ProcessExit {
    /// Process exit code: 0, 2 or 1.
    #[must_use]
    pub fn code(self) -> u8 {
        match self {
            Self::Success => 0,
            Self::Failure => 1,
            Self::Partial => 2,
        }
    }
}

/// Maps completion and failure counts to the process outcome.
#[must_use]
pub fn determine_exit_outcome(completed: usize, failed: usize) -> ProcessExit {
    if failed == 0 {
        ProcessExit::Success
    } else if completed > 0 {
        ProcessExit::Partial
    } else {
        ProcessExit::Failure
    }
}

/// Per-run counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Companies analysed successfully (including zero-hit companies).
    pub succeeded: usize,
    /// Companies whose fetch failed, with the rendered error.
    pub failed: Vec<(String, String)>,
    /// Records aggregated across all successful companies.
    pub total_records: usize,
}

impl RunSummary {
    #[must_use]
    pub fn exit_outcome(&self) -> ProcessExit {
        determine_exit_outcome(self.succeeded, self.failed.len())
    }
}

/// Fetches and aggregates one company.
///
/// # Errors
///
/// Returns the fetcher's error; no partial results are aggregated.
#[instrument(skip(fetcher, query), fields(fetcher = fetcher.name(), company = %query.affiliation))]
pub async fn analyze_company(
    fetcher: &dyn RecordFetcher,
    query: &FetchQuery,
) -> Result<CompanyAnalysis, FetchError> {
    let records = fetcher.fetch(query).await?;
    let trends = aggregate(&records);
    info!(
        fetched = records.len(),
        total = trends.total_count,
        top_keywords = trends.top_keywords.len(),
        "company analysed"
    );
    Ok(CompanyAnalysis::from_query(query, trends))
}

/// Analyses each company in turn and hands results to every sink.
///
/// `template` supplies topics and year window; its affiliation is replaced
/// by each company name.
///
/// # Errors
///
/// Returns [`RenderError`] when a sink fails to write.
#[instrument(skip_all, fields(companies = companies.len(), sinks = sinks.len()))]
pub async fn run_analysis(
    fetcher: &dyn RecordFetcher,
    companies: &[String],
    template: &FetchQuery,
    sinks: &mut [Box<dyn PresentationSink>],
) -> Result<RunSummary, RenderError> {
    let mut summary = RunSummary::default();

    for company in companies {
        let query = template.for_affiliation(company.as_str());
        match analyze_company(fetcher, &query).await {
            Ok(analysis) => {
                summary.succeeded += 1;
                summary.total_records += analysis.trends.total_count;
                for sink in sinks.iter_mut() {
                    sink.present(&analysis)?;
                }
            }
            Err(fetch_error) => {
                error!(company = %company, error = %fetch_error, "analysis failed");
                let message = fetch_error.to_string();
                for sink in sinks.iter_mut() {
                    sink.present_failure(company, &message)?;
                }
                summary.failed.push((company.clone(), message));
            }
        }
    }

    info!(
        succeeded = summary.succeeded,
        failed = summary.failed.len(),
        total_records = summary.total_records,
        "analysis run complete"
    );
    Ok(summary)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;

    use super::*;
    use crate::trends::RawRecord;

    /// Serves canned records per affiliation; unknown names fail.
    struct MockFetcher {
        seen: Mutex<Vec<FetchQuery>>,
    }

    impl MockFetcher {
        fn new() -> Self {
            Self {
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl RecordFetcher for MockFetcher {
        fn name(&self) -> &str {
            "mock"
        }

        async fn fetch(&self, query: &FetchQuery) -> Result<Vec<RawRecord>, FetchError> {
            self.seen.lock().unwrap().push(query.clone());
            match query.affiliation.as_str() {
                "Shiseido" => Ok(vec![
                    RawRecord::new("1", Some("2020"), ["retinol", "spf"]),
                    RawRecord::new("2", Some("2020"), ["retinol"]),
                    RawRecord::new("3", Some("2021"), ["spf"]),
                ]),
                "Empty" => Ok(Vec::new()),
                _ => Err(FetchError::http_status(
                    "https://eutils.example/esearch.fcgi",
                    503,
                    None,
                )),
            }
        }
    }

    /// Records what it was asked to present.
    #[derive(Default)]
    struct RecordingSink {
        events: Arc<Mutex<Vec<String>>>,
    }

    impl PresentationSink for RecordingSink {
        fn present(&mut self, analysis: &CompanyAnalysis) -> Result<(), RenderError> {
            self.events.lock().unwrap().push(format!(
                "ok:{}:{}",
                analysis.company, analysis.trends.total_count
            ));
            Ok(())
        }

        fn present_failure(&mut self, company: &str, _message: &str) -> Result<(), RenderError> {
            self.events.lock().unwrap().push(format!("err:{company}"));
            Ok(())
        }
    }

    struct BrokenSink;

    impl PresentationSink for BrokenSink {
        fn present(&mut self, _analysis: &CompanyAnalysis) -> Result<(), RenderError> {
            Err(RenderError::io(
                "stdout",
                std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed"),
            ))
        }

        fn present_failure(&mut self, _company: &str, _message: &str) -> Result<(), RenderError> {
            Ok(())
        }
    }

    fn companies(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| (*name).to_string()).collect()
    }

    #[test]
    fn test_exit_outcome_success_when_no_failures() {
        assert_eq!(determine_exit_outcome(3, 0), ProcessExit::Success);
        assert_eq!(determine_exit_outcome(0, 0), ProcessExit::Success);
    }

    #[test]
    fn test_exit_outcome_partial_when_mixed() {
        assert_eq!(determine_exit_outcome(2, 1), ProcessExit::Partial);
    }

    #[test]
    fn test_exit_outcome_failure_when_all_failed() {
        assert_eq!(determine_exit_outcome(0, 2), ProcessExit::Failure);
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(ProcessExit::Success.code(), 0);
        assert_eq!(ProcessExit::Failure.code(), 1);
        assert_eq!(ProcessExit::Partial.code(), 2);
    }

    #[tokio::test]
    async fn test_analyze_company_aggregates_fetched_records() {
        let fetcher = MockFetcher::new();
        let query = FetchQuery::new("Shiseido", Vec::new(), 2020, 2021);
        let analysis = analyze_company(&fetcher, &query).await.unwrap();

        assert_eq!(analysis.company, "Shiseido");
        assert_eq!(analysis.trends.total_count, 3);
        assert_eq!(analysis.trends.top_keywords, vec!["retinol", "spf"]);
    }

    #[tokio::test]
    async fn test_run_analysis_continues_after_failure() {
        let fetcher = MockFetcher::new();
        let events = Arc::new(Mutex::new(Vec::new()));
        let mut sinks: Vec<Box<dyn PresentationSink>> = vec![Box::new(RecordingSink {
            events: Arc::clone(&events),
        })];
        let template = FetchQuery::new("", vec!["beauty".to_string()], 2017, 2026);

        let summary = run_analysis(
            &fetcher,
            &companies(&["Broken", "Shiseido", "Empty"]),
            &template,
            &mut sinks,
        )
        .await
        .unwrap();

        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.failed.len(), 1);
        assert_eq!(summary.failed[0].0, "Broken");
        assert!(summary.failed[0].1.contains("HTTP 503"));
        assert_eq!(summary.total_records, 3);
        assert_eq!(summary.exit_outcome(), ProcessExit::Partial);
        assert_eq!(
            *events.lock().unwrap(),
            vec!["err:Broken", "ok:Shiseido:3", "ok:Empty:0"]
        );

        let seen = fetcher.seen.lock().unwrap();
        assert_eq!(seen.len(), 3);
        assert!(seen.iter().all(|q| q.topics == vec!["beauty".to_string()]));
        assert!(seen.iter().all(|q| (q.year_start, q.year_end) == (2017, 2026)));
    }

    #[tokio::test]
    async fn test_run_analysis_all_failed_is_failure() {
        let fetcher = MockFetcher::new();
        let template = FetchQuery::new("", Vec::new(), 2020, 2021);
        let summary = run_analysis(&fetcher, &companies(&["A", "B"]), &template, &mut [])
            .await
            .unwrap();
        assert_eq!(summary.exit_outcome(), ProcessExit::Failure);
    }

    #[tokio::test]
    async fn test_run_analysis_aborts_on_sink_error() {
        let fetcher = MockFetcher::new();
        let mut sinks: Vec<Box<dyn PresentationSink>> = vec![Box::new(BrokenSink)];
        let template = FetchQuery::new("", Vec::new(), 2020, 2021);

        let result = run_analysis(
            &fetcher,
            &companies(&["Shiseido", "Empty"]),
            &template,
            &mut sinks,
        )
        .await;

        assert!(matches!(result, Err(RenderError::Io { .. })));
        assert_eq!(fetcher.seen.lock().unwrap().len(), 1);
    }
}
