//! Effective settings for `analyze`: command line and environment, then the
//! config file, then built-in defaults.

use std::path::PathBuf;
use std::time::Duration;

use chrono::Datelike;
use mesh_trends::config::FileConfig;
use mesh_trends::fetch::{
    DEFAULT_BATCH_SIZE, DEFAULT_CONCURRENCY, DEFAULT_CONNECT_TIMEOUT, DEFAULT_MAX_ATTEMPTS,
    DEFAULT_MAX_RESULTS, DEFAULT_READ_TIMEOUT, DEFAULT_TOOL, DEFAULT_WINDOW_YEARS, FetchQuery,
    PubMedConfig, default_topics,
};

use crate::cli::AnalyzeArgs;

/// Company analysed when neither the command line nor the config names one.
pub(crate) const DEFAULT_COMPANY: &str = "Shiseido";

/// Where an effective value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ValueOrigin {
    CommandLine,
    ConfigFile,
    Default,
}

impl ValueOrigin {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::CommandLine => "command line",
            Self::ConfigFile => "config file",
            Self::Default => "default",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Setting<T> {
    pub(crate) value: T,
    pub(crate) origin: ValueOrigin,
}

fn pick<T>(cli: Option<T>, file: Option<T>, default: impl FnOnce() -> T) -> Setting<T> {
    match (cli, file) {
        (Some(value), _) => Setting {
            value,
            origin: ValueOrigin::CommandLine,
        },
        (None, Some(value)) => Setting {
            value,
            origin: ValueOrigin::ConfigFile,
        },
        (None, None) => Setting {
            value: default(),
            origin: ValueOrigin::Default,
        },
    }
}

fn non_empty(list: &[String]) -> Option<Vec<String>> {
    if list.is_empty() {
        None
    } else {
        Some(list.to_vec())
    }
}

/// Fully resolved `analyze` configuration.
#[derive(Debug, Clone)]
pub(crate) struct AnalysisSettings {
    pub(crate) companies: Setting<Vec<String>>,
    pub(crate) topics: Setting<Vec<String>>,
    pub(crate) years: Setting<u16>,
    pub(crate) end_year: Setting<i32>,
    pub(crate) max_results: Setting<u32>,
    pub(crate) batch_size: Setting<u32>,
    pub(crate) concurrency: Setting<u32>,
    /// `None` applies the NCBI request allowance.
    pub(crate) rate_limit: Setting<Option<u64>>,
    pub(crate) max_retries: Setting<u32>,
    pub(crate) email: Setting<Option<String>>,
    pub(crate) api_key: Setting<Option<String>>,
    pub(crate) tool: Setting<String>,
    pub(crate) connect_timeout_secs: Setting<u64>,
    pub(crate) read_timeout_secs: Setting<u64>,
    pub(crate) output_dir: Setting<Option<PathBuf>>,
}

impl AnalysisSettings {
    pub(crate) fn resolve(args: &AnalyzeArgs, file: Option<&FileConfig>) -> Self {
        let file = file.cloned().unwrap_or_default();
        let cli_topics = if args.no_topics {
            Some(Vec::new())
        } else {
            non_empty(&args.topics)
        };

        Self {
            companies: pick(non_empty(&args.companies), file.companies, || {
                vec![DEFAULT_COMPANY.to_string()]
            }),
            topics: pick(cli_topics, file.topics, default_topics),
            years: pick(args.years, file.years, || DEFAULT_WINDOW_YEARS),
            end_year: pick(args.end_year, None, || chrono::Local::now().year()),
            max_results: pick(args.max_results, file.max_results, || DEFAULT_MAX_RESULTS),
            batch_size: pick(args.batch_size, file.batch_size, || {
                u32::try_from(DEFAULT_BATCH_SIZE).unwrap_or(u32::MAX)
            }),
            concurrency: pick(args.concurrency, file.concurrency, || {
                u32::try_from(DEFAULT_CONCURRENCY).unwrap_or(u32::MAX)
            }),
            rate_limit: pick(args.rate_limit.map(Some), file.rate_limit.map(Some), || None),
            max_retries: pick(args.max_retries, file.max_retries, || {
                DEFAULT_MAX_ATTEMPTS - 1
            }),
            email: pick(args.email.clone().map(Some), file.email.map(Some), || None),
            api_key: pick(args.api_key.clone().map(Some), file.api_key.map(Some), || None),
            tool: pick(None, file.tool, || DEFAULT_TOOL.to_string()),
            connect_timeout_secs: pick(None, file.connect_timeout_secs, || {
                DEFAULT_CONNECT_TIMEOUT.as_secs()
            }),
            read_timeout_secs: pick(None, file.read_timeout_secs, || {
                DEFAULT_READ_TIMEOUT.as_secs()
            }),
            output_dir: pick(
                args.output.output_dir.clone().map(Some),
                file.output_dir.map(Some),
                || None,
            ),
        }
    }

    /// Query shared by every company; the affiliation is filled per company.
    pub(crate) fn template_query(&self) -> FetchQuery {
        FetchQuery::trailing_window(
            String::new(),
            self.topics.value.clone(),
            self.end_year.value,
            self.years.value,
        )
    }

    pub(crate) fn pubmed_config(&self, show_progress: bool) -> PubMedConfig {
        PubMedConfig {
            tool: self.tool.value.clone(),
            email: self.email.value.clone(),
            api_key: self.api_key.value.clone(),
            max_results: self.max_results.value,
            batch_size: usize::try_from(self.batch_size.value).unwrap_or(DEFAULT_BATCH_SIZE),
            concurrency: usize::try_from(self.concurrency.value).unwrap_or(DEFAULT_CONCURRENCY),
            request_interval: self.rate_limit.value.map(Duration::from_millis),
            max_attempts: self.max_retries.value + 1,
            connect_timeout: Duration::from_secs(self.connect_timeout_secs.value),
            read_timeout: Duration::from_secs(self.read_timeout_secs.value),
            show_progress,
            ..PubMedConfig::default()
        }
    }

    /// `key = value` lines with their origins, secrets redacted.
    pub(crate) fn describe(&self) -> Vec<(&'static str, String, ValueOrigin)> {
        fn line<T>(
            key: &'static str,
            setting: &Setting<T>,
            render: impl FnOnce(&T) -> String,
        ) -> (&'static str, String, ValueOrigin) {
            (key, render(&setting.value), setting.origin)
        }
        let list = |items: &Vec<String>| format!("{items:?}");
        let optional = |value: &Option<String>| value.clone().unwrap_or_else(|| "<unset>".into());

        vec![
            line("companies", &self.companies, list),
            line("topics", &self.topics, list),
            line("years", &self.years, ToString::to_string),
            line("end_year", &self.end_year, ToString::to_string),
            line("max_results", &self.max_results, ToString::to_string),
            line("batch_size", &self.batch_size, ToString::to_string),
            line("concurrency", &self.concurrency, ToString::to_string),
            line("rate_limit", &self.rate_limit, |value| {
                value.map_or_else(|| "ncbi-policy".to_string(), |ms| ms.to_string())
            }),
            line("max_retries", &self.max_retries, ToString::to_string),
            line("email", &self.email, optional),
            line("api_key", &self.api_key, |value| {
                if value.is_some() { "<set>" } else { "<unset>" }.to_string()
            }),
            line("tool", &self.tool, Clone::clone),
            line("connect_timeout_secs", &self.connect_timeout_secs, ToString::to_string),
            line("read_timeout_secs", &self.read_timeout_secs, ToString::to_string),
            line("output_dir", &self.output_dir, |value| {
                value
                    .as_ref()
                    .map_or_else(|| "<none>".to_string(), |dir| dir.display().to_string())
            }),
        ]
    }
}
