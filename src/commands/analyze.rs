//! `analyze`: fetch PubMed records per company and report keyword trends.

use std::io::{self, IsTerminal};

use anyhow::{Context, Result};
use mesh_trends::config::FileConfig;
use mesh_trends::fetch::PubMedFetcher;
use mesh_trends::pipeline::{ProcessExit, RunSummary, run_analysis};
use tracing::{info, warn};

use super::build_sinks;
use super::settings::AnalysisSettings;
use crate::cli::AnalyzeArgs;
use crate::terminal;

pub(crate) async fn run_analyze_command(
    args: &AnalyzeArgs,
    file_config: Option<&FileConfig>,
    quiet: bool,
) -> Result<ProcessExit> {
    let settings = AnalysisSettings::resolve(args, file_config);
    let template = settings.template_query();
    let companies = &settings.companies.value;

    info!(
        companies = ?companies,
        year_start = template.year_start,
        year_end = template.year_end,
        topics = template.topics.len(),
        "Starting keyword trend analysis"
    );

    let show_progress =
        terminal::should_show_progress(io::stderr().is_terminal(), quiet, terminal::is_dumb_terminal());
    let fetcher = PubMedFetcher::new(settings.pubmed_config(show_progress))
        .context("Failed to configure the PubMed client")?;

    let mut sinks = build_sinks(args.output.format, settings.output_dir.value.as_deref())?;
    let summary = run_analysis(&fetcher, companies, &template, &mut sinks)
        .await
        .context("Failed to write analysis output")?;

    log_run_summary(&summary);
    Ok(summary.exit_outcome())
}

fn log_run_summary(summary: &RunSummary) {
    for (company, message) in &summary.failed {
        warn!(company = %company, error = %message, "Analysis failed for company");
    }
    info!(
        succeeded = summary.succeeded,
        failed = summary.failed.len(),
        records = summary.total_records,
        "Analysis finished"
    );
}
