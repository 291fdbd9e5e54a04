//! `aggregate`: run the trend aggregation on records saved as JSON.

use std::fs;
use std::io::{self, Read};
use std::path::Path;

use anyhow::{Context, Result};
use mesh_trends::config::FileConfig;
use mesh_trends::pipeline::ProcessExit;
use mesh_trends::render::CompanyAnalysis;
use mesh_trends::trends::{RawRecord, aggregate};
use tracing::info;

use super::build_sinks;
use crate::cli::AggregateArgs;

const STDIN_MARKER: &str = "-";

pub(crate) fn run_aggregate_command(
    args: &AggregateArgs,
    file_config: Option<&FileConfig>,
) -> Result<ProcessExit> {
    let raw = read_input(&args.input)?;
    let records = parse_records(&raw)
        .with_context(|| format!("Invalid record JSON in '{}'", args.input.display()))?;

    let trends = aggregate(&records);
    info!(
        records = records.len(),
        total = trends.total_count,
        top_keywords = trends.top_keywords.len(),
        "Aggregated records"
    );

    let label = args
        .label
        .clone()
        .unwrap_or_else(|| default_label(&args.input));
    let analysis = CompanyAnalysis::offline(label, trends);

    let output_dir = args
        .output
        .output_dir
        .as_deref()
        .or_else(|| file_config.and_then(|config| config.output_dir.as_deref()));
    let mut sinks = build_sinks(args.output.format, output_dir)?;
    for sink in &mut sinks {
        sink.present(&analysis)
            .context("Failed to write aggregation output")?;
    }
    Ok(ProcessExit::Success)
}

fn read_input(path: &Path) -> Result<String> {
    if path.as_os_str() == STDIN_MARKER {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read records from stdin")?;
        return Ok(buffer);
    }
    fs::read_to_string(path)
        .with_context(|| format!("Failed to read records file '{}'", path.display()))
}

fn parse_records(raw: &str) -> Result<Vec<RawRecord>> {
    Ok(serde_json::from_str(raw)?)
}

fn default_label(path: &Path) -> String {
    if path.as_os_str() == STDIN_MARKER {
        return "stdin".to_string();
    }
    path.file_stem()
        .map_or_else(|| path.display().to_string(), |stem| stem.to_string_lossy().into_owned())
}
