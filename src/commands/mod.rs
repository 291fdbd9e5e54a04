//! CLI command handlers.

mod aggregate;
mod analyze;
mod config;
pub(crate) mod settings;

pub(crate) use aggregate::run_aggregate_command;
pub(crate) use analyze::run_analyze_command;
pub(crate) use config::run_config_show_command;

use std::io;
use std::path::Path;

use anyhow::{Context, Result};
use mesh_trends::render::{JsonSink, PresentationSink, SvgSink, TerminalSink};
use tracing::debug;

use crate::cli::OutputFormat;

/// Stdout sink for `format`, plus an SVG sink when `output_dir` is set.
pub(crate) fn build_sinks(
    format: OutputFormat,
    output_dir: Option<&Path>,
) -> Result<Vec<Box<dyn PresentationSink>>> {
    let mut sinks: Vec<Box<dyn PresentationSink>> = Vec::with_capacity(2);
    match format {
        OutputFormat::Text => sinks.push(Box::new(TerminalSink::new(io::stdout()))),
        OutputFormat::Json => sinks.push(Box::new(JsonSink::new(io::stdout()))),
    }

    if let Some(dir) = output_dir {
        let svg = SvgSink::new(dir)
            .with_context(|| format!("Cannot prepare output directory '{}'", dir.display()))?;
        debug!(dir = %dir.display(), "SVG output enabled");
        sinks.push(Box::new(svg));
    }
    Ok(sinks)
}
