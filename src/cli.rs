//! CLI argument definitions using clap derive macros.
//!
//! Optional flags stay `None` when not given so that config file values can
//! fill them; see [`crate::commands::settings`].

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use mesh_trends::config::{MAX_WINDOW_YEARS, VerbositySetting};

/// Track MeSH keyword trends in a company's PubMed publications.
///
/// Searches PubMed for papers with an author affiliated to each company,
/// counts MeSH subject headings per publication year, and reports the ten
/// most frequent keywords over the analysis window.
#[derive(Parser, Debug)]
#[command(name = "mesh-trends")]
#[command(author, version, about)]
pub struct Cli {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Default log filter from CLI flags, falling back to the config file.
    ///
    /// `RUST_LOG` still takes priority when tracing is initialised.
    #[must_use]
    pub fn log_level(&self, configured: Option<VerbositySetting>) -> &'static str {
        if self.quiet {
            return "error";
        }
        match self.verbose {
            0 => configured.map_or("info", VerbositySetting::log_level),
            1 => "debug",
            _ => "trace",
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Fetch PubMed records for companies and report keyword trends
    Analyze(AnalyzeArgs),

    /// Aggregate a JSON array of records from a file or stdin
    Aggregate(AggregateArgs),

    /// Inspect configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigCommand {
    /// Print the effective configuration and where each value came from
    Show,
}

/// Report format written to stdout.
#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable report
    #[default]
    Text,
    /// One JSON object per company, newline delimited
    Json,
}

#[derive(Args, Debug, Clone, Default)]
pub struct OutputArgs {
    /// Also write <company>-trends.svg and <company>-cloud.svg into DIR
    #[arg(short = 'o', long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Report format
    #[arg(short = 'f', long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(Args, Debug, Clone, Default)]
pub struct AnalyzeArgs {
    /// Companies matched against author affiliations [default: config or Shiseido]
    #[arg(value_name = "COMPANY")]
    pub companies: Vec<String>,

    /// Topic term OR-ed into the search (repeatable) [default: config or cosmetics topics]
    #[arg(short = 't', long = "topic", value_name = "TERM")]
    pub topics: Vec<String>,

    /// Search without any topic restriction
    #[arg(long, conflicts_with = "topics")]
    pub no_topics: bool,

    /// Length of the analysis window in years (1-50) [default: 10]
    #[arg(short = 'y', long, value_parser = clap::value_parser!(u16).range(1..=i64::from(MAX_WINDOW_YEARS)))]
    pub years: Option<u16>,

    /// Last year of the window [default: current year]
    #[arg(long, value_parser = clap::value_parser!(i32).range(1800..=2200))]
    pub end_year: Option<i32>,

    /// Maximum PubMed records per company (1-10000) [default: 5000]
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=10_000))]
    pub max_results: Option<u32>,

    /// Records per efetch request (1-500) [default: 200]
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=500))]
    pub batch_size: Option<u32>,

    /// Concurrent efetch requests (1-10) [default: 3]
    #[arg(short = 'c', long, value_parser = clap::value_parser!(u32).range(1..=10))]
    pub concurrency: Option<u32>,

    /// Minimum delay between requests in milliseconds (0 to disable) [default: NCBI policy]
    #[arg(short = 'l', long, value_parser = clap::value_parser!(u64).range(0..=60_000))]
    pub rate_limit: Option<u64>,

    /// Retry attempts for transient failures (0-10) [default: 2]
    #[arg(short = 'r', long, value_parser = clap::value_parser!(u32).range(0..=10))]
    pub max_retries: Option<u32>,

    /// Contact e-mail sent to NCBI
    #[arg(long, env = "NCBI_EMAIL")]
    pub email: Option<String>,

    /// NCBI API key (raises the rate limit to 10 requests/s)
    #[arg(long, env = "NCBI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    #[command(flatten)]
    pub output: OutputArgs,
}

#[derive(Args, Debug, Clone)]
pub struct AggregateArgs {
    /// JSON file with an array of {pmid, year, keywords} records, or - for stdin
    #[arg(value_name = "FILE")]
    pub input: PathBuf,

    /// Heading used in the report [default: file name]
    #[arg(long)]
    pub label: Option<String>,

    #[command(flatten)]
    pub output: OutputArgs,
}
