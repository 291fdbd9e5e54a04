//! Config file loading for CLI defaults.
//!
//! The file uses a small TOML subset: one `key = value` per line, `#`
//! comments, double-quoted strings, integers and single-line string arrays.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};

/// Directory name under the platform config root.
const CONFIG_DIR_NAME: &str = "mesh-trends";

/// Longest supported analysis window, in years.
pub const MAX_WINDOW_YEARS: u16 = 50;

/// File-backed defaults; every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileConfig {
    /// Contact e-mail sent to NCBI.
    pub email: Option<String>,
    /// NCBI API key.
    pub api_key: Option<String>,
    /// `tool` parameter sent to NCBI.
    pub tool: Option<String>,
    /// Companies analysed when none are given on the command line.
    pub companies: Option<Vec<String>>,
    /// Topic filter terms.
    pub topics: Option<Vec<String>>,
    /// Window length in years (1..=50).
    pub years: Option<u16>,
    /// esearch result cap (1..=10000).
    pub max_results: Option<u32>,
    /// PMIDs per efetch request (1..=500).
    pub batch_size: Option<u32>,
    /// efetch requests in flight (1..=10).
    pub concurrency: Option<u32>,
    /// Minimum spacing between requests in milliseconds (0..=60000).
    pub rate_limit: Option<u64>,
    /// Retries after the first attempt (0..=10).
    pub max_retries: Option<u32>,
    pub connect_timeout_secs: Option<u64>,
    pub read_timeout_secs: Option<u64>,
    /// Directory for SVG output.
    pub output_dir: Option<PathBuf>,
    pub verbosity: Option<VerbositySetting>,
}

impl FileConfig {
    /// Validates config values against CLI constraints.
    pub fn validate(&self) -> Result<()> {
        validate_range("years", self.years, 1..=MAX_WINDOW_YEARS)?;
        validate_range("max_results", self.max_results, 1..=10_000)?;
        validate_range("batch_size", self.batch_size, 1..=500)?;
        validate_range("concurrency", self.concurrency, 1..=10)?;
        validate_range("rate_limit", self.rate_limit, 0..=60_000)?;
        validate_range("max_retries", self.max_retries, 0..=10)?;
        validate_range("connect_timeout_secs", self.connect_timeout_secs, 1..=3600)?;
        validate_range("read_timeout_secs", self.read_timeout_secs, 1..=3600)?;

        if let Some(tool) = &self.tool
            && tool.trim().is_empty()
        {
            bail!("Invalid config value for `tool`: must not be empty");
        }
        for (key, list) in [("companies", &self.companies), ("topics", &self.topics)] {
            if let Some(list) = list
                && list.iter().any(|item| item.trim().is_empty())
            {
                bail!("Invalid config value for `{key}`: entries must not be empty");
            }
        }
        if let Some(companies) = &self.companies
            && companies.is_empty()
        {
            bail!("Invalid config value for `companies`: expected at least one company");
        }
        Ok(())
    }
}

fn validate_range<T>(key: &str, value: Option<T>, range: std::ops::RangeInclusive<T>) -> Result<()>
where
    T: PartialOrd + std::fmt::Display + Copy,
{
    let Some(value) = value else {
        return Ok(());
    };
    if !range.contains(&value) {
        bail!(
            "Invalid config value for `{key}`: {value}. Expected range: {}..={}",
            range.start(),
            range.end()
        );
    }
    Ok(())
}

/// Supported config verbosity labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerbositySetting {
    Default,
    Verbose,
    Quiet,
    Debug,
}

impl VerbositySetting {
    /// Returns the stable string label for display output.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Verbose => "verbose",
            Self::Quiet => "quiet",
            Self::Debug => "debug",
        }
    }

    /// Log filter used when neither `RUST_LOG` nor CLI flags decide.
    #[must_use]
    pub fn log_level(self) -> &'static str {
        match self {
            Self::Default => "info",
            Self::Verbose => "debug",
            Self::Quiet => "error",
            Self::Debug => "trace",
        }
    }
}

/// Loaded config metadata.
#[derive(Debug, Clone, Default)]
pub struct LoadedConfig {
    /// Resolved config path if a base directory is known.
    pub path: Option<PathBuf>,
    /// Parsed file config when a config file exists and was valid.
    pub config: Option<FileConfig>,
}

impl LoadedConfig {
    #[must_use]
    pub fn loaded_from_file(&self) -> bool {
        self.config.is_some()
    }
}

/// Resolves default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/mesh-trends/config.toml`
/// 2. `$HOME/.config/mesh-trends/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(
            PathBuf::from(xdg_config_home)
                .join(CONFIG_DIR_NAME)
                .join("config.toml"),
        );
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join(CONFIG_DIR_NAME)
            .join("config.toml"),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads config from the default path if present.
pub fn load_default_file_config() -> Result<LoadedConfig> {
    let path = resolve_default_config_path();
    let config = match path.as_deref() {
        Some(path) if path.exists() => Some(load_file_config(path)?),
        _ => None,
    };
    Ok(LoadedConfig { path, config })
}

/// Reads and parses a config file.
pub fn load_file_config(path: &Path) -> Result<FileConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    parse_config_str(&raw)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))
}

/// Parses config text.
pub fn parse_config_str(raw: &str) -> Result<FileConfig> {
    let mut cfg = FileConfig::default();
    for (line_index, raw_line) in raw.lines().enumerate() {
        let line_number = line_index + 1;
        let line = strip_inline_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }

        let Some((raw_key, raw_value)) = line.split_once('=') else {
            bail!("Invalid config syntax on line {line_number}: expected key = value");
        };

        let key = raw_key.trim();
        let value = raw_value.trim();
        let context = || format!("Invalid `{key}` value on line {line_number}");

        match key {
            "email" => cfg.email = Some(parse_string_literal(value).with_context(context)?),
            "api_key" => cfg.api_key = Some(parse_string_literal(value).with_context(context)?),
            "tool" => cfg.tool = Some(parse_string_literal(value).with_context(context)?),
            "companies" => {
                cfg.companies = Some(parse_string_array(value).with_context(context)?);
            }
            "topics" => cfg.topics = Some(parse_string_array(value).with_context(context)?),
            "years" => cfg.years = Some(parse_integer(value).with_context(context)?),
            "max_results" => cfg.max_results = Some(parse_integer(value).with_context(context)?),
            "batch_size" => cfg.batch_size = Some(parse_integer(value).with_context(context)?),
            "concurrency" => cfg.concurrency = Some(parse_integer(value).with_context(context)?),
            "rate_limit" => cfg.rate_limit = Some(parse_integer(value).with_context(context)?),
            "max_retries" => cfg.max_retries = Some(parse_integer(value).with_context(context)?),
            "connect_timeout_secs" => {
                cfg.connect_timeout_secs = Some(parse_integer(value).with_context(context)?);
            }
            "read_timeout_secs" => {
                cfg.read_timeout_secs = Some(parse_integer(value).with_context(context)?);
            }
            "output_dir" => {
                let parsed = parse_string_literal(value).with_context(context)?;
                cfg.output_dir = Some(PathBuf::from(parsed));
            }
            "verbosity" => {
                let parsed = parse_string_literal(value).with_context(context)?;
                cfg.verbosity = Some(parse_verbosity(&parsed).with_context(|| {
                    format!("Invalid `verbosity` value '{parsed}' on line {line_number}")
                })?);
            }
            unknown => {
                bail!("Unknown configuration key: '{unknown}' on line {line_number}");
            }
        }
    }
    cfg.validate()?;
    Ok(cfg)
}

fn strip_inline_comment(line: &str) -> &str {
    let mut in_string = false;
    for (index, ch) in line.char_indices() {
        match ch {
            '"' => in_string = !in_string,
            '#' if !in_string => return &line[..index],
            _ => {}
        }
    }
    line
}

fn parse_string_literal(raw_value: &str) -> Result<String> {
    if raw_value.len() < 2 || !raw_value.starts_with('"') || !raw_value.ends_with('"') {
        bail!("Expected double-quoted string");
    }
    let inner = &raw_value[1..raw_value.len() - 1];
    if inner.contains('"') {
        bail!("Unexpected quote inside string");
    }
    Ok(inner.to_string())
}

/// Parses `["a", "b"]`; a trailing comma is allowed.
fn parse_string_array(raw_value: &str) -> Result<Vec<String>> {
    let Some(inner) = raw_value
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
    else {
        bail!("Expected array of double-quoted strings, e.g. [\"a\", \"b\"]");
    };

    let mut items = Vec::new();
    let mut rest = inner.trim_start();
    while !rest.is_empty() {
        let Some(after_quote) = rest.strip_prefix('"') else {
            bail!("Expected double-quoted string");
        };
        let Some(end) = after_quote.find('"') else {
            bail!("Unterminated string");
        };
        items.push(after_quote[..end].to_string());

        rest = after_quote[end + 1..].trim_start();
        match rest.strip_prefix(',') {
            Some(after_comma) => rest = after_comma.trim_start(),
            None if rest.is_empty() => {}
            None => bail!("Expected ',' between array items"),
        }
    }
    Ok(items)
}

fn parse_integer<T>(raw_value: &str) -> Result<T>
where
    T: TryFrom<u64>,
{
    let token = raw_value.trim();
    if token.is_empty() {
        bail!("Expected integer value");
    }
    let value = token.parse::<i128>()?;
    if value < 0 {
        bail!("Expected non-negative integer");
    }
    let value =
        u64::try_from(value).map_err(|_| anyhow::anyhow!("Integer value out of range"))?;
    T::try_from(value).map_err(|_| anyhow::anyhow!("Integer value out of range"))
}

fn parse_verbosity(value: &str) -> Result<VerbositySetting> {
    match value {
        "default" => Ok(VerbositySetting::Default),
        "verbose" => Ok(VerbositySetting::Verbose),
        "quiet" => Ok(VerbositySetting::Quiet),
        "debug" => Ok(VerbositySetting::Debug),
        _ => bail!("Expected one of: default, verbose, quiet, debug"),
    }
}
