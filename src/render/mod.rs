//! Presentation sinks for keyword trend results.
//!
//! Sinks consume a finished [`CompanyAnalysis`] and never feed anything back
//! into aggregation:
//! - [`TerminalSink`] - human-readable report on any writer
//! - [`JsonSink`] - one JSON document per company, newline delimited
//! - [`SvgSink`] - line chart and word cloud SVG files

mod chart;
mod cloud;
mod json;
mod terminal;

pub use chart::{CHART_SIZE, chart_title, draw_trend_chart, write_trend_chart};
pub use cloud::{
    CLOUD_WORD_LIMIT, CloudCanvas, CloudWord, PlacedWord, cloud_words, draw_cloud, layout_cloud,
    write_cloud_svg,
};
pub use json::JsonSink;
pub use terminal::TerminalSink;

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use plotters::style::RGBColor;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::fetch::FetchQuery;
use crate::trends::KeywordTrends;

/// Series and word colours (matplotlib "tab10").
pub(crate) const PALETTE: [RGBColor; 10] = [
    RGBColor(31, 119, 180),
    RGBColor(255, 127, 14),
    RGBColor(44, 160, 44),
    RGBColor(214, 39, 40),
    RGBColor(148, 103, 189),
    RGBColor(140, 86, 75),
    RGBColor(227, 119, 194),
    RGBColor(127, 127, 127),
    RGBColor(188, 189, 34),
    RGBColor(23, 190, 207),
];

/// Errors raised while presenting results.
#[derive(Debug, Error)]
pub enum RenderError {
    /// Writing to the output stream or directory failed.
    #[error("failed to write {target}: {source}\n  Suggestion: Check that the output location exists and is writable")]
    Io {
        /// File path or stream name.
        target: String,
        #[source]
        source: std::io::Error,
    },

    /// The drawing backend rejected the chart or cloud.
    #[error("failed to draw {path}: {reason}")]
    Draw { path: PathBuf, reason: String },

    /// A result could not be serialized.
    #[error("failed to serialize results: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl RenderError {
    pub(crate) fn io(target: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            target: target.into(),
            source,
        }
    }

    pub(crate) fn draw(path: &Path, reason: impl std::fmt::Display) -> Self {
        Self::Draw {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }
}

/// Everything a sink needs to present one company.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompanyAnalysis {
    /// Company or label shown in headings.
    pub company: String,
    /// Inclusive publication-year window, when known.
    pub window: Option<(i32, i32)>,
    /// Search expression the records came from; `None` for offline input.
    pub search_term: Option<String>,
    pub trends: KeywordTrends,
}

impl CompanyAnalysis {
    /// Analysis of records fetched for `query`.
    #[must_use]
    pub fn from_query(query: &FetchQuery, trends: KeywordTrends) -> Self {
        Self {
            company: query.affiliation.clone(),
            window: Some((query.year_start, query.year_end)),
            search_term: Some(query.to_search_term()),
            trends,
        }
    }

    /// Analysis of records loaded from a file; the window spans the
    /// years that actually occur in the trend table.
    #[must_use]
    pub fn offline(label: impl Into<String>, trends: KeywordTrends) -> Self {
        let years = trends.years();
        let window = years.first().copied().zip(years.last().copied());
        Self {
            company: label.into(),
            window,
            search_term: None,
            trends,
        }
    }

    /// Keyword-corpus frequencies for word clouds.
    #[must_use]
    pub fn cloud_words(&self, limit: usize) -> Vec<CloudWord> {
        cloud_words(&self.trends.keyword_corpus, limit)
    }
}

/// Destination for analysis results.
pub trait PresentationSink {
    /// Presents one company's results.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError`] when output cannot be written.
    fn present(&mut self, analysis: &CompanyAnalysis) -> Result<(), RenderError>;

    /// Reports a company whose records could not be retrieved.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError`] when output cannot be written.
    fn present_failure(&mut self, company: &str, message: &str) -> Result<(), RenderError>;
}

/// Lowercase ASCII file-name stem: `"L'Oreal Paris"` becomes `"l-oreal-paris"`.
#[must_use]
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let slug = slug.trim_end_matches('-');
    if slug.is_empty() {
        "company".to_string()
    } else {
        slug.to_string()
    }
}

/// Writes `<slug>-trends.svg` and `<slug>-cloud.svg` per company.
///
/// Companies whose names slugify alike get `-2`, `-3`, ... suffixes so one
/// run never overwrites its own files.
#[derive(Debug)]
pub struct SvgSink {
    output_dir: PathBuf,
    written: Vec<PathBuf>,
    used_stems: HashSet<String>,
}

impl SvgSink {
    /// Creates the sink, creating `output_dir` if needed.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::Io`] when the directory cannot be created.
    pub fn new(output_dir: impl Into<PathBuf>) -> Result<Self, RenderError> {
        let output_dir = output_dir.into();
        fs::create_dir_all(&output_dir)
            .map_err(|error| RenderError::io(output_dir.display().to_string(), error))?;
        Ok(Self {
            output_dir,
            written: Vec::new(),
            used_stems: HashSet::new(),
        })
    }

    /// Files written so far, in order.
    #[must_use]
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }

    /// Claims a file stem for `company` not yet used by this sink.
    fn claim_stem(&mut self, company: &str) -> String {
        let base = slugify(company);
        let mut stem = base.clone();
        let mut suffix = 2;
        while self.used_stems.contains(&stem) {
            stem = format!("{base}-{suffix}");
            suffix += 1;
        }
        self.used_stems.insert(stem.clone());
        stem
    }
}

impl PresentationSink for SvgSink {
    #[instrument(skip_all, fields(company = %analysis.company))]
    fn present(&mut self, analysis: &CompanyAnalysis) -> Result<(), RenderError> {
        if analysis.trends.is_empty() {
            warn!("no keyword data; skipping trend chart and word cloud");
            return Ok(());
        }

        let slug = self.claim_stem(&analysis.company);

        let chart_path = self.output_dir.join(format!("{slug}-trends.svg"));
        write_trend_chart(&chart_path, &analysis.company, &analysis.trends)?;
        info!(path = %chart_path.display(), "wrote trend chart");
        self.written.push(chart_path);

        let cloud_path = self.output_dir.join(format!("{slug}-cloud.svg"));
        write_cloud_svg(&cloud_path, &analysis.cloud_words(CLOUD_WORD_LIMIT))?;
        info!(path = %cloud_path.display(), "wrote word cloud");
        self.written.push(cloud_path);

        Ok(())
    }

    fn present_failure(&mut self, _company: &str, _message: &str) -> Result<(), RenderError> {
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::trends::{RawRecord, aggregate};

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Shiseido"), "shiseido");
        assert_eq!(slugify("L'Oreal Paris"), "l-oreal-paris");
        assert_eq!(slugify("  Amore--Pacific  "), "amore-pacific");
        assert_eq!(slugify("資生堂"), "company");
    }

    #[test]
    fn test_offline_analysis_window_from_years() {
        let trends = aggregate(&[
            RawRecord::new("1", Some("2019"), ["Skin"]),
            RawRecord::new("2", Some("2022"), ["Skin"]),
        ]);
        let analysis = CompanyAnalysis::offline("sample", trends);
        assert_eq!(analysis.window, Some((2019, 2022)));
        assert!(analysis.search_term.is_none());

        let empty = CompanyAnalysis::offline("empty", KeywordTrends::default());
        assert_eq!(empty.window, None);
    }

    #[test]
    fn test_from_query_carries_window_and_term() {
        let query = FetchQuery::new("Cosmax", Vec::new(), 2020, 2024);
        let analysis = CompanyAnalysis::from_query(&query, KeywordTrends::default());
        assert_eq!(analysis.company, "Cosmax");
        assert_eq!(analysis.window, Some((2020, 2024)));
        assert_eq!(analysis.search_term, Some(query.to_search_term()));
    }

    #[test]
    fn test_svg_sink_writes_chart_and_cloud() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = SvgSink::new(dir.path().join("out")).unwrap();
        let trends = aggregate(&[
            RawRecord::new("1", Some("2020"), ["retinol", "spf"]),
            RawRecord::new("2", Some("2021"), ["retinol"]),
        ]);

        sink.present(&CompanyAnalysis::offline("L'Oreal", trends))
            .unwrap();

        let chart = dir.path().join("out/l-oreal-trends.svg");
        let cloud = dir.path().join("out/l-oreal-cloud.svg");
        assert!(chart.exists());
        assert!(cloud.exists());
        assert_eq!(sink.written(), &[chart, cloud]);
    }

    #[test]
    fn test_svg_sink_keeps_colliding_company_names_apart() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = SvgSink::new(dir.path()).unwrap();

        for (company, keyword) in [
            ("資生堂", "Retinol"),
            ("코스맥스", "Emulsions"),
            ("L'Oreal", "Hair"),
            ("L Oreal", "Skin"),
        ] {
            let trends = aggregate(&[RawRecord::new("1", Some("2020"), [keyword])]);
            sink.present(&CompanyAnalysis::offline(company, trends)).unwrap();
        }

        let names: Vec<String> = sink
            .written()
            .iter()
            .map(|path| path.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            names,
            vec![
                "company-trends.svg",
                "company-cloud.svg",
                "company-2-trends.svg",
                "company-2-cloud.svg",
                "l-oreal-trends.svg",
                "l-oreal-cloud.svg",
                "l-oreal-2-trends.svg",
                "l-oreal-2-cloud.svg",
            ]
        );

        let first = fs::read_to_string(dir.path().join("company-trends.svg")).unwrap();
        let second = fs::read_to_string(dir.path().join("company-2-trends.svg")).unwrap();
        assert!(first.contains("Retinol"));
        assert!(second.contains("Emulsions"));
        assert!(!first.contains("Emulsions"));
    }

    #[test]
    fn test_svg_sink_skips_empty_trends() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = SvgSink::new(dir.path()).unwrap();
        sink.present(&CompanyAnalysis::offline("Nobody", KeywordTrends::default()))
            .unwrap();
        assert!(sink.written().is_empty());
        assert!(!dir.path().join("nobody-trends.svg").exists());
    }
}
