//! Plain-text report sink.

use std::io::Write;

use super::{CompanyAnalysis, PresentationSink, RenderError};

/// Number of cloud words listed in the text report.
const REPORT_CLOUD_WORDS: usize = 20;

/// Widest keyword column before truncation.
const MAX_KEYWORD_COLUMN: usize = 40;

/// Writes a text report for each company to `W`.
#[derive(Debug)]
pub struct TerminalSink<W: Write> {
    out: W,
    presented: usize,
}

impl<W: Write> TerminalSink<W> {
    pub fn new(out: W) -> Self {
        Self { out, presented: 0 }
    }

    /// Consumes the sink and returns the writer.
    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_report(&mut self, report: &str) -> Result<(), RenderError> {
        if self.presented > 0 {
            writeln!(self.out).map_err(|error| RenderError::io("report output", error))?;
        }
        self.out
            .write_all(report.as_bytes())
            .and_then(|()| self.out.flush())
            .map_err(|error| RenderError::io("report output", error))?;
        self.presented += 1;
        Ok(())
    }
}

impl<W: Write> PresentationSink for TerminalSink<W> {
    fn present(&mut self, analysis: &CompanyAnalysis) -> Result<(), RenderError> {
        let report = format_report(analysis);
        self.write_report(&report)
    }

    fn present_failure(&mut self, company: &str, message: &str) -> Result<(), RenderError> {
        let mut report = format!("== {company} ==\n");
        report.push_str("Analysis failed:\n");
        for line in message.lines() {
            report.push_str(&format!("  {line}\n"));
        }
        self.write_report(&report)
    }
}

fn heading(analysis: &CompanyAnalysis) -> String {
    match analysis.window {
        Some((start, end)) => format!("== {} ({start}-{end}) ==", analysis.company),
        None => format!("== {} ==", analysis.company),
    }
}

/// Renders the full text report for one company.
#[must_use]
pub(crate) fn format_report(analysis: &CompanyAnalysis) -> String {
    let trends = &analysis.trends;
    let mut report = String::new();

    report.push_str(&heading(analysis));
    report.push('\n');
    if let Some(term) = &analysis.search_term {
        report.push_str(&format!("Query: {term}\n"));
    }
    report.push_str(&format!("Total papers: {}\n", trends.total_count));

    if trends.is_empty() {
        report.push_str("No keyword data for this window.\n");
        return report;
    }

    report.push_str("\nTop keywords:\n");
    for (rank, keyword) in trends.top_keywords.iter().enumerate() {
        report.push_str(&format!("  {:>2}. {keyword}\n", rank + 1));
    }

    report.push_str("\nKeyword frequency by year:\n");
    report.push_str(&format_matrix(analysis));

    let cloud = analysis.cloud_words(REPORT_CLOUD_WORDS);
    report.push_str(&format!("\nMost frequent keywords (top {}):\n", cloud.len()));
    let listed: Vec<String> = cloud
        .iter()
        .map(|word| format!("{} ({})", word.text, word.weight))
        .collect();
    report.push_str(&format!("  {}\n", listed.join(", ")));

    report
}

/// Keyword rows by year columns; missing pairs print as zero.
fn format_matrix(analysis: &CompanyAnalysis) -> String {
    let trends = &analysis.trends;
    let years = trends.years();
    let keyword_width = trends
        .top_keywords
        .iter()
        .map(|keyword| keyword.chars().count())
        .max()
        .unwrap_or(0)
        .clamp("Keyword".len(), MAX_KEYWORD_COLUMN);

    let mut matrix = format!("  {:<keyword_width$}", "Keyword");
    for year in &years {
        matrix.push_str(&format!(" {year:>5}"));
    }
    matrix.push('\n');

    for keyword in &trends.top_keywords {
        let label = truncate_to_width(keyword, keyword_width);
        matrix.push_str(&format!("  {label:<keyword_width$}"));
        for year in &years {
            matrix.push_str(&format!(" {:>5}", trends.count_for(*year, keyword)));
        }
        matrix.push('\n');
    }
    matrix
}

/// Truncates text to at most `width` chars, appending an ellipsis if cut.
fn truncate_to_width(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    if width == 0 {
        return String::new();
    }
    let mut output: String = text.chars().take(width - 1).collect();
    output.push('…');
    output
}
