//! Newline-delimited JSON sink.

use std::io::Write;

use serde::Serialize;

use crate::trends::YearKeywordCount;

use super::{CLOUD_WORD_LIMIT, CloudWord, CompanyAnalysis, PresentationSink, RenderError};

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum JsonRecord<'a> {
    Ok {
        company: &'a str,
        year_start: Option<i32>,
        year_end: Option<i32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        query: Option<&'a str>,
        total_count: usize,
        top_keywords: &'a [String],
        trend_table: &'a [YearKeywordCount],
        cloud_words: Vec<CloudWord>,
    },
    Error {
        company: &'a str,
        error: &'a str,
    },
}

/// Writes one JSON object per company, each on its own line.
#[derive(Debug)]
pub struct JsonSink<W: Write> {
    out: W,
}

impl<W: Write> JsonSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_line(&mut self, record: &JsonRecord<'_>) -> Result<(), RenderError> {
        serde_json::to_writer(&mut self.out, record)?;
        writeln!(self.out)
            .and_then(|()| self.out.flush())
            .map_err(|error| RenderError::io("JSON output", error))
    }
}

impl<W: Write> PresentationSink for JsonSink<W> {
    fn present(&mut self, analysis: &CompanyAnalysis) -> Result<(), RenderError> {
        let trends = &analysis.trends;
        let record = JsonRecord::Ok {
            company: &analysis.company,
            year_start: analysis.window.map(|(start, _)| start),
            year_end: analysis.window.map(|(_, end)| end),
            query: analysis.search_term.as_deref(),
            total_count: trends.total_count,
            top_keywords: &trends.top_keywords,
            trend_table: &trends.trend_table,
            cloud_words: analysis.cloud_words(CLOUD_WORD_LIMIT),
        };
        self.write_line(&record)
    }

    fn present_failure(&mut self, company: &str, message: &str) -> Result<(), RenderError> {
        self.write_line(&JsonRecord::Error {
            company,
            error: message,
        })
    }
}
