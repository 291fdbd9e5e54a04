//! mesh-trends Library
//!
//! Retrieves PubMed records for a company, counts MeSH subject headings per
//! publication year, and selects the most frequent keywords for reporting.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`fetch`] - PubMed E-utilities client (esearch + efetch)
//! - [`trends`] - keyword-trend aggregation, pure and synchronous
//! - [`render`] - terminal, JSON and SVG presentation sinks
//! - [`pipeline`] - fetch → aggregate → present for each company
//! - [`config`] - config file defaults for the CLI

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod fetch;
pub mod pipeline;
pub mod render;
pub mod trends;
mod user_agent;

// Re-export commonly used types
pub use fetch::{FetchError, FetchQuery, PubMedConfig, PubMedFetcher, RecordFetcher};
pub use pipeline::{ProcessExit, RunSummary, analyze_company, run_analysis};
pub use render::{CompanyAnalysis, PresentationSink, RenderError};
pub use trends::{KeywordTrends, RawRecord, TOP_KEYWORD_LIMIT, YearKeywordCount, aggregate};
