//! Record and table types shared by the fetcher, aggregator and sinks.

use serde::{Deserialize, Deserializer, Serialize};

/// One publication as returned by a [`crate::fetch::RecordFetcher`].
///
/// The year is kept as the raw text the source reported; the aggregator
/// decides whether it is usable (see [`RawRecord::valid_year`]).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRecord {
    /// Source identifier (PMID for PubMed records). May be empty.
    #[serde(default)]
    pub pmid: String,
    /// Raw publication year text, if the source reported one.
    #[serde(default, deserialize_with = "deserialize_year")]
    pub year: Option<String>,
    /// Subject headings in source order, possibly empty or repeated.
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl RawRecord {
    /// Creates a record with a raw year and keyword list.
    #[must_use]
    pub fn new<K, S>(pmid: impl Into<String>, year: Option<&str>, keywords: K) -> Self
    where
        K: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            pmid: pmid.into(),
            year: year.map(str::to_string),
            keywords: keywords.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns the publication year when it is exactly four ASCII digits.
    #[must_use]
    pub fn valid_year(&self) -> Option<i32> {
        self.year.as_deref().and_then(parse_year)
    }
}

/// Parses a four-digit numeric year, rejecting anything else.
#[must_use]
pub fn parse_year(raw: &str) -> Option<i32> {
    let raw = raw.trim();
    if raw.len() != 4 || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    raw.parse().ok()
}

/// Frequency of one keyword within one publication year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearKeywordCount {
    pub year: i32,
    pub keyword: String,
    pub count: usize,
}

/// Output bundle of [`crate::trends::aggregate`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordTrends {
    /// Per-year rows restricted to the top keywords, ordered by
    /// (year ascending, count descending).
    pub trend_table: Vec<YearKeywordCount>,
    /// At most [`crate::trends::TOP_KEYWORD_LIMIT`] keywords, heaviest first.
    pub top_keywords: Vec<String>,
    /// Records that survived year validation, with or without keywords.
    pub total_count: usize,
    /// Every non-empty keyword of every surviving record, in input order.
    pub keyword_corpus: Vec<String>,
}

impl KeywordTrends {
    /// Returns true when no keyword was observed at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.trend_table.is_empty()
    }

    /// Distinct years present in the trend table, ascending.
    #[must_use]
    pub fn years(&self) -> Vec<i32> {
        let mut years: Vec<i32> = self.trend_table.iter().map(|row| row.year).collect();
        years.dedup();
        years
    }

    /// Count for a (year, keyword) pair, zero when absent.
    #[must_use]
    pub fn count_for(&self, year: i32, keyword: &str) -> usize {
        self.trend_table
            .iter()
            .find(|row| row.year == year && row.keyword == keyword)
            .map_or(0, |row| row.count)
    }
}

/// Accepts `2020`, `"2020"`, `null` or a missing field.
fn deserialize_year<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum YearValue {
        Number(i64),
        Text(String),
    }

    Ok(
        Option::<YearValue>::deserialize(deserializer)?.map(|value| match value {
            YearValue::Number(n) => n.to_string(),
            YearValue::Text(text) => text,
        }),
    )
}
