//! Per-year keyword frequency aggregation and top-N selection.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};

use tracing::{debug, instrument, trace};

use super::{KeywordTrends, RawRecord, YearKeywordCount};

/// Maximum number of keywords kept for trend charts.
pub const TOP_KEYWORD_LIMIT: usize = 10;

/// Turns raw records into a per-year keyword trend table.
///
/// Records without a valid four-digit year are dropped before anything is
/// counted, including `total_count`. Within one record each distinct keyword
/// counts once; the corpus keeps every non-empty keyword with its original
/// multiplicity.
///
/// Keywords are normalized by trimming surrounding whitespace before they
/// are counted or added to the corpus, so `" Skin "` and `"Skin"` are the
/// same keyword and a whitespace-only keyword counts as empty.
///
/// Ordering is fully determined by input order:
/// - trend rows: year ascending, count descending, then first appearance of
///   the (year, keyword) pair
/// - top keywords: total descending, then first appearance of the keyword
#[must_use]
#[instrument(skip(records), fields(records = records.len()))]
pub fn aggregate(records: &[RawRecord]) -> KeywordTrends {
    let mut total_count = 0usize;
    let mut dropped = 0usize;
    let mut keyword_corpus = Vec::new();

    let mut rows: Vec<YearKeywordCount> = Vec::new();
    let mut row_index: HashMap<(i32, &str), usize> = HashMap::new();
    let mut totals: Vec<(&str, usize)> = Vec::new();
    let mut total_index: HashMap<&str, usize> = HashMap::new();

    for record in records {
        let Some(year) = record.valid_year() else {
            trace!(pmid = %record.pmid, year = ?record.year, "dropping record without usable year");
            dropped += 1;
            continue;
        };
        total_count += 1;

        let mut seen_in_record = HashSet::new();
        for keyword in record
            .keywords
            .iter()
            .map(|keyword| keyword.trim())
            .filter(|keyword| !keyword.is_empty())
        {
            keyword_corpus.push(keyword.to_string());
            if !seen_in_record.insert(keyword) {
                continue;
            }

            match row_index.entry((year, keyword)) {
                Entry::Occupied(slot) => rows[*slot.get()].count += 1,
                Entry::Vacant(slot) => {
                    slot.insert(rows.len());
                    rows.push(YearKeywordCount {
                        year,
                        keyword: keyword.to_string(),
                        count: 1,
                    });
                }
            }

            match total_index.entry(keyword) {
                Entry::Occupied(slot) => totals[*slot.get()].1 += 1,
                Entry::Vacant(slot) => {
                    slot.insert(totals.len());
                    totals.push((keyword, 1));
                }
            }
        }
    }

    // Both sorts are stable, so equal keys keep first-appearance order.
    rows.sort_by(|a, b| a.year.cmp(&b.year).then(b.count.cmp(&a.count)));
    totals.sort_by(|a, b| b.1.cmp(&a.1));

    let top_keywords: Vec<String> = totals
        .iter()
        .take(TOP_KEYWORD_LIMIT)
        .map(|(keyword, _)| (*keyword).to_string())
        .collect();

    let top_set: HashSet<&str> = top_keywords.iter().map(String::as_str).collect();
    let trend_table: Vec<YearKeywordCount> = rows
        .into_iter()
        .filter(|row| top_set.contains(row.keyword.as_str()))
        .collect();

    debug!(
        total_count,
        dropped,
        distinct_keywords = totals.len(),
        trend_rows = trend_table.len(),
        "aggregated keyword trends"
    );

    KeywordTrends {
        trend_table,
        top_keywords,
        total_count,
        keyword_corpus,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn record(year: Option<&str>, keywords: &[&str]) -> RawRecord {
        RawRecord::new("", year, keywords.iter().copied())
    }

    fn row(year: i32, keyword: &str, count: usize) -> YearKeywordCount {
        YearKeywordCount {
            year,
            keyword: keyword.to_string(),
            count,
        }
    }

    #[test]
    fn test_aggregate_empty_input_yields_empty_output() {
        let trends = aggregate(&[]);
        assert!(trends.trend_table.is_empty());
        assert!(trends.top_keywords.is_empty());
        assert_eq!(trends.total_count, 0);
        assert!(trends.keyword_corpus.is_empty());
    }

    #[test]
    fn test_aggregate_retinol_spf_scenario() {
        let records = vec![
            record(Some("2020"), &["retinol", "spf"]),
            record(Some("2020"), &["retinol"]),
            record(Some("2021"), &["spf"]),
        ];

        let trends = aggregate(&records);

        assert_eq!(
            trends.trend_table,
            vec![row(2020, "retinol", 2), row(2020, "spf", 1), row(2021, "spf", 1)]
        );
        assert_eq!(trends.top_keywords, vec!["retinol", "spf"]);
        assert_eq!(trends.total_count, 3);
        assert_eq!(
            trends.keyword_corpus,
            vec!["retinol", "spf", "retinol", "spf"]
        );
    }

    #[test]
    fn test_aggregate_duplicate_keywords_count_once_per_record() {
        let trends = aggregate(&[record(Some("2020"), &["A", "A", "B"])]);

        assert_eq!(trends.trend_table, vec![row(2020, "A", 1), row(2020, "B", 1)]);
        assert_eq!(trends.keyword_corpus, vec!["A", "A", "B"]);
    }

    #[test]
    fn test_aggregate_drops_malformed_years_from_everything() {
        let records = vec![
            record(Some("abc"), &["ignored"]),
            record(None, &["ignored"]),
            record(Some("2019 Nov-Dec"), &["ignored"]),
            record(Some("2022"), &["kept"]),
        ];

        let trends = aggregate(&records);

        assert_eq!(trends.total_count, 1);
        assert_eq!(trends.top_keywords, vec!["kept"]);
        assert_eq!(trends.keyword_corpus, vec!["kept"]);
        assert!(trends.trend_table.iter().all(|r| r.keyword == "kept"));
    }

    #[test]
    fn test_aggregate_keywordless_records_count_toward_total_only() {
        let records = vec![
            record(Some("2020"), &[]),
            record(Some("2020"), &["", "   "]),
            record(Some("2021"), &["x"]),
        ];

        let trends = aggregate(&records);

        assert_eq!(trends.total_count, 3);
        assert_eq!(trends.trend_table, vec![row(2021, "x", 1)]);
        assert_eq!(trends.keyword_corpus, vec!["x"]);
    }

    #[test]
    fn test_aggregate_keywords_are_trimmed() {
        let trends = aggregate(&[record(Some("2020"), &[" Skin ", "Skin", "   ", ""])]);
        assert_eq!(trends.trend_table, vec![row(2020, "Skin", 1)]);
        assert_eq!(trends.top_keywords, vec!["Skin"]);
        assert_eq!(trends.keyword_corpus, vec!["Skin", "Skin"]);
    }

    #[test]
    fn test_aggregate_top_set_is_bounded_and_ordered_by_total() {
        // keyword k{i} appears in i+1 records, so k11 is heaviest.
        let mut records = Vec::new();
        for i in 0..12 {
            for _ in 0..=i {
                records.push(record(Some("2020"), &[format!("k{i}").as_str()]));
            }
        }

        let trends = aggregate(&records);

        assert_eq!(trends.top_keywords.len(), TOP_KEYWORD_LIMIT);
        assert_eq!(trends.top_keywords[0], "k11");
        assert_eq!(trends.top_keywords[9], "k2");
        assert!(!trends.top_keywords.contains(&"k0".to_string()));
        assert!(
            trends
                .trend_table
                .iter()
                .all(|r| trends.top_keywords.contains(&r.keyword))
        );
    }

    #[test]
    fn test_aggregate_top_ties_prefer_first_encountered_keyword() {
        let records = vec![
            record(Some("2021"), &["late", "early"]),
            record(Some("2020"), &["early", "late"]),
        ];

        let trends = aggregate(&records);

        assert_eq!(trends.top_keywords, vec!["late", "early"]);
    }

    #[test]
    fn test_aggregate_rows_sorted_by_year_then_count_desc() {
        let records = vec![
            record(Some("2022"), &["a"]),
            record(Some("2020"), &["b"]),
            record(Some("2020"), &["c", "b"]),
            record(Some("2021"), &["a"]),
        ];

        let trends = aggregate(&records);

        assert_eq!(
            trends.trend_table,
            vec![
                row(2020, "b", 2),
                row(2020, "c", 1),
                row(2021, "a", 1),
                row(2022, "a", 1),
            ]
        );
    }

    #[test]
    fn test_aggregate_equal_counts_keep_pair_first_appearance() {
        let records = vec![
            record(Some("2020"), &["z"]),
            record(Some("2020"), &["m"]),
            record(Some("2020"), &["a"]),
        ];

        let trends = aggregate(&records);

        let keywords: Vec<&str> = trends
            .trend_table
            .iter()
            .map(|r| r.keyword.as_str())
            .collect();
        assert_eq!(keywords, vec!["z", "m", "a"]);
    }

    #[test]
    fn test_aggregate_is_idempotent() {
        let records = vec![
            record(Some("2020"), &["x", "y"]),
            record(Some("2021"), &["y"]),
            record(Some("bad"), &["x"]),
        ];

        assert_eq!(aggregate(&records), aggregate(&records));
    }

    #[test]
    fn test_aggregate_conserves_counts_for_top_keywords() {
        let records = vec![
            record(Some("2018"), &["Humans", "Skin", "Humans"]),
            record(Some("2019"), &["Humans"]),
            record(Some("2019"), &["Skin", "Female"]),
            record(Some("2020"), &["Female", "Humans"]),
        ];

        let trends = aggregate(&records);

        for keyword in &trends.top_keywords {
            let table_sum: usize = trends
                .trend_table
                .iter()
                .filter(|r| &r.keyword == keyword)
                .map(|r| r.count)
                .sum();
            let containing = records
                .iter()
                .filter(|r| r.keywords.iter().any(|k| k == keyword))
                .count();
            assert_eq!(table_sum, containing, "count mismatch for {keyword}");
        }
    }
}
