//! Keyword trend aggregation over fetched publication records.
//!
//! This is the pure core of the tool: it takes an in-memory record list and
//! produces the per-year keyword table, the top keyword set, the count of
//! usable records and the keyword corpus for word clouds. Nothing here does
//! I/O.
//!
//! # Example
//!
//! ```
//! use mesh_trends::trends::{RawRecord, aggregate};
//!
//! let records = vec![
//!     RawRecord::new("1", Some("2020"), ["retinol", "spf"]),
//!     RawRecord::new("2", Some("2020"), ["retinol"]),
//!     RawRecord::new("3", Some("2021"), ["spf"]),
//! ];
//!
//! let trends = aggregate(&records);
//! assert_eq!(trends.top_keywords, vec!["retinol", "spf"]);
//! assert_eq!(trends.total_count, 3);
//! ```

mod aggregate;
mod record;

pub use aggregate::{TOP_KEYWORD_LIMIT, aggregate};
pub use record::{KeywordTrends, RawRecord, YearKeywordCount, parse_year};
