//! # csv-filter
//!
//! Filter CSV lines and columns for words or numerical interval.
//!
//! ## Features
//!
//! - **String filtering**: keep rows whose selected columns contain any (or all) terms,
//!   optionally as whole words and ignoring case
//! - **Range filtering**: keep rows whose values fall within a numeric or date interval;
//!   dates are converted to UTC timestamps
//! - **Column cutting**: keep (or, inverted, drop) columns by 1-based index or title
//! - **Dialect detection**: the delimiter is sniffed from the header line
//! - **Encodings**: any WHATWG encoding label, or automatic detection
//!
//! ## Usage
//!
//! ```bash
//! # Rows whose "name" contains foo or bar
//! csv-filter data.csv -s "foo+bar" -c name
//!
//! # Rows dated in January 2020
//! csv-filter data.csv -m 2020-01-01 -M 2020-01-31 -c created
//!
//! # Drop the "comment" column
//! csv-filter data.csv -c comment --invert
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use csv_filter::filter::TermSet;
//! use csv_filter::processor::{FilterConfig, FilterMode, Processor};
//!
//! let mut config = FilterConfig::new("data.csv", FilterMode::Strings(TermSet::from_inline("foo", "+", false)));
//! config.columns = Some(vec!["name".to_string()]);
//!
//! let report = Processor::new(config).process().unwrap();
//! println!("{} rows kept", report.counters.rows_matched);
//! ```

pub mod cli;
pub mod columns;
pub mod dialect;
pub mod encoding;
pub mod error;
pub mod filter;
pub mod output;
pub mod processor;
pub mod progress;

pub use cli::Args;
pub use error::FilterError;
pub use processor::{FilterConfig, FilterMode, Processor, RunReport};
