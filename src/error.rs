//! Fatal error taxonomy
//!
//! Every variant here terminates the run. Per-row conditions that the
//! configured policy tolerates never become a `FilterError`; they are logged
//! and the stream continues.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FilterError {
    #[error("missing required filter arguments: give --strings, --minimum/--maximum or --columns")]
    NoCriteria,

    #[error("missing required COLUMNS argument for a --minimum/--maximum filter")]
    RangeWithoutColumns,

    #[error("invalid column (0), must be >= 1")]
    ZeroColumn,

    #[error("invalid column ({index}), header has {width} columns")]
    ColumnOutOfRange { index: String, width: usize },

    #[error("no usable column among {tokens:?}, header is {header:?}")]
    NoColumnsResolved {
        tokens: Vec<String>,
        header: Vec<String>,
    },

    #[error("invalid {which} bound '{value}': expected a number or YYYY-MM-DD[ hh:mm:ss]")]
    InvalidBound { which: &'static str, value: String },

    #[error("no filter terms found in '{0}'")]
    EmptyTerms(String),

    #[error("invalid delimiter '{0}': must be a single ASCII character")]
    InvalidDelimiter(String),

    #[error("unknown encoding label '{0}'")]
    UnknownEncoding(String),

    #[error("input file is empty, no header line: {0:?}")]
    MissingHeader(PathBuf),

    #[error("row {row}: column {column} out of range, row has {len} fields")]
    ShortRow { row: u64, column: usize, len: usize },

    #[error("output record {row}: field {field:?} holds the delimiter or a line break and quoting is disabled")]
    UnquotableField { row: u64, field: String },

    #[error("row {row}: malformed {encoding} byte sequence")]
    MalformedBytes { row: u64, encoding: &'static str },
}
