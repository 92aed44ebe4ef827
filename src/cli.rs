//! Command-line interface definition for csv-filter
//!
//! Provides argument parsing and validation for the CSV filtering tool.

use crate::columns::parse_tokens;
use crate::dialect::{Delimiter, Quoting};
use crate::error::FilterError;
use crate::filter::{MatchOptions, ShortRowPolicy};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Filter CSV lines and columns for words or numerical interval
///
/// Allows automatic minimum and maximum date conversion to timestamp.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "csv-filter",
    version,
    about = "Filter CSV lines and columns for words or numerical interval",
    long_about = r#"
Filter delimited text files by row content (words, substrings, numeric or
date intervals) and/or cut columns by index or title. The delimiter is
detected from the header line unless given explicitly.

EXAMPLES:
    # Keep rows whose "name" contains "foo" or "bar"
    csv-filter data.csv -s "foo+bar" -c name

    # Same, whole words only, ignoring case, terms read from a file
    csv-filter data.csv -s terms.txt -c name -w -i

    # Keep rows whose "created" timestamp falls in January 2020
    csv-filter data.csv -m 2020-01-01 -M 2020-01-31 -c created

    # Keep only columns 1 and "amount"
    csv-filter data.csv -c 1,amount

    # Drop column "comment"
    csv-filter data.csv -c comment --invert
"#
)]
pub struct Args {
    /// Input file name
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Output file name (default: <input>_FILTERED.<ext>)
    #[arg(short, long, value_name = "OUTPUT")]
    pub output: Option<PathBuf>,

    /// Words, or a file containing one word per line
    #[arg(short, long, value_name = "STRINGS")]
    pub strings: Option<String>,

    /// Separator between inline words
    #[arg(long, value_name = "SEP", default_value = "+")]
    pub separator: String,

    /// Column indexes or titles (comma separated)
    #[arg(short, long, value_name = "COLUMNS")]
    pub columns: Option<String>,

    /// Value or date for timestamp (YYYY-MM-DD hh:mm:ss)
    #[arg(short, long, value_name = "MINIMUM", allow_hyphen_values = true)]
    pub minimum: Option<String>,

    /// Value or date for timestamp (YYYY-MM-DD hh:mm:ss)
    #[arg(short = 'M', long, value_name = "MAXIMUM", allow_hyphen_values = true)]
    pub maximum: Option<String>,

    /// Match only lines with all strings
    #[arg(short, long, default_value_t = false)]
    pub all_words: bool,

    /// Match only lines with whole strings
    #[arg(short, long, default_value_t = false)]
    pub whole_words: bool,

    /// Ignore letter cases such as AaBbCc
    #[arg(short, long, alias = "ignore-cases", default_value_t = false)]
    pub ignore_case: bool,

    /// Invert line matching rules (drops the given columns when only cutting)
    #[arg(short = 'v', long, default_value_t = false)]
    pub invert: bool,

    /// Field delimiter (detected from the header when omitted)
    #[arg(short, long, value_name = "DELIMITER")]
    pub delimiter: Option<String>,

    /// Text quoting
    #[arg(short, long, value_enum, default_value_t = QuotingArg::Minimal)]
    pub quoting: QuotingArg,

    /// File encoding label, or "auto" to detect it
    #[arg(short, long, value_name = "ENCODING", default_value = "utf-8")]
    pub encoding: String,

    /// Fail on malformed byte sequences instead of replacing them
    #[arg(long, default_value_t = false)]
    pub strict_encoding: bool,

    /// What to do with rows shorter than a selected column
    #[arg(long, value_enum, default_value_t = ShortRowArg::Skip)]
    pub on_short_row: ShortRowArg,

    /// Skip short rows (same as --on-short-row skip)
    #[arg(long, default_value_t = false)]
    pub index_ignore: bool,

    /// Quiet mode - minimal output
    #[arg(long, default_value_t = false)]
    pub quiet: bool,

    /// Verbose mode - detailed logging
    #[arg(long, default_value_t = false, conflicts_with = "quiet")]
    pub verbose: bool,
}

/// Quoting choice on the command line; numeric aliases follow the usual
/// CSV dialect constants
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum QuotingArg {
    #[value(alias = "0")]
    Minimal,
    #[value(alias = "1")]
    All,
    #[value(alias = "2")]
    NonNumeric,
    #[value(alias = "3")]
    None,
}

impl From<QuotingArg> for Quoting {
    fn from(arg: QuotingArg) -> Self {
        match arg {
            QuotingArg::Minimal => Quoting::Minimal,
            QuotingArg::All => Quoting::All,
            QuotingArg::NonNumeric => Quoting::NonNumeric,
            QuotingArg::None => Quoting::None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ShortRowArg {
    /// Warn and ignore the missing column for that row
    Skip,
    /// Abort the run
    Fail,
}

impl Args {
    /// Raw column tokens, if any were given
    pub fn column_tokens(&self) -> Option<Vec<String>> {
        self.columns
            .as_deref()
            .filter(|c| !c.is_empty())
            .map(parse_tokens)
    }

    /// Parse the delimiter override
    pub fn delimiter_override(&self) -> Result<Option<Delimiter>, FilterError> {
        self.delimiter.as_deref().map(Delimiter::parse).transpose()
    }

    pub fn short_row_policy(&self) -> ShortRowPolicy {
        if self.index_ignore {
            return ShortRowPolicy::Skip;
        }
        match self.on_short_row {
            ShortRowArg::Skip => ShortRowPolicy::Skip,
            ShortRowArg::Fail => ShortRowPolicy::Fail,
        }
    }

    pub fn match_options(&self) -> MatchOptions {
        MatchOptions {
            all_words: self.all_words,
            whole_words: self.whole_words,
            ignore_case: self.ignore_case,
        }
    }

    pub fn has_range(&self) -> bool {
        self.minimum.is_some() || self.maximum.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Args {
        let mut argv = vec!["csv-filter"];
        argv.extend_from_slice(args);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_defaults() {
        let args = parse(&["data.csv", "-s", "foo"]);

        assert_eq!(args.input, PathBuf::from("data.csv"));
        assert_eq!(args.separator, "+");
        assert_eq!(args.encoding, "utf-8");
        assert_eq!(Quoting::from(args.quoting), Quoting::Minimal);
        assert_eq!(args.short_row_policy(), ShortRowPolicy::Skip);
        assert!(args.column_tokens().is_none());
    }

    #[test]
    fn test_flags() {
        let args = parse(&["data.csv", "-s", "a+b", "-c", "name, 2", "-a", "-w", "-i", "-v"]);
        let options = args.match_options();

        assert!(options.all_words && options.whole_words && options.ignore_case);
        assert!(args.invert);
        assert_eq!(args.column_tokens().unwrap(), vec!["name", "2"]);
    }

    #[test]
    fn test_quoting_numeric_alias() {
        let args = parse(&["data.csv", "-c", "a", "-q", "3"]);
        assert_eq!(Quoting::from(args.quoting), Quoting::None);

        let args = parse(&["data.csv", "-c", "a", "--quoting", "non-numeric"]);
        assert_eq!(Quoting::from(args.quoting), Quoting::NonNumeric);
    }

    #[test]
    fn test_negative_bound() {
        let args = parse(&["data.csv", "-c", "a", "-m", "-5"]);
        assert_eq!(args.minimum.as_deref(), Some("-5"));
        assert!(args.has_range());
    }

    #[test]
    fn test_short_row_policy() {
        let args = parse(&["data.csv", "-c", "a", "--on-short-row", "fail"]);
        assert_eq!(args.short_row_policy(), ShortRowPolicy::Fail);

        let args = parse(&["data.csv", "-c", "a", "--on-short-row", "fail", "--index-ignore"]);
        assert_eq!(args.short_row_policy(), ShortRowPolicy::Skip);
    }

    #[test]
    fn test_delimiter_override() {
        let args = parse(&["data.csv", "-c", "a", "-d", "\\t"]);
        assert_eq!(args.delimiter_override().unwrap(), Some(Delimiter::Char(b'\t')));

        let args = parse(&["data.csv", "-c", "a", "-d", "ab"]);
        assert!(args.delimiter_override().is_err());
    }
}
