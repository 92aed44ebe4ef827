//! Row filtering module
//!
//! Provides the per-row predicates: string terms (substring or whole word),
//! numeric/date ranges, and plain column extraction.

use crate::columns::{field, ColumnSelection, FieldAccess};
use crate::encoding::EncodedLineIterator;
use crate::error::FilterError;
use ahash::RandomState;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use hashbrown::HashSet;
use regex::Regex;
use std::cell::Cell;
use std::path::Path;

/// One decoded input row
pub type Row = Vec<String>;

/// Distinct filter terms, in first-seen order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TermSet {
    terms: Vec<String>,
}

impl TermSet {
    /// Load terms from a list file if `source` names one, otherwise split it
    pub fn load(source: &str, separator: &str, ignore_case: bool) -> anyhow::Result<Self> {
        let path = Path::new(source);

        let set = if path.is_file() {
            let set = Self::from_file(path, ignore_case)?;
            log::info!("Loaded {} strings from {:?}", set.len(), path);
            set
        } else {
            Self::from_inline(source, separator, ignore_case)
        };

        if set.is_empty() {
            return Err(FilterError::EmptyTerms(source.to_string()).into());
        }

        Ok(set)
    }

    /// Split an inline term list; empty pieces are ignored
    pub fn from_inline(text: &str, separator: &str, ignore_case: bool) -> Self {
        Self::collect(text.split(separator).map(str::to_string), ignore_case)
    }

    /// One term per line; blank lines are ignored
    pub fn from_file(path: &Path, ignore_case: bool) -> anyhow::Result<Self> {
        let mut lines = Vec::new();
        for line in EncodedLineIterator::new(path)? {
            lines.push(line?.trim_end().to_string());
        }
        Ok(Self::collect(lines, ignore_case))
    }

    fn collect<I>(terms: I, ignore_case: bool) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let mut seen: HashSet<String, RandomState> = HashSet::with_hasher(RandomState::new());
        let mut ordered = Vec::new();

        for term in terms {
            if term.is_empty() {
                continue;
            }
            let term = if ignore_case { term.to_lowercase() } else { term };
            if seen.insert(term.clone()) {
                ordered.push(term);
            }
        }

        Self { terms: ordered }
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.terms.iter().map(String::as_str)
    }
}

/// Options for string matching
#[derive(Debug, Clone, Copy, Default)]
pub struct MatchOptions {
    /// Every term must match instead of any
    pub all_words: bool,
    /// Terms must occur as whole words
    pub whole_words: bool,
    /// Fold case of terms and field values
    pub ignore_case: bool,
}

/// Matches a field value against a term set
#[derive(Debug, Clone)]
pub struct StringMatcher {
    terms: Vec<String>,
    /// Word-bounded patterns, present in whole-word mode
    patterns: Option<Vec<Regex>>,
    options: MatchOptions,
}

impl StringMatcher {
    pub fn new(terms: &TermSet, options: MatchOptions) -> anyhow::Result<Self> {
        let terms: Vec<String> = terms
            .iter()
            .map(|t| if options.ignore_case { t.to_lowercase() } else { t.to_string() })
            .collect();

        let patterns = if options.whole_words {
            let compiled = terms
                .iter()
                .map(|term| {
                    let pattern = format!(r"\b{}\b", regex::escape(term));
                    Regex::new(&pattern)
                        .map_err(|e| anyhow::anyhow!("Invalid word pattern '{}': {}", pattern, e))
                })
                .collect::<anyhow::Result<Vec<_>>>()?;
            Some(compiled)
        } else {
            None
        };

        Ok(Self {
            terms,
            patterns,
            options,
        })
    }

    /// Check a single field value
    #[inline]
    pub fn matches(&self, value: &str) -> bool {
        let folded;
        let value = if self.options.ignore_case {
            folded = value.to_lowercase();
            folded.as_str()
        } else {
            value
        };

        match self.patterns {
            Some(ref patterns) if self.options.all_words => {
                patterns.iter().all(|p| p.is_match(value))
            }
            Some(ref patterns) => patterns.iter().any(|p| p.is_match(value)),
            None if self.options.all_words => self.terms.iter().all(|t| value.contains(t.as_str())),
            None => self.terms.iter().any(|t| value.contains(t.as_str())),
        }
    }
}

const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Parse `YYYY-MM-DD[ hh:mm:ss]` as a UTC timestamp.
///
/// A bare date takes `default_time` as its time of day.
pub fn parse_timestamp(value: &str, default_time: NaiveTime) -> Option<i64> {
    let value = value.trim();

    let datetime = DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(value, DATE_FORMAT)
                .ok()
                .map(|date| date.and_time(default_time))
        })?;

    Some(datetime.and_utc().timestamp())
}

/// One side of a range filter
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Bound {
    #[default]
    Unbounded,
    Numeric(f64),
    /// Unix timestamp (UTC) resolved from a date
    Timestamp(i64),
}

impl Bound {
    /// Minimum bound: a bare date starts at 00:00:00
    pub fn minimum(value: Option<&str>) -> Result<Self, FilterError> {
        Self::parse(value, "minimum", NaiveTime::MIN)
    }

    /// Maximum bound: a bare date ends at 23:59:59
    pub fn maximum(value: Option<&str>) -> Result<Self, FilterError> {
        let end_of_day = NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN);
        Self::parse(value, "maximum", end_of_day)
    }

    fn parse(
        value: Option<&str>,
        which: &'static str,
        default_time: NaiveTime,
    ) -> Result<Self, FilterError> {
        let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) else {
            return Ok(Self::Unbounded);
        };

        if let Ok(number) = value.parse::<f64>() {
            return Ok(Self::Numeric(number));
        }

        match parse_timestamp(value, default_time) {
            Some(ts) => {
                log::info!("Timestamp {} set as {}", which, ts);
                Ok(Self::Timestamp(ts))
            }
            None => Err(FilterError::InvalidBound {
                which,
                value: value.to_string(),
            }),
        }
    }

    pub fn is_set(&self) -> bool {
        !matches!(self, Self::Unbounded)
    }

    fn as_f64(&self) -> Option<f64> {
        match *self {
            Self::Unbounded => None,
            Self::Numeric(n) => Some(n),
            Self::Timestamp(ts) => Some(ts as f64),
        }
    }
}

/// Inclusive numeric/date interval
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RangeFilter {
    pub minimum: Bound,
    pub maximum: Bound,
}

impl RangeFilter {
    pub fn new(minimum: Bound, maximum: Bound) -> Self {
        Self { minimum, maximum }
    }

    pub fn is_active(&self) -> bool {
        self.minimum.is_set() || self.maximum.is_set()
    }

    /// Check a single field value.
    ///
    /// Numbers compare as numbers; dates compare by their UTC timestamp;
    /// anything else is outside every range.
    #[inline]
    pub fn matches(&self, value: &str) -> bool {
        let Some(v) = coerce(value) else {
            log::trace!("Value '{}' is neither a number nor a date", value);
            return false;
        };

        match (self.minimum.as_f64(), self.maximum.as_f64()) {
            (Some(lo), Some(hi)) => lo <= v && v <= hi,
            (Some(lo), None) => v >= lo,
            (None, Some(hi)) => v <= hi,
            (None, None) => false,
        }
    }
}

fn coerce(value: &str) -> Option<f64> {
    let trimmed = value.trim();
    trimmed
        .parse::<f64>()
        .ok()
        .or_else(|| parse_timestamp(trimmed, NaiveTime::MIN).map(|ts| ts as f64))
}

/// What to do when a row is shorter than a selected column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShortRowPolicy {
    /// Warn and ignore that column for the row
    #[default]
    Skip,
    /// Abort the run
    Fail,
}

/// Predicate mode, chosen once per run
#[derive(Debug, Clone)]
pub enum Matcher {
    Strings(StringMatcher),
    Range(RangeFilter),
    /// No predicate: extract the selected columns
    Columns,
}

impl Matcher {
    pub fn is_column_only(&self) -> bool {
        matches!(self, Self::Columns)
    }

    fn matches(&self, value: &str) -> bool {
        match self {
            Self::Strings(m) => m.matches(value),
            Self::Range(r) => r.matches(value),
            Self::Columns => true,
        }
    }
}

/// Result of evaluating one row
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowOutcome {
    /// Row to write (the whole row, or the extracted columns)
    Matched(Row),
    Skipped,
}

/// Applies a matcher to the selected columns of each row
#[derive(Debug, Clone)]
pub struct RowFilter {
    matcher: Matcher,
    columns: ColumnSelection,
    invert: bool,
    on_short_row: ShortRowPolicy,
    short_cells: Cell<u64>,
}

impl RowFilter {
    pub fn new(
        matcher: Matcher,
        columns: ColumnSelection,
        invert: bool,
        on_short_row: ShortRowPolicy,
    ) -> Self {
        Self {
            matcher,
            columns,
            invert,
            on_short_row,
            short_cells: Cell::new(0),
        }
    }

    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    pub fn columns(&self) -> &ColumnSelection {
        &self.columns
    }

    /// Cells ignored so far because their row was too short
    pub fn short_cells(&self) -> u64 {
        self.short_cells.get()
    }

    /// Evaluate a row; `line` is its position in the input, for diagnostics
    pub fn evaluate(&self, line: u64, row: Row) -> Result<RowOutcome, FilterError> {
        if self.matcher.is_column_only() {
            return self.extract(line, &row);
        }

        let mut matched = false;

        for &column in self.columns.indices() {
            let access = field(&row, column);
            let Some(value) = self.tolerate(line, access)? else {
                continue;
            };
            if self.matcher.matches(value) {
                matched = true;
                break;
            }
        }

        if matched != self.invert {
            Ok(RowOutcome::Matched(row))
        } else {
            Ok(RowOutcome::Skipped)
        }
    }

    fn extract(&self, line: u64, row: &[String]) -> Result<RowOutcome, FilterError> {
        let mut extracted = Vec::with_capacity(self.columns.len());

        for &column in self.columns.indices() {
            if let Some(value) = self.tolerate(line, field(row, column))? {
                extracted.push(value.to_string());
            }
        }

        if extracted.is_empty() {
            Ok(RowOutcome::Skipped)
        } else {
            Ok(RowOutcome::Matched(extracted))
        }
    }

    /// Apply the short-row policy to a field access
    fn tolerate<'r>(&self, line: u64, access: FieldAccess<'r>) -> Result<Option<&'r str>, FilterError> {
        match access {
            FieldAccess::Value(value) => Ok(Some(value)),
            FieldAccess::OutOfRange { column, len } => match self.on_short_row {
                ShortRowPolicy::Skip => {
                    self.short_cells.set(self.short_cells.get() + 1);
                    log::warn!(
                        "Row {}: column {} out of range, row has {} fields; skipped",
                        line,
                        column + 1,
                        len
                    );
                    Ok(None)
                }
                ShortRowPolicy::Fail => Err(FilterError::ShortRow {
                    row: line,
                    column: column + 1,
                    len,
                }),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn row(fields: &[&str]) -> Row {
        fields.iter().map(|s| s.to_string()).collect()
    }

    fn string_filter(terms: &str, options: MatchOptions, columns: &[&str], header: &[&str]) -> RowFilter {
        let header = row(header);
        let set = TermSet::from_inline(terms, "+", options.ignore_case);
        let matcher = Matcher::Strings(StringMatcher::new(&set, options).unwrap());
        let tokens: Vec<String> = columns.iter().map(|s| s.to_string()).collect();
        let columns = ColumnSelection::resolve(&header, &tokens).unwrap();
        RowFilter::new(matcher, columns, false, ShortRowPolicy::Skip)
    }

    #[test]
    fn test_term_set_dedup() {
        let set = TermSet::from_inline("cat+dog+cat++", "+", false);
        assert_eq!(set.iter().collect::<Vec<_>>(), vec!["cat", "dog"]);
    }

    #[test]
    fn test_term_set_case_fold() {
        let set = TermSet::from_inline("Cat,CAT,dog", ",", true);
        assert_eq!(set.iter().collect::<Vec<_>>(), vec!["cat", "dog"]);
    }

    #[test]
    fn test_term_set_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "cat\ndog\ncat\n").unwrap();

        let set = TermSet::from_file(file.path(), false).unwrap();
        assert_eq!(set.iter().collect::<Vec<_>>(), vec!["cat", "dog"]);
    }

    #[test]
    fn test_term_set_file_skips_blank_lines() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "cat\r\n\n  \ndog  \n").unwrap();

        let set = TermSet::load(file.path().to_str().unwrap(), "+", false).unwrap();
        assert_eq!(set.iter().collect::<Vec<_>>(), vec!["cat", "dog"]);
    }

    #[test]
    fn test_term_set_empty_is_error() {
        assert!(TermSet::load("+", "+", false).is_err());
    }

    #[test]
    fn test_substring_vs_whole_word() {
        let header = ["id", "name", "amount"];
        let line = row(&["1", "foobar", "10"]);

        let substring = string_filter("foo", MatchOptions::default(), &["name"], &header);
        assert!(matches!(substring.evaluate(2, line.clone()).unwrap(), RowOutcome::Matched(_)));

        let options = MatchOptions {
            whole_words: true,
            ..Default::default()
        };
        let whole = string_filter("foo", options, &["name"], &header);
        assert_eq!(whole.evaluate(2, line).unwrap(), RowOutcome::Skipped);
    }

    #[test]
    fn test_whole_word_escapes_terms() {
        let set = TermSet::from_inline("a.c", "+", false);
        let options = MatchOptions {
            whole_words: true,
            ..Default::default()
        };
        let matcher = StringMatcher::new(&set, options).unwrap();

        assert!(matcher.matches("x a.c y"));
        assert!(!matcher.matches("x abc y"));
    }

    #[test]
    fn test_all_words() {
        let set = TermSet::from_inline("red+blue", "+", false);
        let any = StringMatcher::new(&set, MatchOptions::default()).unwrap();
        let all = StringMatcher::new(
            &set,
            MatchOptions {
                all_words: true,
                ..Default::default()
            },
        )
        .unwrap();

        assert!(any.matches("red car"));
        assert!(!all.matches("red car"));
        assert!(all.matches("red and blue car"));
    }

    #[test]
    fn test_ignore_case_is_superset() {
        let values = ["Foo", "foo", "FOO bar", "baz"];

        let exact = StringMatcher::new(
            &TermSet::from_inline("foo", "+", false),
            MatchOptions::default(),
        )
        .unwrap();
        let folded = StringMatcher::new(
            &TermSet::from_inline("foo", "+", true),
            MatchOptions {
                ignore_case: true,
                ..Default::default()
            },
        )
        .unwrap();

        for value in values {
            if exact.matches(value) {
                assert!(folded.matches(value), "{value}");
            }
        }
        assert!(folded.matches("FOO bar"));
        assert!(!exact.matches("FOO bar"));
    }

    #[test]
    fn test_parse_timestamp() {
        assert_eq!(parse_timestamp("2020-01-01", NaiveTime::MIN), Some(1577836800));
        assert_eq!(
            parse_timestamp("2020-01-01 12:00:00", NaiveTime::MIN),
            Some(1577836800 + 12 * 3600)
        );
        assert_eq!(parse_timestamp("not a date", NaiveTime::MIN), None);
    }

    #[test]
    fn test_bounds() {
        assert_eq!(Bound::minimum(None).unwrap(), Bound::Unbounded);
        assert_eq!(Bound::minimum(Some("2.5")).unwrap(), Bound::Numeric(2.5));
        assert_eq!(Bound::minimum(Some("2020-01-01")).unwrap(), Bound::Timestamp(1577836800));
        assert_eq!(
            Bound::maximum(Some("2020-01-31")).unwrap(),
            Bound::Timestamp(1580515199)
        );
        assert_eq!(
            Bound::maximum(Some("2020-01-31 08:00:00")).unwrap(),
            Bound::Timestamp(1580457600)
        );
        assert!(Bound::maximum(Some("soon")).is_err());
    }

    #[test]
    fn test_zero_is_a_real_bound() {
        let range = RangeFilter::new(Bound::minimum(Some("0")).unwrap(), Bound::Unbounded);
        assert!(range.is_active());
        assert!(range.matches("0"));
        assert!(!range.matches("-1"));
    }

    #[test]
    fn test_range_inclusive() {
        let range = RangeFilter::new(
            Bound::minimum(Some("2020-01-01")).unwrap(),
            Bound::maximum(Some("2020-01-31")).unwrap(),
        );

        assert!(!range.matches("1577836799"));
        assert!(range.matches("1577836800"));
        assert!(range.matches("1580515199"));
        assert!(!range.matches("1580515200"));
        assert!(range.matches("2020-01-15"));
        assert!(!range.matches("n/a"));
    }

    #[test]
    fn test_range_single_bound() {
        let min_only = RangeFilter::new(Bound::Numeric(10.0), Bound::Unbounded);
        assert!(min_only.matches("10"));
        assert!(min_only.matches(" 11.5 "));
        assert!(!min_only.matches("9.99"));

        let max_only = RangeFilter::new(Bound::Unbounded, Bound::Numeric(10.0));
        assert!(max_only.matches("-3"));
        assert!(!max_only.matches("10.01"));
    }

    #[test]
    fn test_any_column_matches() {
        let filter = string_filter("x", MatchOptions::default(), &["a", "b"], &["a", "b"]);
        assert!(matches!(filter.evaluate(2, row(&["", "x"])).unwrap(), RowOutcome::Matched(_)));
        assert_eq!(filter.evaluate(3, row(&["", ""])).unwrap(), RowOutcome::Skipped);
    }

    #[test]
    fn test_invert_complements() {
        let header = row(&["a"]);
        let columns = ColumnSelection::all(&header);
        let set = TermSet::from_inline("x", "+", false);
        let matcher = Matcher::Strings(StringMatcher::new(&set, MatchOptions::default()).unwrap());

        let plain = RowFilter::new(matcher.clone(), columns.clone(), false, ShortRowPolicy::Skip);
        let inverted = RowFilter::new(matcher, columns, true, ShortRowPolicy::Skip);

        for value in ["x", "y", "xx", ""] {
            let a = plain.evaluate(2, row(&[value])).unwrap() != RowOutcome::Skipped;
            let b = inverted.evaluate(2, row(&[value])).unwrap() != RowOutcome::Skipped;
            assert_ne!(a, b, "{value}");
        }
    }

    #[test]
    fn test_column_extraction() {
        let header = row(&["a", "b", "c"]);
        let columns = ColumnSelection::resolve(&header, &["c".to_string(), "a".to_string()]).unwrap();
        let filter = RowFilter::new(Matcher::Columns, columns, false, ShortRowPolicy::Skip);

        assert_eq!(
            filter.evaluate(2, row(&["1", "2", "3"])).unwrap(),
            RowOutcome::Matched(row(&["3", "1"]))
        );
        // Short row keeps what exists
        assert_eq!(
            filter.evaluate(3, row(&["1"])).unwrap(),
            RowOutcome::Matched(row(&["1"]))
        );
    }

    #[test]
    fn test_short_row_policy() {
        let header = row(&["a", "b"]);
        let columns = ColumnSelection::resolve(&header, &["b".to_string()]).unwrap();
        let range = Matcher::Range(RangeFilter::new(Bound::Numeric(0.0), Bound::Unbounded));

        let skip = RowFilter::new(range.clone(), columns.clone(), false, ShortRowPolicy::Skip);
        assert_eq!(skip.evaluate(4, row(&["1"])).unwrap(), RowOutcome::Skipped);
        assert_eq!(skip.short_cells(), 1);

        let fail = RowFilter::new(range, columns, false, ShortRowPolicy::Fail);
        let err = fail.evaluate(4, row(&["1"])).unwrap_err();
        assert!(matches!(err, FilterError::ShortRow { row: 4, column: 2, len: 1 }));
    }
}
