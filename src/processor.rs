//! Core processing engine
//!
//! Streams the input once: sniff the dialect, read the header, resolve the
//! columns, then evaluate and write rows one at a time.

use crate::cli::Args;
use crate::columns::ColumnSelection;
use crate::dialect::{detect_delimiter, Delimiter, Dialect, LineEvent, LineScanner, Quoting};
use crate::encoding::{open_input, read_header_line, resolve_encoding, FieldDecoder};
use crate::error::FilterError;
use crate::filter::{
    Bound, MatchOptions, Matcher, RangeFilter, Row, RowFilter, RowOutcome, ShortRowPolicy,
    StringMatcher, TermSet,
};
use crate::output::{default_output_path, OutputWriter};
use crate::progress::{
    create_row_spinner, print_header, print_info, print_success, print_warning, RunCounters,
    PROGRESS_INTERVAL,
};

use bytesize::ByteSize;
use colored::*;
use csv::ByteRecord;
use std::fs;
use std::io::Read;
use std::path::PathBuf;

/// Which predicate the run applies
#[derive(Debug, Clone)]
pub enum FilterMode {
    /// Keep rows containing the terms
    Strings(TermSet),
    /// Keep rows inside the interval
    Range(RangeFilter),
    /// Keep every row, cut columns
    Columns,
}

impl FilterMode {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Strings(_) => "strings",
            Self::Range(_) => "range",
            Self::Columns => "columns",
        }
    }
}

/// Filter configuration
#[derive(Debug, Clone)]
pub struct FilterConfig {
    pub input: PathBuf,
    /// Output path; `<stem>_FILTERED<ext>` when absent
    pub output: Option<PathBuf>,
    pub mode: FilterMode,
    /// Raw column tokens (titles and/or 1-based indices)
    pub columns: Option<Vec<String>>,
    pub match_options: MatchOptions,
    pub invert: bool,
    /// Delimiter override; detected from the header when absent
    pub delimiter: Option<Delimiter>,
    pub quoting: Quoting,
    /// Encoding label or `auto`
    pub encoding: String,
    pub strict_encoding: bool,
    pub on_short_row: ShortRowPolicy,
    pub quiet: bool,
    pub verbose: bool,
}

impl FilterConfig {
    /// Configuration with default dialect, encoding and policies
    pub fn new(input: impl Into<PathBuf>, mode: FilterMode) -> Self {
        Self {
            input: input.into(),
            output: None,
            mode,
            columns: None,
            match_options: MatchOptions::default(),
            invert: false,
            delimiter: None,
            quoting: Quoting::default(),
            encoding: "utf-8".to_string(),
            strict_encoding: false,
            on_short_row: ShortRowPolicy::default(),
            quiet: false,
            verbose: false,
        }
    }

    /// Build and validate a configuration from command-line arguments.
    ///
    /// Strings take priority over a range, which takes priority over a plain
    /// column cut.
    pub fn from_args(args: &Args) -> anyhow::Result<Self> {
        let columns = args.column_tokens();

        if let Some(ref tokens) = columns {
            if tokens.iter().any(|t| t.trim() == "0") {
                return Err(FilterError::ZeroColumn.into());
            }
        }

        let mode = match args.strings.as_deref().filter(|s| !s.is_empty()) {
            Some(source) => FilterMode::Strings(TermSet::load(
                source,
                &args.separator,
                args.ignore_case,
            )?),
            None if args.has_range() => {
                if columns.is_none() {
                    return Err(FilterError::RangeWithoutColumns.into());
                }
                FilterMode::Range(RangeFilter::new(
                    Bound::minimum(args.minimum.as_deref())?,
                    Bound::maximum(args.maximum.as_deref())?,
                ))
            }
            None if columns.is_some() => FilterMode::Columns,
            None => return Err(FilterError::NoCriteria.into()),
        };

        Ok(Self {
            input: args.input.clone(),
            output: args.output.clone(),
            mode,
            columns,
            match_options: args.match_options(),
            invert: args.invert,
            delimiter: args.delimiter_override()?,
            quoting: args.quoting.into(),
            encoding: args.encoding.clone(),
            strict_encoding: args.strict_encoding,
            on_short_row: args.short_row_policy(),
            quiet: args.quiet,
            verbose: args.verbose,
        })
    }

    /// Resolve the column selection against the header
    fn select_columns(&self, header: &[String]) -> Result<ColumnSelection, FilterError> {
        match (&self.mode, &self.columns) {
            (FilterMode::Strings(_), None) => Ok(ColumnSelection::all(header)),
            (FilterMode::Strings(_), Some(tokens)) => ColumnSelection::resolve(header, tokens),
            (FilterMode::Range(_), None) => Err(FilterError::RangeWithoutColumns),
            (FilterMode::Range(_), Some(tokens)) => ColumnSelection::resolve(header, tokens),
            (FilterMode::Columns, None) => Err(FilterError::NoCriteria),
            (FilterMode::Columns, Some(tokens)) => {
                let selection = ColumnSelection::resolve(header, tokens)?;
                if self.invert {
                    selection.complement(header)
                } else {
                    Ok(selection)
                }
            }
        }
    }

    fn matcher(&self) -> anyhow::Result<Matcher> {
        Ok(match &self.mode {
            FilterMode::Strings(terms) => {
                Matcher::Strings(StringMatcher::new(terms, self.match_options)?)
            }
            FilterMode::Range(range) if !range.is_active() => {
                return Err(FilterError::NoCriteria.into());
            }
            FilterMode::Range(range) => Matcher::Range(*range),
            FilterMode::Columns => Matcher::Columns,
        })
    }
}

/// Outcome of a finished run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub output: PathBuf,
    pub header: Vec<String>,
    pub output_header: Vec<String>,
    pub dialect: Dialect,
    pub counters: RunCounters,
    pub column_only: bool,
}

/// Main processor
pub struct Processor {
    config: FilterConfig,
}

impl Processor {
    pub fn new(config: FilterConfig) -> Self {
        Self { config }
    }

    /// Run the filter over the input file
    pub fn process(&self) -> anyhow::Result<RunReport> {
        let config = &self.config;
        let input = config.input.as_path();

        let size = fs::metadata(input)
            .map_err(|e| anyhow::anyhow!("Cannot read input {:?}: {}", input, e))?
            .len();

        let encoding = resolve_encoding(&config.encoding, input)?;
        log::debug!(
            "Encoding {} (confidence {:.1})",
            encoding.name,
            encoding.confidence
        );

        let header_line = read_header_line(input, encoding.encoding)?
            .ok_or_else(|| FilterError::MissingHeader(input.to_path_buf()))?;
        let delimiter = match config.delimiter {
            Some(delimiter) => delimiter,
            None => {
                let detected = detect_delimiter(&header_line);
                log::debug!("Detected delimiter {}", detected);
                detected
            }
        };
        let dialect = Dialect::new(delimiter, config.quoting);

        if !config.quiet {
            print_header("Filtering...");
            print_info(&format!("Input:     {:?} ({})", input, ByteSize(size)));
            print_info(&format!("Encoding:  {}", encoding.name));
            print_info(&format!("Delimiter: {}", delimiter));
            print_info(&format!("Mode:      {}", config.mode.name()));
        }

        let (reader, decoder) = open_input(input, encoding.encoding)?;
        let decoder = decoder.strict(config.strict_encoding);
        let mut reader = dialect
            .reader_builder()
            .from_reader(LineScanner::new(reader, &dialect));

        let mut record = ByteRecord::new();
        if !reader.read_byte_record(&mut record)? {
            return Err(FilterError::MissingHeader(input.to_path_buf()).into());
        }
        let (leading, header_line) = next_record_line(reader.get_mut());
        if !leading.is_empty() {
            log::debug!("Ignored {} empty lines before the header", leading.len());
        }
        let mut header = decode_record(&record, &decoder, header_line.unwrap_or(1))?;
        if let Some(first) = header.first_mut() {
            if let Some(stripped) = first.strip_prefix('\u{feff}') {
                *first = stripped.to_string();
            }
        }

        let columns = config.select_columns(&header)?;
        let filter = RowFilter::new(config.matcher()?, columns, config.invert, config.on_short_row);
        let column_only = filter.matcher().is_column_only();

        let output_header = if column_only {
            filter.columns().titles().to_vec()
        } else {
            header.clone()
        };

        if config.verbose {
            print_info(&format!("Columns:   {:?}", filter.columns().titles()));
        }

        let output_path = config
            .output
            .clone()
            .unwrap_or_else(|| default_output_path(input));
        let mut output = OutputWriter::create(output_path, &dialect, encoding.encoding)?;
        output.write_row(&output_header)?;

        let mut counters = RunCounters::new(header.len(), output_header.len());
        let pb = if config.quiet {
            indicatif::ProgressBar::hidden()
        } else {
            create_row_spinner("")
        };

        let mut evaluate = |line: u64, row: Row, counters: &mut RunCounters| -> anyhow::Result<()> {
            counters.add_row();
            if counters.rows_total % PROGRESS_INTERVAL == 0 {
                pb.set_position(counters.rows_total);
            }

            if let RowOutcome::Matched(row) = filter.evaluate(line, row)? {
                output.write_row(&row)?;
                counters.add_match();
            }
            Ok(())
        };

        loop {
            let more = reader.read_byte_record(&mut record)?;
            let (blanks, start) = if more {
                next_record_line(reader.get_mut())
            } else {
                (drain_blank_lines(reader.get_mut()), None)
            };

            // The csv reader drops empty lines; they are rows with no fields
            for line in blanks {
                evaluate(line, Row::new(), &mut counters)?;
            }

            if !more {
                break;
            }

            let line = start
                .or_else(|| record.position().map(|p| p.line()))
                .unwrap_or(counters.rows_total + 1);
            let row = decode_record(&record, &decoder, line)?;
            evaluate(line, row, &mut counters)?;
        }

        pb.set_position(counters.rows_total);
        pb.finish_with_message("Complete".green().to_string());

        counters.short_cells = filter.short_cells();
        let output = output.finish()?;

        log::info!(
            "Read {} lines, {} matched, {} columns of {} kept",
            counters.rows_total,
            counters.rows_matched,
            counters.columns_matched,
            counters.columns_total
        );

        if !config.quiet {
            if counters.short_cells > 0 {
                print_warning(&format!(
                    "{} cells skipped in rows shorter than the header",
                    counters.short_cells
                ));
            }
            print_success(&format!("Output written to: {:?}", output));
            counters.print_summary(column_only);
        }

        Ok(RunReport {
            output,
            header,
            output_header,
            dialect,
            counters,
            column_only,
        })
    }
}

/// Pop scanner events up to the next record start: the empty lines before it
/// and the line it starts on
fn next_record_line<R: Read>(scanner: &mut LineScanner<R>) -> (Vec<u64>, Option<u64>) {
    let mut blanks = Vec::new();
    while let Some(event) = scanner.next_event() {
        match event {
            LineEvent::Blank(line) => blanks.push(line),
            LineEvent::Record(line) => return (blanks, Some(line)),
        }
    }
    (blanks, None)
}

/// Empty lines left after the last record
fn drain_blank_lines<R: Read>(scanner: &mut LineScanner<R>) -> Vec<u64> {
    std::iter::from_fn(|| scanner.next_event())
        .filter_map(|event| match event {
            LineEvent::Blank(line) => Some(line),
            LineEvent::Record(_) => None,
        })
        .collect()
}

/// Decode every field of a raw record
fn decode_record(record: &ByteRecord, decoder: &FieldDecoder, line: u64) -> Result<Row, FilterError> {
    record
        .iter()
        .map(|bytes| {
            decoder
                .decode(bytes)
                .map(|field| field.into_owned())
                .ok_or(FilterError::MalformedBytes {
                    row: line,
                    encoding: decoder.encoding().name(),
                })
        })
        .collect()
}
