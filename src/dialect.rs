//! CSV dialect: delimiter detection and quoting styles
//!
//! The delimiter is sniffed from the literal text of the header line, before
//! any CSV parsing takes place. Candidates are tried in priority order and the
//! first one present anywhere in the line wins, so a title that contains a
//! higher-priority character (e.g. `"a|b",c`) selects that character.

use crate::error::FilterError;
use csv::{QuoteStyle, ReaderBuilder, WriterBuilder};
use std::collections::VecDeque;
use std::fmt;
use std::io::{self, Read};

/// Delimiter candidates in detection priority order
pub const CANDIDATES: [u8; 4] = [b'|', b'\t', b';', b','];

/// Byte standing in for "no delimiter" so each line parses as a single field.
const UNIT_SEPARATOR: u8 = 0x1F;

/// Field delimiter of the input and output files
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delimiter {
    Char(u8),
    /// No candidate found: one field per line
    LinePerField,
}

impl Delimiter {
    /// Parse a user-supplied delimiter override (`\t` and `tab` mean tab)
    pub fn parse(value: &str) -> Result<Self, FilterError> {
        match value {
            "\\t" | "tab" | "TAB" => return Ok(Self::Char(b'\t')),
            "\\n" => return Ok(Self::LinePerField),
            _ => {}
        }

        let bytes = value.as_bytes();
        if bytes.len() == 1 && bytes[0].is_ascii() {
            if bytes[0] == b'\n' {
                return Ok(Self::LinePerField);
            }
            Ok(Self::Char(bytes[0]))
        } else {
            Err(FilterError::InvalidDelimiter(value.to_string()))
        }
    }

    /// Byte handed to the csv reader and writer
    pub fn as_byte(&self) -> u8 {
        match self {
            Self::Char(b) => *b,
            Self::LinePerField => UNIT_SEPARATOR,
        }
    }
}

impl fmt::Display for Delimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Char(b'\t') => write!(f, "tab"),
            Self::Char(b) => write!(f, "'{}'", *b as char),
            Self::LinePerField => write!(f, "none (one field per line)"),
        }
    }
}

/// Detect the delimiter from the raw header line
pub fn detect_delimiter(header_line: &str) -> Delimiter {
    let bytes = header_line.as_bytes();

    CANDIDATES
        .iter()
        .find(|&&c| memchr::memchr(c, bytes).is_some())
        .map(|&c| Delimiter::Char(c))
        .unwrap_or(Delimiter::LinePerField)
}

/// Field quoting style
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Quoting {
    /// Quote only fields that need it
    #[default]
    Minimal,
    /// Quote every field
    All,
    /// Quote every field that is not a number
    NonNumeric,
    /// Never quote; quote characters are plain data when reading
    None,
}

impl Quoting {
    fn quote_style(&self) -> QuoteStyle {
        match self {
            Self::Minimal => QuoteStyle::Necessary,
            Self::All => QuoteStyle::Always,
            Self::NonNumeric => QuoteStyle::NonNumeric,
            Self::None => QuoteStyle::Never,
        }
    }
}

impl fmt::Display for Quoting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Minimal => "minimal",
            Self::All => "all",
            Self::NonNumeric => "non-numeric",
            Self::None => "none",
        };
        f.write_str(name)
    }
}

/// Delimiter and quoting shared by reader and writer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dialect {
    pub delimiter: Delimiter,
    pub quoting: Quoting,
}

impl Dialect {
    pub fn new(delimiter: Delimiter, quoting: Quoting) -> Self {
        Self { delimiter, quoting }
    }

    /// Reader settings. Headers are read as an ordinary record and rows of any
    /// length are accepted; short rows are handled per column by the driver.
    pub fn reader_builder(&self) -> ReaderBuilder {
        let mut builder = ReaderBuilder::new();
        builder
            .delimiter(self.delimiter.as_byte())
            .has_headers(false)
            .flexible(true)
            .quoting(self.quoting != Quoting::None);
        builder
    }

    pub fn writer_builder(&self) -> WriterBuilder {
        let mut builder = WriterBuilder::new();
        builder
            .delimiter(self.delimiter.as_byte())
            .flexible(true)
            .quote_style(self.quoting.quote_style());
        builder
    }
}

/// Physical-line event seen while scanning the raw input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineEvent {
    /// An empty line at this line number
    Blank(u64),
    /// A record starts on this line
    Record(u64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    FieldStart,
    Unquoted,
    Quoted,
    QuoteInQuoted,
}

/// Reader adapter reporting empty lines and record start lines.
///
/// The csv parser skips empty lines without a trace and positions a record
/// before any lines it skipped. Scanning the same bytes with the dialect's
/// quoting rules gives one `Record` event per parsed record, in order, with
/// `Blank` events for the empty lines between them.
pub struct LineScanner<R> {
    inner: R,
    delimiter: u8,
    quoting: bool,
    line: u64,
    state: ScanState,
    at_boundary: bool,
    line_empty: bool,
    events: VecDeque<LineEvent>,
}

impl<R: Read> LineScanner<R> {
    pub fn new(inner: R, dialect: &Dialect) -> Self {
        Self {
            inner,
            delimiter: dialect.delimiter.as_byte(),
            quoting: dialect.quoting != Quoting::None,
            line: 1,
            state: ScanState::FieldStart,
            at_boundary: true,
            line_empty: true,
            events: VecDeque::new(),
        }
    }

    /// Next event, if the bytes read so far produced one
    pub fn next_event(&mut self) -> Option<LineEvent> {
        self.events.pop_front()
    }

    fn scan(&mut self, b: u8) {
        match self.state {
            ScanState::Quoted => {
                if b == b'"' {
                    self.state = ScanState::QuoteInQuoted;
                } else if b == b'\n' {
                    self.line += 1;
                }
                return;
            }
            ScanState::QuoteInQuoted if b == b'"' => {
                self.state = ScanState::Quoted;
                return;
            }
            ScanState::QuoteInQuoted => self.state = ScanState::Unquoted,
            ScanState::FieldStart | ScanState::Unquoted => {}
        }

        match b {
            b'\n' => {
                if self.line_empty {
                    self.events.push_back(LineEvent::Blank(self.line));
                }
                self.line += 1;
                self.line_empty = true;
                self.at_boundary = true;
                self.state = ScanState::FieldStart;
            }
            b'\r' => {
                self.at_boundary = true;
                self.state = ScanState::FieldStart;
            }
            _ => {
                if self.at_boundary {
                    self.events.push_back(LineEvent::Record(self.line));
                    self.at_boundary = false;
                }
                self.line_empty = false;
                self.state = if b == self.delimiter {
                    ScanState::FieldStart
                } else if self.quoting && b == b'"' && self.state == ScanState::FieldStart {
                    ScanState::Quoted
                } else {
                    ScanState::Unquoted
                };
            }
        }
    }
}

impl<R: Read> Read for LineScanner<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        for &b in &buf[..n] {
            self.scan(b);
        }
        Ok(n)
    }
}
