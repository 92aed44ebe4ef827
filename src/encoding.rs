//! Encoding detection and transcoding module
//!
//! Input bytes are decoded according to a WHATWG label (or detected with
//! `auto`) and output is re-encoded into the same encoding where `encoding_rs`
//! has an encoder for it.

use crate::error::FilterError;
use chardetng::EncodingDetector;
use encoding_rs::{CoderResult, Encoder, Encoding};
use encoding_rs_io::DecodeReaderBytesBuilder;
use std::borrow::Cow;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::Path;

/// Bytes sampled for detection and header sniffing
const SAMPLE_SIZE: usize = 64 * 1024;

pub const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Result of encoding detection
#[derive(Debug, Clone)]
pub struct EncodingInfo {
    /// Detected encoding name
    pub name: &'static str,
    /// Confidence level (0.0 - 1.0)
    pub confidence: f32,
    /// The encoding_rs Encoding reference
    pub encoding: &'static Encoding,
}

impl Default for EncodingInfo {
    fn default() -> Self {
        Self {
            name: "UTF-8",
            confidence: 1.0,
            encoding: encoding_rs::UTF_8,
        }
    }
}

impl EncodingInfo {
    fn exact(encoding: &'static Encoding) -> Self {
        Self {
            name: encoding.name(),
            confidence: 1.0,
            encoding,
        }
    }
}

/// Resolve a user-supplied label, or sniff the file when the label is `auto`
pub fn resolve_encoding(label: &str, path: &Path) -> anyhow::Result<EncodingInfo> {
    if label.eq_ignore_ascii_case("auto") {
        return detect_encoding(path);
    }

    Encoding::for_label(label.trim().as_bytes())
        .map(EncodingInfo::exact)
        .ok_or_else(|| FilterError::UnknownEncoding(label.to_string()).into())
}

fn read_sample(path: &Path) -> io::Result<Vec<u8>> {
    let mut sample = Vec::with_capacity(SAMPLE_SIZE);
    File::open(path)?
        .take(SAMPLE_SIZE as u64)
        .read_to_end(&mut sample)?;
    Ok(sample)
}

/// Detect the encoding of a file by sampling its content
pub fn detect_encoding(path: &Path) -> anyhow::Result<EncodingInfo> {
    let sample = read_sample(path)?;

    if sample.is_empty() {
        return Ok(EncodingInfo::default());
    }

    // Check for BOM first
    if let Some(encoding) = detect_bom(&sample) {
        return Ok(EncodingInfo::exact(encoding));
    }

    let mut detector = EncodingDetector::new();
    detector.feed(&sample, true);

    let encoding = detector.guess(None, true);

    // Calculate a rough confidence based on whether the content is valid UTF-8
    let confidence = if encoding == encoding_rs::UTF_8 {
        if std::str::from_utf8(&sample).is_ok() {
            1.0
        } else {
            0.5
        }
    } else {
        0.8
    };

    Ok(EncodingInfo {
        name: encoding.name(),
        confidence,
        encoding,
    })
}

/// Detect BOM (Byte Order Mark) at the start of content
fn detect_bom(content: &[u8]) -> Option<&'static Encoding> {
    Encoding::for_bom(content).map(|(encoding, _)| encoding)
}

/// Decode the first line of the file, used for delimiter sniffing.
///
/// Returns `None` for an empty file.
pub fn read_header_line(path: &Path, encoding: &'static Encoding) -> anyhow::Result<Option<String>> {
    let sample = read_sample(path)?;

    if sample.is_empty() {
        return Ok(None);
    }

    let (text, _, _) = encoding.decode(&sample);
    let line = text.split('\n').next().unwrap_or_default();
    Ok(Some(line.trim_end_matches('\r').to_string()))
}

/// Open the input for CSV parsing.
///
/// ASCII-compatible encodings are handed to the csv reader untouched and
/// decoded per field; anything else (UTF-16) is transcoded to UTF-8 first
/// because its delimiters are not single bytes.
pub fn open_input(path: &Path, encoding: &'static Encoding) -> anyhow::Result<(Box<dyn Read>, FieldDecoder)> {
    let file = File::open(path)?;

    if encoding.is_ascii_compatible() {
        Ok((
            Box::new(BufReader::with_capacity(SAMPLE_SIZE, file)),
            FieldDecoder::new(encoding),
        ))
    } else {
        let reader = DecodeReaderBytesBuilder::new()
            .encoding(Some(encoding))
            .build(file);
        Ok((
            Box::new(BufReader::with_capacity(SAMPLE_SIZE, reader)),
            FieldDecoder::new(encoding_rs::UTF_8),
        ))
    }
}

/// Decodes raw CSV fields into strings
#[derive(Debug, Clone, Copy)]
pub struct FieldDecoder {
    encoding: &'static Encoding,
    strict: bool,
}

impl FieldDecoder {
    pub fn new(encoding: &'static Encoding) -> Self {
        Self {
            encoding,
            strict: false,
        }
    }

    /// Reject malformed sequences instead of substituting U+FFFD
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn encoding(&self) -> &'static Encoding {
        self.encoding
    }

    /// Decode one field; `None` only in strict mode on malformed input
    pub fn decode<'a>(&self, bytes: &'a [u8]) -> Option<Cow<'a, str>> {
        if self.encoding == encoding_rs::UTF_8 {
            // Fast path for UTF-8
            return match std::str::from_utf8(bytes) {
                Ok(s) => Some(Cow::Borrowed(s)),
                Err(_) if self.strict => None,
                Err(_) => Some(String::from_utf8_lossy(bytes)),
            };
        }

        if self.strict {
            self.encoding
                .decode_without_bom_handling_and_without_replacement(bytes)
        } else {
            let (decoded, had_errors) = self.encoding.decode_without_bom_handling(bytes);
            if had_errors {
                log::debug!("Encoding errors in field, using lossy conversion");
            }
            Some(decoded)
        }
    }
}

/// Writer that re-encodes UTF-8 text into the output encoding.
///
/// Encodings without an `encoding_rs` encoder (UTF-16, replacement) fall back
/// to UTF-8, following `Encoding::output_encoding`.
pub struct TranscodingWriter<W: Write> {
    inner: W,
    encoder: Option<Encoder>,
    pending: Vec<u8>,
    scratch: Vec<u8>,
}

impl<W: Write> TranscodingWriter<W> {
    pub fn new(inner: W, encoding: &'static Encoding) -> Self {
        let output = encoding.output_encoding();
        let encoder = (output != encoding_rs::UTF_8).then(|| output.new_encoder());

        Self {
            inner,
            encoder,
            pending: Vec::new(),
            scratch: vec![0u8; 8 * 1024],
        }
    }

    fn encode(&mut self, mut text: &str, last: bool) -> io::Result<()> {
        let Some(encoder) = self.encoder.as_mut() else {
            return self.inner.write_all(text.as_bytes());
        };

        loop {
            let (result, read, written, had_errors) =
                encoder.encode_from_utf8(text, &mut self.scratch, last);
            if had_errors {
                log::debug!("Unmappable characters written as numeric character references");
            }
            self.inner.write_all(&self.scratch[..written])?;
            text = &text[read..];

            match result {
                CoderResult::InputEmpty => return Ok(()),
                CoderResult::OutputFull => continue,
            }
        }
    }

    /// Flush encoder state and return the inner writer
    pub fn finish(mut self) -> io::Result<W> {
        if !self.pending.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "truncated UTF-8 sequence at end of output",
            ));
        }
        self.encode("", true)?;
        self.inner.flush()?;
        Ok(self.inner)
    }
}

impl<W: Write> Write for TranscodingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.encoder.is_none() {
            return self.inner.write(buf);
        }

        self.pending.extend_from_slice(buf);

        // Hold back an incomplete trailing sequence until the next write
        let valid = match std::str::from_utf8(&self.pending) {
            Ok(s) => s.len(),
            Err(e) if e.error_len().is_none() => e.valid_up_to(),
            Err(e) => return Err(io::Error::new(io::ErrorKind::InvalidData, e)),
        };

        let pending = std::mem::take(&mut self.pending);
        let text = std::str::from_utf8(&pending[..valid])
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        self.encode(text, false)?;
        self.pending = pending[valid..].to_vec();

        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// A line iterator that handles different encodings
pub struct EncodedLineIterator {
    reader: Box<dyn BufRead>,
    encoding: &'static Encoding,
    line_buffer: Vec<u8>,
    first: bool,
}

impl EncodedLineIterator {
    /// Create a new line iterator for a file with automatic encoding detection
    pub fn new(path: &Path) -> anyhow::Result<Self> {
        let encoding_info = detect_encoding(path)?;
        Self::with_encoding(path, encoding_info.encoding)
    }

    /// Create with a specific encoding
    pub fn with_encoding(path: &Path, encoding: &'static Encoding) -> anyhow::Result<Self> {
        let (reader, decoder) = open_input(path, encoding)?;

        Ok(Self {
            reader: Box::new(BufReader::with_capacity(SAMPLE_SIZE, reader)),
            encoding: decoder.encoding(),
            line_buffer: Vec::with_capacity(4096),
            first: true,
        })
    }
}

impl Iterator for EncodedLineIterator {
    type Item = anyhow::Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        self.line_buffer.clear();

        match self.reader.read_until(b'\n', &mut self.line_buffer) {
            Ok(0) => None, // EOF
            Ok(_) => {
                // Remove trailing newline characters
                while self.line_buffer.last() == Some(&b'\n')
                    || self.line_buffer.last() == Some(&b'\r')
                {
                    self.line_buffer.pop();
                }

                let mut bytes = self.line_buffer.as_slice();
                if std::mem::take(&mut self.first) && self.encoding == encoding_rs::UTF_8 {
                    bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
                }

                let (decoded, had_errors) = self.encoding.decode_without_bom_handling(bytes);
                if had_errors {
                    // Log warning but continue
                    log::warn!("Encoding errors in line, using lossy conversion");
                }
                Some(Ok(decoded.into_owned()))
            }
            Err(e) => Some(Err(e.into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_utf8_detection() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "Hello, World!").unwrap();
        writeln!(file, "Привет мир!").unwrap();

        let info = detect_encoding(file.path()).unwrap();
        assert_eq!(info.name, "UTF-8");
    }

    #[test]
    fn test_bom_detection() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&[0xFF, 0xFE, b'a', 0, b',', 0, b'b', 0]).unwrap();

        let info = detect_encoding(file.path()).unwrap();
        assert_eq!(info.encoding, encoding_rs::UTF_16LE);
    }

    #[test]
    fn test_resolve_label() {
        let file = NamedTempFile::new().unwrap();
        let info = resolve_encoding("latin1", file.path()).unwrap();
        assert_eq!(info.encoding, encoding_rs::WINDOWS_1252);

        assert!(resolve_encoding("klingon", file.path()).is_err());
    }

    #[test]
    fn test_header_line() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "id;name\r\n1;x\r\n").unwrap();

        let line = read_header_line(file.path(), encoding_rs::UTF_8).unwrap();
        assert_eq!(line.as_deref(), Some("id;name"));

        let empty = NamedTempFile::new().unwrap();
        assert!(read_header_line(empty.path(), encoding_rs::UTF_8).unwrap().is_none());
    }

    #[test]
    fn test_field_decoder() {
        let latin = FieldDecoder::new(encoding_rs::WINDOWS_1252);
        assert_eq!(latin.decode(b"caf\xe9").unwrap(), "café");

        let utf8 = FieldDecoder::new(encoding_rs::UTF_8);
        assert_eq!(utf8.decode(b"caf\xe9").unwrap(), "caf\u{FFFD}");
        assert!(utf8.strict(true).decode(b"caf\xe9").is_none());
    }

    #[test]
    fn test_transcoding_writer_split_sequence() {
        let mut writer = TranscodingWriter::new(Vec::new(), encoding_rs::WINDOWS_1252);
        let bytes = "café\n".as_bytes();
        // Split inside the two-byte 'é'
        writer.write_all(&bytes[..4]).unwrap();
        writer.write_all(&bytes[4..]).unwrap();

        let out = writer.finish().unwrap();
        assert_eq!(out, b"caf\xe9\n");
    }

    #[test]
    fn test_transcoding_writer_utf16_falls_back() {
        let mut writer = TranscodingWriter::new(Vec::new(), encoding_rs::UTF_16LE);
        writer.write_all("ab".as_bytes()).unwrap();
        assert_eq!(writer.finish().unwrap(), b"ab");
    }

    #[test]
    fn test_line_iterator() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "line1").unwrap();
        writeln!(file, "line2").unwrap();
        writeln!(file, "line3").unwrap();

        let iter = EncodedLineIterator::new(file.path()).unwrap();
        let lines: Vec<_> = iter.filter_map(|r| r.ok()).collect();

        assert_eq!(lines, vec!["line1", "line2", "line3"]);
    }
}
