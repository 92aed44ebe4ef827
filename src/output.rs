//! Output management module
//!
//! Rows are written to a temporary file next to the destination and the file
//! is only moved into place by [`OutputWriter::finish`]. A run that fails
//! part-way leaves no output file behind.

use crate::dialect::{Dialect, Quoting};
use crate::encoding::TranscodingWriter;
use crate::error::FilterError;
use anyhow::Context;
use encoding_rs::Encoding;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tempfile::{Builder, NamedTempFile};

/// Default buffer size for file writing (1MB)
const DEFAULT_BUFFER_SIZE: usize = 1024 * 1024;

/// Suffix appended to the input stem for the default output name
pub const FILTERED_SUFFIX: &str = "_FILTERED";

type Sink = TranscodingWriter<BufWriter<NamedTempFile>>;

/// CSV writer for the filtered copy
pub struct OutputWriter {
    writer: csv::Writer<Sink>,
    path: PathBuf,
    /// Delimiter byte when fields are never quoted
    unquoted: Option<u8>,
    rows_written: u64,
}

impl OutputWriter {
    /// Create a writer whose output will land at `path`
    pub fn create(path: PathBuf, dialect: &Dialect, encoding: &'static Encoding) -> anyhow::Result<Self> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let mut builder = Builder::new();
        // 0666 minus umask, like a plainly created file
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            builder.permissions(std::fs::Permissions::from_mode(0o666));
        }

        let temp = builder
            .tempfile_in(&dir)
            .with_context(|| format!("cannot create output in {:?}", dir))?;
        let sink = TranscodingWriter::new(BufWriter::with_capacity(DEFAULT_BUFFER_SIZE, temp), encoding);

        let unquoted = match dialect.quoting {
            Quoting::None => Some(dialect.delimiter.as_byte()),
            _ => None,
        };

        Ok(Self {
            writer: dialect.writer_builder().from_writer(sink),
            path,
            unquoted,
            rows_written: 0,
        })
    }

    /// Write one record.
    ///
    /// Without quoting, a field holding the delimiter or a line break cannot
    /// be written unambiguously and is rejected.
    pub fn write_row<I, T>(&mut self, fields: I) -> anyhow::Result<()>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        match self.unquoted {
            Some(delimiter) => {
                let fields: Vec<T> = fields.into_iter().collect();
                for field in &fields {
                    let bytes: &[u8] = field.as_ref();
                    if memchr::memchr3(delimiter, b'\n', b'\r', bytes).is_some() {
                        return Err(FilterError::UnquotableField {
                            row: self.rows_written + 1,
                            field: String::from_utf8_lossy(bytes).into_owned(),
                        }
                        .into());
                    }
                }
                self.writer.write_record(fields)?;
            }
            None => self.writer.write_record(fields)?,
        }
        self.rows_written += 1;
        Ok(())
    }

    /// Flush everything and move the file to its final path
    pub fn finish(self) -> anyhow::Result<PathBuf> {
        let sink = self
            .writer
            .into_inner()
            .map_err(|e| anyhow::anyhow!("failed to flush output: {}", e.error()))?;
        let buffered = sink.finish()?;
        let temp = buffered.into_inner().map_err(|e| e.into_error())?;

        temp.persist(&self.path)
            .with_context(|| format!("cannot write output file {:?}", self.path))?;

        Ok(self.path)
    }

    /// Records written so far, header included
    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }
}

/// Generate the default output name: `<stem>_FILTERED<ext>` in the current directory
pub fn default_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");

    let name = match input.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{}{}.{}", stem, FILTERED_SUFFIX, ext),
        None => format!("{}{}", stem, FILTERED_SUFFIX),
    };

    PathBuf::from(name)
}
