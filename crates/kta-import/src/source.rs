//! Streaming CSV source
//!
//! Reads a delimited member export one record at a time. The source is a
//! forward-only producer: [`MemberSource::next_row`] yields `Ok(Some(row))`
//! per record, `Ok(None)` at end of input, and an error when the underlying
//! data cannot be read. Nothing is buffered beyond the CSV reader's own
//! read buffer, so a caller that stops pulling also stops reading the file.

use csv_async::{AsyncReader, AsyncReaderBuilder, ByteRecord, ErrorKind, Trim};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use std::io::Cursor;
use tokio::io::{AsyncRead, AsyncReadExt, Chain};
use tracing::debug;

/// UTF-8 byte-order mark written by spreadsheet exports
pub const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Errors produced while reading the input
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Failed to read input: {0}")]
    Io(#[from] std::io::Error),

    /// One record could not be decoded; the stream can continue
    #[error("Malformed record at line {line}: {reason}")]
    Malformed { line: u64, reason: String },

    #[error("Failed to read CSV header: {0}")]
    Header(String),
}

impl SourceError {
    /// Whether reading can go on with the next record
    pub fn is_recoverable(&self) -> bool {
        matches!(self, SourceError::Malformed { .. })
    }

    /// Source line the error refers to, when known
    pub fn line(&self) -> Option<u64> {
        match self {
            SourceError::Malformed { line, .. } => Some(*line),
            _ => None,
        }
    }
}

/// Fixed CSV dialect of the member exports
///
/// The reader always tolerates stray quotes inside unquoted fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvDialect {
    pub delimiter: u8,
    pub quote: u8,
    /// Escape byte inside quoted fields; equal to `quote` means `""`
    pub escape: u8,
    /// Trim leading and trailing whitespace of every field and header
    pub trim: bool,
    /// Drop lines without any content; a line of bare delimiters is still a record
    pub skip_empty_lines: bool,
    /// Accept records with a different field count than the header
    pub flexible: bool,
}

impl Default for CsvDialect {
    fn default() -> Self {
        Self {
            delimiter: b';',
            quote: b'"',
            escape: b'"',
            trim: true,
            skip_empty_lines: true,
            flexible: true,
        }
    }
}

impl CsvDialect {
    fn reader_builder(&self) -> AsyncReaderBuilder {
        let mut builder = AsyncReaderBuilder::new();
        builder
            .has_headers(true)
            .delimiter(self.delimiter)
            .quote(self.quote)
            .flexible(self.flexible)
            .trim(if self.trim { Trim::All } else { Trim::None });

        if self.escape == self.quote {
            builder.double_quote(true).escape(None);
        } else {
            builder.double_quote(false).escape(Some(self.escape));
        }

        builder
    }
}

/// One input record keyed by header name
#[derive(Debug, Clone)]
pub struct RawRow {
    line: u64,
    headers: Arc<[String]>,
    values: Vec<String>,
}

impl RawRow {
    pub fn new(line: u64, headers: Arc<[String]>, values: Vec<String>) -> Self {
        Self {
            line,
            headers,
            values,
        }
    }

    /// Build a row from `(column, value)` pairs
    pub fn from_pairs(line: u64, pairs: &[(&str, &str)]) -> Self {
        let headers: Arc<[String]> = pairs.iter().map(|(k, _)| k.to_string()).collect();
        let values = pairs.iter().map(|(_, v)| v.to_string()).collect();
        Self::new(line, headers, values)
    }

    /// Value of `column`, or `None` when the header lacks it or the record is short
    pub fn get(&self, column: &str) -> Option<&str> {
        let idx = self.headers.iter().position(|h| h == column)?;
        self.values.get(idx).map(String::as_str)
    }

    /// 1-based line in the source file where this record starts
    pub fn line(&self) -> u64 {
        self.line
    }

    /// A line with no content at all, e.g. whitespace trimmed to nothing
    fn is_blank(&self) -> bool {
        match self.values.as_slice() {
            [] => true,
            [only] => only.trim().is_empty(),
            _ => false,
        }
    }
}

/// Lazy, single-pass reader of [`RawRow`]s
pub struct MemberSource<R> {
    reader: AsyncReader<Chain<Cursor<Vec<u8>>, R>>,
    headers: Arc<[String]>,
    record: ByteRecord,
    skip_empty_lines: bool,
}

impl MemberSource<tokio::fs::File> {
    /// Open a file on disk
    pub async fn open(path: impl AsRef<Path>, dialect: &CsvDialect) -> Result<Self, SourceError> {
        let file = tokio::fs::File::open(path.as_ref()).await?;
        Self::new(file, dialect).await
    }
}

impl<R> MemberSource<R>
where
    R: AsyncRead + Unpin + Send,
{
    /// Wrap a byte stream, strip a leading BOM and read the header row
    pub async fn new(mut inner: R, dialect: &CsvDialect) -> Result<Self, SourceError> {
        // Short reads are allowed, so keep going until the BOM length or EOF
        let mut head = [0u8; 3];
        let mut filled = 0;
        while filled < head.len() {
            let n = inner.read(&mut head[filled..]).await?;
            if n == 0 {
                break;
            }
            filled += n;
        }

        let prefix = if head[..filled] == *UTF8_BOM {
            debug!("Stripping UTF-8 byte-order mark");
            Vec::new()
        } else {
            head[..filled].to_vec()
        };

        let stream = Cursor::new(prefix).chain(inner);
        let mut reader = dialect.reader_builder().create_reader(stream);

        let headers: Arc<[String]> = reader
            .byte_headers()
            .await
            .map_err(|e| match e.into_kind() {
                ErrorKind::Io(io) => SourceError::Io(io),
                other => SourceError::Header(format!("{:?}", other)),
            })?
            .iter()
            .map(|h| String::from_utf8_lossy(h).into_owned())
            .collect();

        debug!(columns = headers.len(), "Read CSV header");

        Ok(Self {
            reader,
            headers,
            record: ByteRecord::new(),
            skip_empty_lines: dialect.skip_empty_lines,
        })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Pull the next record
    ///
    /// Returns `Ok(None)` once the input is exhausted. A
    /// [`SourceError::Malformed`] only concerns the current record; calling
    /// again continues with the next one.
    pub async fn next_row(&mut self) -> Result<Option<RawRow>, SourceError> {
        loop {
            let has_record = match self.reader.read_byte_record(&mut self.record).await {
                Ok(has_record) => has_record,
                Err(e) => {
                    let line = e.position().map(|p| p.line()).unwrap_or(0);
                    return Err(match e.into_kind() {
                        ErrorKind::Io(io) => SourceError::Io(io),
                        other => SourceError::Malformed {
                            line,
                            reason: format!("{:?}", other),
                        },
                    });
                },
            };

            if !has_record {
                return Ok(None);
            }

            let line = self.record.position().map(|p| p.line()).unwrap_or(0);
            let values = self
                .record
                .iter()
                .map(|field| String::from_utf8_lossy(field).into_owned())
                .collect();
            let row = RawRow::new(line, Arc::clone(&self.headers), values);

            if self.skip_empty_lines && row.is_blank() {
                continue;
            }

            return Ok(Some(row));
        }
    }
}
