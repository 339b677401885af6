//! Incremental CSV parser with encoding and delimiter auto-detection.
//!
//! Produces [`FlatRow`] batches bounded by a batch size. The batch sequence
//! consumes its reader and is not restartable. [`spawn_parse`] runs the same
//! parse on a blocking worker and delivers batches through a channel so the
//! caller can report progress while a large file is read.

use csv::{ReaderBuilder, StringRecord, Trim};
use std::io::{self, Read};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::config::DEFAULT_PARSE_BATCH_SIZE;
use crate::error::ParseError;
use crate::models::FlatRow;

/// A bounded group of parsed rows.
#[derive(Debug, Clone)]
pub struct RowBatch {
    pub rows: Vec<FlatRow>,
    /// Rows parsed so far, this batch included.
    pub rows_parsed: usize,
}

/// Fully collected source with metadata.
#[derive(Debug, Clone)]
pub struct ParsedSource {
    pub headers: Vec<String>,
    pub rows: Vec<FlatRow>,
    pub encoding: String,
    pub delimiter: char,
}

/// Options for a parse run.
#[derive(Debug, Clone)]
pub struct ParserOptions {
    /// Explicit delimiter; auto-detected from the first line when `None`.
    pub delimiter: Option<char>,
    pub batch_size: usize,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            delimiter: None,
            batch_size: DEFAULT_PARSE_BATCH_SIZE,
        }
    }
}

/// Events delivered by [`spawn_parse`].
#[derive(Debug, Clone)]
pub enum ParseEvent {
    /// Sent once, before the first batch.
    Started {
        encoding: String,
        delimiter: char,
        headers: Vec<String>,
    },
    Batch(RowBatch),
    Finished { rows_parsed: usize },
    Failed(ParseError),
}

/// Detect the encoding of raw bytes using chardet
pub fn detect_encoding(bytes: &[u8]) -> String {
    let result = chardet::detect(bytes);
    let charset = result.0;

    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" | "" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        other => other.to_string(),
    }
}

/// Decode bytes with the named encoding.
///
/// Bytes that are not valid in that encoding fail the decode.
pub fn decode_content(bytes: &[u8], encoding: &str) -> Result<String, ParseError> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);

    match encoding.to_lowercase().as_str() {
        "utf-8" | "utf8" | "ascii" => String::from_utf8(bytes.to_vec())
            .map_err(|e| ParseError::new(0, format!("Content is not valid UTF-8: {}", e))),
        "iso-8859-1" | "latin-1" | "latin1" => {
            Ok(encoding_rs::ISO_8859_15.decode(bytes).0.into_owned())
        }
        "windows-1252" | "cp1252" => Ok(encoding_rs::WINDOWS_1252.decode(bytes).0.into_owned()),
        label => {
            let enc = encoding_rs::Encoding::for_label(label.as_bytes())
                .ok_or_else(|| ParseError::new(0, format!("Unsupported encoding '{}'", label)))?;
            let (decoded, _, had_errors) = enc.decode(bytes);
            if had_errors {
                return Err(ParseError::new(
                    0,
                    format!("Content is not valid {}", enc.name()),
                ));
            }
            Ok(decoded.into_owned())
        }
    }
}

/// Detect the delimiter by counting occurrences in the first non-empty line
pub fn detect_delimiter(content: &str) -> char {
    let first_line = content
        .lines()
        .find(|l| !l.trim().is_empty())
        .unwrap_or("");

    let separators = [',', ';', '\t', '|'];
    let mut best_sep = ',';
    let mut best_count = 0;

    for &sep in &separators {
        let count = first_line.matches(sep).count();
        if count > best_count {
            best_count = count;
            best_sep = sep;
        }
    }

    best_sep
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QuoteState {
    RecordStart,
    FieldStart,
    Unquoted,
    Quoted,
    QuoteInQuoted,
}

/// Reader adapter that follows the CSV quoting rules on the bytes it passes
/// through, so a quoted field still open at end of input can be reported.
/// The csv reader itself ends such a field silently at EOF.
struct QuoteScan<R> {
    inner: R,
    delimiter: u8,
    state: QuoteState,
    line: u64,
    record_line: u64,
    /// Start line of the record left open at end of input.
    unterminated: Option<u64>,
}

impl<R: Read> QuoteScan<R> {
    fn new(inner: R, delimiter: u8) -> Self {
        Self {
            inner,
            delimiter,
            state: QuoteState::RecordStart,
            line: 1,
            record_line: 1,
            unterminated: None,
        }
    }

    fn scan(&mut self, bytes: &[u8]) {
        for &b in bytes {
            let terminator = b == b'\n' || b == b'\r';
            if self.state == QuoteState::RecordStart && !terminator {
                self.record_line = self.line;
            }
            // A quote only opens a field as its first byte.
            self.state = match (self.state, b) {
                (QuoteState::Quoted, b'"') => QuoteState::QuoteInQuoted,
                (QuoteState::Quoted, _) => QuoteState::Quoted,
                (QuoteState::QuoteInQuoted, b'"') => QuoteState::Quoted,
                _ if terminator => QuoteState::RecordStart,
                _ if b == self.delimiter => QuoteState::FieldStart,
                (QuoteState::RecordStart | QuoteState::FieldStart, b'"') => QuoteState::Quoted,
                _ => QuoteState::Unquoted,
            };
            if b == b'\n' {
                self.line += 1;
            }
        }
    }
}

impl<R: Read> Read for QuoteScan<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        if n == 0 {
            if self.state == QuoteState::Quoted {
                self.unterminated = Some(self.record_line);
            }
        } else {
            self.scan(&buf[..n]);
        }
        Ok(n)
    }
}

/// Lazy sequence of row batches over a reader.
///
/// The first non-empty record is the header. Empty and whitespace-only lines
/// are skipped; a line holding only delimiters is a row of empty values.
/// Malformed quoting fails the parse after the rows before it have been
/// delivered. After the last batch or the first error, the iterator yields
/// `None` forever.
pub struct RowBatches<R: Read> {
    reader: csv::Reader<QuoteScan<R>>,
    headers: Option<Arc<[String]>>,
    batch_size: usize,
    rows_parsed: usize,
    /// Record read ahead while checking for an open quote at end of input.
    pending: Option<StringRecord>,
    /// Error held back until the rows read before it have been delivered.
    failed: Option<ParseError>,
    done: bool,
}

impl<R: Read> RowBatches<R> {
    /// Fails when `delimiter` is not a single ASCII character.
    pub fn new(reader: R, delimiter: char, batch_size: usize) -> Result<Self, ParseError> {
        if !delimiter.is_ascii() {
            return Err(ParseError::new(
                0,
                format!("Delimiter '{}' is not an ASCII character", delimiter),
            ));
        }
        let delimiter = delimiter as u8;
        let reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(Trim::All)
            .delimiter(delimiter)
            .from_reader(QuoteScan::new(reader, delimiter));

        Ok(Self {
            reader,
            headers: None,
            batch_size: batch_size.max(1),
            rows_parsed: 0,
            pending: None,
            failed: None,
            done: false,
        })
    }

    /// Column headers, once the header line has been read.
    pub fn headers(&self) -> Option<&[String]> {
        self.headers.as_deref()
    }

    pub fn rows_parsed(&self) -> usize {
        self.rows_parsed
    }

    /// Read the header line if it has not been read yet.
    pub fn read_headers(&mut self) -> Result<&[String], ParseError> {
        if self.headers.is_none() {
            let record = match self.next_record()? {
                Some(record) => record,
                None => {
                    self.done = true;
                    return Err(ParseError::new(0, "Empty CSV file").at_line(1));
                }
            };
            let headers: Vec<String> = record.iter().map(str::to_string).collect();
            self.headers = Some(headers.into());
        }
        Ok(self.headers.as_deref().unwrap_or(&[]))
    }

    /// Next non-blank record, or `None` at end of input.
    fn next_record(&mut self) -> Result<Option<StringRecord>, ParseError> {
        loop {
            let record = match self.pending.take() {
                Some(record) => record,
                None => match self.read_record()? {
                    Some(record) => record,
                    None => return Ok(None),
                },
            };
            // Once input is exhausted inside a quote, the open field belongs
            // to the last record.
            let unterminated = self.reader.get_ref().unterminated;
            if let Some(line) = unterminated {
                match self.read_record()? {
                    Some(next) => self.pending = Some(next),
                    None => {
                        return Err(ParseError::new(
                            self.rows_parsed,
                            "Invalid CSV: unterminated quoted field",
                        )
                        .at_line(line))
                    }
                }
            }
            if !is_blank(&record) {
                return Ok(Some(record));
            }
        }
    }

    fn read_record(&mut self) -> Result<Option<StringRecord>, ParseError> {
        let mut record = StringRecord::new();
        match self.reader.read_record(&mut record) {
            Ok(true) => Ok(Some(record)),
            Ok(false) => Ok(None),
            Err(e) => {
                let err = ParseError::new(self.rows_parsed, format!("Invalid CSV: {}", e));
                Err(match e.position() {
                    Some(pos) => err.at_line(pos.line()),
                    None => err,
                })
            }
        }
    }

    fn next_batch(&mut self) -> Result<Option<RowBatch>, ParseError> {
        self.read_headers()?;
        let columns = match &self.headers {
            Some(h) => Arc::clone(h),
            None => return Ok(None),
        };

        let mut rows = Vec::with_capacity(self.batch_size);

        while rows.len() < self.batch_size {
            let record = match self.next_record() {
                Ok(Some(record)) => record,
                Ok(None) => {
                    self.done = true;
                    break;
                }
                Err(e) if rows.is_empty() => return Err(e),
                Err(e) => {
                    self.failed = Some(e);
                    break;
                }
            };
            let line = record.position().map(|p| p.line()).unwrap_or(0);
            let values: Vec<String> = record
                .iter()
                .take(columns.len())
                .map(str::to_string)
                .collect();
            rows.push(FlatRow::new(Arc::clone(&columns), values).with_line(line));
            self.rows_parsed += 1;
        }

        if rows.is_empty() {
            return Ok(None);
        }

        Ok(Some(RowBatch {
            rows,
            rows_parsed: self.rows_parsed,
        }))
    }
}

impl<R: Read> Iterator for RowBatches<R> {
    type Item = Result<RowBatch, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(e) = self.failed.take() {
            self.done = true;
            return Some(Err(e));
        }
        if self.done {
            return None;
        }
        match self.next_batch() {
            Ok(Some(batch)) => Some(Ok(batch)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// An empty or whitespace-only line; delimiters make a row.
fn is_blank(record: &StringRecord) -> bool {
    record.len() <= 1 && record.iter().all(str::is_empty)
}

/// Parse CSV text with an explicit delimiter into batches.
///
/// # Example
/// ```ignore
/// use paybatch::parser::row_batches;
///
/// let mut batches = row_batches("name,age\nAlice,30\nBob,25", ',', 1)?;
/// assert_eq!(batches.next().unwrap()?.rows.len(), 1);
/// ```
pub fn row_batches(
    content: &str,
    delimiter: char,
    batch_size: usize,
) -> Result<RowBatches<&[u8]>, ParseError> {
    RowBatches::new(content.as_bytes(), delimiter, batch_size)
}

/// Parse CSV text fully, with an explicit delimiter.
pub fn parse_str(content: &str, delimiter: char) -> Result<ParsedSource, ParseError> {
    let mut batches = row_batches(content, delimiter, DEFAULT_PARSE_BATCH_SIZE)?;
    let headers = batches.read_headers()?.to_vec();

    let mut rows = Vec::new();
    for batch in batches {
        rows.extend(batch?.rows);
    }

    Ok(ParsedSource {
        headers,
        rows,
        encoding: "utf-8".to_string(),
        delimiter,
    })
}

/// Parse CSV bytes with auto-detection of encoding and delimiter.
pub fn parse_bytes_auto(bytes: &[u8]) -> Result<ParsedSource, ParseError> {
    let encoding = detect_encoding(bytes);
    let content = decode_content(bytes, &encoding)?;
    let delimiter = detect_delimiter(&content);

    let mut parsed = parse_str(&content, delimiter)?;
    parsed.encoding = encoding;
    Ok(parsed)
}

/// Parse a CSV file with auto-detection of encoding and delimiter.
pub fn parse_file_auto<P: AsRef<Path>>(path: P) -> Result<ParsedSource, ParseError> {
    let bytes = std::fs::read(path.as_ref()).map_err(|e| {
        ParseError::new(
            0,
            format!("Cannot read file '{}': {}", path.as_ref().display(), e),
        )
    })?;
    parse_bytes_auto(&bytes)
}

/// Parse `bytes` on a blocking worker, streaming events back.
///
/// The channel is bounded, so a slow consumer throttles the parser. Dropping
/// the receiver stops the parse. Exactly one terminal event (`Finished` or
/// `Failed`) ends the stream. Must be called within a tokio runtime.
pub fn spawn_parse(bytes: Vec<u8>, options: ParserOptions) -> mpsc::Receiver<ParseEvent> {
    let (tx, rx) = mpsc::channel(4);

    tokio::task::spawn_blocking(move || {
        let encoding = detect_encoding(&bytes);
        let content = match decode_content(&bytes, &encoding) {
            Ok(c) => c,
            Err(e) => {
                let _ = tx.blocking_send(ParseEvent::Failed(e));
                return;
            }
        };
        drop(bytes);

        let delimiter = options
            .delimiter
            .unwrap_or_else(|| detect_delimiter(&content));
        let mut batches = match row_batches(&content, delimiter, options.batch_size) {
            Ok(batches) => batches,
            Err(e) => {
                let _ = tx.blocking_send(ParseEvent::Failed(e));
                return;
            }
        };

        let headers = match batches.read_headers() {
            Ok(h) => h.to_vec(),
            Err(e) => {
                let _ = tx.blocking_send(ParseEvent::Failed(e));
                return;
            }
        };

        let started = ParseEvent::Started {
            encoding,
            delimiter,
            headers,
        };
        if tx.blocking_send(started).is_err() {
            return;
        }

        let mut rows_parsed = 0;
        for batch in &mut batches {
            let event = match batch {
                Ok(batch) => {
                    rows_parsed = batch.rows_parsed;
                    ParseEvent::Batch(batch)
                }
                Err(e) => ParseEvent::Failed(e),
            };
            let failed = matches!(event, ParseEvent::Failed(_));
            if tx.blocking_send(event).is_err() || failed {
                return;
            }
        }

        let _ = tx.blocking_send(ParseEvent::Finished { rows_parsed });
    });

    rx
}
