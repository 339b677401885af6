//! Error types for the paybatch exchange engine.
//!
//! This module defines the error hierarchy used across the crate:
//!
//! - [`ParseError`] - tabular source could not be read to the end
//! - [`LineItemError`] - a `label:amount` list could not be decoded
//! - [`TranslateError`] - location code/id lookups and directory consistency
//! - [`RowValidationError`] - one field of one row failed validation
//! - [`ClientError`] - the remote read/write API failed
//! - [`ChunkSubmissionError`] - one chunk could not be written
//! - [`UploadError`] - orchestration errors
//! - [`ExportError`] - CSV serialization or file output failed
//! - [`ConfigError`] - environment configuration is invalid
//! - [`PipelineError`] - top-level wrapper returned by [`crate::pipeline`]
//!
//! Conversions are `#[from]` so `?` works across layers.

use serde::Serialize;
use thiserror::Error;

use crate::upload::session::UploadStatus;

// =============================================================================
// Parsing
// =============================================================================

/// The source could not be parsed to the end.
///
/// Batches emitted before the failure stay valid; `rows_parsed` says how many.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
#[error("{reason} (after {rows_parsed} rows)")]
pub struct ParseError {
    pub rows_parsed: usize,
    /// Source line where parsing stopped, when known.
    pub line: Option<u64>,
    pub reason: String,
}

impl ParseError {
    pub fn new(rows_parsed: usize, reason: impl Into<String>) -> Self {
        Self {
            rows_parsed,
            line: None,
            reason: reason.into(),
        }
    }

    pub fn at_line(mut self, line: u64) -> Self {
        self.line = Some(line);
        self
    }
}

// =============================================================================
// Line items
// =============================================================================

/// Errors while decoding a `label:amount;amount` list.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LineItemError {
    #[error("token '{0}' contains more than one ':'")]
    AmbiguousSeparator(String),

    #[error("token '{0}' has an empty name")]
    EmptyName(String),

    #[error("'{0}' is not a decimal amount")]
    InvalidAmount(String),

    #[error("amount '{0}' is negative")]
    NegativeAmount(String),

    #[error("name '{0}' cannot be written as a line item")]
    UnencodableName(String),
}

// =============================================================================
// Translation
// =============================================================================

/// Location directory lookup errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TranslateError {
    #[error("Unknown location code '{0}'")]
    UnknownLocationCode(String),

    #[error("Unknown location id '{0}'")]
    UnknownLocationId(String),

    #[error("Location code '{code}' is used by both '{first}' and '{second}'")]
    DuplicateCode {
        code: String,
        first: String,
        second: String,
    },

    #[error("Location id '{0}' is listed more than once")]
    DuplicateId(String),
}

// =============================================================================
// Row validation
// =============================================================================

/// Why a field was rejected.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RowErrorKind {
    #[error("required value is missing")]
    Missing,

    #[error("'{value}' is not one of {}", .expected.join(", "))]
    BadEnum {
        value: String,
        expected: Vec<&'static str>,
    },

    #[error("'{value}' is not a valid number")]
    BadNumber { value: String },

    #[error("'{value}' must be TRUE or FALSE")]
    BadBoolean { value: String },

    #[error("'{value}' is not a date (expected YYYY-MM-DD)")]
    BadDate { value: String },

    #[error("line items: {message}")]
    BadLineItems { message: String },

    #[error("unknown location code '{code}'")]
    UnknownLocation { code: String },

    #[error("{message}")]
    Inconsistent { message: String },

    #[error("{message}")]
    Invalid { message: String },
}

/// A single field-level failure, attached to its row.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
#[error("Row {row}, column '{column}': {kind}")]
pub struct RowValidationError {
    /// Spreadsheet row number (the header is row 1).
    pub row: usize,
    pub column: String,
    pub kind: RowErrorKind,
}

impl RowValidationError {
    pub fn new(row: usize, column: impl Into<String>, kind: RowErrorKind) -> Self {
        Self {
            row,
            column: column.into(),
            kind,
        }
    }
}

// =============================================================================
// Remote API
// =============================================================================

/// Errors from the remote read/write/directory API.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Transport(String),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid JSON response: {0}")]
    Decode(String),
}

impl ClientError {
    /// Transport failures, rate limiting and server errors may succeed later.
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Transport(_) => true,
            ClientError::Status { status, .. } => *status == 429 || *status >= 500,
            ClientError::Decode(_) => false,
        }
    }
}

// =============================================================================
// Upload orchestration
// =============================================================================

/// A chunk write failed; earlier chunks are already committed remotely.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error(
    "Chunk {chunk} of {chunk_count} failed after {attempts} attempt(s): {source}. \
     {succeeded} of {attempted} records were submitted"
)]
pub struct ChunkSubmissionError {
    /// 1-based index of the failing chunk.
    pub chunk: usize,
    pub chunk_count: usize,
    pub attempts: u32,
    pub succeeded: usize,
    pub attempted: usize,
    #[source]
    pub source: ClientError,
}

/// Errors raised while driving an upload session.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UploadError {
    #[error(transparent)]
    Chunk(#[from] ChunkSubmissionError),

    #[error("Chunk size must be at least 1")]
    InvalidChunkSize,

    #[error("No records to upload")]
    EmptyRecordSet,

    #[error("Cannot apply '{event}' to a session in state {from}")]
    InvalidTransition {
        from: UploadStatus,
        event: &'static str,
    },
}

// =============================================================================
// Export
// =============================================================================

/// Errors while serializing rows or writing the export file.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("CSV write error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Export IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Export produced invalid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("Line items cannot be exported: {0}")]
    LineItem(#[from] LineItemError),
}

// =============================================================================
// Configuration
// =============================================================================

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing {0} environment variable")]
    Missing(&'static str),

    #[error("Invalid value '{value}' for {key}: {message}")]
    Invalid {
        key: &'static str,
        value: String,
        message: String,
    },
}

// =============================================================================
// Pipeline (top-level)
// =============================================================================

/// Top-level error returned by the [`crate::pipeline`] entry points.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Location directory error: {0}")]
    Translate(#[from] TranslateError),

    #[error("API error: {0}")]
    Client(#[from] ClientError),

    #[error("Upload error: {0}")]
    Upload(#[from] UploadError),

    #[error("Export error: {0}")]
    Export(#[from] ExportError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("No valid records: 0 of {attempted} rows passed validation")]
    NoValidRecords { attempted: usize },
}

/// HTTP layer errors.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

pub type ParseResult<T> = Result<T, ParseError>;
pub type PipelineResult<T> = Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion_chain() {
        let parse_err = ParseError::new(12, "unterminated quote");
        let pipeline_err: PipelineError = parse_err.into();
        let msg = pipeline_err.to_string();
        assert!(msg.contains("unterminated quote"));
        assert!(msg.contains("after 12 rows"));

        let translate_err = TranslateError::UnknownLocationCode("LDN".into());
        let pipeline_err: PipelineError = translate_err.into();
        assert!(pipeline_err.to_string().contains("LDN"));
    }

    #[test]
    fn test_row_error_format() {
        let err = RowValidationError::new(
            5,
            "niDayMode",
            RowErrorKind::BadEnum {
                value: "all".into(),
                expected: vec!["NONE", "ALL", "FIXED"],
            },
        );
        let msg = err.to_string();
        assert!(msg.contains("Row 5"));
        assert!(msg.contains("column 'niDayMode'"));
        assert!(msg.contains("'all' is not one of NONE, ALL, FIXED"));
    }

    #[test]
    fn test_chunk_error_states_counts() {
        let err = ChunkSubmissionError {
            chunk: 2,
            chunk_count: 3,
            attempts: 1,
            succeeded: 50,
            attempted: 127,
            source: ClientError::Status {
                status: 400,
                body: "duplicate email".into(),
            },
        };
        let msg = err.to_string();
        assert!(msg.contains("Chunk 2 of 3"));
        assert!(msg.contains("50 of 127 records"));
    }

    #[test]
    fn test_retryable_statuses() {
        assert!(ClientError::Transport("reset".into()).is_retryable());
        assert!(ClientError::Status { status: 503, body: String::new() }.is_retryable());
        assert!(ClientError::Status { status: 429, body: String::new() }.is_retryable());
        assert!(!ClientError::Status { status: 422, body: String::new() }.is_retryable());
        assert!(!ClientError::Decode("eof".into()).is_retryable());
    }
}
