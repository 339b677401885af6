//! # Paybatch - batch CSV exchange for employee, NIC/Tax and timesheet records
//!
//! Paybatch turns flat, human-edited CSV files into nested, validated domain
//! records, submits them to a remote write API in bounded chunks, and exports
//! stored records back to CSV.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────┐   ┌──────────┐   ┌──────────────┐   ┌───────────┐
//! │ CSV file │──▶│  Parser  │──▶│  Mapper  │──▶│ Orchestrator │──▶│ Write API │
//! │(any enc.)│   │(batches) │   │(codes→id)│   │   (chunks)   │   │  (bulk)   │
//! └──────────┘   └──────────┘   └──────────┘   └──────────────┘   └───────────┘
//!                                    ▲
//! ┌──────────┐   ┌──────────┐        │ inverse
//! │ CSV file │◀──│  Export  │◀───────┘
//! └──────────┘   └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use paybatch::{import_file, ImportOptions, LocationCodeMap, RecordKind};
//!
//! #[tokio::main]
//! async fn main() {
//!     let locations = LocationCodeMap::from_pairs([("loc-1", "LDN")]).unwrap();
//!     let options = ImportOptions::new(RecordKind::Employee);
//!     let report = import_file("staff.csv", &options, &locations).await.unwrap();
//!     println!("{}", report.summary());
//! }
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`config`] - Environment configuration and defaults
//! - [`models`] - Domain models (FlatRow, EmployeeRecord, NicTaxEntry, TimesheetEntry)
//! - [`parser`] - Incremental CSV parsing with auto-detection
//! - [`codec`] - `label:amount` line-item lists
//! - [`translate`] - Location code ↔ id translation
//! - [`mapper`] - Row ↔ record mapping per kind
//! - [`upload`] - Chunked submission sessions
//! - [`export`] - Records → CSV
//! - [`client`] - Remote API client
//! - [`pipeline`] - High-level entry points
//! - [`api`] - HTTP API server

// Core modules
pub mod config;
pub mod error;
pub mod models;

// Parsing and mapping
pub mod codec;
pub mod mapper;
pub mod parser;
pub mod translate;

// Submission and export
pub mod client;
pub mod export;
pub mod upload;

// Pipeline
pub mod pipeline;

// HTTP API
pub mod api;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    ChunkSubmissionError, ClientError, ConfigError, ExportError, LineItemError, ParseError,
    PipelineError, RowErrorKind, RowValidationError, ServerError, TranslateError, UploadError,
};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{
    DomainRecord, EmployeeRecord, FlatRow, LineItem, Location, NicTaxEntry, NicTaxPeriod,
    PayStructure, RecordKind, TimesheetEntry, TimesheetPeriod, WriteMode,
};

// =============================================================================
// Re-exports - Parsing, codec, translation, mapping
// =============================================================================

pub use parser::{
    detect_delimiter, detect_encoding, decode_content, parse_bytes_auto, parse_file_auto,
    parse_str, row_batches, spawn_parse, ParseEvent, ParsedSource, ParserOptions, RowBatch,
};

pub use translate::LocationCodeMap;

pub use mapper::{import_rows, MapOutcome, RowWarning};

// =============================================================================
// Re-exports - Upload, export, client
// =============================================================================

pub use upload::{
    plan_chunks, Chunk, Orchestrator, RecordWriter, RetryPolicy, UploadProgress, UploadReport,
    UploadSession, UploadStatus,
};

pub use export::{export_file_name, export_records, to_csv, write_export, ExportedRows};

pub use client::ApiClient;

pub use config::Config;

// =============================================================================
// Re-exports - Pipeline
// =============================================================================

pub use pipeline::{
    import_bytes, import_file, submit, upload_bytes, ImportOptions, ImportReport,
};

// Server
pub mod server {
    pub use crate::api::server::{start_server, AppState};
}
