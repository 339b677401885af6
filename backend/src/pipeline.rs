//! High-level entry points combining parser, mapper, orchestrator and export.
//!
//! # Example
//!
//! ```rust,ignore
//! use paybatch::pipeline::{import_file, submit, ImportOptions};
//! use paybatch::{ApiClient, Config, Orchestrator, RecordKind};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let client = ApiClient::from_config(&config)?;
//!     let locations = paybatch::pipeline::load_locations(&client).await?;
//!
//!     let options = ImportOptions::new(RecordKind::Employee);
//!     let report = import_file("staff.csv", &options, &locations).await?;
//!
//!     let orchestrator = Orchestrator::new(client).with_retry(config.retry_policy());
//!     let chunk_size = config.chunk_size_for(options.kind, options.mode);
//!     let upload = submit(&orchestrator, report, chunk_size).await?;
//!     println!("{} of {} submitted", upload.succeeded, upload.total);
//!     Ok(())
//! }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

use crate::api::logs::{log_info, log_info_indent, log_success, log_warning};
use crate::client::ApiClient;
use crate::config::DEFAULT_PARSE_BATCH_SIZE;
use crate::error::{PipelineError, PipelineResult, RowValidationError};
use crate::export::{export_records, ExportedRows};
use crate::mapper::{self, RowWarning};
use crate::models::{DomainRecord, FlatRow, Location, RecordKind, WriteMode};
use crate::parser::{spawn_parse, ParseEvent, ParserOptions};
use crate::translate::LocationCodeMap;
use crate::upload::{Orchestrator, RecordWriter, UploadReport, UploadSession};

/// Options for importing one source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportOptions {
    pub kind: RecordKind,
    #[serde(default)]
    pub mode: WriteMode,
    /// Auto-detected when not set.
    #[serde(default)]
    pub delimiter: Option<char>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

fn default_batch_size() -> usize {
    DEFAULT_PARSE_BATCH_SIZE
}

impl ImportOptions {
    pub fn new(kind: RecordKind) -> Self {
        Self {
            kind,
            mode: WriteMode::default(),
            delimiter: None,
            batch_size: DEFAULT_PARSE_BATCH_SIZE,
        }
    }

    pub fn with_mode(mut self, mode: WriteMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_delimiter(mut self, delimiter: Option<char>) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }
}

/// Pre-submission summary of an import.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    pub kind: RecordKind,
    pub mode: WriteMode,
    pub encoding: String,
    pub delimiter: String,
    pub headers: Vec<String>,
    pub rows_parsed: usize,
    pub valid: usize,
    pub invalid: usize,
    pub errors: Vec<RowValidationError>,
    pub warnings: Vec<RowWarning>,
    pub records: Vec<DomainRecord>,
}

impl ImportReport {
    /// One-line summary for logs and CLI output.
    pub fn summary(&self) -> String {
        format!(
            "{} rows parsed: {} valid, {} invalid, {} warning(s)",
            self.rows_parsed,
            self.valid,
            self.invalid,
            self.warnings.len()
        )
    }
}

/// Parse `bytes` incrementally, then map every row.
pub async fn import_bytes(
    bytes: Vec<u8>,
    options: &ImportOptions,
    locations: &LocationCodeMap,
) -> PipelineResult<ImportReport> {
    let parser_options = ParserOptions {
        delimiter: options.delimiter,
        batch_size: options.batch_size,
    };
    let mut events = spawn_parse(bytes, parser_options);

    let mut encoding = String::new();
    let mut delimiter = ',';
    let mut headers = Vec::new();
    let mut rows: Vec<FlatRow> = Vec::new();
    let mut rows_parsed = 0;

    while let Some(event) = events.recv().await {
        match event {
            ParseEvent::Started {
                encoding: enc,
                delimiter: delim,
                headers: cols,
            } => {
                log_info(format!(
                    "Parsing {} CSV ({}, delimiter {:?}, {} columns)",
                    options.kind,
                    enc,
                    delim,
                    cols.len()
                ));
                encoding = enc;
                delimiter = delim;
                headers = cols;
            }
            ParseEvent::Batch(batch) => {
                log_info_indent(format!("{} rows read", batch.rows_parsed), 1);
                rows.extend(batch.rows);
            }
            ParseEvent::Finished { rows_parsed: n } => {
                rows_parsed = n;
                break;
            }
            ParseEvent::Failed(e) => return Err(e.into()),
        }
    }

    Ok(map_rows(
        options,
        encoding,
        delimiter,
        headers,
        rows,
        rows_parsed,
        locations,
    ))
}

/// Read a file and import it.
pub async fn import_file<P: AsRef<Path>>(
    path: P,
    options: &ImportOptions,
    locations: &LocationCodeMap,
) -> PipelineResult<ImportReport> {
    let bytes = tokio::fs::read(path.as_ref()).await?;
    import_bytes(bytes, options, locations).await
}

fn map_rows(
    options: &ImportOptions,
    encoding: String,
    delimiter: char,
    headers: Vec<String>,
    rows: Vec<FlatRow>,
    rows_parsed: usize,
    locations: &LocationCodeMap,
) -> ImportReport {
    let outcome = mapper::import_rows(options.kind, options.mode, &rows, locations);

    let report = ImportReport {
        kind: options.kind,
        mode: options.mode,
        encoding,
        delimiter: delimiter.to_string(),
        headers,
        rows_parsed,
        valid: outcome.records.len(),
        invalid: outcome.rejected_rows.len(),
        errors: outcome.errors,
        warnings: outcome.warnings,
        records: outcome.records,
    };

    if report.invalid == 0 {
        log_success(report.summary());
    } else {
        log_warning(report.summary());
    }
    report
}

/// Submit the valid records of `report` in chunks of `chunk_size`.
///
/// An import with no valid record is rejected before any request is sent.
pub async fn submit<W: RecordWriter>(
    orchestrator: &Orchestrator<W>,
    report: ImportReport,
    chunk_size: usize,
) -> PipelineResult<UploadReport> {
    if report.records.is_empty() {
        return Err(PipelineError::NoValidRecords {
            attempted: report.rows_parsed,
        });
    }
    let mut session =
        UploadSession::with_records(report.kind, report.mode, chunk_size, report.records)?;
    Ok(orchestrator.run(&mut session).await?)
}

/// Import `bytes` and submit the result within one session.
///
/// The returned import report no longer holds the records; they were moved
/// into the session.
pub async fn upload_bytes<W: RecordWriter>(
    bytes: Vec<u8>,
    options: &ImportOptions,
    locations: &LocationCodeMap,
    orchestrator: &Orchestrator<W>,
    chunk_size: usize,
) -> PipelineResult<(ImportReport, UploadReport)> {
    let mut session = UploadSession::new(options.kind, options.mode, chunk_size)?;
    upload_into(&mut session, bytes, options, locations, orchestrator).await
}

/// Like [`upload_bytes`], driving a session created by the caller.
///
/// The session's kind and mode take precedence over those in `options`.
pub async fn upload_into<W: RecordWriter>(
    session: &mut UploadSession,
    bytes: Vec<u8>,
    options: &ImportOptions,
    locations: &LocationCodeMap,
    orchestrator: &Orchestrator<W>,
) -> PipelineResult<(ImportReport, UploadReport)> {
    let options = ImportOptions {
        kind: session.kind(),
        mode: session.mode(),
        ..options.clone()
    };
    session.begin_parsing()?;

    let mut report = import_bytes(bytes, &options, locations).await?;
    if report.records.is_empty() {
        return Err(PipelineError::NoValidRecords {
            attempted: report.rows_parsed,
        });
    }
    session.load_records(std::mem::take(&mut report.records))?;

    let upload = orchestrator.run(session).await?;
    Ok((report, upload))
}

/// Fetch the location directory and build the code map.
pub async fn load_locations(client: &ApiClient) -> PipelineResult<LocationCodeMap> {
    let locations = client.fetch_locations().await?;
    log_info(format!("Loaded {} locations", locations.len()));
    Ok(LocationCodeMap::from_locations(locations)?)
}

/// Read a directory snapshot saved as a JSON array of `{id, code, name}`.
pub fn load_locations_file<P: AsRef<Path>>(path: P) -> PipelineResult<LocationCodeMap> {
    let content = std::fs::read_to_string(path)?;
    let locations: Vec<Location> = serde_json::from_str(&content)?;
    Ok(LocationCodeMap::from_locations(locations)?)
}

/// A records file: a bare array, or an object with a `records` array.
#[derive(Deserialize)]
#[serde(untagged)]
enum RecordsDocument {
    Bare(Vec<Value>),
    Wrapped { records: Vec<Value> },
}

/// Read records of `kind` from JSON: a bare array or `{"records": [...]}`.
///
/// Any other document is a decode error.
pub fn read_records_json(kind: RecordKind, content: &str) -> PipelineResult<Vec<DomainRecord>> {
    let items = match serde_json::from_str::<RecordsDocument>(content)? {
        RecordsDocument::Bare(items) | RecordsDocument::Wrapped { records: items } => items,
    };

    items
        .into_iter()
        .map(|v| DomainRecord::from_json(kind, v).map_err(PipelineError::from))
        .collect()
}

/// Fetch records through the read API and flatten them for export.
pub async fn export_from_api(
    client: &ApiClient,
    kind: RecordKind,
    ids: &[String],
    locations: &LocationCodeMap,
    with_id: bool,
) -> PipelineResult<ExportedRows> {
    let records = client.fetch_records(kind, ids).await?;
    log_info(format!("Fetched {} {} records", records.len(), kind));
    Ok(export_records(kind, &records, locations, with_id)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ClientError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    const NIC_CSV: &str = "RecordName,StartDate,EndDate,BaseLocationId,EmployeeId,EesNIC,ErNIC,EesTax,Notes\n\
April,2024-04-01,2024-04-30,LDN,e1,10.50,12,30,\n\
,,,,e2,abc,1,2,\n\
,,,,e3,1,2,3,late\n";

    fn locations() -> LocationCodeMap {
        LocationCodeMap::from_pairs([("loc-1", "LDN")]).unwrap()
    }

    #[derive(Default)]
    struct Recording {
        sizes: Mutex<Vec<usize>>,
    }

    #[async_trait]
    impl RecordWriter for Recording {
        async fn write_chunk(
            &self,
            _kind: RecordKind,
            _mode: WriteMode,
            records: &[DomainRecord],
        ) -> Result<(), ClientError> {
            self.sizes.lock().unwrap().push(records.len());
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_import_bytes_reports_valid_and_invalid() {
        let options = ImportOptions::new(RecordKind::NicTax).with_batch_size(1);
        let report = import_bytes(NIC_CSV.as_bytes().to_vec(), &options, &locations())
            .await
            .unwrap();

        assert_eq!(report.rows_parsed, 3);
        assert_eq!(report.valid, 2);
        assert_eq!(report.invalid, 1);
        assert_eq!(report.delimiter, ",");
        assert_eq!(report.errors[0].row, 3);
        assert_eq!(report.errors[0].column, "EesNIC");
        assert_eq!(report.headers.len(), 9);
    }

    #[tokio::test]
    async fn test_report_serializes_camel_case() {
        let options = ImportOptions::new(RecordKind::NicTax);
        let report = import_bytes(NIC_CSV.as_bytes().to_vec(), &options, &locations())
            .await
            .unwrap();

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["rowsParsed"], 3);
        assert_eq!(json["kind"], "nic-tax");
        assert_eq!(json["records"][0]["employeeId"], "e1");
    }

    #[tokio::test]
    async fn test_upload_bytes_chunks_valid_records() {
        let writer = std::sync::Arc::new(Recording::default());
        let orchestrator = Orchestrator::new(writer.clone());
        let options = ImportOptions::new(RecordKind::NicTax);

        let (report, upload) = upload_bytes(
            NIC_CSV.as_bytes().to_vec(),
            &options,
            &locations(),
            &orchestrator,
            1,
        )
        .await
        .unwrap();

        assert_eq!(report.valid, 2);
        assert!(report.records.is_empty());
        assert_eq!(upload.succeeded, 2);
        assert_eq!(*writer.sizes.lock().unwrap(), vec![1, 1]);
    }

    #[tokio::test]
    async fn test_submit_rejects_empty_import() {
        let csv = "RecordName,StartDate,EndDate,BaseLocationId,EmployeeId,EesNIC,ErNIC,EesTax,Notes\n\
April,2024-04-01,2024-04-30,XXX,e1,1,2,3,\n";
        let options = ImportOptions::new(RecordKind::NicTax);
        let report = import_bytes(csv.as_bytes().to_vec(), &options, &locations())
            .await
            .unwrap();

        let orchestrator = Orchestrator::new(Recording::default());
        let err = submit(&orchestrator, report, 10).await.unwrap_err();
        assert!(matches!(err, PipelineError::NoValidRecords { attempted: 1 }));
    }

    #[tokio::test]
    async fn test_import_bytes_surfaces_parse_error() {
        let options = ImportOptions::new(RecordKind::NicTax);
        let err = import_bytes(Vec::new(), &options, &locations()).await.unwrap_err();
        assert!(matches!(err, PipelineError::Parse(_)));
    }

    #[test]
    fn test_read_records_json_shapes() {
        let bare = r#"[{"period":{"recordName":"April","startDate":"2024-04-01",
            "endDate":"2024-04-30","baseLocationId":"loc-1"},
            "employeeId":"e1","eesNic":1,"erNic":2,"eesTax":3}]"#;
        let records = read_records_json(RecordKind::NicTax, bare).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].identity(), Some("e1"));

        let wrapped = format!(r#"{{"records": {}}}"#, bare);
        assert_eq!(read_records_json(RecordKind::NicTax, &wrapped).unwrap().len(), 1);
    }

    #[test]
    fn test_read_records_json_rejects_other_documents() {
        for content in [r#"{"items": []}"#, r#"{"records": {}}"#, "42", r#""records""#] {
            let err = read_records_json(RecordKind::Timesheet, content).unwrap_err();
            assert!(matches!(err, PipelineError::Json(_)), "{}: {:?}", content, err);
        }
        assert!(read_records_json(RecordKind::Timesheet, "[]").unwrap().is_empty());
    }

    #[test]
    fn test_load_locations_file_rejects_duplicate_codes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("locations.json");
        std::fs::write(
            &path,
            r#"[{"id":"a","code":"LDN"},{"id":"b","code":"LDN"}]"#,
        )
        .unwrap();

        let err = load_locations_file(&path).unwrap_err();
        assert!(matches!(err, PipelineError::Translate(_)));
    }
}
