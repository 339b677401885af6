//! CSV → records → chunks → writer, with an in-memory writer.

use async_trait::async_trait;
use paybatch::pipeline::{submit, upload_bytes};
use paybatch::{
    import_bytes, ClientError, Config, DomainRecord, ImportOptions, LocationCodeMap, Orchestrator,
    PipelineError, RecordKind, RecordWriter, RetryPolicy, UploadError, UploadStatus, WriteMode,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn locations() -> LocationCodeMap {
    LocationCodeMap::from_pairs([("loc-1", "LDN")]).unwrap()
}

fn nic_csv(rows: usize) -> Vec<u8> {
    let mut csv = String::from("RecordName,StartDate,EndDate,BaseLocationId,EmployeeId,EesNIC,ErNIC,EesTax,Notes\n");
    for i in 0..rows {
        if i == 0 {
            csv.push_str("April,2024-04-01,2024-04-30,LDN,");
        } else {
            csv.push_str(",,,,");
        }
        csv.push_str(&format!("emp-{},10.5,12,30,\n", i));
    }
    csv.into_bytes()
}

/// Records every chunk it receives; fails the chunks listed in `fail_on`.
#[derive(Default)]
struct MemoryWriter {
    chunks: Mutex<Vec<Vec<String>>>,
    fail_on: Vec<usize>,
    status: u16,
}

impl MemoryWriter {
    fn failing(chunk: usize, status: u16) -> Self {
        Self {
            fail_on: vec![chunk],
            status,
            ..Self::default()
        }
    }

    fn sizes(&self) -> Vec<usize> {
        self.chunks.lock().unwrap().iter().map(Vec::len).collect()
    }
}

#[async_trait]
impl RecordWriter for MemoryWriter {
    async fn write_chunk(
        &self,
        _kind: RecordKind,
        _mode: WriteMode,
        records: &[DomainRecord],
    ) -> Result<(), ClientError> {
        let mut chunks = self.chunks.lock().unwrap();
        let number = chunks.len() + 1;
        chunks.push(
            records
                .iter()
                .filter_map(|r| r.identity().map(str::to_string))
                .collect(),
        );
        if self.fail_on.contains(&number) {
            return Err(ClientError::Status {
                status: self.status,
                body: "rejected".into(),
            });
        }
        Ok(())
    }
}

#[tokio::test]
async fn test_127_records_in_three_chunks() {
    let writer = Arc::new(MemoryWriter::default());
    let orchestrator = Orchestrator::new(writer.clone());
    let options = ImportOptions::new(RecordKind::NicTax);

    let (report, upload) = upload_bytes(nic_csv(127), &options, &locations(), &orchestrator, 50)
        .await
        .unwrap();

    assert_eq!(report.valid, 127);
    assert_eq!(upload.status, UploadStatus::Completed);
    assert_eq!(upload.succeeded, 127);
    assert_eq!(upload.chunk_count, 3);
    assert_eq!(writer.sizes(), vec![50, 50, 27]);

    let sent: Vec<String> = writer.chunks.lock().unwrap().concat();
    let expected: Vec<String> = (0..127).map(|i| format!("emp-{}", i)).collect();
    assert_eq!(sent, expected);
    assert_eq!(orchestrator.subscribe().borrow().percent, 100);
}

#[tokio::test]
async fn test_second_chunk_failure_stops_upload() {
    let writer = Arc::new(MemoryWriter::failing(2, 400));
    let orchestrator = Orchestrator::new(writer.clone());
    let options = ImportOptions::new(RecordKind::NicTax);

    let err = upload_bytes(nic_csv(127), &options, &locations(), &orchestrator, 50)
        .await
        .unwrap_err();

    match err {
        PipelineError::Upload(UploadError::Chunk(e)) => {
            assert_eq!(e.chunk, 2);
            assert_eq!(e.succeeded, 50);
            assert_eq!(e.attempted, 127);
            assert_eq!(e.attempts, 1);
        }
        other => panic!("unexpected error: {}", other),
    }
    assert_eq!(writer.sizes(), vec![50, 50]);

    let progress = orchestrator.subscribe().borrow().clone();
    assert_eq!(progress.status, UploadStatus::Failed);
    assert_eq!(progress.succeeded, 50);
    assert_eq!(progress.percent, 33);
}

#[tokio::test]
async fn test_server_errors_are_retried() {
    let writer = Arc::new(MemoryWriter::failing(1, 503));
    let orchestrator = Orchestrator::new(writer.clone())
        .with_retry(RetryPolicy::new(3, Duration::from_millis(5)));
    let options = ImportOptions::new(RecordKind::NicTax);

    let (_, upload) = upload_bytes(nic_csv(12), &options, &locations(), &orchestrator, 10)
        .await
        .unwrap();

    assert_eq!(upload.succeeded, 12);
    assert_eq!(writer.sizes(), vec![10, 10, 2]);
}

#[tokio::test]
async fn test_update_mode_uses_update_chunk_size() {
    let config = Config::default();
    let options = ImportOptions::new(RecordKind::NicTax).with_mode(WriteMode::Update);
    let report = import_bytes(nic_csv(25), &options, &locations()).await.unwrap();
    assert_eq!(report.mode, WriteMode::Update);

    let writer = Arc::new(MemoryWriter::default());
    let orchestrator = Orchestrator::new(writer.clone());
    let chunk_size = config.chunk_size_for(options.kind, options.mode);
    let upload = submit(&orchestrator, report, chunk_size).await.unwrap();

    assert_eq!(upload.chunk_count, 3);
    assert_eq!(writer.sizes(), vec![10, 10, 5]);
}

#[tokio::test]
async fn test_cancel_before_start_sends_nothing() {
    let writer = Arc::new(MemoryWriter::default());
    let orchestrator = Orchestrator::new(writer.clone());
    orchestrator.cancellation_token().cancel();
    let options = ImportOptions::new(RecordKind::NicTax);

    let (_, upload) = upload_bytes(nic_csv(20), &options, &locations(), &orchestrator, 10)
        .await
        .unwrap();

    assert_eq!(upload.status, UploadStatus::Cancelled);
    assert_eq!(upload.succeeded, 0);
    assert!(writer.sizes().is_empty());
}
