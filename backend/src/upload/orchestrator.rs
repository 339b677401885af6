//! Sequential chunk submission.
//!
//! The orchestrator owns a session for the duration of [`Orchestrator::run`]:
//! it partitions the records, writes one chunk at a time (at most one write
//! in flight), retries transient failures with backoff, and stops at the
//! first chunk that cannot be written. Chunks already written stay written.

use serde::Serialize;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::chunk::Chunk;
use super::retry::RetryPolicy;
use super::session::{SessionEvent, UploadProgress, UploadSession, UploadStatus};
use super::writer::RecordWriter;
use crate::api::logs::{log_error, log_info, log_success, log_success_indent, log_warning};
use crate::error::{ChunkSubmissionError, ClientError, UploadError};

/// Outcome of a run that was not stopped by a chunk failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadReport {
    pub session_id: Uuid,
    pub status: UploadStatus,
    pub total: usize,
    pub succeeded: usize,
    pub chunk_count: usize,
    pub chunks_written: usize,
}

impl UploadReport {
    pub fn from_session(session: &UploadSession) -> Self {
        Self {
            session_id: session.id(),
            status: session.status().clone(),
            total: session.total(),
            succeeded: session.succeeded(),
            chunk_count: session.chunks().len(),
            chunks_written: session.current_chunk(),
        }
    }
}

enum ChunkResult {
    Written,
    Cancelled,
    Failed { error: ClientError, attempts: u32 },
}

pub struct Orchestrator<W> {
    writer: W,
    retry: RetryPolicy,
    cancel: CancellationToken,
    progress: watch::Sender<UploadProgress>,
}

impl<W: RecordWriter> Orchestrator<W> {
    pub fn new(writer: W) -> Self {
        let (progress, _) = watch::channel(UploadProgress::default());
        Self {
            writer,
            retry: RetryPolicy::default(),
            cancel: CancellationToken::new(),
            progress,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token that cancels the run before its next chunk.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Live progress; the latest value is always available.
    pub fn subscribe(&self) -> watch::Receiver<UploadProgress> {
        self.progress.subscribe()
    }

    fn publish(&self, session: &UploadSession) {
        self.progress.send_replace(session.progress());
    }

    fn step(&self, session: &mut UploadSession, event: SessionEvent) -> Result<(), UploadError> {
        session.transition(event)?;
        self.publish(session);
        Ok(())
    }

    /// Submit every chunk of `session` in order.
    ///
    /// Returns the report for `Completed` and `Cancelled` runs. A chunk that
    /// still fails after its retries leaves the session `Failed` and returns
    /// [`ChunkSubmissionError`] with the number of records already written.
    pub async fn run(&self, session: &mut UploadSession) -> Result<UploadReport, UploadError> {
        self.step(session, SessionEvent::Partition)?;
        log_info(format!(
            "Uploading {} {} records in {} chunk(s) of up to {} ({})",
            session.total(),
            session.kind(),
            session.chunks().len(),
            session.chunk_size(),
            session.mode()
        ));

        while let Some(chunk) = session.next_chunk() {
            if self.cancel.is_cancelled() {
                return Ok(self.cancelled(session));
            }

            self.step(session, SessionEvent::BeginChunk)?;

            let result = self.submit(session, chunk).await;
            match result {
                ChunkResult::Written => {
                    self.step(session, SessionEvent::ChunkSucceeded)?;
                    log_success_indent(
                        format!(
                            "Chunk {}/{}: {} records ({}%)",
                            chunk.number(),
                            session.chunks().len(),
                            chunk.len,
                            session.progress().percent
                        ),
                        1,
                    );
                }
                ChunkResult::Cancelled => return Ok(self.cancelled(session)),
                ChunkResult::Failed { error, attempts } => {
                    self.step(session, SessionEvent::ChunkFailed)?;
                    let err = ChunkSubmissionError {
                        chunk: chunk.number(),
                        chunk_count: session.chunks().len(),
                        attempts,
                        succeeded: session.succeeded(),
                        attempted: session.total(),
                        source: error,
                    };
                    log_error(err.to_string());
                    return Err(err.into());
                }
            }
        }

        log_success(format!(
            "Upload complete: {} of {} records submitted",
            session.succeeded(),
            session.total()
        ));
        Ok(UploadReport::from_session(session))
    }

    async fn submit(&self, session: &UploadSession, chunk: Chunk) -> ChunkResult {
        let records = &session.records()[chunk.range()];
        let mut attempt = 1;

        loop {
            let error = match self
                .writer
                .write_chunk(session.kind(), session.mode(), records)
                .await
            {
                Ok(()) => return ChunkResult::Written,
                Err(e) => e,
            };

            if !error.is_retryable() || !self.retry.should_retry(attempt) {
                return ChunkResult::Failed {
                    error,
                    attempts: attempt,
                };
            }

            let delay = self.retry.delay_for(attempt);
            log_warning(format!(
                "Chunk {} attempt {} failed ({}), retrying in {}ms",
                chunk.number(),
                attempt,
                error,
                delay.as_millis()
            ));

            tokio::select! {
                _ = self.cancel.cancelled() => return ChunkResult::Cancelled,
                _ = tokio::time::sleep(delay) => {}
            }
            attempt += 1;
        }
    }

    fn cancelled(&self, session: &mut UploadSession) -> UploadReport {
        // Cancel is valid from every non-terminal state reached here.
        if self.step(session, SessionEvent::Cancel).is_err() {
            self.publish(session);
        }
        log_warning(format!(
            "Upload cancelled: {} of {} records were submitted",
            session.succeeded(),
            session.total()
        ));
        UploadReport::from_session(session)
    }
}
