//! Upload session state machine.
//!
//! ```text
//! Idle ──▶ Parsing ──▶ Chunking ──▶ Uploading(1 of n) ──▶ … ──▶ Completed
//!   └──────────────────▶┘                  │
//!                                          ├──▶ Failed
//!                                          └──▶ Cancelled
//! ```
//!
//! `Completed`, `Failed` and `Cancelled` are terminal; a new submission needs
//! a new session. Only the orchestrator drives the upload transitions.

use serde::Serialize;
use std::fmt;
use uuid::Uuid;

use super::chunk::{plan_chunks, Chunk};
use crate::error::UploadError;
use crate::models::{DomainRecord, RecordKind, WriteMode};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum UploadStatus {
    Idle,
    Parsing,
    Chunking,
    /// `chunk` is 1-based.
    Uploading { chunk: usize, of: usize },
    Completed,
    Failed,
    Cancelled,
}

impl UploadStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            UploadStatus::Completed | UploadStatus::Failed | UploadStatus::Cancelled
        )
    }
}

impl fmt::Display for UploadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UploadStatus::Idle => f.write_str("Idle"),
            UploadStatus::Parsing => f.write_str("Parsing"),
            UploadStatus::Chunking => f.write_str("Chunking"),
            UploadStatus::Uploading { chunk, of } => write!(f, "Uploading chunk {} of {}", chunk, of),
            UploadStatus::Completed => f.write_str("Completed"),
            UploadStatus::Failed => f.write_str("Failed"),
            UploadStatus::Cancelled => f.write_str("Cancelled"),
        }
    }
}

/// Snapshot published after every transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadProgress {
    pub status: UploadStatus,
    /// Chunks fully written.
    pub chunk_index: usize,
    pub chunk_count: usize,
    pub succeeded: usize,
    pub total: usize,
    pub percent: u8,
}

impl Default for UploadProgress {
    fn default() -> Self {
        Self {
            status: UploadStatus::Idle,
            chunk_index: 0,
            chunk_count: 0,
            succeeded: 0,
            total: 0,
            percent: 0,
        }
    }
}

/// `round(done / count * 100)`.
pub fn percent(done: usize, count: usize) -> u8 {
    if count == 0 {
        return 0;
    }
    ((done * 100 + count / 2) / count).min(100) as u8
}

pub(crate) enum SessionEvent {
    BeginParsing,
    Partition,
    BeginChunk,
    ChunkSucceeded,
    ChunkFailed,
    Cancel,
}

impl SessionEvent {
    fn name(&self) -> &'static str {
        match self {
            SessionEvent::BeginParsing => "begin parsing",
            SessionEvent::Partition => "partition",
            SessionEvent::BeginChunk => "begin chunk",
            SessionEvent::ChunkSucceeded => "chunk succeeded",
            SessionEvent::ChunkFailed => "chunk failed",
            SessionEvent::Cancel => "cancel",
        }
    }
}

/// One submission of a homogeneous record set.
#[derive(Debug, Clone)]
pub struct UploadSession {
    id: Uuid,
    kind: RecordKind,
    mode: WriteMode,
    records: Vec<DomainRecord>,
    chunk_size: usize,
    chunks: Vec<Chunk>,
    current_chunk: usize,
    succeeded: usize,
    status: UploadStatus,
}

impl UploadSession {
    pub fn new(kind: RecordKind, mode: WriteMode, chunk_size: usize) -> Result<Self, UploadError> {
        if chunk_size == 0 {
            return Err(UploadError::InvalidChunkSize);
        }
        Ok(Self {
            id: Uuid::new_v4(),
            kind,
            mode,
            records: Vec::new(),
            chunk_size,
            chunks: Vec::new(),
            current_chunk: 0,
            succeeded: 0,
            status: UploadStatus::Idle,
        })
    }

    /// A session already holding its records, ready to be partitioned.
    pub fn with_records(
        kind: RecordKind,
        mode: WriteMode,
        chunk_size: usize,
        records: Vec<DomainRecord>,
    ) -> Result<Self, UploadError> {
        let mut session = Self::new(kind, mode, chunk_size)?;
        session.records = records;
        Ok(session)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn kind(&self) -> RecordKind {
        self.kind
    }

    pub fn mode(&self) -> WriteMode {
        self.mode
    }

    pub fn records(&self) -> &[DomainRecord] {
        &self.records
    }

    pub fn total(&self) -> usize {
        self.records.len()
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    /// Index of the chunk being (or next to be) written.
    pub fn current_chunk(&self) -> usize {
        self.current_chunk
    }

    pub fn succeeded(&self) -> usize {
        self.succeeded
    }

    pub fn status(&self) -> &UploadStatus {
        &self.status
    }

    pub fn progress(&self) -> UploadProgress {
        UploadProgress {
            status: self.status.clone(),
            chunk_index: self.current_chunk,
            chunk_count: self.chunks.len(),
            succeeded: self.succeeded,
            total: self.records.len(),
            percent: percent(self.current_chunk, self.chunks.len()),
        }
    }

    /// Mark the session as reading its source.
    pub fn begin_parsing(&mut self) -> Result<(), UploadError> {
        self.transition(SessionEvent::BeginParsing)
    }

    /// Replace the record set while the source is still being read.
    pub fn load_records(&mut self, records: Vec<DomainRecord>) -> Result<(), UploadError> {
        match self.status {
            UploadStatus::Idle | UploadStatus::Parsing => {
                self.records = records;
                Ok(())
            }
            _ => Err(UploadError::InvalidTransition {
                from: self.status.clone(),
                event: "load records",
            }),
        }
    }

    /// The chunk to write next, if any.
    pub fn next_chunk(&self) -> Option<Chunk> {
        match self.status {
            UploadStatus::Chunking | UploadStatus::Uploading { .. } => {
                self.chunks.get(self.current_chunk).copied()
            }
            _ => None,
        }
    }

    pub(crate) fn transition(&mut self, event: SessionEvent) -> Result<(), UploadError> {
        let next = match (&self.status, &event) {
            (UploadStatus::Idle, SessionEvent::BeginParsing) => UploadStatus::Parsing,

            (UploadStatus::Idle | UploadStatus::Parsing, SessionEvent::Partition) => {
                if self.records.is_empty() {
                    return Err(UploadError::EmptyRecordSet);
                }
                self.chunks = plan_chunks(self.records.len(), self.chunk_size)?;
                self.current_chunk = 0;
                self.succeeded = 0;
                UploadStatus::Chunking
            }

            (UploadStatus::Chunking | UploadStatus::Uploading { .. }, SessionEvent::BeginChunk)
                if self.current_chunk < self.chunks.len() =>
            {
                UploadStatus::Uploading {
                    chunk: self.current_chunk + 1,
                    of: self.chunks.len(),
                }
            }

            (UploadStatus::Uploading { .. }, SessionEvent::ChunkSucceeded) => {
                self.succeeded += self.chunks[self.current_chunk].len;
                self.current_chunk += 1;
                if self.current_chunk == self.chunks.len() {
                    UploadStatus::Completed
                } else {
                    self.status.clone()
                }
            }

            (UploadStatus::Uploading { .. }, SessionEvent::ChunkFailed) => UploadStatus::Failed,

            (status, SessionEvent::Cancel) if !status.is_terminal() => UploadStatus::Cancelled,

            (status, event) => {
                return Err(UploadError::InvalidTransition {
                    from: status.clone(),
                    event: event.name(),
                })
            }
        };

        self.status = next;
        Ok(())
    }
}
