//! The seam between the orchestrator and the remote write API.

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::ClientError;
use crate::models::{DomainRecord, RecordKind, WriteMode};

/// Writes one chunk as a single bulk request.
///
/// A chunk is committed exactly when this returns `Ok`.
#[async_trait]
pub trait RecordWriter: Send + Sync {
    async fn write_chunk(
        &self,
        kind: RecordKind,
        mode: WriteMode,
        records: &[DomainRecord],
    ) -> Result<(), ClientError>;
}

#[async_trait]
impl<W: RecordWriter + ?Sized> RecordWriter for Arc<W> {
    async fn write_chunk(
        &self,
        kind: RecordKind,
        mode: WriteMode,
        records: &[DomainRecord],
    ) -> Result<(), ClientError> {
        (**self).write_chunk(kind, mode, records).await
    }
}
