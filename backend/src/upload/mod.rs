//! Chunked submission of validated records.
//!
//! - [`chunk`] - deterministic in-order partitioning
//! - [`session`] - the [`UploadSession`] state machine
//! - [`retry`] - bounded exponential backoff
//! - [`writer`] - the [`RecordWriter`] seam to the remote write API
//! - [`orchestrator`] - drives a session chunk by chunk

pub mod chunk;
pub mod orchestrator;
pub mod retry;
pub mod session;
pub mod writer;

pub use chunk::{plan_chunks, Chunk};
pub use orchestrator::{Orchestrator, UploadReport};
pub use retry::RetryPolicy;
pub use session::{UploadProgress, UploadSession, UploadStatus};
pub use writer::RecordWriter;
