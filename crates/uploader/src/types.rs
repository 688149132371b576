//! Data types for the upload flow.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Network operation wrapped by the retry executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum RetryOperation {
    CreateToken,
    UploadChunk { offset: u64 },
    TokenStatus,
}

impl fmt::Display for RetryOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CreateToken => f.write_str("create_token"),
            Self::UploadChunk { offset } => write!(f, "upload_chunk@{offset}"),
            Self::TokenStatus => f.write_str("token_status"),
        }
    }
}

/// Progress event emitted during an upload.
#[derive(Debug, Clone)]
pub enum UploadEvent {
    /// Server token created; chunks follow.
    TokenCreated { token_id: String, total_bytes: u64 },
    /// A chunk was acknowledged.
    ChunkSent {
        token_id: String,
        offset: u64,
        len: u64,
        is_final: bool,
        retries: u32,
        /// Fraction of the file acknowledged (0.0-1.0).
        progress: f64,
        next_chunk_bytes: usize,
        bytes_per_second: f64,
        eta: Option<Duration>,
    },
    /// A transient failure is being retried after `delay`.
    Retrying {
        operation: RetryOperation,
        attempt: u32,
        delay: Duration,
        error: String,
    },
    /// All chunks sent; waiting for the server to finalize.
    Finalizing { token_id: String },
    Completed { token_id: String },
    Failed { error: String },
}

/// Non-blocking publisher for [`UploadEvent`]s.
///
/// Events are dropped when the channel is full or nobody listens, so a
/// slow consumer never stalls the transfer.
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    tx: Option<mpsc::Sender<UploadEvent>>,
}

impl EventSink {
    pub fn new(tx: mpsc::Sender<UploadEvent>) -> Self {
        Self { tx: Some(tx) }
    }

    /// A sink that discards everything.
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    pub fn emit(&self, event: UploadEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.try_send(event);
        }
    }
}

/// Record of one acknowledged chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkReport {
    pub index: u32,
    pub offset: u64,
    pub len: u64,
    pub is_final: bool,
    /// Failed attempts before the chunk went through.
    pub retries: u32,
    pub elapsed_ms: u64,
}

/// Summary of a finished upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadReport {
    pub token_id: String,
    pub file_name: String,
    pub total_bytes: u64,
    pub chunks: Vec<ChunkReport>,
    pub finalize_polls: u32,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl UploadReport {
    /// Retries across all chunks.
    pub fn total_retries(&self) -> u32 {
        self.chunks.iter().map(|c| c.retries).sum()
    }
}
