//! Chunked file reading with adaptive chunk sizing.
//!
//! The local half of the resumable upload: validating the source file,
//! reading it sequentially in caller-sized chunks, and steering the chunk
//! size toward a target time per request.

mod adaptive;
mod chunked;
mod progress;
mod types;
mod validation;

pub use adaptive::{ChunkSizeController, ChunkSizing};
pub use chunked::FileSource;
pub use progress::SpeedCalculator;
pub use types::{Chunk, ChunkPlan, UploadSession};
pub use validation::{upload_file_name, validate_upload_file};

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("file not found: {0}")]
    NotFound(String),

    #[error("not a regular file: {0}")]
    NotAFile(String),

    #[error("file is empty: {0}")]
    EmptyFile(String),

    #[error("invalid chunk sizing: {0}")]
    InvalidSizing(String),

    #[error("chunk at offset {offset} with {len} bytes overruns file size {total}")]
    OffsetOverrun { offset: u64, len: u64, total: u64 },
}

impl TransferError {
    /// Returns `true` for errors that reject the file before any transfer.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::NotFound(_) | Self::NotAFile(_) | Self::EmptyFile(_)
        )
    }
}
