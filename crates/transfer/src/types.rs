use std::path::{Path, PathBuf};

use bytes::Bytes;

use crate::TransferError;

/// A contiguous byte range read from the source file.
#[derive(Debug, Clone)]
pub struct Chunk {
    /// Byte offset within the file.
    pub offset: u64,
    /// Raw chunk data.
    pub data: Vec<u8>,
    /// `true` if this read reached the end of the file.
    pub eof: bool,
}

/// One chunk about to be sent, with its protocol flags.
#[derive(Debug, Clone)]
pub struct ChunkPlan {
    pub offset: u64,
    /// Payload; cloning it for a retry does not copy the bytes.
    pub data: Bytes,
    /// Continues an upload that already has bytes on the server.
    pub is_resume: bool,
    /// Last chunk of the file.
    pub is_final: bool,
}

impl ChunkPlan {
    /// Plans `chunk` against a file of `total_size` bytes.
    pub fn new(chunk: Chunk, total_size: u64) -> Self {
        let end = chunk.offset + chunk.data.len() as u64;
        Self {
            offset: chunk.offset,
            is_resume: chunk.offset > 0,
            is_final: end >= total_size,
            data: Bytes::from(chunk.data),
        }
    }

    /// Payload length in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Tracks one file transfer in progress.
///
/// Owned by a single upload call; not shared across tasks.
#[derive(Debug)]
pub struct UploadSession {
    file_path: PathBuf,
    total_size: u64,
    offset: u64,
    token_id: Option<String>,
    chunks_sent: u32,
}

impl UploadSession {
    /// Creates a session for `file_path` of `total_size` bytes.
    pub fn new(file_path: &Path, total_size: u64) -> Self {
        Self {
            file_path: file_path.to_path_buf(),
            total_size,
            offset: 0,
            token_id: None,
            chunks_sent: 0,
        }
    }

    /// Records the server token backing this session.
    pub fn set_token(&mut self, token_id: impl Into<String>) {
        self.token_id = Some(token_id.into());
    }

    /// Advances the offset past an acknowledged chunk of `len` bytes.
    pub fn advance(&mut self, len: u64) -> Result<(), TransferError> {
        if self.offset + len > self.total_size {
            return Err(TransferError::OffsetOverrun {
                offset: self.offset,
                len,
                total: self.total_size,
            });
        }
        self.offset += len;
        self.chunks_sent += 1;
        Ok(())
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn token_id(&self) -> Option<&str> {
        self.token_id.as_deref()
    }

    pub fn chunks_sent(&self) -> u32 {
        self.chunks_sent
    }

    /// Bytes not yet acknowledged.
    pub fn remaining(&self) -> u64 {
        self.total_size - self.offset
    }

    /// Returns `true` once every byte has been acknowledged.
    pub fn is_complete(&self) -> bool {
        self.offset == self.total_size
    }

    /// Fraction of the file acknowledged so far (0.0-1.0).
    pub fn progress(&self) -> f64 {
        if self.total_size == 0 {
            return 0.0;
        }
        self.offset as f64 / self.total_size as f64
    }
}
