use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::fs::File;
use tokio::io::AsyncReadExt;

use crate::types::Chunk;
use crate::{TransferError, validate_upload_file};

// ---------------------------------------------------------------------------
// FileSource
// ---------------------------------------------------------------------------

/// Sequential reader over a validated upload file.
///
/// The file handle lives as long as the source and is closed when it is
/// dropped, whichever way the upload ends. Chunks are produced strictly in
/// offset order and the sequence cannot be restarted.
pub struct FileSource {
    file: File,
    path: PathBuf,
    total_size: u64,
    offset: u64,
}

impl FileSource {
    /// Validates `path` and opens it for chunked reading.
    pub async fn open(path: &Path) -> Result<Self, TransferError> {
        let total_size = validate_upload_file(path).await?;
        let file = File::open(path).await?;
        Ok(Self {
            file,
            path: path.to_path_buf(),
            total_size,
            offset: 0,
        })
    }

    /// Reads the next chunk of at most `max_len` bytes. Returns `None` at EOF.
    ///
    /// `max_len` may change between calls. A `max_len` of 0 is treated as 1
    /// so the sequence always makes progress.
    pub async fn next_chunk(&mut self, max_len: usize) -> Result<Option<Chunk>, TransferError> {
        let remaining = self.remaining();
        if remaining == 0 {
            return Ok(None);
        }

        let read_size = remaining.min(max_len.max(1) as u64) as usize;
        let mut buf = vec![0u8; read_size];
        self.file.read_exact(&mut buf).await.map_err(|e| {
            if e.kind() == ErrorKind::UnexpectedEof {
                TransferError::Io(std::io::Error::new(
                    ErrorKind::UnexpectedEof,
                    format!(
                        "{} shrank while reading at offset {} (expected {} bytes)",
                        self.path.display(),
                        self.offset,
                        self.total_size
                    ),
                ))
            } else {
                TransferError::Io(e)
            }
        })?;

        let chunk = Chunk {
            offset: self.offset,
            eof: self.offset + read_size as u64 == self.total_size,
            data: buf,
        };
        self.offset += read_size as u64;
        Ok(Some(chunk))
    }

    /// Current byte offset.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Total file size in bytes, fixed at open time.
    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    /// Bytes remaining to read.
    pub fn remaining(&self) -> u64 {
        self.total_size - self.offset
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
