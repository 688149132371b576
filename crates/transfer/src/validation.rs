use std::io::ErrorKind;
use std::path::Path;

use crate::TransferError;

/// Validates that `path` is a non-empty regular file and returns its size.
///
/// Rejects:
/// - Missing paths
/// - Directories and other non-regular files
/// - Zero-byte files (never attempted)
pub async fn validate_upload_file(path: &Path) -> Result<u64, TransferError> {
    let display = path.display().to_string();

    let metadata = match tokio::fs::metadata(path).await {
        Ok(m) => m,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(TransferError::NotFound(display));
        }
        Err(e) => return Err(TransferError::Io(e)),
    };

    if !metadata.is_file() {
        return Err(TransferError::NotAFile(display));
    }

    if metadata.len() == 0 {
        return Err(TransferError::EmptyFile(display));
    }

    Ok(metadata.len())
}

/// Returns the base name sent as the token's `fileName`.
pub fn upload_file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}
