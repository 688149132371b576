//! Upload error types.

use kmcp_protocol::TokenStatus;
use kmcp_transfer::TransferError;

/// Failure of a single transport call.
///
/// Carries strings rather than client-library errors so the engine stays
/// independent of the HTTP stack.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TransportError {
    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("connection failed: {0}")]
    Connect(String),

    /// HTTP 5xx, 408 or 429.
    #[error("server error {status}: {body}")]
    Server { status: u16, body: String },

    /// Any other non-success HTTP status.
    #[error("request rejected {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("API exception {code}: {message}")]
    Api { code: String, message: String },

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl TransportError {
    /// Timeouts, connection failures and server-side errors are worth retrying.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Timeout(_) | Self::Connect(_) | Self::Server { .. }
        )
    }
}

/// Errors produced by an upload.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("invalid file {path}: {reason}")]
    FileValidation { path: String, reason: String },

    #[error("could not create upload token for {file_name} after {attempts} attempt(s): {source}")]
    TokenCreation {
        file_name: String,
        attempts: u32,
        source: TransportError,
    },

    #[error(
        "chunk at offset {offset} of token {token_id} failed after {attempts} attempt(s): {source}"
    )]
    ChunkTransfer {
        token_id: String,
        offset: u64,
        attempts: u32,
        source: TransportError,
    },

    #[error("status poll for token {token_id} failed after {attempts} attempt(s): {source}")]
    StatusPoll {
        token_id: String,
        attempts: u32,
        source: TransportError,
    },

    #[error(
        "token {token_id} not finalized after {polls} poll(s): last status {last_status}, {uploaded_bytes} of {total_size} bytes"
    )]
    TokenNotFinalized {
        token_id: String,
        polls: u32,
        last_status: TokenStatus,
        uploaded_bytes: u64,
        total_size: u64,
    },

    #[error("cancelled")]
    Cancelled,

    #[error("invalid settings: {0}")]
    Settings(String),

    #[error("transfer error: {0}")]
    Transfer(#[from] TransferError),
}

impl UploadError {
    /// Maps a file-open failure, keeping validation failures distinct.
    pub(crate) fn from_file(path: &std::path::Path, err: TransferError) -> Self {
        if err.is_validation() {
            Self::FileValidation {
                path: path.display().to_string(),
                reason: err.to_string(),
            }
        } else {
            Self::Transfer(err)
        }
    }

    /// Token id the failure relates to, if one had been created.
    pub fn token_id(&self) -> Option<&str> {
        match self {
            Self::ChunkTransfer { token_id, .. }
            | Self::StatusPoll { token_id, .. }
            | Self::TokenNotFinalized { token_id, .. } => Some(token_id),
            _ => None,
        }
    }
}
