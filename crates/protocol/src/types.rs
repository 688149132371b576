use std::fmt;

use serde::{Deserialize, Serialize};

/// Server-side state of an upload token, as seen by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenStatus {
    Pending,
    Partial,
    Full,
    Unknown,
}

impl TokenStatus {
    /// Maps the integer `status` of the token JSON.
    ///
    /// Closed (3), timed out (4) and deleted (5) tokens, as well as any
    /// future code, map to [`TokenStatus::Unknown`].
    pub fn from_code(code: i64) -> Self {
        match code {
            0 => Self::Pending,
            1 => Self::Partial,
            2 => Self::Full,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Partial => "partial",
            Self::Full => "full",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for TokenStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Upload token object as returned by `add` and `get`.
///
/// Sizes are declared as floats by the API, so they are kept as `f64` on
/// the wire and converted by [`TokenHandle`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadToken {
    pub id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub object_type: String,
    #[serde(default)]
    pub status: i64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub file_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uploaded_file_size: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
}

/// Client-side view of an upload token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenHandle {
    pub id: String,
    pub status: TokenStatus,
    pub uploaded_bytes: u64,
}

impl TokenHandle {
    /// Returns `true` once the server holds all `total_size` bytes.
    pub fn is_finalized(&self, total_size: u64) -> bool {
        self.status == TokenStatus::Full && self.uploaded_bytes == total_size
    }
}

impl From<UploadToken> for TokenHandle {
    fn from(token: UploadToken) -> Self {
        let uploaded = token.uploaded_file_size.unwrap_or(0.0);
        Self {
            id: token.id,
            status: TokenStatus::from_code(token.status),
            uploaded_bytes: if uploaded > 0.0 { uploaded as u64 } else { 0 },
        }
    }
}
