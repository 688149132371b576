use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Path prefix of the upload-token service, appended to the service URL.
pub const UPLOAD_TOKEN_SERVICE_PATH: &str = "/api_v3/service/uploadtoken/action";

/// `format` value selecting JSON responses.
pub const RESPONSE_FORMAT_JSON: &str = "1";

/// `objectType` of the error envelope returned by the API.
pub const API_EXCEPTION_OBJECT_TYPE: &str = "KalturaAPIException";

/// `objectType` sent when creating an upload token.
pub const UPLOAD_TOKEN_OBJECT_TYPE: &str = "KalturaUploadToken";

/// Content type of every chunk payload.
pub const CHUNK_CONTENT_TYPE: &str = "application/octet-stream";

/// Per-request timeout for chunk uploads.
pub const CHUNK_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Request and multipart field names.
pub mod fields {
    pub const KS: &str = "ks";
    pub const FORMAT: &str = "format";
    pub const UPLOAD_TOKEN_ID: &str = "uploadTokenId";

    pub const TOKEN_OBJECT_TYPE: &str = "uploadToken[objectType]";
    pub const TOKEN_FILE_NAME: &str = "uploadToken[fileName]";
    pub const TOKEN_FILE_SIZE: &str = "uploadToken[fileSize]";

    pub const RESUME: &str = "resume";
    pub const RESUME_AT: &str = "resumeAt";
    pub const FINAL_CHUNK: &str = "finalChunk";
    pub const FILE_DATA: &str = "fileData";
}

/// Upload-token service action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenAction {
    Add,
    Upload,
    Get,
}

impl TokenAction {
    /// Returns the action segment used in the request path.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Upload => "upload",
            Self::Get => "get",
        }
    }
}

/// Encodes a boolean as the `"1"`/`"0"` flag the API expects.
pub fn flag(value: bool) -> &'static str {
    if value { "1" } else { "0" }
}

/// Multipart filename of the chunk starting at `offset`.
pub fn chunk_file_name(offset: u64) -> String {
    format!("chunk_{offset}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_are_numeric_strings() {
        assert_eq!(flag(true), "1");
        assert_eq!(flag(false), "0");
    }

    #[test]
    fn chunk_file_name_uses_decimal_offset() {
        assert_eq!(chunk_file_name(0), "chunk_0");
        assert_eq!(chunk_file_name(1_048_576), "chunk_1048576");
    }

    #[test]
    fn action_path_segments() {
        assert_eq!(TokenAction::Add.as_str(), "add");
        assert_eq!(TokenAction::Upload.as_str(), "upload");
        assert_eq!(TokenAction::Get.as_str(), "get");
    }

    #[test]
    fn action_serde_matches_path_segment() {
        for action in [TokenAction::Add, TokenAction::Upload, TokenAction::Get] {
            let json = serde_json::to_string(&action).unwrap();
            assert_eq!(json, format!("\"{}\"", action.as_str()));
        }
    }
}
