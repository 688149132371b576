use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::constants::API_EXCEPTION_OBJECT_TYPE;

/// Error object the API returns in place of a result.
///
/// The API reports most failures with HTTP 200 and this body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiException {
    pub object_type: String,
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<serde_json::Value>,
}

/// Failure to turn a response body into a typed result.
#[derive(Debug, thiserror::Error)]
pub enum ResponseError {
    #[error("API exception {}: {}", .0.code, .0.message)]
    Api(ApiException),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Parses a JSON response body, surfacing API exceptions as errors.
pub fn parse_response<T: DeserializeOwned>(body: &[u8]) -> Result<T, ResponseError> {
    let value: serde_json::Value = serde_json::from_slice(body)?;
    let is_exception = value
        .get("objectType")
        .and_then(|v| v.as_str())
        .is_some_and(|t| t == API_EXCEPTION_OBJECT_TYPE);
    if is_exception {
        let exc: ApiException = serde_json::from_value(value)?;
        return Err(ResponseError::Api(exc));
    }
    Ok(serde_json::from_value(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::UploadToken;

    #[test]
    fn parses_token() {
        let token: UploadToken =
            parse_response(br#"{"id":"0_tok","objectType":"KalturaUploadToken","status":0}"#)
                .unwrap();
        assert_eq!(token.id, "0_tok");
    }

    #[test]
    fn exception_becomes_error() {
        let body = br#"{
            "objectType": "KalturaAPIException",
            "code": "INVALID_KS",
            "message": "Invalid KS \"abc\"",
            "args": {"KSID": "abc"}
        }"#;
        let err = parse_response::<UploadToken>(body).unwrap_err();
        match err {
            ResponseError::Api(exc) => {
                assert_eq!(exc.code, "INVALID_KS");
                assert!(exc.message.contains("Invalid KS"));
            }
            other => panic!("expected API exception, got {other:?}"),
        }
    }

    #[test]
    fn garbage_is_json_error() {
        let err = parse_response::<UploadToken>(b"<html>").unwrap_err();
        assert!(matches!(err, ResponseError::Json(_)));
    }

    #[test]
    fn error_message_names_code() {
        let err = ResponseError::Api(ApiException {
            object_type: API_EXCEPTION_OBJECT_TYPE.into(),
            code: "UPLOAD_TOKEN_NOT_FOUND".into(),
            message: "not found".into(),
            args: None,
        });
        assert_eq!(err.to_string(), "API exception UPLOAD_TOKEN_NOT_FOUND: not found");
    }
}
