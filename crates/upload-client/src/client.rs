//! Upload-token service client.
//!
//! Async HTTP client using `reqwest`. Every request carries the session key
//! (`ks`) and asks for JSON responses.

use std::time::Duration;

use kmcp_protocol::constants::{
    CHUNK_CONTENT_TYPE, RESPONSE_FORMAT_JSON, UPLOAD_TOKEN_OBJECT_TYPE,
    UPLOAD_TOKEN_SERVICE_PATH, chunk_file_name, fields, flag,
};
use kmcp_protocol::{ResponseError, TokenAction, TokenHandle, UploadToken, parse_response};
use kmcp_transfer::ChunkPlan;
use kmcp_uploader::{TransportError, TransportFuture, UploadTransport};
use reqwest::multipart::{Form, Part};
use tracing::debug;

/// Errors building the client.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid service URL {0:?}")]
    InvalidUrl(String),

    #[error("missing session key")]
    MissingSession,
}

/// Upload-token service client.
pub struct Client {
    http: reqwest::Client,
    base_url: String,
    ks: String,
}

impl Client {
    /// Creates a client for `service_url` authenticated with `ks`.
    ///
    /// `timeout` bounds each request, chunk uploads included.
    pub fn new(service_url: &str, ks: &str, timeout: Duration) -> Result<Self, Error> {
        let service_url = service_url.trim_end_matches('/');
        let parsed = reqwest::Url::parse(service_url)
            .map_err(|_| Error::InvalidUrl(service_url.to_string()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(Error::InvalidUrl(service_url.to_string()));
        }
        if ks.trim().is_empty() {
            return Err(Error::MissingSession);
        }

        let http = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            http,
            base_url: format!("{service_url}{UPLOAD_TOKEN_SERVICE_PATH}"),
            ks: ks.to_string(),
        })
    }

    fn action_url(&self, action: TokenAction) -> String {
        format!("{}/{}", self.base_url, action.as_str())
    }

    fn session_params(&self) -> [(&'static str, &str); 2] {
        [
            (fields::FORMAT, RESPONSE_FORMAT_JSON),
            (fields::KS, self.ks.as_str()),
        ]
    }

    /// Performs a form-encoded POST and returns the response body.
    async fn post_form(
        &self,
        action: TokenAction,
        form: &[(&str, String)],
    ) -> Result<Vec<u8>, TransportError> {
        let resp = self
            .http
            .post(self.action_url(action))
            .query(&self.session_params())
            .form(form)
            .send()
            .await
            .map_err(classify)?;
        read_body(resp).await
    }

    /// Creates an upload token for a file.
    pub async fn add_token(
        &self,
        file_name: &str,
        file_size: u64,
    ) -> Result<TokenHandle, TransportError> {
        let form = [
            (fields::TOKEN_OBJECT_TYPE, UPLOAD_TOKEN_OBJECT_TYPE.to_string()),
            (fields::TOKEN_FILE_NAME, file_name.to_string()),
            (fields::TOKEN_FILE_SIZE, file_size.to_string()),
        ];
        let body = self.post_form(TokenAction::Add, &form).await?;
        let token: UploadToken = decode(&body)?;
        if token.id.is_empty() {
            return Err(TransportError::InvalidResponse(
                "upload token without id".into(),
            ));
        }
        debug!(token = %token.id, file = %file_name, size = file_size, "token added");
        Ok(token.into())
    }

    /// Sends one chunk as `multipart/form-data`.
    pub async fn upload(&self, token_id: &str, chunk: &ChunkPlan) -> Result<(), TransportError> {
        let file_part = Part::stream_with_length(chunk.data.clone(), chunk.len() as u64)
            .file_name(chunk_file_name(chunk.offset))
            .mime_str(CHUNK_CONTENT_TYPE)
            .map_err(|e| TransportError::InvalidResponse(e.to_string()))?;
        let form = Form::new()
            .text(fields::RESUME, flag(chunk.is_resume))
            .text(fields::RESUME_AT, chunk.offset.to_string())
            .text(fields::FINAL_CHUNK, flag(chunk.is_final))
            .part(fields::FILE_DATA, file_part);

        let resp = self
            .http
            .post(self.action_url(TokenAction::Upload))
            .query(&[(fields::UPLOAD_TOKEN_ID, token_id)])
            .query(&self.session_params())
            .multipart(form)
            .send()
            .await
            .map_err(classify)?;
        let body = read_body(resp).await?;

        let token: UploadToken = decode(&body)?;
        debug!(
            token = %token_id,
            offset = chunk.offset,
            len = chunk.len(),
            server_bytes = token.uploaded_file_size.unwrap_or(0.0),
            "chunk accepted"
        );
        Ok(())
    }

    /// Returns the token's status and received byte count.
    pub async fn get_token(&self, token_id: &str) -> Result<TokenHandle, TransportError> {
        let form = [(fields::UPLOAD_TOKEN_ID, token_id.to_string())];
        let body = self.post_form(TokenAction::Get, &form).await?;
        let token: UploadToken = decode(&body)?;
        Ok(token.into())
    }
}

impl UploadTransport for Client {
    fn create_token<'a>(
        &'a self,
        file_name: &'a str,
        file_size: u64,
    ) -> TransportFuture<'a, TokenHandle> {
        Box::pin(self.add_token(file_name, file_size))
    }

    fn upload_chunk<'a>(
        &'a self,
        token_id: &'a str,
        chunk: &'a ChunkPlan,
    ) -> TransportFuture<'a, ()> {
        Box::pin(self.upload(token_id, chunk))
    }

    fn get_token_status<'a>(&'a self, token_id: &'a str) -> TransportFuture<'a, TokenHandle> {
        Box::pin(self.get_token(token_id))
    }
}

/// Reads a response body, turning non-success statuses into errors.
async fn read_body(resp: reqwest::Response) -> Result<Vec<u8>, TransportError> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(status_error(status.as_u16(), body));
    }
    Ok(resp.bytes().await.map_err(classify)?.to_vec())
}

fn decode<T: serde::de::DeserializeOwned>(body: &[u8]) -> Result<T, TransportError> {
    parse_response(body).map_err(|e| match e {
        ResponseError::Api(exc) => TransportError::Api {
            code: exc.code,
            message: exc.message,
        },
        ResponseError::Json(e) => TransportError::InvalidResponse(e.to_string()),
    })
}

/// Maps a non-success HTTP status to a transport error.
fn status_error(status: u16, body: String) -> TransportError {
    match status {
        408 | 429 | 500..=599 => TransportError::Server { status, body },
        _ => TransportError::Rejected { status, body },
    }
}

/// Maps a `reqwest` failure to a transport error.
///
/// The URL is stripped because its query carries the session key.
fn classify(err: reqwest::Error) -> TransportError {
    let err = err.without_url();
    if err.is_timeout() {
        TransportError::Timeout(err.to_string())
    } else if err.is_connect() || err.is_request() || err.is_body() {
        TransportError::Connect(err.to_string())
    } else {
        TransportError::InvalidResponse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use kmcp_protocol::TokenStatus;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    /// Reads one HTTP request: headers plus `Content-Length` bytes of body.
    async fn read_request(stream: &mut TcpStream) -> String {
        let mut buf = Vec::new();
        let mut tmp = [0u8; 8192];
        loop {
            let n = stream.read(&mut tmp).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&tmp[..n]);
            if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                let head = String::from_utf8_lossy(&buf[..end]).to_ascii_lowercase();
                let len = head
                    .lines()
                    .find_map(|l| l.strip_prefix("content-length:"))
                    .and_then(|v| v.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if buf.len() >= end + 4 + len {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&buf).into_owned()
    }

    /// Starts a mock HTTP server that answers one request and returns it.
    async fn mock_server(status: u16, body: &str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let url = format!("http://127.0.0.1:{port}");
        let body = body.to_string();

        let handle = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let request = read_request(&mut stream).await;

            let resp = format!(
                "HTTP/1.1 {status} Mock\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            let _ = stream.write_all(resp.as_bytes()).await;
            let _ = stream.shutdown().await;
            request
        });

        (url, handle)
    }

    fn client(url: &str) -> Client {
        Client::new(url, "secret-ks", Duration::from_secs(5)).unwrap()
    }

    fn request_line(request: &str) -> &str {
        request.lines().next().unwrap_or_default()
    }

    const TOKEN_JSON: &str = r#"{"objectType":"KalturaUploadToken","id":"0_abc","status":0,"fileName":"clip.mp4","fileSize":5242880}"#;

    #[tokio::test]
    async fn add_token_posts_form() {
        let (url, handle) = mock_server(200, TOKEN_JSON).await;

        let token = client(&url).add_token("clip.mp4", 5_242_880).await.unwrap();
        assert_eq!(token.id, "0_abc");
        assert_eq!(token.status, TokenStatus::Pending);

        let request = handle.await.unwrap();
        let line = request_line(&request);
        assert!(line.starts_with("POST /api_v3/service/uploadtoken/action/add?"));
        assert!(line.contains("format=1"));
        assert!(line.contains("ks=secret-ks"));
        assert!(request.contains("uploadToken%5BobjectType%5D=KalturaUploadToken"));
        assert!(request.contains("uploadToken%5BfileName%5D=clip.mp4"));
        assert!(request.contains("uploadToken%5BfileSize%5D=5242880"));
    }

    #[tokio::test]
    async fn add_token_without_id_is_invalid() {
        let (url, handle) = mock_server(200, r#"{"objectType":"KalturaUploadToken","id":""}"#).await;
        let err = client(&url).add_token("clip.mp4", 1).await.unwrap_err();
        assert!(matches!(err, TransportError::InvalidResponse(_)));
        handle.abort();
    }

    #[tokio::test]
    async fn upload_sends_multipart_fields() {
        let (url, handle) = mock_server(
            200,
            r#"{"objectType":"KalturaUploadToken","id":"0_abc","status":2,"uploadedFileSize":1029}"#,
        )
        .await;

        let plan = ChunkPlan {
            offset: 1024,
            data: Bytes::from_static(b"hello"),
            is_resume: true,
            is_final: true,
        };
        client(&url).upload("0_abc", &plan).await.unwrap();

        let request = handle.await.unwrap();
        let line = request_line(&request);
        assert!(line.starts_with("POST /api_v3/service/uploadtoken/action/upload?"));
        assert!(line.contains("uploadTokenId=0_abc"));
        assert!(line.contains("ks=secret-ks"));
        assert!(line.contains("format=1"));

        let lower = request.to_ascii_lowercase();
        assert!(lower.contains("content-type: multipart/form-data; boundary="));
        assert!(lower.contains("name=\"resume\"\r\n\r\n1\r\n"));
        assert!(lower.contains("name=\"resumeat\"\r\n\r\n1024\r\n"));
        assert!(lower.contains("name=\"finalchunk\"\r\n\r\n1\r\n"));
        assert!(lower.contains("name=\"filedata\"; filename=\"chunk_1024\""));
        assert!(lower.contains("content-type: application/octet-stream\r\n\r\nhello\r\n"));
    }

    #[tokio::test]
    async fn first_chunk_flags_are_zero() {
        let (url, handle) = mock_server(200, TOKEN_JSON).await;

        let plan = ChunkPlan {
            offset: 0,
            data: Bytes::from(vec![7u8; 16]),
            is_resume: false,
            is_final: false,
        };
        client(&url).upload("0_abc", &plan).await.unwrap();

        let lower = handle.await.unwrap().to_ascii_lowercase();
        assert!(lower.contains("name=\"resume\"\r\n\r\n0\r\n"));
        assert!(lower.contains("name=\"resumeat\"\r\n\r\n0\r\n"));
        assert!(lower.contains("name=\"finalchunk\"\r\n\r\n0\r\n"));
        assert!(lower.contains("filename=\"chunk_0\""));
    }

    #[tokio::test]
    async fn get_token_reads_status_and_bytes() {
        let (url, handle) = mock_server(
            200,
            r#"{"objectType":"KalturaUploadToken","id":"0_abc","status":1,"uploadedFileSize":2048.0}"#,
        )
        .await;

        let token = client(&url).get_token_status("0_abc").await.unwrap();
        assert_eq!(token.status, TokenStatus::Partial);
        assert_eq!(token.uploaded_bytes, 2048);

        let request = handle.await.unwrap();
        assert!(request_line(&request).starts_with("POST /api_v3/service/uploadtoken/action/get?"));
        assert!(request.contains("uploadTokenId=0_abc"));
    }

    #[tokio::test]
    async fn api_exception_on_200_is_not_transient() {
        let (url, handle) = mock_server(
            200,
            r#"{"objectType":"KalturaAPIException","code":"INVALID_KS","message":"Invalid KS"}"#,
        )
        .await;

        let err = client(&url).get_token("0_abc").await.unwrap_err();
        assert_eq!(
            err,
            TransportError::Api {
                code: "INVALID_KS".into(),
                message: "Invalid KS".into(),
            }
        );
        assert!(!err.is_transient());
        handle.abort();
    }

    #[tokio::test]
    async fn server_error_is_transient() {
        let (url, handle) = mock_server(503, "unavailable").await;
        let err = client(&url).get_token("0_abc").await.unwrap_err();
        assert!(matches!(err, TransportError::Server { status: 503, .. }));
        assert!(err.is_transient());
        handle.abort();
    }

    #[tokio::test]
    async fn throttled_is_transient() {
        let (url, handle) = mock_server(429, "slow down").await;
        let err = client(&url).add_token("clip.mp4", 1).await.unwrap_err();
        assert!(err.is_transient());
        handle.abort();
    }

    #[tokio::test]
    async fn client_error_is_rejected() {
        let (url, handle) = mock_server(404, "no such action").await;
        let err = client(&url).get_token("0_abc").await.unwrap_err();
        assert_eq!(
            err,
            TransportError::Rejected {
                status: 404,
                body: "no such action".into(),
            }
        );
        assert!(!err.is_transient());
        handle.abort();
    }

    #[tokio::test]
    async fn garbage_body_is_invalid_response() {
        let (url, handle) = mock_server(200, "<html>oops</html>").await;
        let err = client(&url).get_token("0_abc").await.unwrap_err();
        assert!(matches!(err, TransportError::InvalidResponse(_)));
        assert!(!err.is_transient());
        handle.abort();
    }

    #[tokio::test]
    async fn refused_connection_is_transient() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let err = client(&format!("http://127.0.0.1:{port}"))
            .get_token("0_abc")
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Connect(_)), "got {err:?}");
        assert!(!err.to_string().contains("secret-ks"));
    }

    #[tokio::test]
    async fn slow_server_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let handle = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(10)).await;
            drop(stream);
        });

        let client = Client::new(
            &format!("http://127.0.0.1:{port}"),
            "secret-ks",
            Duration::from_millis(200),
        )
        .unwrap();
        let err = client.get_token("0_abc").await.unwrap_err();
        assert!(matches!(err, TransportError::Timeout(_)), "got {err:?}");
        assert!(err.is_transient());
        handle.abort();
    }

    #[test]
    fn new_rejects_bad_url() {
        let err = Client::new("not a url", "ks", Duration::from_secs(1));
        assert!(matches!(err, Err(Error::InvalidUrl(_))));
        let err = Client::new("ftp://media.example.com", "ks", Duration::from_secs(1));
        assert!(matches!(err, Err(Error::InvalidUrl(_))));
    }

    #[test]
    fn new_requires_session() {
        let err = Client::new("https://media.example.com", "  ", Duration::from_secs(1));
        assert!(matches!(err, Err(Error::MissingSession)));
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        let c = Client::new("https://media.example.com/", "ks", Duration::from_secs(1)).unwrap();
        assert_eq!(
            c.action_url(TokenAction::Get),
            "https://media.example.com/api_v3/service/uploadtoken/action/get"
        );
    }

    #[test]
    fn status_classification() {
        assert!(status_error(500, String::new()).is_transient());
        assert!(status_error(408, String::new()).is_transient());
        assert!(!status_error(401, String::new()).is_transient());
        assert!(!status_error(413, String::new()).is_transient());
    }
}
