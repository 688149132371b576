fn main() {
    println!("Run `cargo test -p wire-compat` to execute wire compatibility tests.");
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use kmcp_protocol::{
        ApiException, ResponseError, TokenHandle, TokenStatus, UploadToken, parse_response,
    };
    use kmcp_uploader::UploadReport;

    /// Returns the path to the fixtures directory.
    fn fixtures_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")
    }

    fn read_fixture(name: &str) -> Vec<u8> {
        let path = fixtures_dir().join(name);
        fs::read(&path).unwrap_or_else(|e| panic!("failed to read fixture {}: {e}", path.display()))
    }

    /// Loads a fixture JSON file and returns it as a `serde_json::Value`.
    fn load_fixture(name: &str) -> serde_json::Value {
        serde_json::from_slice(&read_fixture(name))
            .unwrap_or_else(|e| panic!("failed to parse fixture {name}: {e}"))
    }

    /// Normalizes JSON values so that integer-valued floats compare equal.
    ///
    /// The service declares sizes as floats but usually sends them as
    /// integers (`5242880`), while `f64` re-serializes as `5242880.0`.
    fn normalize_value(v: &serde_json::Value) -> serde_json::Value {
        match v {
            serde_json::Value::Number(n) => match n.as_f64() {
                Some(f) => serde_json::json!(f),
                None => v.clone(),
            },
            serde_json::Value::Object(map) => serde_json::Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), normalize_value(v)))
                    .collect(),
            ),
            serde_json::Value::Array(arr) => {
                serde_json::Value::Array(arr.iter().map(normalize_value).collect())
            }
            _ => v.clone(),
        }
    }

    /// Deserializes a fixture, re-serializes it, and compares the JSON values
    /// (order-independent, float-normalized comparison).
    fn roundtrip_test<T>(name: &str)
    where
        T: serde::de::DeserializeOwned + serde::Serialize,
    {
        let fixture = load_fixture(name);
        let parsed: T = serde_json::from_value(fixture.clone())
            .unwrap_or_else(|e| panic!("failed to deserialize {name}: {e}"));
        let reserialized = serde_json::to_value(&parsed)
            .unwrap_or_else(|e| panic!("failed to re-serialize {name}: {e}"));

        assert_eq!(
            normalize_value(&fixture),
            normalize_value(&reserialized),
            "roundtrip mismatch for {name}:\n  wire: {fixture}\n  Rust: {reserialized}"
        );
    }

    fn token_handle(name: &str) -> TokenHandle {
        let token: UploadToken = parse_response(&read_fixture(name))
            .unwrap_or_else(|e| panic!("failed to parse {name}: {e}"));
        token.into()
    }

    // --- Upload token ---

    #[test]
    fn fixture_upload_token_add() {
        roundtrip_test::<UploadToken>("upload_token_add.json");

        let handle = token_handle("upload_token_add.json");
        assert_eq!(handle.id, "0_x9k2m4pq");
        assert_eq!(handle.status, TokenStatus::Pending);
        assert_eq!(handle.uploaded_bytes, 0);
    }

    #[test]
    fn fixture_upload_token_partial() {
        roundtrip_test::<UploadToken>("upload_token_get_partial.json");

        let handle = token_handle("upload_token_get_partial.json");
        assert_eq!(handle.status, TokenStatus::Partial);
        assert_eq!(handle.uploaded_bytes, 3_145_728);
        assert!(!handle.is_finalized(5_242_880));
    }

    #[test]
    fn fixture_upload_token_full() {
        roundtrip_test::<UploadToken>("upload_token_get_full.json");

        let handle = token_handle("upload_token_get_full.json");
        assert_eq!(handle.status, TokenStatus::Full);
        assert!(handle.is_finalized(5_242_880));
        assert!(!handle.is_finalized(5_242_881));
    }

    #[test]
    fn fixture_upload_token_closed_is_unknown() {
        let handle = token_handle("upload_token_closed.json");
        assert_eq!(handle.status, TokenStatus::Unknown);
        assert!(!handle.is_finalized(5_242_880));
    }

    // --- Errors ---

    #[test]
    fn fixture_api_exception() {
        roundtrip_test::<ApiException>("api_exception.json");

        let err = parse_response::<UploadToken>(&read_fixture("api_exception.json")).unwrap_err();
        match err {
            ResponseError::Api(exc) => {
                assert_eq!(exc.code, "UPLOAD_TOKEN_NOT_FOUND");
                assert!(exc.message.contains("0_missing"));
                assert!(exc.args.is_some());
            }
            other => panic!("expected API exception, got {other:?}"),
        }
    }

    // --- Reports ---

    #[test]
    fn fixture_upload_report() {
        roundtrip_test::<UploadReport>("upload_report.json");

        let report: UploadReport = serde_json::from_value(load_fixture("upload_report.json")).unwrap();
        assert_eq!(report.total_retries(), 2);
        let total: u64 = report.chunks.iter().map(|c| c.len).sum();
        assert_eq!(total, report.total_bytes);
        assert_eq!(report.chunks.iter().filter(|c| c.is_final).count(), 1);
    }
}
