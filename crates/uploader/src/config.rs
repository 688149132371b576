//! Upload settings.
//!
//! Deserializable from the `[upload]` table of the CLI's TOML config;
//! every key is optional.

use std::time::Duration;

use kmcp_transfer::ChunkSizing;
use serde::{Deserialize, Serialize};

use crate::error::UploadError;
use crate::retry::RetryPolicy;

/// Tunables for one upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadSettings {
    /// Chunk sizing and adaptation.
    #[serde(default)]
    pub chunking: ChunkSizing,

    /// Retry policy for token creation.
    #[serde(default)]
    pub create_retry: RetryPolicy,

    /// Retry policy for each chunk.
    #[serde(default)]
    pub chunk_retry: RetryPolicy,

    /// Retry policy for each status call.
    #[serde(default)]
    pub status_retry: RetryPolicy,

    /// Poll count and backoff while waiting for finalization.
    #[serde(default)]
    pub finalize: RetryPolicy,

    /// Per-request timeout for transport calls, in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Capacity of the progress event channel.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

fn default_request_timeout_secs() -> u64 {
    kmcp_protocol::constants::CHUNK_REQUEST_TIMEOUT.as_secs()
}

fn default_event_capacity() -> usize {
    256
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            chunking: ChunkSizing::default(),
            create_retry: RetryPolicy::default(),
            chunk_retry: RetryPolicy::default(),
            status_retry: RetryPolicy::default(),
            finalize: RetryPolicy::default(),
            request_timeout_secs: default_request_timeout_secs(),
            event_capacity: default_event_capacity(),
        }
    }
}

impl UploadSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Rejects settings an upload cannot run with.
    pub fn validate(&self) -> Result<(), UploadError> {
        self.chunking
            .validate()
            .map_err(|e| UploadError::Settings(e.to_string()))?;

        for (name, policy) in [
            ("create_retry", &self.create_retry),
            ("chunk_retry", &self.chunk_retry),
            ("status_retry", &self.status_retry),
            ("finalize", &self.finalize),
        ] {
            if policy.max_attempts == 0 {
                return Err(UploadError::Settings(format!(
                    "{name}.max_attempts must be at least 1"
                )));
            }
        }

        if self.request_timeout_secs == 0 {
            return Err(UploadError::Settings(
                "request_timeout_secs must be positive".into(),
            ));
        }
        if self.event_capacity == 0 {
            return Err(UploadError::Settings(
                "event_capacity must be positive".into(),
            ));
        }
        Ok(())
    }
}
