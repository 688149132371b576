//! Resumable chunked upload flow.
//!
//! This crate implements the **business logic** for pushing one media file
//! to an upload-token service. It has no HTTP dependency; the caller
//! provides an [`UploadTransport`] that talks to the real service.
//!
//! # Pipeline
//!
//! 1. **Validate**: the file must exist, be a regular file and be non-empty
//! 2. **Token**: ask the service for an upload token
//! 3. **Upload**: send chunks in offset order, resizing them to the link
//! 4. **Finalize**: poll the token until the service reports it complete

pub mod config;
pub mod error;
pub mod orchestrator;
pub mod poller;
pub mod retry;
pub mod transport;
pub mod types;

// Re-export primary types for convenience.
pub use config::UploadSettings;
pub use error::{TransportError, UploadError};
pub use orchestrator::UploadOrchestrator;
pub use poller::{FinalizationPoller, PollState};
pub use retry::{Attempted, RetryError, RetryExecutor, RetryPolicy, Retryable};
pub use transport::{TransportFuture, UploadTransport};
pub use types::{ChunkReport, EventSink, RetryOperation, UploadEvent, UploadReport};
