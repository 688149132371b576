//! Upload transport trait.
//!
//! `UploadTransport` is the only seam that talks to the network. The HTTP
//! client crate implements it against the real service; tests implement
//! it with scripted mocks.

use std::future::Future;
use std::pin::Pin;

use kmcp_protocol::TokenHandle;
use kmcp_transfer::ChunkPlan;

use crate::error::TransportError;

/// Boxed future returned by transport calls.
pub type TransportFuture<'a, T> =
    Pin<Box<dyn Future<Output = Result<T, TransportError>> + Send + 'a>>;

/// Abstract connection to the upload-token service.
pub trait UploadTransport: Send + Sync {
    /// Creates a server-side upload token for a file of `file_size` bytes.
    fn create_token<'a>(
        &'a self,
        file_name: &'a str,
        file_size: u64,
    ) -> TransportFuture<'a, TokenHandle>;

    /// Sends one chunk. The plan carries the payload, its offset and the
    /// resume/final flags.
    fn upload_chunk<'a>(
        &'a self,
        token_id: &'a str,
        chunk: &'a ChunkPlan,
    ) -> TransportFuture<'a, ()>;

    /// Fetches the token's current status and received byte count.
    fn get_token_status<'a>(&'a self, token_id: &'a str) -> TransportFuture<'a, TokenHandle>;
}

impl<T: UploadTransport + ?Sized> UploadTransport for std::sync::Arc<T> {
    fn create_token<'a>(
        &'a self,
        file_name: &'a str,
        file_size: u64,
    ) -> TransportFuture<'a, TokenHandle> {
        (**self).create_token(file_name, file_size)
    }

    fn upload_chunk<'a>(
        &'a self,
        token_id: &'a str,
        chunk: &'a ChunkPlan,
    ) -> TransportFuture<'a, ()> {
        (**self).upload_chunk(token_id, chunk)
    }

    fn get_token_status<'a>(&'a self, token_id: &'a str) -> TransportFuture<'a, TokenHandle> {
        (**self).get_token_status(token_id)
    }
}
