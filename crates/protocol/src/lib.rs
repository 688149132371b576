//! Wire types for the media platform's `uploadtoken` service.
//!
//! Everything that must match the remote API byte for byte lives here:
//! action names, multipart field names, the token JSON shape and the
//! API exception envelope.

pub mod constants;
pub mod envelope;
pub mod types;

// Re-export primary types for convenience.
pub use constants::TokenAction;
pub use envelope::{ApiException, ResponseError, parse_response};
pub use types::{TokenHandle, TokenStatus, UploadToken};
