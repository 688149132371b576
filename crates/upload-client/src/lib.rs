//! Upload-token service HTTP client.
//!
//! Implements [`kmcp_uploader::UploadTransport`] over `reqwest`.

pub mod client;

pub use client::{Client, Error};
