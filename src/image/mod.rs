//! Image normalization ahead of durable storage
//!
//! Provider images arrive in whatever format the backend emits. Everything
//! stored in the bucket is re-encoded as maximally compressed PNG.

pub mod processor;

pub use processor::PngNormalizer;

use crate::Result;
use async_trait::async_trait;

pub const PNG_CONTENT_TYPE: &str = "image/png";

#[async_trait]
pub trait ImageService: Send + Sync {
    /// Decode `image_data` and re-encode it as PNG. Takes ownership so the
    /// work can move off the async executor.
    async fn normalize(&self, image_data: Vec<u8>) -> Result<Vec<u8>>;
}
