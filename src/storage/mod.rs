//! Durable object storage for relocated images
//!
//! Uploads normalized PNGs to an S3 bucket and hands out time-limited signed
//! GET URLs for them.

pub mod client;
pub mod mock;

pub use client::S3ObjectStorage;
pub use mock::MockObjectStorage;

use crate::Result;
use async_trait::async_trait;
use std::time::Duration;

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn put_object(&self, key: &str, data: Vec<u8>, content_type: &str) -> Result<()>;
    async fn presign_get(&self, key: &str, expires_in: Duration) -> Result<String>;
}
