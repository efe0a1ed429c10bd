/// Object storage contract
///
/// Recording files land in the bucket asynchronously, after the vendor's
/// stop call has already returned; readers list by prefix to see what has
/// arrived so far.
use async_trait::async_trait;
use std::time::Duration;

use super::upstream::UpstreamError;

pub mod s3;

pub use s3::S3ObjectStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub key: String,
    pub size: i64,
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Every object under `prefix`, ordered by key.
    async fn list_by_prefix(&self, prefix: &str) -> Result<Vec<StoredObject>, UpstreamError>;

    /// Presigned GET URL valid for `ttl`.
    async fn signed_read_url(&self, key: &str, ttl: Duration) -> Result<String, UpstreamError>;
}
