/// S3-backed `ObjectStore`
///
/// Lists the recording files the vendor uploaded and presigns time-limited
/// GET URLs for playback. Credentials come from config when present,
/// otherwise from the default AWS credential chain.
use async_trait::async_trait;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::Client;
use std::time::Duration;

use super::{ObjectStore, StoredObject};
use crate::config::S3Config;
use crate::services::upstream::UpstreamError;

#[derive(Clone)]
pub struct S3ObjectStore {
    client: Client,
    bucket: String,
}

impl S3ObjectStore {
    pub fn new(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    /// Build the client from config
    pub async fn from_config(config: &S3Config) -> Self {
        let mut aws_config_builder = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(config.region.clone()));

        if let (Some(access_key_id), Some(secret_access_key)) =
            (&config.access_key_id, &config.secret_access_key)
        {
            let credentials = Credentials::new(
                access_key_id,
                secret_access_key,
                None,
                None,
                "recording_service_s3",
            );
            aws_config_builder = aws_config_builder.credentials_provider(credentials);
        }

        // S3-compatible storage such as MinIO
        if let Some(endpoint) = &config.endpoint {
            aws_config_builder = aws_config_builder.endpoint_url(endpoint);
        }

        let aws_config = aws_config_builder.load().await;
        Self::new(Client::new(&aws_config), config.bucket.clone())
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn list_by_prefix(&self, prefix: &str) -> Result<Vec<StoredObject>, UpstreamError> {
        let mut objects = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let response = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(prefix)
                .set_continuation_token(continuation.take())
                .send()
                .await
                .map_err(|e| UpstreamError::Transport(format!("S3 list {prefix}: {e}")))?;

            objects.extend(response.contents().iter().filter_map(|obj| {
                obj.key().map(|key| StoredObject {
                    key: key.to_string(),
                    size: obj.size().unwrap_or(0),
                })
            }));

            match response.next_continuation_token() {
                Some(token) if response.is_truncated().unwrap_or(false) => {
                    continuation = Some(token.to_string());
                }
                _ => break,
            }
        }

        objects.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(objects)
    }

    async fn signed_read_url(&self, key: &str, ttl: Duration) -> Result<String, UpstreamError> {
        let presigning_config = PresigningConfig::expires_in(ttl)
            .map_err(|e| UpstreamError::Malformed(format!("invalid presign expiry: {e}")))?;

        let presigned_request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presigning_config)
            .await
            .map_err(|e| UpstreamError::Transport(format!("S3 presign {key}: {e}")))?;

        Ok(presigned_request.uri().to_string())
    }
}
