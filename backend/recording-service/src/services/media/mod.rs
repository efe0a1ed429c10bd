/// Media vendor contract
///
/// The orchestrator only sees this trait; `AgoraCloudRecording` is the
/// production implementation.
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::upstream::UpstreamError;
use crate::models::RecordingMode;

pub mod agora;

pub use agora::AgoraCloudRecording;

/// Result of a successful upstream stop
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StopOutcome {
    /// Object keys the vendor reported, possibly empty while uploads finish
    pub file_keys: Vec<String>,
    pub uploading_status: Option<String>,
}

/// Vendor view of a running or finished recording
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingStatus {
    /// Vendor status code (e.g. 5 = recording in progress)
    pub status: Option<i64>,
    pub file_keys: Vec<String>,
    pub server_response: serde_json::Value,
}

#[async_trait]
pub trait MediaService: Send + Sync {
    async fn acquire_resource(&self, channel: &str, uid: &str) -> Result<String, UpstreamError>;

    async fn mint_token(&self, channel: &str, uid: u32, ttl_secs: u32)
        -> Result<String, UpstreamError>;

    /// Returns the vendor session id (sid).
    async fn start_recording(
        &self,
        resource_id: &str,
        channel: &str,
        uid: &str,
        token: &str,
        mode: RecordingMode,
    ) -> Result<String, UpstreamError>;

    async fn stop_recording(
        &self,
        resource_id: &str,
        sid: &str,
        channel: &str,
        uid: &str,
        mode: RecordingMode,
    ) -> Result<StopOutcome, UpstreamError>;

    async fn query_status(
        &self,
        resource_id: &str,
        sid: &str,
        mode: RecordingMode,
    ) -> Result<RecordingStatus, UpstreamError>;
}
