/// Agora Cloud Recording REST client
///
/// Drives acquire/start/stop/query against the vendor REST API with HTTP
/// Basic auth (customer id / secret). Recording output is written by the
/// vendor straight into our S3 bucket, so the start request carries the
/// storage credentials and key prefix.
///
/// Tokens come from the vendor token service; signing stays there.
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::{MediaService, RecordingStatus, StopOutcome};
use crate::config::{agora_region_code, AgoraConfig, ConfigError, S3Config};
use crate::models::RecordingMode;
use crate::services::upstream::UpstreamError;

/// Storage vendor code for Amazon S3
const STORAGE_VENDOR_AWS: u8 = 1;
/// Communication channel profile
const CHANNEL_TYPE_COMMUNICATION: u8 = 0;
/// Record both audio and video
const STREAM_TYPES_AUDIO_VIDEO: u8 = 2;
/// Seconds without publishers before the vendor ends a recording on its own
const MAX_IDLE_TIME_SECS: u32 = 30;

// ========================================
// Request bodies
// ========================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AcquireBody<'a> {
    cname: &'a str,
    uid: &'a str,
    client_request: AcquireClientRequest,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AcquireClientRequest {
    resource_expired_hour: u32,
    scene: u8,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StartBody<'a> {
    cname: &'a str,
    uid: &'a str,
    client_request: StartClientRequest<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StartClientRequest<'a> {
    token: &'a str,
    recording_config: RecordingConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    recording_file_config: Option<RecordingFileConfig<'a>>,
    storage_config: &'a StorageConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RecordingConfig {
    channel_type: u8,
    stream_types: u8,
    max_idle_time: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    transcoding_config: Option<TranscodingConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    subscribe_uid_group: Option<u8>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TranscodingConfig {
    width: u32,
    height: u32,
    fps: u32,
    bitrate: u32,
    mixed_video_layout: u8,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RecordingFileConfig<'a> {
    av_file_type: &'a [String],
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct StorageConfig {
    vendor: u8,
    region: u8,
    bucket: String,
    access_key: String,
    secret_key: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    file_name_prefix: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StopBody<'a> {
    cname: &'a str,
    uid: &'a str,
    client_request: serde_json::Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TokenBody<'a> {
    token_type: &'static str,
    channel: &'a str,
    role: &'static str,
    uid: String,
    expire: u32,
}

// ========================================
// Response bodies
// ========================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AcquireResponse {
    resource_id: String,
}

#[derive(Debug, Deserialize)]
struct StartResponse {
    sid: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StopResponse {
    #[serde(default)]
    server_response: Option<StopServerResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StopServerResponse {
    #[serde(default)]
    file_list: Option<FileList>,
    #[serde(default)]
    uploading_status: Option<String>,
}

/// `fileListMode = "string"` yields one file name, `"json"` an array.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FileList {
    Single(String),
    Entries(Vec<FileEntry>),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileEntry {
    file_name: String,
}

impl FileList {
    fn into_keys(self) -> Vec<String> {
        match self {
            FileList::Single(name) if name.trim().is_empty() => Vec::new(),
            FileList::Single(name) => vec![name],
            FileList::Entries(entries) => {
                let mut keys = Vec::with_capacity(entries.len());
                for entry in entries {
                    if !entry.file_name.is_empty() && !keys.contains(&entry.file_name) {
                        keys.push(entry.file_name);
                    }
                }
                keys
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: String,
}

// ========================================
// Client
// ========================================

#[derive(Clone)]
pub struct AgoraCloudRecording {
    http: Client,
    api_base: String,
    customer_id: String,
    customer_secret: String,
    token_service_url: String,
    resource_expired_hours: u32,
    file_types: Vec<String>,
    storage: StorageConfig,
}

impl AgoraCloudRecording {
    pub fn new(
        agora: &AgoraConfig,
        s3: &S3Config,
        request_timeout: Duration,
    ) -> Result<Self, ConfigError> {
        let region = agora_region_code(&s3.region).ok_or_else(|| ConfigError::Invalid {
            name: "AWS_REGION",
            reason: format!("{} has no cloud recording region code", s3.region),
        })?;
        let access_key = s3
            .access_key_id
            .clone()
            .ok_or(ConfigError::Missing("AWS_ACCESS_KEY_ID"))?;
        let secret_key = s3
            .secret_access_key
            .clone()
            .ok_or(ConfigError::Missing("AWS_SECRET_ACCESS_KEY"))?;

        let http = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| ConfigError::Invalid {
                name: "UPSTREAM_TIMEOUT_MS",
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            http,
            api_base: format!(
                "{}/v1/apps/{}/cloud_recording",
                agora.api_base_url.trim_end_matches('/'),
                agora.app_id
            ),
            customer_id: agora.customer_id.clone(),
            customer_secret: agora.customer_secret.clone(),
            token_service_url: agora.token_service_url.trim_end_matches('/').to_string(),
            resource_expired_hours: agora.resource_expired_hours,
            file_types: agora.file_types.clone(),
            storage: StorageConfig {
                vendor: STORAGE_VENDOR_AWS,
                region,
                bucket: s3.bucket.clone(),
                access_key,
                secret_key,
                file_name_prefix: s3.prefix_segments(),
            },
        })
    }

    fn session_url(&self, resource_id: &str, sid: &str, mode: RecordingMode, action: &str) -> String {
        format!(
            "{}/resourceid/{}/sid/{}/mode/{}/{}",
            self.api_base,
            resource_id,
            sid,
            mode.as_str(),
            action
        )
    }

    fn recording_config(mode: RecordingMode) -> RecordingConfig {
        match mode {
            RecordingMode::Mixed => RecordingConfig {
                channel_type: CHANNEL_TYPE_COMMUNICATION,
                stream_types: STREAM_TYPES_AUDIO_VIDEO,
                max_idle_time: MAX_IDLE_TIME_SECS,
                transcoding_config: Some(TranscodingConfig {
                    width: 1280,
                    height: 720,
                    fps: 15,
                    bitrate: 1130,
                    mixed_video_layout: 1,
                }),
                subscribe_uid_group: None,
            },
            RecordingMode::Individual => RecordingConfig {
                channel_type: CHANNEL_TYPE_COMMUNICATION,
                stream_types: STREAM_TYPES_AUDIO_VIDEO,
                max_idle_time: MAX_IDLE_TIME_SECS,
                transcoding_config: None,
                subscribe_uid_group: Some(0),
            },
        }
    }

    async fn post_json<B, R>(&self, url: &str, body: &B) -> Result<R, UpstreamError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let response = self
            .http
            .post(url)
            .basic_auth(&self.customer_id, Some(&self.customer_secret))
            .json(body)
            .send()
            .await?;
        decode(response).await
    }
}

async fn decode<R: DeserializeOwned>(response: Response) -> Result<R, UpstreamError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(UpstreamError::Rejected {
            status: status.as_u16(),
            body,
        });
    }
    response
        .json::<R>()
        .await
        .map_err(|e| UpstreamError::Malformed(e.to_string()))
}

fn parse_status(server_response: serde_json::Value) -> Result<RecordingStatus, UpstreamError> {
    let status = server_response.get("status").and_then(|s| s.as_i64());
    let file_keys = match server_response.get("fileList") {
        Some(raw) if !raw.is_null() => serde_json::from_value::<FileList>(raw.clone())
            .map_err(|e| UpstreamError::Malformed(format!("fileList: {e}")))?
            .into_keys(),
        _ => Vec::new(),
    };
    Ok(RecordingStatus {
        status,
        file_keys,
        server_response,
    })
}

#[async_trait]
impl MediaService for AgoraCloudRecording {
    async fn acquire_resource(&self, channel: &str, uid: &str) -> Result<String, UpstreamError> {
        let body = AcquireBody {
            cname: channel,
            uid,
            client_request: AcquireClientRequest {
                resource_expired_hour: self.resource_expired_hours,
                scene: 0,
            },
        };
        let response: AcquireResponse = self
            .post_json(&format!("{}/acquire", self.api_base), &body)
            .await?;
        debug!(channel, resource_id = %response.resource_id, "resource acquired");
        Ok(response.resource_id)
    }

    async fn mint_token(
        &self,
        channel: &str,
        uid: u32,
        ttl_secs: u32,
    ) -> Result<String, UpstreamError> {
        let body = TokenBody {
            token_type: "rtc",
            channel,
            role: "publisher",
            uid: uid.to_string(),
            expire: ttl_secs,
        };
        let response = self
            .http
            .post(format!("{}/getToken", self.token_service_url))
            .json(&body)
            .send()
            .await?;
        let token: TokenResponse = decode(response).await?;
        Ok(token.token)
    }

    async fn start_recording(
        &self,
        resource_id: &str,
        channel: &str,
        uid: &str,
        token: &str,
        mode: RecordingMode,
    ) -> Result<String, UpstreamError> {
        let recording_file_config = match mode {
            RecordingMode::Mixed if !self.file_types.is_empty() => Some(RecordingFileConfig {
                av_file_type: &self.file_types,
            }),
            _ => None,
        };
        let body = StartBody {
            cname: channel,
            uid,
            client_request: StartClientRequest {
                token,
                recording_config: Self::recording_config(mode),
                recording_file_config,
                storage_config: &self.storage,
            },
        };
        let url = format!(
            "{}/resourceid/{}/mode/{}/start",
            self.api_base,
            resource_id,
            mode.as_str()
        );
        let response: StartResponse = self.post_json(&url, &body).await?;
        debug!(channel, resource_id, sid = %response.sid, "recording started");
        Ok(response.sid)
    }

    async fn stop_recording(
        &self,
        resource_id: &str,
        sid: &str,
        channel: &str,
        uid: &str,
        mode: RecordingMode,
    ) -> Result<StopOutcome, UpstreamError> {
        let body = StopBody {
            cname: channel,
            uid,
            client_request: serde_json::json!({}),
        };
        let response: StopResponse = self
            .post_json(&self.session_url(resource_id, sid, mode, "stop"), &body)
            .await?;

        let outcome = match response.server_response {
            Some(server) => StopOutcome {
                file_keys: server.file_list.map(FileList::into_keys).unwrap_or_default(),
                uploading_status: server.uploading_status,
            },
            None => StopOutcome::default(),
        };
        debug!(
            resource_id,
            sid,
            files = outcome.file_keys.len(),
            uploading_status = ?outcome.uploading_status,
            "recording stopped"
        );
        Ok(outcome)
    }

    async fn query_status(
        &self,
        resource_id: &str,
        sid: &str,
        mode: RecordingMode,
    ) -> Result<RecordingStatus, UpstreamError> {
        let response = self
            .http
            .get(self.session_url(resource_id, sid, mode, "query"))
            .basic_auth(&self.customer_id, Some(&self.customer_secret))
            .send()
            .await?;
        let mut payload: serde_json::Value = decode(response).await?;
        let server_response = payload
            .get_mut("serverResponse")
            .map(serde_json::Value::take)
            .unwrap_or(serde_json::Value::Null);
        parse_status(server_response)
    }
}
