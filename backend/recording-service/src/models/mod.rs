/// Data models for recording-service
///
/// This module defines structures for:
/// - Session: one acquire -> start -> stop recording lifecycle
/// - PendingAcquisition: write-ahead marker for an in-flight start
/// - Request/response DTOs for the HTTP surface
///
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, Result};

// ========================================
// Lifecycle
// ========================================

/// Session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Acquiring,
    Recording,
    Stopping,
    Stopped,
    Failed,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Acquiring => "acquiring",
            Self::Recording => "recording",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
            Self::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "acquiring" => Some(Self::Acquiring),
            "recording" => Some(Self::Recording),
            "stopping" => Some(Self::Stopping),
            "stopped" => Some(Self::Stopped),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Stopped | Self::Failed)
    }

    /// Forward edges of the lifecycle; anything non-terminal may fail.
    pub fn can_transition_to(&self, next: SessionState) -> bool {
        use SessionState::*;
        match (self, next) {
            (Acquiring, Recording) => true,
            (Recording, Stopping) => true,
            (Stopping, Stopped) => true,
            (from, Failed) => !from.is_terminal(),
            _ => false,
        }
    }
}

/// Output topology of a recording
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RecordingMode {
    /// All participants composited into one output
    #[default]
    #[serde(rename = "mix", alias = "mixed")]
    Mixed,
    /// One output per participant
    #[serde(rename = "individual")]
    Individual,
}

impl RecordingMode {
    /// Wire name used by the vendor API and the database
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mixed => "mix",
            Self::Individual => "individual",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "mix" | "mixed" => Some(Self::Mixed),
            "individual" => Some(Self::Individual),
            _ => None,
        }
    }
}

// ========================================
// Session
// ========================================

/// A single recording lifecycle for one channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    /// Vendor resource handle returned by acquire
    pub external_resource_id: String,
    /// Vendor session handle (sid) returned by start
    pub external_session_id: String,
    pub channel_name: String,
    /// uid the recorder itself joins the channel with
    pub recording_subject_id: String,
    pub mode: RecordingMode,
    pub state: SessionState,
    pub started_at: DateTime<Utc>,
    pub stopped_at: Option<DateTime<Utc>>,
    pub stored_file_keys: Vec<String>,
    pub last_error: Option<String>,
}

impl Session {
    /// A freshly started session, as persisted once acquire and start succeed.
    pub fn recording(
        external_resource_id: String,
        external_session_id: String,
        channel_name: String,
        recording_subject_id: String,
        mode: RecordingMode,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            external_resource_id,
            external_session_id,
            channel_name,
            recording_subject_id,
            mode,
            state: SessionState::Recording,
            started_at,
            stopped_at: None,
            stored_file_keys: Vec::new(),
            last_error: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.state == SessionState::Recording
    }

    pub fn duration_seconds(&self) -> i64 {
        self.stopped_at
            .map(|stopped| (stopped - self.started_at).num_seconds().max(0))
            .unwrap_or(0)
    }

    fn transition(&mut self, next: SessionState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(AppError::InvalidState(format!(
                "session {} cannot move from {} to {}",
                self.id,
                self.state.as_str(),
                next.as_str()
            )));
        }
        self.state = next;
        Ok(())
    }
}

/// Atomic mutation applied by `SessionStore::update`
#[derive(Debug, Clone)]
pub enum SessionUpdate {
    /// Upstream stop succeeded: Recording -> Stopping -> Stopped
    MarkStopped {
        stopped_at: DateTime<Utc>,
        file_keys: Vec<String>,
    },
    /// Upstream stop failed or timed out
    MarkFailed {
        stopped_at: DateTime<Utc>,
        reason: String,
    },
}

impl SessionUpdate {
    pub fn apply(self, session: &mut Session) -> Result<()> {
        match self {
            SessionUpdate::MarkStopped {
                stopped_at,
                file_keys,
            } => {
                session.transition(SessionState::Stopping)?;
                session.transition(SessionState::Stopped)?;
                session.stopped_at = Some(stopped_at);
                for key in file_keys {
                    if !session.stored_file_keys.contains(&key) {
                        session.stored_file_keys.push(key);
                    }
                }
            }
            SessionUpdate::MarkFailed { stopped_at, reason } => {
                session.transition(SessionState::Failed)?;
                session.stopped_at = Some(stopped_at);
                session.last_error = Some(reason);
            }
        }
        Ok(())
    }
}

/// Database row for `recording_sessions`
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SessionRow {
    pub id: Uuid,
    pub resource_id: String,
    pub sid: String,
    pub channel_name: String,
    pub recording_uid: String,
    pub mode: String,
    pub state: String,
    pub started_at: DateTime<Utc>,
    pub stopped_at: Option<DateTime<Utc>>,
    pub stored_file_keys: Vec<String>,
    pub last_error: Option<String>,
}

impl TryFrom<SessionRow> for Session {
    type Error = AppError;

    fn try_from(row: SessionRow) -> Result<Self> {
        let mode = RecordingMode::from_str(&row.mode).ok_or_else(|| {
            AppError::Internal(format!("session {} has unknown mode {}", row.id, row.mode))
        })?;
        let state = SessionState::from_str(&row.state).ok_or_else(|| {
            AppError::Internal(format!("session {} has unknown state {}", row.id, row.state))
        })?;

        Ok(Session {
            id: row.id,
            external_resource_id: row.resource_id,
            external_session_id: row.sid,
            channel_name: row.channel_name,
            recording_subject_id: row.recording_uid,
            mode,
            state,
            started_at: row.started_at,
            stopped_at: row.stopped_at,
            stored_file_keys: row.stored_file_keys,
            last_error: row.last_error,
        })
    }
}

/// Filter for `SessionStore::list`
#[derive(Debug, Clone, Default)]
pub struct SessionFilter {
    pub channel_contains: Option<String>,
    pub limit: i64,
}

impl SessionFilter {
    pub const DEFAULT_LIMIT: i64 = 20;
    pub const MAX_LIMIT: i64 = 100;

    pub fn new(channel_contains: Option<String>, limit: Option<i64>) -> Self {
        Self {
            channel_contains: channel_contains
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty()),
            limit: limit
                .unwrap_or(Self::DEFAULT_LIMIT)
                .clamp(1, Self::MAX_LIMIT),
        }
    }
}

// ========================================
// Pending acquisitions
// ========================================

/// Marker written before the first upstream call of `start`.
///
/// Promoted into a `Session` on success and deleted on handled failures;
/// markers that outlive the TTL belong to a crashed start and are swept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct PendingAcquisition {
    pub id: Uuid,
    pub channel_name: String,
    pub recording_uid: String,
    pub mode: String,
    pub resource_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl PendingAcquisition {
    pub fn new(channel_name: &str, recording_uid: &str, mode: RecordingMode) -> Self {
        Self {
            id: Uuid::new_v4(),
            channel_name: channel_name.to_string(),
            recording_uid: recording_uid.to_string(),
            mode: mode.as_str().to_string(),
            resource_id: None,
            created_at: Utc::now(),
        }
    }
}

// ========================================
// Playback
// ========================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    /// Single-file container
    Mp4,
    /// Streaming manifest
    Hls,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mp4 => "mp4",
            Self::Hls => "hls",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Mp4 => "video/mp4",
            Self::Hls => "application/vnd.apple.mpegurl",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Mp4 => ".mp4",
            Self::Hls => ".m3u8",
        }
    }
}

/// Time-limited read link for a recording
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackLink {
    pub url: String,
    pub key: String,
    pub media_kind: MediaKind,
    pub mime_type: String,
    pub expires_at: DateTime<Utc>,
}

// ========================================
// Validation
// ========================================

const MAX_CHANNEL_NAME_BYTES: usize = 64;
const CHANNEL_NAME_PUNCTUATION: &str = " !#$%&()+-:;<=.>?@[]^_{|}~,";

/// Channel names are limited to 64 bytes of ASCII letters, digits and the
/// punctuation set the vendor accepts.
pub fn validate_channel_name(channel: &str) -> Result<()> {
    if channel.is_empty() {
        return Err(AppError::InvalidArgument(
            "channel must not be empty".to_string(),
        ));
    }
    if channel.len() > MAX_CHANNEL_NAME_BYTES {
        return Err(AppError::InvalidArgument(format!(
            "channel must be at most {MAX_CHANNEL_NAME_BYTES} bytes"
        )));
    }
    if let Some(bad) = channel
        .chars()
        .find(|c| !c.is_ascii_alphanumeric() && !CHANNEL_NAME_PUNCTUATION.contains(*c))
    {
        return Err(AppError::InvalidArgument(format!(
            "channel contains unsupported character {bad:?}"
        )));
    }
    Ok(())
}

/// The recorder joins as a regular integer uid, so it must be a non-zero
/// unsigned 32-bit value.
pub fn validate_recording_uid(uid: &str) -> Result<u32> {
    let trimmed = uid.trim();
    if trimmed.is_empty() || !trimmed.chars().all(|c| c.is_ascii_digit()) {
        return Err(AppError::InvalidArgument(format!(
            "uid must be a positive integer, got {uid:?}"
        )));
    }
    match trimmed.parse::<u32>() {
        Ok(0) => Err(AppError::InvalidArgument(
            "uid 0 is reserved for vendor-assigned identities".to_string(),
        )),
        Ok(value) => Ok(value),
        Err(_) => Err(AppError::InvalidArgument(format!(
            "uid must fit in 32 bits, got {uid}"
        ))),
    }
}

// ========================================
// HTTP DTOs
// ========================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartRecordingRequest {
    pub channel: String,
    pub uid: Option<String>,
    pub mode: Option<RecordingMode>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartRecordingResponse {
    pub session_id: Uuid,
    pub resource_id: String,
    pub sid: String,
}

impl From<&Session> for StartRecordingResponse {
    fn from(session: &Session) -> Self {
        Self {
            session_id: session.id,
            resource_id: session.external_resource_id.clone(),
            sid: session.external_session_id.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StopRecordingResponse {
    pub session_id: Uuid,
    pub status: SessionState,
    pub file_keys: Vec<String>,
}

impl From<Session> for StopRecordingResponse {
    fn from(session: Session) -> Self {
        Self {
            session_id: session.id,
            status: session.state,
            file_keys: session.stored_file_keys,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListRecordingsQuery {
    pub channel: Option<String>,
    pub limit: Option<i64>,
}

/// List entry for `GET /recordings`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: Uuid,
    pub channel_name: String,
    pub mode: RecordingMode,
    pub state: SessionState,
    pub started_at: DateTime<Utc>,
    pub stopped_at: Option<DateTime<Utc>>,
    pub duration_seconds: i64,
    pub is_active: bool,
    pub file_count: usize,
}

impl From<&Session> for SessionSummary {
    fn from(session: &Session) -> Self {
        Self {
            id: session.id,
            channel_name: session.channel_name.clone(),
            mode: session.mode,
            state: session.state,
            started_at: session.started_at,
            stopped_at: session.stopped_at,
            duration_seconds: session.duration_seconds(),
            is_active: session.is_active(),
            file_count: session.stored_file_keys.len(),
        }
    }
}

/// Full detail for `GET /recordings/{id}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionResponse {
    #[serde(flatten)]
    pub session: Session,
    pub duration_seconds: i64,
    pub is_active: bool,
}

impl From<Session> for SessionResponse {
    fn from(session: Session) -> Self {
        Self {
            duration_seconds: session.duration_seconds(),
            is_active: session.is_active(),
            session,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenQuery {
    pub channel: Option<String>,
    pub uid: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub app_id: String,
    pub token: String,
    pub channel: String,
    pub uid: u32,
    pub expires_in: u32,
}
