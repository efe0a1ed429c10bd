/// Recording session orchestrator
///
/// Drives a session through acquire -> start -> stop against the media
/// vendor and keeps `SessionStore` in step with it.
///
/// Failure rules:
/// - `start` persists nothing unless every upstream step succeeded. A
///   `PendingAcquisition` marker covers the window between acquire and the
///   durable write; the sweeper removes markers a crash left behind.
/// - `stop` records an upstream failure (the session becomes `Failed`) and
///   never retries on its own.
/// - Upstream calls are bounded by the configured timeout; a timeout is an
///   ordinary upstream failure.
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::locks::SessionLocks;
use super::media::{MediaService, RecordingStatus};
use super::upstream::guarded;
use crate::config::{AgoraConfig, UpstreamConfig};
use crate::db::SessionStore;
use crate::error::{AppError, Result, UpstreamStep};
use crate::metrics;
use crate::models::{
    validate_channel_name, validate_recording_uid, PendingAcquisition, RecordingMode, Session,
    SessionFilter, SessionState, SessionSummary, SessionUpdate,
};

#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    /// uid the recorder joins with when the caller gives none
    pub default_recording_uid: String,
    pub token_ttl_secs: u32,
    pub upstream_timeout: Duration,
}

impl OrchestratorSettings {
    pub fn from_config(agora: &AgoraConfig, upstream: &UpstreamConfig) -> Self {
        Self {
            default_recording_uid: agora.recording_uid.clone(),
            token_ttl_secs: agora.token_ttl_secs,
            upstream_timeout: upstream.timeout(),
        }
    }
}

#[derive(Clone)]
pub struct RecordingOrchestrator {
    store: Arc<dyn SessionStore>,
    media: Arc<dyn MediaService>,
    locks: SessionLocks,
    settings: OrchestratorSettings,
}

impl RecordingOrchestrator {
    pub fn new(
        store: Arc<dyn SessionStore>,
        media: Arc<dyn MediaService>,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            store,
            media,
            locks: SessionLocks::new(),
            settings,
        }
    }

    /// Acquire a vendor resource, mint a recorder token and start recording.
    ///
    /// Returns the new session in `Recording`. On any failure no session is
    /// created.
    pub async fn start(
        &self,
        channel: &str,
        recording_uid: Option<&str>,
        mode: RecordingMode,
    ) -> Result<Session> {
        let uid_str = recording_uid
            .map(str::trim)
            .filter(|uid| !uid.is_empty())
            .unwrap_or(&self.settings.default_recording_uid)
            .to_string();

        validate_channel_name(channel)?;
        let uid = validate_recording_uid(&uid_str)?;

        let pending = PendingAcquisition::new(channel, &uid_str, mode);
        self.store.record_pending(&pending).await?;

        match self.start_upstream(&pending, channel, &uid_str, uid, mode).await {
            Ok((resource_id, sid)) => {
                let session = Session::recording(
                    resource_id,
                    sid,
                    channel.to_string(),
                    uid_str,
                    mode,
                    Utc::now(),
                );
                let session = match self.store.promote_pending(pending.id, session).await {
                    Ok(session) => session,
                    Err(err) => {
                        // The vendor is recording but we hold no session for it;
                        // the marker stays so the sweeper reports the resource.
                        error!(
                            channel,
                            pending_id = %pending.id,
                            error = %err,
                            "failed to persist started recording"
                        );
                        return Err(err);
                    }
                };

                metrics::record_transition(SessionState::Recording);
                info!(
                    session_id = %session.id,
                    channel,
                    resource_id = %session.external_resource_id,
                    sid = %session.external_session_id,
                    mode = mode.as_str(),
                    "recording started"
                );
                Ok(session)
            }
            Err(err) => {
                if let Err(discard_err) = self.store.discard_pending(pending.id).await {
                    warn!(
                        pending_id = %pending.id,
                        error = %discard_err,
                        "failed to discard pending acquisition"
                    );
                }
                Err(err)
            }
        }
    }

    async fn start_upstream(
        &self,
        pending: &PendingAcquisition,
        channel: &str,
        uid_str: &str,
        uid: u32,
        mode: RecordingMode,
    ) -> Result<(String, String)> {
        let timeout = self.settings.upstream_timeout;

        let resource_id = guarded(
            UpstreamStep::Acquire,
            None,
            timeout,
            self.media.acquire_resource(channel, uid_str),
        )
        .await?;

        if let Err(err) = self
            .store
            .attach_pending_resource(pending.id, &resource_id)
            .await
        {
            warn!(
                pending_id = %pending.id,
                resource_id = %resource_id,
                error = %err,
                "failed to note acquired resource on pending marker"
            );
        }

        let token = guarded(
            UpstreamStep::MintToken,
            None,
            timeout,
            self.media
                .mint_token(channel, uid, self.settings.token_ttl_secs),
        )
        .await?;

        let sid = guarded(
            UpstreamStep::Start,
            None,
            timeout,
            self.media
                .start_recording(&resource_id, channel, uid_str, &token, mode),
        )
        .await?;

        Ok((resource_id, sid))
    }

    /// Stop a recording.
    ///
    /// Idempotent once the session is terminal: the stored record comes back
    /// unchanged and the vendor is not called again.
    ///
    /// The locked section runs on its own task, so a caller that goes away
    /// mid-call cannot leave a stopped vendor recording marked `Recording`.
    pub async fn stop(&self, id: Uuid) -> Result<Session> {
        let this = self.clone();
        tokio::spawn(async move { this.stop_locked(id).await })
            .await
            .map_err(|e| AppError::Internal(format!("stop task for session {id} failed: {e}")))?
    }

    async fn stop_locked(&self, id: Uuid) -> Result<Session> {
        let _guard = self.locks.acquire(id).await;

        let session = self.store.read(id).await?;
        if session.state.is_terminal() {
            debug!(session_id = %id, state = session.state.as_str(), "stop on terminal session");
            return Ok(session);
        }
        if session.state != SessionState::Recording {
            return Err(AppError::InvalidState(format!(
                "session {} is {}, only recording sessions can be stopped",
                id,
                session.state.as_str()
            )));
        }

        let outcome = guarded(
            UpstreamStep::Stop,
            Some(id),
            self.settings.upstream_timeout,
            self.media.stop_recording(
                &session.external_resource_id,
                &session.external_session_id,
                &session.channel_name,
                &session.recording_subject_id,
                session.mode,
            ),
        )
        .await;

        match outcome {
            Ok(stopped) => {
                let change = SessionUpdate::MarkStopped {
                    stopped_at: Utc::now(),
                    file_keys: stopped.file_keys,
                };
                let updated = match self.store.update(id, change).await {
                    Ok(updated) => updated,
                    Err(AppError::InvalidState(reason)) => {
                        return self.settled_elsewhere(id, reason).await
                    }
                    Err(err) => return Err(err),
                };
                metrics::record_transition(SessionState::Stopped);
                info!(
                    session_id = %id,
                    files = updated.stored_file_keys.len(),
                    uploading_status = ?stopped.uploading_status,
                    "recording stopped"
                );
                Ok(updated)
            }
            Err(err) => {
                let change = SessionUpdate::MarkFailed {
                    stopped_at: Utc::now(),
                    reason: err.to_string(),
                };
                match self.store.update(id, change).await {
                    Ok(_) => {
                        metrics::record_transition(SessionState::Failed);
                        warn!(session_id = %id, error = %err, "stop failed, session marked failed");
                    }
                    Err(AppError::InvalidState(reason)) => {
                        return self.settled_elsewhere(id, reason).await
                    }
                    Err(persist_err) => error!(
                        session_id = %id,
                        error = %err,
                        persist_error = %persist_err,
                        "stop failed and the failure could not be recorded"
                    ),
                }
                Err(err)
            }
        }
    }

    /// Another process finished the session while our vendor call was in
    /// flight; its terminal record stands.
    async fn settled_elsewhere(&self, id: Uuid, reason: String) -> Result<Session> {
        let current = self.store.read(id).await?;
        if current.state.is_terminal() {
            info!(
                session_id = %id,
                state = current.state.as_str(),
                "session already settled by a concurrent stop"
            );
            Ok(current)
        } else {
            Err(AppError::InvalidState(reason))
        }
    }

    /// Vendor-side status; never mutates the session.
    pub async fn query(&self, id: Uuid) -> Result<RecordingStatus> {
        let session = self.store.read(id).await?;
        guarded(
            UpstreamStep::Query,
            Some(id),
            self.settings.upstream_timeout,
            self.media.query_status(
                &session.external_resource_id,
                &session.external_session_id,
                session.mode,
            ),
        )
        .await
    }

    pub async fn get(&self, id: Uuid) -> Result<Session> {
        self.store.read(id).await
    }

    pub async fn list(&self, filter: &SessionFilter) -> Result<Vec<SessionSummary>> {
        let sessions = self.store.list(filter).await?;
        Ok(sessions.iter().map(SessionSummary::from).collect())
    }
}
