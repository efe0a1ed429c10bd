/// Playback link resolution
///
/// Picks one playable file for a stopped session and signs a read URL for it.
/// Uploads finish after the vendor's stop returns, so when the session holds
/// no file keys yet the bucket is listed again on every call. Nothing here
/// writes to the session.
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

use super::storage::ObjectStore;
use super::upstream::guarded;
use crate::config::{S3Config, UpstreamConfig};
use crate::db::SessionStore;
use crate::error::{AppError, Result, UpstreamStep};
use crate::models::{MediaKind, PlaybackLink, SessionState};

#[derive(Debug, Clone)]
pub struct PlaybackSettings {
    /// Bucket prefix the vendor writes under, without surrounding slashes
    pub key_prefix: String,
    pub url_ttl: Duration,
    pub upstream_timeout: Duration,
}

impl PlaybackSettings {
    pub fn from_config(s3: &S3Config, upstream: &UpstreamConfig) -> Self {
        Self {
            key_prefix: s3.prefix_segments().join("/"),
            url_ttl: s3.playback_url_ttl(),
            upstream_timeout: upstream.timeout(),
        }
    }

    /// Every file of a recording starts with `{sid}_` below the prefix. The
    /// separator keeps `sid-1` from matching `sid-10`'s files.
    pub fn session_prefix(&self, sid: &str) -> String {
        if self.key_prefix.is_empty() {
            format!("{sid}_")
        } else {
            format!("{}/{}_", self.key_prefix, sid)
        }
    }
}

/// Choose the key to play back.
///
/// Any `.mp4` wins, smallest key first. Otherwise the shortest `.m3u8` name,
/// which is usually the top-level manifest rather than a nested segment
/// list; equal lengths fall back to key order.
pub fn select_playback_key(keys: &[String]) -> Option<(String, MediaKind)> {
    if let Some(key) = keys
        .iter()
        .filter(|key| key.ends_with(MediaKind::Mp4.extension()))
        .min()
    {
        return Some((key.clone(), MediaKind::Mp4));
    }

    keys.iter()
        .filter(|key| key.ends_with(MediaKind::Hls.extension()))
        .min_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)))
        .map(|key| (key.clone(), MediaKind::Hls))
}

#[derive(Clone)]
pub struct PlaybackResolver {
    store: Arc<dyn SessionStore>,
    objects: Arc<dyn ObjectStore>,
    settings: PlaybackSettings,
}

impl PlaybackResolver {
    pub fn new(
        store: Arc<dyn SessionStore>,
        objects: Arc<dyn ObjectStore>,
        settings: PlaybackSettings,
    ) -> Self {
        Self {
            store,
            objects,
            settings,
        }
    }

    /// `Ok(None)` means no playable file exists yet.
    pub async fn resolve(&self, id: Uuid) -> Result<Option<PlaybackLink>> {
        let session = self.store.read(id).await?;
        if session.state != SessionState::Stopped {
            return Err(AppError::InvalidState(format!(
                "session {} is {}, playback needs a stopped recording",
                id,
                session.state.as_str()
            )));
        }

        let keys = if session.stored_file_keys.is_empty() {
            let prefix = self.settings.session_prefix(&session.external_session_id);
            let listed = guarded(
                UpstreamStep::ListObjects,
                Some(id),
                self.settings.upstream_timeout,
                self.objects.list_by_prefix(&prefix),
            )
            .await?;
            debug!(session_id = %id, prefix = %prefix, found = listed.len(), "listed recording files");
            listed.into_iter().map(|object| object.key).collect()
        } else {
            session.stored_file_keys
        };

        let Some((key, media_kind)) = select_playback_key(&keys) else {
            debug!(session_id = %id, candidates = keys.len(), "no playable file yet");
            return Ok(None);
        };

        let url = guarded(
            UpstreamStep::SignUrl,
            Some(id),
            self.settings.upstream_timeout,
            self.objects.signed_read_url(&key, self.settings.url_ttl),
        )
        .await?;

        let expires_at = Utc::now()
            + chrono::Duration::from_std(self.settings.url_ttl)
                .map_err(|e| AppError::Internal(format!("playback ttl out of range: {e}")))?;

        Ok(Some(PlaybackLink {
            url,
            key,
            media_kind,
            mime_type: media_kind.mime_type().to_string(),
            expires_at,
        }))
    }
}
