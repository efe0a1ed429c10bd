/// RTC join tokens for clients
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use super::media::MediaService;
use super::upstream::guarded;
use crate::error::{AppError, Result, UpstreamStep};
use crate::models::{validate_channel_name, TokenResponse};

#[derive(Clone)]
pub struct TokenIssuer {
    media: Arc<dyn MediaService>,
    app_id: String,
    ttl_secs: u32,
    upstream_timeout: Duration,
}

impl TokenIssuer {
    pub fn new(
        media: Arc<dyn MediaService>,
        app_id: impl Into<String>,
        ttl_secs: u32,
        upstream_timeout: Duration,
    ) -> Self {
        Self {
            media,
            app_id: app_id.into(),
            ttl_secs,
            upstream_timeout,
        }
    }

    /// Publisher token for `channel`. A missing uid means 0, which lets the
    /// vendor assign one on join.
    pub async fn issue(&self, channel: &str, uid: Option<&str>) -> Result<TokenResponse> {
        validate_channel_name(channel)?;
        let uid = parse_client_uid(uid)?;

        let token = guarded(
            UpstreamStep::MintToken,
            None,
            self.upstream_timeout,
            self.media.mint_token(channel, uid, self.ttl_secs),
        )
        .await?;

        info!(channel, uid, "issued rtc token");
        Ok(TokenResponse {
            app_id: self.app_id.clone(),
            token,
            channel: channel.to_string(),
            uid,
            expires_in: self.ttl_secs,
        })
    }
}

fn parse_client_uid(uid: Option<&str>) -> Result<u32> {
    let Some(raw) = uid.map(str::trim).filter(|raw| !raw.is_empty()) else {
        return Ok(0);
    };
    if !raw.chars().all(|c| c.is_ascii_digit()) {
        return Err(AppError::InvalidArgument(format!(
            "uid must be an unsigned integer, got {raw:?}"
        )));
    }
    raw.parse::<u32>()
        .map_err(|_| AppError::InvalidArgument(format!("uid must fit in 32 bits, got {raw}")))
}
