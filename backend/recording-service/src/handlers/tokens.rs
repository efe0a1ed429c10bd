/// Token handlers - RTC join tokens for clients
use actix_web::{web, HttpResponse};

use crate::error::{AppError, Result};
use crate::models::TokenQuery;
use crate::services::TokenIssuer;

/// Issue a publisher token for a channel
pub async fn issue_token(
    issuer: web::Data<TokenIssuer>,
    query: web::Query<TokenQuery>,
) -> Result<HttpResponse> {
    let channel = query
        .channel
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .ok_or_else(|| AppError::InvalidArgument("channel is required".to_string()))?;

    let token = issuer.issue(channel, query.uid.as_deref()).await?;
    Ok(HttpResponse::Ok().json(token))
}
