/// Recording handlers - HTTP endpoints for session lifecycle and playback
use actix_web::{web, HttpResponse};
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::{
    ListRecordingsQuery, SessionFilter, SessionResponse, StartRecordingRequest,
    StartRecordingResponse, StopRecordingResponse,
};
use crate::services::{PlaybackResolver, RecordingOrchestrator};

fn parse_session_id(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw)
        .map_err(|_| AppError::InvalidArgument(format!("invalid session id: {raw}")))
}

/// Start a cloud recording for a channel
pub async fn start_recording(
    orchestrator: web::Data<RecordingOrchestrator>,
    req: web::Json<StartRecordingRequest>,
) -> Result<HttpResponse> {
    let req = req.into_inner();
    let session = orchestrator
        .start(
            req.channel.trim(),
            req.uid.as_deref(),
            req.mode.unwrap_or_default(),
        )
        .await?;

    Ok(HttpResponse::Created().json(StartRecordingResponse::from(&session)))
}

/// Stop a recording; repeated calls return the stored outcome
pub async fn stop_recording(
    orchestrator: web::Data<RecordingOrchestrator>,
    session_id: web::Path<String>,
) -> Result<HttpResponse> {
    let id = parse_session_id(&session_id)?;
    let session = orchestrator.stop(id).await?;
    Ok(HttpResponse::Ok().json(StopRecordingResponse::from(session)))
}

/// Vendor-side status of a recording
pub async fn query_recording(
    orchestrator: web::Data<RecordingOrchestrator>,
    session_id: web::Path<String>,
) -> Result<HttpResponse> {
    let id = parse_session_id(&session_id)?;
    let status = orchestrator.query(id).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "session_id": id,
        "status": status.status,
        "file_keys": status.file_keys,
        "server_response": status.server_response,
    })))
}

pub async fn get_recording(
    orchestrator: web::Data<RecordingOrchestrator>,
    session_id: web::Path<String>,
) -> Result<HttpResponse> {
    let id = parse_session_id(&session_id)?;
    let session = orchestrator.get(id).await?;
    Ok(HttpResponse::Ok().json(SessionResponse::from(session)))
}

/// List recordings, newest first
pub async fn list_recordings(
    orchestrator: web::Data<RecordingOrchestrator>,
    query: web::Query<ListRecordingsQuery>,
) -> Result<HttpResponse> {
    let query = query.into_inner();
    let filter = SessionFilter::new(query.channel, query.limit);
    let sessions = orchestrator.list(&filter).await?;
    Ok(HttpResponse::Ok().json(sessions))
}

/// Signed playback URL, or 204 while no playable file exists
pub async fn get_playback(
    resolver: web::Data<PlaybackResolver>,
    session_id: web::Path<String>,
) -> Result<HttpResponse> {
    let id = parse_session_id(&session_id)?;
    match resolver.resolve(id).await? {
        Some(link) => Ok(HttpResponse::Ok().json(link)),
        None => Ok(HttpResponse::NoContent().finish()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_session_id() {
        let id = Uuid::new_v4();
        assert_eq!(parse_session_id(&id.to_string()).unwrap(), id);
        assert!(matches!(
            parse_session_id("not-a-uuid"),
            Err(AppError::InvalidArgument(_))
        ));
    }
}
