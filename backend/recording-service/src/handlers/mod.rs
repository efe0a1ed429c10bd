/// HTTP handlers for recording-service
///
/// - Recordings: start, stop, status, listing and playback links
/// - Tokens: RTC join tokens for clients
use actix_web::{web, HttpResponse};

use crate::error::AppError;

pub mod recordings;
pub mod tokens;

pub use recordings::{
    get_playback, get_recording, list_recordings, query_recording, start_recording,
    stop_recording,
};
pub use tokens::issue_token;

/// Routes under `/api/v1`
pub fn configure(cfg: &mut web::ServiceConfig) {
    // Malformed bodies and query strings render as INVALID_ARGUMENT
    cfg.app_data(web::JsonConfig::default().error_handler(|err, _req| {
        AppError::InvalidArgument(err.to_string()).into()
    }))
    .app_data(web::QueryConfig::default().error_handler(|err, _req| {
        AppError::InvalidArgument(err.to_string()).into()
    }));

    cfg.service(
        web::scope("/api/v1")
            .route(
                "/health",
                web::get()
                    .to(|| async { HttpResponse::Ok().json(serde_json::json!({"status": "ok"})) }),
            )
            .route("/tokens", web::get().to(issue_token))
            .service(
                web::scope("/recordings")
                    .route("", web::post().to(start_recording))
                    .route("", web::get().to(list_recordings))
                    .route("/{id}", web::get().to(get_recording))
                    .route("/{id}/stop", web::post().to(stop_recording))
                    .route("/{id}/status", web::get().to(query_recording))
                    .route("/{id}/playback", web::get().to(get_playback)),
            ),
    );
}
