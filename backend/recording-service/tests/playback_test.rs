mod common;

use chrono::Utc;
use common::{calls, Harness};
use recording_service::db::SessionStore;
use recording_service::error::AppError;
use recording_service::models::{MediaKind, RecordingMode, Session, SessionUpdate};
use uuid::Uuid;

#[tokio::test]
async fn start_stop_resolve_scenario() {
    let h = Harness::new();
    h.media.stop_returns(&["room1_sid.mp4"]);

    let session = h
        .orchestrator
        .start("room1", Some("999999"), RecordingMode::Mixed)
        .await
        .unwrap();
    let stopped = h.orchestrator.stop(session.id).await.unwrap();
    assert_eq!(stopped.stored_file_keys, vec!["room1_sid.mp4".to_string()]);

    let link = h.resolver.resolve(session.id).await.unwrap().unwrap();
    assert_eq!(link.key, "room1_sid.mp4");
    assert_eq!(link.media_kind, MediaKind::Mp4);
    assert_eq!(link.mime_type, "video/mp4");
    assert!(link.url.starts_with("https://bucket.test/room1_sid.mp4"));
    assert!(link.url.ends_with("X-Amz-Expires=7200"));
    assert!(link.expires_at > chrono::Utc::now());

    // Stored keys are authoritative; no listing needed
    assert_eq!(calls(&h.bucket.list_calls), 0);
}

#[tokio::test]
async fn resolve_lists_bucket_when_stop_reported_no_files() {
    let h = Harness::new();
    let session = h
        .orchestrator
        .start("room1", Some("999999"), RecordingMode::Mixed)
        .await
        .unwrap();
    h.orchestrator.stop(session.id).await.unwrap();

    // Upload still in flight
    assert!(h.resolver.resolve(session.id).await.unwrap().is_none());

    h.bucket.put("recordings/sid-0_room1_0.ts");
    h.bucket.put("recordings/sid-0_room1/seg/chunk0.m3u8");
    h.bucket.put("recordings/sid-0_room1.m3u8");
    h.bucket.put("recordings/sid-99_other.mp4");

    let link = h.resolver.resolve(session.id).await.unwrap().unwrap();
    assert_eq!(link.key, "recordings/sid-0_room1.m3u8");
    assert_eq!(link.media_kind, MediaKind::Hls);
    assert_eq!(link.mime_type, "application/vnd.apple.mpegurl");

    assert_eq!(calls(&h.bucket.list_calls), 2);
    assert!(h
        .bucket
        .listed_prefixes
        .lock()
        .unwrap()
        .iter()
        .all(|p| p == "recordings/sid-0_"));

    // Resolution never writes back to the session
    let stored = h.orchestrator.get(session.id).await.unwrap();
    assert!(stored.stored_file_keys.is_empty());
}

#[tokio::test]
async fn resolve_without_prefix_lists_by_sid() {
    let h = Harness::with_prefix("");
    let session = h
        .orchestrator
        .start("room1", Some("999999"), RecordingMode::Mixed)
        .await
        .unwrap();
    h.orchestrator.stop(session.id).await.unwrap();
    h.bucket.put("sid-0_room1.mp4");

    let link = h.resolver.resolve(session.id).await.unwrap().unwrap();
    assert_eq!(link.key, "sid-0_room1.mp4");
    assert_eq!(
        h.bucket.listed_prefixes.lock().unwrap().as_slice(),
        ["sid-0_".to_string()]
    );
}

#[tokio::test]
async fn resolve_requires_stopped_session() {
    let h = Harness::new();
    let session = h
        .orchestrator
        .start("room1", Some("999999"), RecordingMode::Mixed)
        .await
        .unwrap();

    let result = h.resolver.resolve(session.id).await;
    assert!(matches!(result, Err(AppError::InvalidState(_))));
    assert_eq!(calls(&h.bucket.list_calls), 0);

    let missing = h.resolver.resolve(Uuid::new_v4()).await;
    assert!(matches!(missing, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn resolve_ignores_files_of_sid_sharing_a_prefix() {
    let h = Harness::new();
    let session = h
        .store
        .create(Session::recording(
            "rid-1".to_string(),
            "sid-1".to_string(),
            "room1".to_string(),
            "999999".to_string(),
            RecordingMode::Mixed,
            Utc::now(),
        ))
        .await
        .unwrap();
    h.store
        .update(
            session.id,
            SessionUpdate::MarkStopped {
                stopped_at: Utc::now(),
                file_keys: Vec::new(),
            },
        )
        .await
        .unwrap();

    h.bucket.put("recordings/sid-10_room9.mp4");
    assert!(h.resolver.resolve(session.id).await.unwrap().is_none());

    h.bucket.put("recordings/sid-1_room1.mp4");
    let link = h.resolver.resolve(session.id).await.unwrap().unwrap();
    assert_eq!(link.key, "recordings/sid-1_room1.mp4");
}
