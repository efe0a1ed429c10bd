/// In-memory `SessionStore` for local runs and tests
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::SessionStore;
use crate::error::{AppError, Result};
use crate::models::{PendingAcquisition, Session, SessionFilter, SessionUpdate};

#[derive(Default)]
struct Tables {
    sessions: HashMap<Uuid, Session>,
    pending: HashMap<Uuid, PendingAcquisition>,
}

impl Tables {
    fn insert_session(&mut self, session: &Session) -> Result<()> {
        let duplicate = self.sessions.values().any(|existing| {
            existing.id == session.id
                || existing.external_resource_id == session.external_resource_id
                || existing.external_session_id == session.external_session_id
        });
        if duplicate {
            return Err(AppError::Conflict(format!(
                "resource {} / sid {} already recorded",
                session.external_resource_id, session.external_session_id
            )));
        }
        self.sessions.insert(session.id, session.clone());
        Ok(())
    }
}

/// All state sits behind one lock, so every mutation is atomic.
#[derive(Default)]
pub struct InMemorySessionStore {
    tables: RwLock<Tables>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn session_count(&self) -> usize {
        self.tables.read().await.sessions.len()
    }

    pub async fn pending(&self) -> Vec<PendingAcquisition> {
        self.tables.read().await.pending.values().cloned().collect()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn create(&self, session: Session) -> Result<Session> {
        self.tables.write().await.insert_session(&session)?;
        Ok(session)
    }

    async fn read(&self, id: Uuid) -> Result<Session> {
        self.tables
            .read()
            .await
            .sessions
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::session_not_found(id))
    }

    async fn update(&self, id: Uuid, change: SessionUpdate) -> Result<Session> {
        let mut tables = self.tables.write().await;
        let stored = tables
            .sessions
            .get_mut(&id)
            .ok_or_else(|| AppError::session_not_found(id))?;

        // Apply to a copy so a rejected transition leaves the record untouched
        let mut updated = stored.clone();
        change.apply(&mut updated)?;
        *stored = updated.clone();
        Ok(updated)
    }

    async fn list(&self, filter: &SessionFilter) -> Result<Vec<Session>> {
        let tables = self.tables.read().await;
        let needle = filter.channel_contains.as_ref().map(|c| c.to_lowercase());

        let mut sessions: Vec<Session> = tables
            .sessions
            .values()
            .filter(|s| match &needle {
                Some(n) => s.channel_name.to_lowercase().contains(n.as_str()),
                None => true,
            })
            .cloned()
            .collect();

        sessions.sort_by(|a, b| b.started_at.cmp(&a.started_at).then(b.id.cmp(&a.id)));
        sessions.truncate(filter.limit.max(0) as usize);
        Ok(sessions)
    }

    async fn record_pending(&self, pending: &PendingAcquisition) -> Result<()> {
        self.tables
            .write()
            .await
            .pending
            .insert(pending.id, pending.clone());
        Ok(())
    }

    async fn attach_pending_resource(&self, pending_id: Uuid, resource_id: &str) -> Result<()> {
        let mut tables = self.tables.write().await;
        let pending = tables
            .pending
            .get_mut(&pending_id)
            .ok_or_else(|| AppError::NotFound(format!("pending acquisition {pending_id}")))?;
        pending.resource_id = Some(resource_id.to_string());
        Ok(())
    }

    async fn promote_pending(&self, pending_id: Uuid, session: Session) -> Result<Session> {
        let mut tables = self.tables.write().await;
        tables.insert_session(&session)?;
        tables.pending.remove(&pending_id);
        Ok(session)
    }

    async fn discard_pending(&self, pending_id: Uuid) -> Result<()> {
        self.tables.write().await.pending.remove(&pending_id);
        Ok(())
    }

    async fn stale_pending(&self, cutoff: DateTime<Utc>) -> Result<Vec<PendingAcquisition>> {
        let tables = self.tables.read().await;
        let mut stale: Vec<PendingAcquisition> = tables
            .pending
            .values()
            .filter(|p| p.created_at < cutoff)
            .cloned()
            .collect();
        stale.sort_by_key(|p| p.created_at);
        Ok(stale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RecordingMode, SessionState};
    use chrono::Duration;

    fn session(resource: &str, sid: &str, channel: &str, started_at: DateTime<Utc>) -> Session {
        Session::recording(
            resource.into(),
            sid.into(),
            channel.into(),
            "999999".into(),
            RecordingMode::Mixed,
            started_at,
        )
    }

    #[tokio::test]
    async fn test_create_rejects_duplicate_external_ids() {
        let store = InMemorySessionStore::new();
        let now = Utc::now();
        store.create(session("rid", "sid", "room", now)).await.unwrap();

        let dup_resource = store.create(session("rid", "other", "room", now)).await;
        assert!(matches!(dup_resource, Err(AppError::Conflict(_))));

        let dup_sid = store.create(session("other", "sid", "room", now)).await;
        assert!(matches!(dup_sid, Err(AppError::Conflict(_))));

        assert_eq!(store.session_count().await, 1);
    }

    #[tokio::test]
    async fn test_list_is_newest_first_and_filtered() {
        let store = InMemorySessionStore::new();
        let now = Utc::now();
        store
            .create(session("r1", "s1", "Room-A", now - Duration::minutes(10)))
            .await
            .unwrap();
        store
            .create(session("r2", "s2", "lobby", now - Duration::minutes(5)))
            .await
            .unwrap();
        store.create(session("r3", "s3", "room-b", now)).await.unwrap();

        let all = store.list(&SessionFilter::new(None, None)).await.unwrap();
        let channels: Vec<_> = all.iter().map(|s| s.channel_name.as_str()).collect();
        assert_eq!(channels, vec!["room-b", "lobby", "Room-A"]);

        let rooms = store
            .list(&SessionFilter::new(Some("room".into()), Some(1)))
            .await
            .unwrap();
        assert_eq!(rooms.len(), 1);
        assert_eq!(rooms[0].channel_name, "room-b");
    }

    #[tokio::test]
    async fn test_rejected_update_leaves_record_unchanged() {
        let store = InMemorySessionStore::new();
        let mut acquiring = session("r", "s", "room", Utc::now());
        acquiring.state = SessionState::Acquiring;
        let id = store.create(acquiring.clone()).await.unwrap().id;

        let result = store
            .update(
                id,
                SessionUpdate::MarkStopped {
                    stopped_at: Utc::now(),
                    file_keys: vec!["x.mp4".into()],
                },
            )
            .await;

        assert!(matches!(result, Err(AppError::InvalidState(_))));
        assert_eq!(store.read(id).await.unwrap(), acquiring);
    }

    #[tokio::test]
    async fn test_promote_pending_removes_marker() {
        let store = InMemorySessionStore::new();
        let pending = PendingAcquisition::new("room", "999999", RecordingMode::Mixed);
        store.record_pending(&pending).await.unwrap();
        store.attach_pending_resource(pending.id, "rid").await.unwrap();

        store
            .promote_pending(pending.id, session("rid", "sid", "room", Utc::now()))
            .await
            .unwrap();

        assert!(store.pending().await.is_empty());
        assert_eq!(store.session_count().await, 1);
    }

    #[tokio::test]
    async fn test_stale_pending_respects_cutoff() {
        let store = InMemorySessionStore::new();
        let mut old = PendingAcquisition::new("room", "1", RecordingMode::Mixed);
        old.created_at = Utc::now() - Duration::minutes(30);
        let fresh = PendingAcquisition::new("room", "2", RecordingMode::Mixed);
        store.record_pending(&old).await.unwrap();
        store.record_pending(&fresh).await.unwrap();

        let stale = store
            .stale_pending(Utc::now() - Duration::minutes(10))
            .await
            .unwrap();
        assert_eq!(stale, vec![old]);
    }
}
