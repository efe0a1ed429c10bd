/// Database access layer
///
/// This module provides:
/// - The `SessionStore` contract the orchestrator persists through
/// - `PgSessionStore`, the Postgres implementation
/// - `InMemorySessionStore`, same semantics without a database
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::models::{PendingAcquisition, Session, SessionFilter, SessionUpdate};

pub mod memory;
pub mod session_repo;

pub use memory::InMemorySessionStore;
pub use session_repo::PgSessionStore;

/// Durable record of every recording session.
///
/// Implementations must apply `update` atomically per record: two concurrent
/// updates to the same session never interleave their read-modify-write.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Fails with `Conflict` when the resource id or sid is already stored.
    async fn create(&self, session: Session) -> Result<Session>;

    /// Fails with `NotFound` for unknown ids.
    async fn read(&self, id: Uuid) -> Result<Session>;

    async fn update(&self, id: Uuid, change: SessionUpdate) -> Result<Session>;

    /// Newest first.
    async fn list(&self, filter: &SessionFilter) -> Result<Vec<Session>>;

    async fn record_pending(&self, pending: &PendingAcquisition) -> Result<()>;

    async fn attach_pending_resource(&self, pending_id: Uuid, resource_id: &str) -> Result<()>;

    /// Creates `session` and removes the marker in one step.
    async fn promote_pending(&self, pending_id: Uuid, session: Session) -> Result<Session>;

    async fn discard_pending(&self, pending_id: Uuid) -> Result<()>;

    /// Markers created before `cutoff`, oldest first.
    async fn stale_pending(&self, cutoff: DateTime<Utc>) -> Result<Vec<PendingAcquisition>>;
}
