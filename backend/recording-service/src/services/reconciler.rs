/// Pending acquisition sweeper
///
/// A marker outlives its start call only when the process died between
/// acquire and the durable session write, or when that write failed. Such a
/// marker may name a vendor resource nobody will ever stop; the sweeper logs
/// it for manual follow-up and removes the marker.
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{debug, error, info, warn};

use crate::db::SessionStore;
use crate::error::{AppError, Result};
use crate::metrics;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub swept: usize,
    /// Vendor resource ids that were acquired but never became a session
    pub leaked_resources: Vec<String>,
}

#[derive(Clone)]
pub struct PendingSweeper {
    store: Arc<dyn SessionStore>,
    ttl: Duration,
}

impl PendingSweeper {
    pub fn new(store: Arc<dyn SessionStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    /// Remove markers older than the TTL as of `now`.
    pub async fn sweep(&self, now: DateTime<Utc>) -> Result<SweepReport> {
        let ttl = chrono::Duration::from_std(self.ttl)
            .map_err(|e| AppError::Internal(format!("pending ttl out of range: {e}")))?;
        let stale = self.store.stale_pending(now - ttl).await?;

        let mut report = SweepReport::default();
        for pending in stale {
            self.store.discard_pending(pending.id).await?;
            report.swept += 1;

            match &pending.resource_id {
                Some(resource_id) => {
                    warn!(
                        pending_id = %pending.id,
                        channel = %pending.channel_name,
                        resource_id = %resource_id,
                        created_at = %pending.created_at,
                        "acquired resource never became a session"
                    );
                    report.leaked_resources.push(resource_id.clone());
                }
                None => debug!(
                    pending_id = %pending.id,
                    channel = %pending.channel_name,
                    "dropped pending acquisition without resource"
                ),
            }
        }

        if report.swept > 0 {
            metrics::record_pending_swept(report.swept);
        }
        Ok(report)
    }

    /// Run `sweep` on a fixed interval until the task is aborted.
    pub fn spawn(self, every: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(
                interval_secs = every.as_secs(),
                ttl_secs = self.ttl.as_secs(),
                "starting pending acquisition sweeper"
            );
            let mut ticker = interval(every);
            loop {
                ticker.tick().await;
                match self.sweep(Utc::now()).await {
                    Ok(report) if report.swept > 0 => info!(
                        swept = report.swept,
                        leaked = report.leaked_resources.len(),
                        "swept pending acquisitions"
                    ),
                    Ok(_) => {}
                    Err(e) => error!(error = %e, "pending acquisition sweep failed"),
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::InMemorySessionStore;
    use crate::models::{PendingAcquisition, RecordingMode};

    #[tokio::test]
    async fn test_sweep_removes_only_stale_markers() {
        let store = Arc::new(InMemorySessionStore::new());
        let now = Utc::now();

        let mut leaked = PendingAcquisition::new("room1", "999999", RecordingMode::Mixed);
        leaked.created_at = now - chrono::Duration::minutes(30);
        leaked.resource_id = Some("rid-leaked".to_string());
        let mut early = PendingAcquisition::new("room2", "999999", RecordingMode::Mixed);
        early.created_at = now - chrono::Duration::minutes(20);
        let fresh = PendingAcquisition::new("room3", "999999", RecordingMode::Mixed);

        for pending in [&leaked, &early, &fresh] {
            store.record_pending(pending).await.unwrap();
        }

        let sweeper = PendingSweeper::new(store.clone(), Duration::from_secs(600));
        let report = sweeper.sweep(now).await.unwrap();

        assert_eq!(report.swept, 2);
        assert_eq!(report.leaked_resources, vec!["rid-leaked".to_string()]);
        assert_eq!(store.pending().await, vec![fresh]);
    }

    #[tokio::test]
    async fn test_sweep_with_nothing_stale() {
        let store = Arc::new(InMemorySessionStore::new());
        let sweeper = PendingSweeper::new(store, Duration::from_secs(600));
        assert_eq!(sweeper.sweep(Utc::now()).await.unwrap(), SweepReport::default());
    }
}
