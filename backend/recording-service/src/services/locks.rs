/// Per-session critical sections
///
/// One async mutex per session id, created on demand and dropped from the
/// table once the last holder or waiter releases it. Sessions never share a
/// lock.
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

type LockTable = DashMap<Uuid, Arc<Mutex<()>>>;

#[derive(Clone, Default)]
pub struct SessionLocks {
    table: Arc<LockTable>,
}

impl SessionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, id: Uuid) -> SessionLockGuard {
        // Clone under the shard lock so release can't drop an entry we're about to wait on
        let lock = self.table.entry(id).or_default().clone();
        // Built before waiting so a cancelled waiter still cleans up the entry
        let mut held = SessionLockGuard {
            id,
            table: Arc::clone(&self.table),
            guard: None,
        };
        held.guard = Some(lock.lock_owned().await);
        held
    }

    /// Number of sessions with a live lock entry
    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

#[derive(Debug)]
pub struct SessionLockGuard {
    id: Uuid,
    table: Arc<LockTable>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for SessionLockGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Only the table's own reference left: nobody holds or waits on it
        self.table
            .remove_if(&self.id, |_, lock| Arc::strong_count(lock) == 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_entry_removed_after_release() {
        let locks = SessionLocks::new();
        let id = Uuid::new_v4();
        {
            let _guard = locks.acquire(id).await;
            assert_eq!(locks.len(), 1);
        }
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_same_session_is_serialized() {
        let locks = SessionLocks::new();
        let id = Uuid::new_v4();
        let inside = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let mut tasks = Vec::new();
        for _ in 0..4 {
            let locks = locks.clone();
            let inside = inside.clone();
            let max_seen = max_seen.clone();
            tasks.push(tokio::spawn(async move {
                let _guard = locks.acquire(id).await;
                let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                max_seen.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                inside.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_waiter_leaves_no_entry() {
        let locks = SessionLocks::new();
        let id = Uuid::new_v4();
        let holder = locks.acquire(id).await;

        let mut waiter = tokio_test::task::spawn(locks.acquire(id));
        tokio_test::assert_pending!(waiter.poll());

        drop(holder);
        assert!(waiter.is_woken());
        assert_eq!(locks.len(), 1);

        // Woken but never polled again
        drop(waiter);
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_different_sessions_do_not_block() {
        let locks = SessionLocks::new();
        let _first = locks.acquire(Uuid::new_v4()).await;
        let second = tokio::time::timeout(Duration::from_millis(100), locks.acquire(Uuid::new_v4())).await;
        assert!(second.is_ok());
        assert_eq!(locks.len(), 2);
    }
}
