//! Per-case serialization.
//!
//! Vote casting and escalation on the same case take the same mutex, so
//! "read votes, decide status, commit" never interleaves. Different cases
//! proceed concurrently. Entries nobody holds or waits on are dropped by
//! [`CaseLocks::prune`], which the escalation scheduler calls after each scan.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Lock table indexed by case id.
#[derive(Default)]
pub struct CaseLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl CaseLocks {
    pub fn new() -> Self {
        Self {
            locks: DashMap::new(),
        }
    }

    /// Wait for exclusive access to a case.
    pub async fn acquire(&self, case_id: &str) -> OwnedMutexGuard<()> {
        // Clone the Arc out so the shard guard is released before awaiting
        let lock = self
            .locks
            .entry(case_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        lock.lock_owned().await
    }

    /// Drop entries that no task holds or waits on. Returns how many went.
    ///
    /// A task that has cloned an entry keeps its strong count above one, so
    /// a lock in use is never removed.
    pub fn prune(&self) -> usize {
        let before = self.locks.len();
        self.locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        before.saturating_sub(self.locks.len())
    }

    /// Number of cases with a lock entry.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_case_serializes() {
        let locks = CaseLocks::new();
        let guard = locks.acquire("C1").await;

        let mut contender = tokio_test::task::spawn(locks.acquire("C1"));
        tokio_test::assert_pending!(contender.poll());

        drop(guard);
        assert!(contender.is_woken());
        let _guard = tokio_test::assert_ready!(contender.poll());
    }

    #[tokio::test]
    async fn test_different_cases_independent() {
        let locks = CaseLocks::new();
        let _a = locks.acquire("C1").await;
        let acquired = tokio::time::timeout(Duration::from_millis(50), locks.acquire("C2")).await;
        assert!(acquired.is_ok());
        assert_eq!(locks.len(), 2);
    }

    #[tokio::test]
    async fn test_prune_keeps_locks_in_use() {
        let locks = CaseLocks::new();
        drop(locks.acquire("C1").await);
        let held = locks.acquire("C2").await;

        let mut waiter = tokio_test::task::spawn(locks.acquire("C2"));
        tokio_test::assert_pending!(waiter.poll());

        assert_eq!(locks.prune(), 1);
        assert_eq!(locks.len(), 1);

        drop(held);
        let guard = tokio_test::assert_ready!(waiter.poll());
        assert_eq!(locks.prune(), 0);

        drop(guard);
        drop(waiter);
        assert_eq!(locks.prune(), 1);
        assert!(locks.is_empty());
    }
}
