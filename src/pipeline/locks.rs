// Per-entity async locks.
//
// A sweep evaluates many entities at once, and a CLI call may overlap with a
// sweep in the same process. Snapshot read-modify-write and rate-limit checks
// for one entity must not interleave, so each entity key gets its own async
// mutex. Unrelated entities never wait on each other.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use tokio::sync::{Mutex, OwnedMutexGuard};

/// Keyed lock table, cheap to clone.
#[derive(Clone, Default)]
pub struct EntityLocks {
    inner: Arc<StdMutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl EntityLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for the lock on `key` and hold it until the guard drops.
    pub async fn acquire(&self, key: &str) -> OwnedMutexGuard<()> {
        let lock = {
            // The table lock is only held for the lookup, never across .await.
            let mut table = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            table
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }

    /// Number of keys seen so far.
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_key_serializes() {
        let locks = EntityLocks::new();
        let guard = locks.acquire("band:1").await;

        let locks2 = locks.clone();
        let waiter = tokio::spawn(async move {
            let _g = locks2.acquire("band:1").await;
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());
        drop(guard);
        waiter.await.unwrap();
    }

    #[tokio::test]
    async fn test_different_keys_do_not_block() {
        let locks = EntityLocks::new();
        let _a = locks.acquire("band:1").await;
        let _b = tokio::time::timeout(Duration::from_millis(100), locks.acquire("band:2"))
            .await
            .expect("unrelated key should not wait");
        assert_eq!(locks.len(), 2);
    }
}
