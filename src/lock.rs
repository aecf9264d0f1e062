use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use ulid::Ulid;

use crate::engine::EngineError;

/// Held lock. Dropping it releases the lock.
pub struct LockGuard {
    _held: Box<dyn Send + Sync>,
}

impl LockGuard {
    pub fn new<T: Send + Sync + 'static>(held: T) -> Self {
        Self { _held: Box::new(held) }
    }
}

impl fmt::Debug for LockGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockGuard").finish_non_exhaustive()
    }
}

/// Named mutual exclusion. The local provider is process-wide; a distributed
/// provider (e.g. a Redis `SET NX` lease) plugs in behind the same trait.
#[async_trait]
pub trait LockProvider: Send + Sync {
    /// Wait up to `timeout` for the lock called `name`.
    async fn acquire(&self, name: &str, timeout: Duration) -> Result<LockGuard, EngineError>;
}

/// Every slot of a resource books through this one lock.
pub fn booking_lock_name(resource_id: Ulid) -> String {
    format!("booking:resource:{resource_id}")
}

/// Slot creation for one resource and day runs under this lock.
pub fn materialize_lock_name(resource_id: Ulid, date: NaiveDate) -> String {
    format!("materialize:{resource_id}:{date}")
}

type LockTable = DashMap<String, Arc<Mutex<()>>>;

/// Drop a table entry nobody holds or waits on. The table's own `Arc` is the
/// only one left in that case.
fn prune(locks: &LockTable, name: &str) {
    locks.remove_if(name, |_, mutex| Arc::strong_count(mutex) == 1);
}

struct LocalHeld {
    guard: Option<OwnedMutexGuard<()>>,
    name: String,
    locks: Arc<LockTable>,
}

impl Drop for LocalHeld {
    fn drop(&mut self) {
        drop(self.guard.take());
        prune(&self.locks, &self.name);
    }
}

#[derive(Default)]
pub struct LocalLockProvider {
    locks: Arc<LockTable>,
}

impl LocalLockProvider {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LockProvider for LocalLockProvider {
    async fn acquire(&self, name: &str, timeout: Duration) -> Result<LockGuard, EngineError> {
        let mutex = self.locks.entry(name.to_string()).or_default().value().clone();
        let acquired = tokio::time::timeout(timeout, mutex.lock_owned()).await;
        match acquired {
            Ok(guard) => Ok(LockGuard::new(LocalHeld {
                guard: Some(guard),
                name: name.to_string(),
                locks: self.locks.clone(),
            })),
            Err(_) => {
                prune(&self.locks, name);
                Err(EngineError::LockTimeout(name.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::task;

    #[tokio::test]
    async fn second_acquire_times_out_while_held() {
        let locks = LocalLockProvider::new();
        let _held = locks.acquire("a", Duration::from_millis(50)).await.unwrap();
        let err = locks.acquire("a", Duration::from_millis(20)).await.unwrap_err();
        assert!(matches!(err, EngineError::LockTimeout(ref n) if n == "a"));
    }

    #[tokio::test]
    async fn drop_releases() {
        let locks = LocalLockProvider::new();
        let held = locks.acquire("a", Duration::from_millis(50)).await.unwrap();
        drop(held);
        assert!(locks.acquire("a", Duration::from_millis(50)).await.is_ok());
    }

    #[tokio::test]
    async fn different_names_do_not_contend() {
        let locks = LocalLockProvider::new();
        let _a = locks.acquire("a", Duration::from_millis(50)).await.unwrap();
        assert!(locks.acquire("b", Duration::from_millis(50)).await.is_ok());
    }

    #[tokio::test]
    async fn waiter_is_woken_on_release() {
        use tokio_test::{assert_pending, assert_ready_ok};

        let locks = LocalLockProvider::new();
        let held = locks.acquire("a", Duration::from_secs(1)).await.unwrap();
        let mut waiter = task::spawn(locks.acquire("a", Duration::from_secs(1)));
        assert_pending!(waiter.poll());

        drop(held);
        assert!(waiter.is_woken());
        let _guard = assert_ready_ok!(waiter.poll());
    }

    #[tokio::test]
    async fn released_locks_leave_no_entry() {
        let locks = LocalLockProvider::new();
        let held = locks.acquire("a", Duration::from_secs(1)).await.unwrap();
        let mut waiter = task::spawn(locks.acquire("a", Duration::from_secs(1)));
        assert!(waiter.poll().is_pending());

        // The waiter still needs the entry.
        drop(held);
        assert_eq!(locks.locks.len(), 1);
        let second = match waiter.poll() {
            std::task::Poll::Ready(Ok(guard)) => guard,
            other => panic!("waiter should own the lock, got {other:?}"),
        };
        drop(waiter);
        drop(second);
        assert!(locks.locks.is_empty());

        let _held = locks.acquire("b", Duration::from_secs(1)).await.unwrap();
        let err = locks.acquire("b", Duration::from_millis(10)).await.unwrap_err();
        assert!(matches!(err, EngineError::LockTimeout(_)));
        assert_eq!(locks.locks.len(), 1);
    }

    #[test]
    fn lock_name_is_per_resource() {
        let rid = Ulid::new();
        assert_eq!(booking_lock_name(rid), format!("booking:resource:{rid}"));
    }

    #[test]
    fn materialize_lock_is_per_resource_and_day() {
        let rid = Ulid::new();
        let day = NaiveDate::from_ymd_opt(2026, 10, 14).unwrap();
        assert_eq!(materialize_lock_name(rid, day), format!("materialize:{rid}:2026-10-14"));
        assert_ne!(materialize_lock_name(rid, day), materialize_lock_name(rid, day.succ_opt().unwrap()));
    }
}
