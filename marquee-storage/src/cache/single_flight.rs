//! Single-flight coalescing.
//!
//! While one operation is in flight, every further caller awaits the same
//! shared future instead of starting its own. The slot is cleared once the
//! operation completes, so a failed outcome is never replayed to callers
//! that arrive afterwards.

use futures_util::future::{BoxFuture, FutureExt, Shared};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

struct InFlight<T: Clone> {
    id: u64,
    fut: Shared<BoxFuture<'static, T>>,
}

/// Coalesces concurrent calls into one execution whose output every caller
/// receives.
pub struct SingleFlight<T: Clone> {
    slot: Mutex<Option<InFlight<T>>>,
    next_id: AtomicU64,
}

impl<T> SingleFlight<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
            next_id: AtomicU64::new(0),
        }
    }

    /// Run `make()` unless a call is already in flight, in which case join it.
    ///
    /// The shared future stays in the slot until a caller observes its
    /// completion, so a cancelled leader does not abandon the work: the next
    /// caller keeps driving it.
    pub async fn run<F, Fut>(&self, make: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T> + Send + 'static,
    {
        let (id, fut) = {
            let mut slot = self.lock();
            match slot.as_ref() {
                Some(in_flight) => (in_flight.id, in_flight.fut.clone()),
                None => {
                    let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                    let fut = make().boxed().shared();
                    *slot = Some(InFlight {
                        id,
                        fut: fut.clone(),
                    });
                    (id, fut)
                }
            }
        };

        let output = fut.await;

        let mut slot = self.lock();
        if slot.as_ref().is_some_and(|in_flight| in_flight.id == id) {
            *slot = None;
        }
        output
    }

    pub fn is_in_flight(&self) -> bool {
        self.lock().is_some()
    }

    fn lock(&self) -> MutexGuard<'_, Option<InFlight<T>>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T> Default for SingleFlight<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_concurrent_calls_share_one_execution() {
        let flight = Arc::new(SingleFlight::<u32>::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let flight = Arc::clone(&flight);
            let calls = Arc::clone(&calls);
            handles.push(tokio::spawn(async move {
                flight
                    .run(move || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        42
                    })
                    .await
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap(), 42);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!flight.is_in_flight());
    }

    #[tokio::test]
    async fn test_sequential_calls_run_again() {
        let flight = SingleFlight::<Result<u32, String>>::new();
        let first = flight.run(|| async { Err("down".to_string()) }).await;
        assert!(first.is_err());
        let second = flight.run(|| async { Ok(7) }).await;
        assert_eq!(second, Ok(7));
    }

    #[tokio::test]
    async fn test_cancelled_leader_does_not_strand_followers() {
        let flight = Arc::new(SingleFlight::<u32>::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let leader = {
            let flight = Arc::clone(&flight);
            let calls = Arc::clone(&calls);
            tokio::spawn(async move {
                flight
                    .run(move || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        5
                    })
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        leader.abort();

        let calls_follower = Arc::clone(&calls);
        let value = flight
            .run(move || async move {
                calls_follower.fetch_add(1, Ordering::SeqCst);
                9
            })
            .await;
        assert_eq!(value, 5);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
