//! # Result Cache
//!
//! Single-flight memoization of encoded query results.
//!
//! | Slot state | Caller does |
//! |------------|-------------|
//! | absent or expired | becomes the leader: marks the key pending and computes |
//! | pending | waits for the leader's outcome, success or error |
//! | ready and fresh | returns the stored result |
//!
//! Waiters never compute behind a leader, so N identical queries run once
//! and finish together, within the leader's deadline. Successful results
//! stay fresh for `ttl`; errors are handed to the waiters of that flight and
//! then forgotten. [`ResultCache::clear`] drops every slot when the claim
//! store moves; flights already running still answer their own waiters but
//! no longer store anything.
//!
//! If a leader is cancelled mid-flight, its waiters see the channel close
//! and the first of them takes over.
//!
//! The LRU map sits behind one short `parking_lot` lock that is never held
//! across a computation.

use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use lru::LruCache;
use parking_lot::Mutex;
use tokio::sync::watch;

use super::errors::QueryError;

type Outcome = Option<Result<Arc<str>, QueryError>>;

enum Slot {
    Pending { flight: u64, done: watch::Receiver<Outcome> },
    Ready { stored_at: Instant, result: Arc<str> },
}

enum Role {
    Ready(Arc<str>),
    Leader { flight: u64, done: watch::Sender<Outcome> },
    Waiter { flight: u64, done: watch::Receiver<Outcome> },
}

struct Slots {
    map: LruCache<String, Slot>,
    next_flight: u64,
}

pub struct ResultCache {
    slots: Mutex<Slots>,
    ttl: Duration,
}

impl ResultCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            slots: Mutex::new(Slots {
                map: LruCache::new(capacity),
                next_flight: 0,
            }),
            ttl,
        }
    }

    /// The cached result for `key`, the outcome of the flight already
    /// computing it, or the result of `compute`.
    pub async fn get_or_compute<F, Fut>(&self, key: String, compute: F) -> Result<Arc<str>, QueryError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Arc<str>, QueryError>>,
    {
        let mut compute = Some(compute);
        loop {
            match self.join(&key) {
                Role::Ready(result) => return Ok(result),
                Role::Leader { flight, done } => {
                    let Some(compute) = compute.take() else {
                        return Err(QueryError::Internal("query flight led twice".into()));
                    };
                    let result = compute().await;
                    self.land(&key, flight, &result);
                    done.send_replace(Some(result.clone()));
                    return result;
                }
                Role::Waiter { flight, mut done } => {
                    let outcome = match done.wait_for(Option::is_some).await {
                        Ok(outcome) => (*outcome).clone(),
                        Err(_) => None,
                    };
                    if let Some(result) = outcome {
                        return result;
                    }
                    // The leader was dropped before it finished.
                    self.abandon(&key, flight);
                }
            }
        }
    }

    fn join(&self, key: &str) -> Role {
        let mut slots = self.slots.lock();
        match slots.map.get(key) {
            Some(Slot::Ready { stored_at, result }) if stored_at.elapsed() < self.ttl => {
                return Role::Ready(result.clone());
            }
            Some(Slot::Pending { flight, done }) => {
                return Role::Waiter {
                    flight: *flight,
                    done: done.clone(),
                };
            }
            _ => {}
        }
        slots.next_flight += 1;
        let flight = slots.next_flight;
        let (tx, rx) = watch::channel(None);
        slots.map.put(key.to_string(), Slot::Pending { flight, done: rx });
        Role::Leader { flight, done: tx }
    }

    /// Settle `flight`: store a success, forget a failure. A slot that was
    /// cleared or taken over meanwhile is left alone.
    fn land(&self, key: &str, flight: u64, result: &Result<Arc<str>, QueryError>) {
        let mut slots = self.slots.lock();
        let ours = matches!(slots.map.peek(key), Some(Slot::Pending { flight: f, .. }) if *f == flight);
        if !ours {
            return;
        }
        match result {
            Ok(result) => {
                slots.map.put(
                    key.to_string(),
                    Slot::Ready {
                        stored_at: Instant::now(),
                        result: result.clone(),
                    },
                );
            }
            Err(_) => {
                slots.map.pop(key);
            }
        }
    }

    fn abandon(&self, key: &str, flight: u64) {
        let mut slots = self.slots.lock();
        if matches!(slots.map.peek(key), Some(Slot::Pending { flight: f, .. }) if *f == flight) {
            slots.map.pop(key);
        }
    }

    /// Forget every stored result.
    pub fn clear(&self) {
        self.slots.lock().map.clear();
    }

    pub fn len(&self) -> usize {
        self.slots.lock().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_concurrent_callers_share_one_computation() {
        let cache = Arc::new(ResultCache::new(8, Duration::from_secs(5)));
        let runs = Arc::new(AtomicUsize::new(0));
        let call = |cache: Arc<ResultCache>, runs: Arc<AtomicUsize>| async move {
            cache
                .get_or_compute("search:{}".into(), || async {
                    runs.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    Ok(Arc::from("result"))
                })
                .await
        };
        let (a, b) = tokio::join!(
            call(cache.clone(), runs.clone()),
            call(cache.clone(), runs.clone())
        );
        assert_eq!(&*a.unwrap(), "result");
        assert_eq!(&*b.unwrap(), "result");
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_errors_are_not_stored() {
        let cache = ResultCache::new(8, Duration::from_secs(5));
        let failed = cache
            .get_or_compute("k".into(), || async { Err(QueryError::Timeout { ms: 1 }) })
            .await;
        assert!(failed.is_err());
        assert!(cache.is_empty());
        let ok = cache
            .get_or_compute("k".into(), || async { Ok(Arc::from("fresh")) })
            .await
            .unwrap();
        assert_eq!(&*ok, "fresh");
    }

    #[tokio::test(start_paused = true)]
    async fn test_waiters_share_a_failed_flight() {
        let cache = Arc::new(ResultCache::new(8, Duration::from_secs(5)));
        let runs = Arc::new(AtomicUsize::new(0));
        let started = tokio::time::Instant::now();
        let calls: Vec<_> = (0..4)
            .map(|_| {
                let cache = cache.clone();
                let runs = runs.clone();
                tokio::spawn(async move {
                    let result = cache
                        .get_or_compute("search:{}".into(), || async {
                            runs.fetch_add(1, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(100)).await;
                            Err(QueryError::Timeout { ms: 100 })
                        })
                        .await;
                    (result, started.elapsed())
                })
            })
            .collect();
        for call in calls {
            let (result, elapsed) = call.await.unwrap();
            assert_eq!(result, Err(QueryError::Timeout { ms: 100 }));
            assert!(elapsed < Duration::from_millis(150), "waited {elapsed:?}");
        }
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_waiter_takes_over_from_cancelled_leader() {
        let cache = Arc::new(ResultCache::new(8, Duration::from_secs(5)));
        let leader = {
            let cache = cache.clone();
            tokio::spawn(async move {
                cache
                    .get_or_compute("k".into(), || async {
                        tokio::time::sleep(Duration::from_secs(3600)).await;
                        Ok(Arc::from("never"))
                    })
                    .await
            })
        };
        tokio::task::yield_now().await;
        tokio::time::sleep(Duration::from_millis(10)).await;
        let waiter = {
            let cache = cache.clone();
            tokio::spawn(async move {
                cache
                    .get_or_compute("k".into(), || async { Ok(Arc::from("second")) })
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        leader.abort();
        assert_eq!(&*waiter.await.unwrap().unwrap(), "second");
    }

    #[tokio::test]
    async fn test_expired_and_cleared_entries_recompute() {
        let cache = ResultCache::new(8, Duration::ZERO);
        cache.get_or_compute("k".into(), || async { Ok(Arc::from("a")) }).await.unwrap();
        let second = cache
            .get_or_compute("k".into(), || async { Ok(Arc::from("b")) })
            .await
            .unwrap();
        assert_eq!(&*second, "b");

        let cache = ResultCache::new(8, Duration::from_secs(60));
        cache.get_or_compute("k".into(), || async { Ok(Arc::from("a")) }).await.unwrap();
        cache.clear();
        assert!(cache.is_empty());
        let third = cache
            .get_or_compute("k".into(), || async { Ok(Arc::from("c")) })
            .await
            .unwrap();
        assert_eq!(&*third, "c");
    }
}
