//! In-memory response cache for idempotent remote lookups.
//!
//! The cache memoizes the result of a fetch under a caller-supplied key for a
//! time-to-live, and collapses concurrent fetches of the same key into a
//! single in-flight operation whose outcome every waiter receives.
//!
//! # Semantics
//! - A live entry is returned without running the fetch.
//! - An in-flight fetch is joined, never duplicated.
//! - A fetch runs on its own task: it completes (and its outcome is settled)
//!   even when every caller waiting on it has gone away.
//! - Failures are never stored; every waiter of the failed flight gets a
//!   clone of the error, and the next caller fetches again.
//! - A zero TTL stores nothing, so every sequential call refetches.
//! - Nothing is evicted proactively: an expired entry is simply replaced the
//!   next time its key is requested.
//!
//! Entries are additionally keyed by the value and error *types*, so the same
//! string key used for two different kinds of result never collides.

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

type Flight<T, E> = Shared<BoxFuture<'static, Result<T, E>>>;
type Entries = Mutex<HashMap<CacheKey, Entry>>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    value: TypeId,
    error: TypeId,
    key: String,
}
impl CacheKey {
    fn new<T: 'static, E: 'static>(key: String) -> Self {
        Self {
            value: TypeId::of::<T>(),
            error: TypeId::of::<E>(),
            key,
        }
    }
}

enum Entry {
    Ready {
        value: Arc<dyn Any + Send + Sync>,
        /// `None` when the TTL is too large to represent: never expires.
        expires_at: Option<Instant>,
    },
    InFlight {
        id: u64,
        /// A `Flight<T, E>` matching the types in the entry's key.
        flight: Box<dyn Any + Send + Sync>,
    },
}
impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        match self {
            Entry::Ready { expires_at, .. } => expires_at.is_none_or(|at| now < at),
            Entry::InFlight { .. } => true,
        }
    }
}

/// TTL cache with at-most-one-in-flight-fetch-per-key semantics.
///
/// Cheap to share behind an [`Arc`]; all methods take `&self`. The internal
/// lock is only held for map bookkeeping, never while a fetch is running, so
/// transactions on different keys never wait on each other's network I/O.
///
/// # Examples
///
/// ```
/// use hubsync_cache::ResponseCache;
/// use std::time::Duration;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let cache = ResponseCache::new();
/// let ttl = Duration::from_secs(60);
/// let first: Result<u32, String> = cache.transaction("answer", ttl, || async { Ok(42) }).await;
/// // Served from the cache: the second fetch never runs.
/// let second: Result<u32, String> = cache.transaction("answer", ttl, || async { Ok(0) }).await;
/// assert_eq!(first, second);
/// # }
/// ```
#[derive(Default)]
pub struct ResponseCache {
    entries: Arc<Entries>,
    next_flight: AtomicU64,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached value for `key`, or run `fetch` to produce it.
    ///
    /// `fetch` is only invoked when there is neither a live entry nor an
    /// in-flight fetch for `key`. The future it returns is spawned onto the
    /// runtime, so it runs to completion even if every caller waiting on it is
    /// cancelled; its outcome is still settled into the cache.
    ///
    /// Must be called from within a Tokio runtime.
    pub async fn transaction<T, E, F, Fut>(&self, key: impl Into<String>, ttl: Duration, fetch: F) -> Result<T, E>
    where
        T: Clone + Send + Sync + 'static,
        E: Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let key = CacheKey::new::<T, E>(key.into());
        let (id, flight) = {
            let mut entries = self.entries.lock().await;
            match entries.get(&key) {
                Some(Entry::Ready { value, expires_at }) if expires_at.is_none_or(|at| Instant::now() < at) => {
                    tracing::trace!(key = %key.key, "Cache hit");
                    // Keyed by TypeId, so the downcast holds.
                    return Ok(downcast::<T>(value.as_ref()).clone());
                },
                Some(Entry::InFlight { id, flight }) => {
                    tracing::trace!(key = %key.key, "Joining in-flight fetch");
                    (*id, downcast::<Flight<T, E>>(flight.as_ref()).clone())
                },
                _ => {
                    tracing::trace!(key = %key.key, "Cache miss; fetching");
                    let id = self.next_flight.fetch_add(1, Ordering::Relaxed);
                    let flight = spawn_flight(Arc::clone(&self.entries), key.clone(), id, ttl, fetch());
                    entries.insert(key.clone(), Entry::InFlight {
                        id,
                        flight: Box::new(flight.clone()),
                    });
                    (id, flight)
                },
            }
        };
        tracing::trace!(key = %key.key, flight = id, "Awaiting fetch");
        flight.await
    }

    /// Forget every entry stored under `key` (of any type), including
    /// in-flight markers. Running fetches complete, but their results are
    /// not stored.
    pub async fn invalidate(&self, key: &str) {
        self.entries.lock().await.retain(|k, _| k.key != key);
    }

    pub async fn clear(&self) {
        self.entries.lock().await.clear();
    }

    /// Number of live entries (stored values and in-flight fetches).
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        self.entries.lock().await.values().filter(|entry| entry.is_live(now)).count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// Run `fetch` on its own task, settling its outcome into `entries` before
/// handing it to the waiters.
fn spawn_flight<T, E, Fut>(entries: Arc<Entries>, key: CacheKey, id: u64, ttl: Duration, fetch: Fut) -> Flight<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
{
    let task = tokio::spawn(async move {
        let outcome = AssertUnwindSafe(fetch).catch_unwind().await;
        let value = match &outcome {
            Ok(Ok(value)) => Some(value.clone()),
            _ => None,
        };
        settle(&entries, &key, id, value, ttl).await;
        match outcome {
            Ok(outcome) => outcome,
            Err(panic) => std::panic::resume_unwind(panic),
        }
    });
    async move {
        match task.await {
            Ok(outcome) => outcome,
            // A panicking fetch panics every waiter, as if they had run it themselves.
            Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
            Err(err) => panic!("cache fetch task cancelled: {err}"),
        }
    }
    .boxed()
    .shared()
}

/// Replace the in-flight marker `id` with the flight's outcome, unless the
/// entry was invalidated (or replaced) in the meantime.
async fn settle<T>(entries: &Entries, key: &CacheKey, id: u64, value: Option<T>, ttl: Duration)
where
    T: Send + Sync + 'static,
{
    let mut entries = entries.lock().await;
    if !matches!(entries.get(key), Some(Entry::InFlight { id: current, .. }) if *current == id) {
        return;
    }
    match value {
        Some(value) if !ttl.is_zero() => {
            let expires_at = Instant::now().checked_add(ttl);
            entries.insert(key.clone(), Entry::Ready {
                value: Arc::new(value),
                expires_at,
            });
        },
        Some(_) => {
            entries.remove(key);
        },
        None => {
            tracing::debug!(key = %key.key, "Fetch failed; nothing cached");
            entries.remove(key);
        },
    }
}

fn downcast<T: 'static>(value: &(dyn Any + Send + Sync)) -> &T {
    // Entries are keyed by the TypeIds of what they hold, so a mismatch here
    // is a bug in this module, not a recoverable condition.
    value.downcast_ref::<T>().unwrap_or_else(|| unreachable!("cache entry stored with mismatched type"))
}
