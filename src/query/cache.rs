use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use moka::future::Cache;

use super::key::{Invalidation, QueryFamily, QueryKey};
use crate::api::ApiError;

/// Extra attempts made for a failed read before the error is returned.
pub const DEFAULT_RETRIES: u32 = 1;

/// Delay before the first retry, doubled for each further attempt.
const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(500);

/// Invalidation counters. A fetch that started under one snapshot and
/// finished under another raced an invalidation and must not stay cached.
#[derive(Debug, Default)]
struct Generations {
    cleared: u64,
    families: HashMap<QueryFamily, u64>,
    keys: HashMap<QueryKey, u64>,
}

impl Generations {
    fn snapshot(&self, key: &QueryKey) -> (u64, u64, u64) {
        (
            self.cleared,
            self.families.get(&key.family()).copied().unwrap_or(0),
            self.keys.get(key).copied().unwrap_or(0),
        )
    }

    fn bump(&mut self, invalidation: &Invalidation) {
        match invalidation {
            Invalidation::Key(key) => *self.keys.entry(key.clone()).or_default() += 1,
            Invalidation::Family(family) => *self.families.entry(*family).or_default() += 1,
        }
    }
}

/// Key-addressed read-through cache with request de-duplication.
///
/// - [`query`](Self::query) returns a cached value when present; otherwise it
///   runs the fetcher once for all concurrent callers of the same key.
/// - [`mutate`](Self::mutate) runs a write and, only once it succeeded,
///   evicts the affected keys so the next read refetches.
///
/// Entries never expire on their own; they live until invalidated or
/// evicted for capacity. A fetch that was in flight when its key was
/// invalidated hands its result to the callers waiting on it but is not
/// kept, so the next read fetches again. Cloning is cheap and shares the
/// entries.
#[derive(Clone)]
pub struct QueryCache<V> {
    entries: Cache<QueryKey, V>,
    generations: Arc<Mutex<Generations>>,
    retries: u32,
    retry_delay: Duration,
}

impl<V> QueryCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new(max_capacity: u64) -> Self {
        Self {
            entries: Cache::builder().max_capacity(max_capacity).build(),
            generations: Arc::default(),
            retries: DEFAULT_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }

    /// Number of extra attempts for a failed read.
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Cached value for `key`, or the result of `fetcher`.
    ///
    /// Concurrent calls with the same key while a fetch is in flight wait for
    /// that fetch instead of starting their own. Failures are not cached:
    /// every waiter receives the error and the next call fetches again.
    pub async fn query<F, Fut>(&self, key: QueryKey, fetcher: F) -> Result<V, ApiError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<V, ApiError>>,
    {
        let label = key.to_string();
        let started = self.generations().snapshot(&key);

        let entry = self
            .entries
            .entry(key.clone())
            .or_try_insert_with(fetch_with_retry(
                &label,
                self.retries,
                self.retry_delay,
                fetcher,
            ))
            .await
            .map_err(|e| (*e).clone())?;

        if !entry.is_fresh() {
            tracing::trace!(key = %label, "Query cache hit");
        } else if self.generations().snapshot(&key) != started {
            tracing::debug!(key = %label, "Key invalidated during fetch, not caching result");
            self.entries.invalidate(&key).await;
        } else {
            tracing::debug!(key = %label, "Query cache miss, fetched");
        }

        Ok(entry.into_value())
    }

    /// Run `mutation`; on success evict every key matched by `invalidations`.
    ///
    /// On failure the cache is left untouched and the error is returned.
    pub async fn mutate<T, Fut>(
        &self,
        invalidations: &[Invalidation],
        mutation: Fut,
    ) -> Result<T, ApiError>
    where
        Fut: Future<Output = Result<T, ApiError>>,
    {
        let value = match mutation.await {
            Ok(value) => value,
            Err(e) => {
                tracing::debug!(error = %e, "Mutation failed, cache unchanged");
                return Err(e);
            }
        };
        self.invalidate(invalidations).await;
        Ok(value)
    }

    /// Evict every entry matched by `invalidations`.
    pub async fn invalidate(&self, invalidations: &[Invalidation]) {
        {
            let mut generations = self.generations();
            for inv in invalidations {
                generations.bump(inv);
            }
        }

        let stale: Vec<QueryKey> = self
            .entries
            .iter()
            .filter(|(key, _)| invalidations.iter().any(|inv| inv.matches(key)))
            .map(|(key, _)| (*key).clone())
            .collect();

        for key in &stale {
            self.entries.invalidate(key).await;
        }

        // Exact keys may be mid-insert and not yet visible to iteration
        for inv in invalidations {
            if let Invalidation::Key(key) = inv {
                self.entries.invalidate(key).await;
            }
        }

        if !stale.is_empty() {
            tracing::debug!(evicted = stale.len(), "Invalidated query cache entries");
        }
    }

    /// Cached value without fetching.
    pub async fn peek(&self, key: &QueryKey) -> Option<V> {
        self.entries.get(key).await
    }

    /// Drop every entry.
    pub async fn clear(&self) {
        self.generations().cleared += 1;
        self.entries.invalidate_all();
        self.entries.run_pending_tasks().await;
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.entries.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn generations(&self) -> std::sync::MutexGuard<'_, Generations> {
        self.generations.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Run `fetcher`, retrying failures up to `retries` more times with
/// exponential backoff.
async fn fetch_with_retry<V, F, Fut>(
    label: &str,
    retries: u32,
    retry_delay: Duration,
    fetcher: F,
) -> Result<V, ApiError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<V, ApiError>>,
{
    let mut attempt = 0;

    loop {
        match fetcher().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < retries => {
                let delay = retry_delay.saturating_mul(1 << attempt.min(6));
                tracing::debug!(
                    key = %label,
                    error = %e,
                    retry = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    "Retrying query after error"
                );
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                attempt += 1;
            }
            Err(e) => {
                tracing::warn!(key = %label, error = %e, "Query failed");
                return Err(e);
            }
        }
    }
}
