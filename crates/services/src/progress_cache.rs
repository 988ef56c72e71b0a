use std::collections::{HashMap, HashSet};
use std::fmt::Display;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use progress_core::Clock;
use progress_core::model::{CacheEntry, CacheType, UserId, UserKey};
use storage::repository::KeyValueStore;

use crate::config::DEFAULT_CACHE_PREFIX;
use crate::identity::CurrentUserIdentity;

type Listener = Arc<dyn Fn(&Value) + Send + Sync>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Result of [`ProgressCache::fetch_with_cache`].
#[derive(Debug)]
pub struct Fetched<T> {
    pub value: T,
    /// `true` when `value` came from the cache rather than a fresh recompute.
    pub from_cache: bool,
    /// Background revalidation started by this call, if any.
    ///
    /// Dropping the handle detaches the task; it always runs to completion.
    pub revalidation: Option<JoinHandle<()>>,
}

struct Inner {
    store: Arc<dyn KeyValueStore>,
    identity: Arc<dyn CurrentUserIdentity>,
    clock: Clock,
    prefix: String,
    user_key: Mutex<Option<(UserId, UserKey)>>,
    revalidating: Mutex<HashSet<String>>,
    listeners: Mutex<HashMap<String, Vec<(u64, Listener)>>>,
    next_listener_id: AtomicU64,
}

/// Per-user, TTL-bound, stale-while-revalidate cache of named aggregates.
///
/// Constructed once and shared by cloning; clones see the same state.
/// Reads and writes are refused while no user is signed in, so pre-auth data
/// never lands in (or is served from) a real user's namespace.
#[derive(Clone)]
pub struct ProgressCache {
    inner: Arc<Inner>,
}

impl ProgressCache {
    #[must_use]
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        identity: Arc<dyn CurrentUserIdentity>,
        clock: Clock,
    ) -> Self {
        Self::with_prefix(store, identity, clock, DEFAULT_CACHE_PREFIX)
    }

    #[must_use]
    pub fn with_prefix(
        store: Arc<dyn KeyValueStore>,
        identity: Arc<dyn CurrentUserIdentity>,
        clock: Clock,
        prefix: impl Into<String>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                identity,
                clock,
                prefix: prefix.into(),
                user_key: Mutex::new(None),
                revalidating: Mutex::new(HashSet::new()),
                listeners: Mutex::new(HashMap::new()),
                next_listener_id: AtomicU64::new(1),
            }),
        }
    }

    /// Namespace of the signed-in user, derived once per user.
    fn current_user_key(&self) -> Option<UserKey> {
        let user = self.inner.identity.current_user()?;
        let mut memo = lock(&self.inner.user_key);
        if let Some((known, key)) = memo.as_ref() {
            if *known == user {
                return Some(key.clone());
            }
        }
        let key = UserKey::derive(&user);
        *memo = Some((user, key.clone()));
        Some(key)
    }

    fn storage_key(&self, user_key: &UserKey, cache_type: &CacheType) -> String {
        format!("{}_{}_{}", self.inner.prefix, user_key, cache_type)
    }

    fn user_prefix(&self, user_key: &UserKey) -> String {
        format!("{}_{}_", self.inner.prefix, user_key)
    }

    /// Fresh cached value for `cache_type`, or `None` when absent, expired,
    /// unreadable, or no user is signed in.
    pub async fn get<T: DeserializeOwned>(&self, cache_type: &CacheType) -> Option<T> {
        let user_key = self.current_user_key()?;
        let value = self
            .read_entry(&self.storage_key(&user_key, cache_type))
            .await?;
        serde_json::from_value(value).ok()
    }

    /// Store `value` for the signed-in user. A no-op with no user.
    ///
    /// Storage failures are logged and swallowed; caching is advisory.
    pub async fn set<T: Serialize>(&self, cache_type: &CacheType, value: &T) {
        let Some(user_key) = self.current_user_key() else {
            debug!(cache_type = %cache_type, "no signed-in user; refusing cache write");
            return;
        };
        match serde_json::to_value(value) {
            Ok(value) => {
                self.write_entry(&self.storage_key(&user_key, cache_type), value)
                    .await;
            }
            Err(err) => warn!(cache_type = %cache_type, error = %err, "cache value not serializable"),
        }
    }

    /// Reads a live entry. Expired or corrupt entries are evicted on sight.
    async fn read_entry(&self, key: &str) -> Option<Value> {
        let raw = match self.inner.store.get(key).await {
            Ok(raw) => raw?,
            Err(err) => {
                warn!(key, error = %err, "cache read failed");
                return None;
            }
        };
        match CacheEntry::decode(&raw) {
            Some(entry) if !entry.is_expired(self.inner.clock.now_millis()) => Some(entry.value),
            _ => {
                debug!(key, "evicting expired cache entry");
                self.remove_key(key).await;
                None
            }
        }
    }

    async fn write_entry(&self, key: &str, value: Value) {
        let entry = CacheEntry::new(value, self.inner.clock.now_millis());
        let encoded = match entry.encode() {
            Ok(encoded) => encoded,
            Err(err) => {
                warn!(key, error = %err, "cache entry not encodable");
                return;
            }
        };

        match self.inner.store.set(key, &encoded).await {
            Ok(()) => {}
            Err(err) if err.is_quota_exceeded() => {
                let evicted = self.evict_expired().await;
                info!(key, evicted, "cache quota exceeded; retrying after evicting expired entries");
                if let Err(err) = self.inner.store.set(key, &encoded).await {
                    warn!(key, error = %err, "cache write dropped after retry");
                }
            }
            Err(err) => warn!(key, error = %err, "cache write failed"),
        }
    }

    async fn remove_key(&self, key: &str) {
        if let Err(err) = self.inner.store.remove(key).await {
            warn!(key, error = %err, "cache eviction failed");
        }
    }

    /// Remove every expired or unreadable entry under this cache's prefix,
    /// across all users. Returns how many entries were removed.
    pub async fn evict_expired(&self) -> usize {
        let prefix = format!("{}_", self.inner.prefix);
        let keys = match self.inner.store.keys_with_prefix(&prefix).await {
            Ok(keys) => keys,
            Err(err) => {
                warn!(error = %err, "could not list cache entries");
                return 0;
            }
        };

        let now = self.inner.clock.now_millis();
        let mut evicted = 0;
        for key in keys {
            let stale = match self.inner.store.get(&key).await {
                Ok(Some(raw)) => CacheEntry::decode(&raw).is_none_or(|e| e.is_expired(now)),
                _ => false,
            };
            if stale {
                self.remove_key(&key).await;
                evicted += 1;
            }
        }
        evicted
    }

    /// Stale-while-revalidate read.
    ///
    /// With a fresh cached value: returns it at once (`from_cache = true`)
    /// and, unless one is already running for this user and type, spawns a
    /// background `recompute` that stores its result and notifies
    /// subscribers only if the value changed. That task cannot be cancelled.
    ///
    /// Without one: awaits `recompute`, stores the result and returns it
    /// (`from_cache = false`).
    ///
    /// # Errors
    ///
    /// Returns the error of a foreground `recompute`; the cache is left
    /// untouched. Background failures are logged and the stale value stays.
    pub async fn fetch_with_cache<T, E, F, Fut>(
        &self,
        cache_type: &CacheType,
        recompute: F,
    ) -> Result<Fetched<T>, E>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        E: Display + Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let Some(user_key) = self.current_user_key() else {
            let value = recompute().await?;
            return Ok(Fetched {
                value,
                from_cache: false,
                revalidation: None,
            });
        };
        let key = self.storage_key(&user_key, cache_type);

        if let Some(cached) = self.read_entry(&key).await {
            match serde_json::from_value::<T>(cached.clone()) {
                Ok(value) => {
                    let revalidation =
                        self.spawn_revalidation(cache_type.clone(), user_key, key, cached, recompute);
                    return Ok(Fetched {
                        value,
                        from_cache: true,
                        revalidation,
                    });
                }
                Err(err) => {
                    debug!(cache_type = %cache_type, error = %err, "cached value has a different shape; recomputing");
                }
            }
        }

        let value = recompute().await?;
        match serde_json::to_value(&value) {
            Ok(encoded) => {
                if self.current_user_key().as_ref() == Some(&user_key) {
                    self.write_entry(&key, encoded).await;
                }
            }
            Err(err) => warn!(cache_type = %cache_type, error = %err, "cache value not serializable"),
        }
        Ok(Fetched {
            value,
            from_cache: false,
            revalidation: None,
        })
    }

    fn spawn_revalidation<T, E, F, Fut>(
        &self,
        cache_type: CacheType,
        user_key: UserKey,
        key: String,
        previous: Value,
        recompute: F,
    ) -> Option<JoinHandle<()>>
    where
        T: Serialize + Send + 'static,
        E: Display + Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        if !lock(&self.inner.revalidating).insert(key.clone()) {
            debug!(cache_type = %cache_type, "revalidation already in flight");
            return None;
        }

        let cache = self.clone();
        Some(tokio::spawn(async move {
            let _flag = RevalidatingFlag {
                inner: Arc::clone(&cache.inner),
                key: key.clone(),
            };

            let fresh = match recompute().await {
                Ok(fresh) => fresh,
                Err(err) => {
                    warn!(cache_type = %cache_type, error = %err, "background revalidation failed; serving stale value");
                    return;
                }
            };
            let fresh = match serde_json::to_value(&fresh) {
                Ok(fresh) => fresh,
                Err(err) => {
                    warn!(cache_type = %cache_type, error = %err, "cache value not serializable");
                    return;
                }
            };
            if cache.current_user_key().as_ref() != Some(&user_key) {
                debug!(cache_type = %cache_type, "user changed during revalidation; discarding result");
                return;
            }

            cache.write_entry(&key, fresh.clone()).await;
            if fresh != previous {
                debug!(cache_type = %cache_type, "revalidated value changed; notifying subscribers");
                cache.notify(&cache_type, &fresh);
            }
        }))
    }

    /// True while a background revalidation for `cache_type` is running for
    /// the signed-in user.
    #[must_use]
    pub fn is_revalidating(&self, cache_type: &CacheType) -> bool {
        self.current_user_key().is_some_and(|user_key| {
            lock(&self.inner.revalidating).contains(&self.storage_key(&user_key, cache_type))
        })
    }

    /// Call `callback` with the new value whenever a background revalidation
    /// changes `cache_type`.
    pub fn on_update<F>(&self, cache_type: &CacheType, callback: F) -> Subscription
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        let id = self.inner.next_listener_id.fetch_add(1, Ordering::Relaxed);
        let listener: Listener = Arc::new(callback);
        lock(&self.inner.listeners)
            .entry(cache_type.as_str().to_owned())
            .or_default()
            .push((id, listener));
        Subscription {
            inner: Arc::downgrade(&self.inner),
            cache_type: cache_type.as_str().to_owned(),
            id,
        }
    }

    fn notify(&self, cache_type: &CacheType, value: &Value) {
        // Snapshot first so a callback may unsubscribe without deadlocking.
        let listeners: Vec<Listener> = lock(&self.inner.listeners)
            .get(cache_type.as_str())
            .map(|list| list.iter().map(|(_, l)| Arc::clone(l)).collect())
            .unwrap_or_default();
        for listener in listeners {
            listener(value);
        }
    }

    /// Evict the named entries for the signed-in user.
    pub async fn invalidate(&self, cache_types: &[CacheType]) {
        let Some(user_key) = self.current_user_key() else {
            return;
        };
        for cache_type in cache_types {
            self.remove_key(&self.storage_key(&user_key, cache_type))
                .await;
        }
    }

    /// Evict every entry of the current user and forget the derived user key.
    ///
    /// When the identity is already gone (typical on logout), the last
    /// derived namespace is cleared instead.
    pub async fn clear_all(&self) {
        let user_key = self
            .current_user_key()
            .or_else(|| lock(&self.inner.user_key).as_ref().map(|(_, k)| k.clone()));
        *lock(&self.inner.user_key) = None;

        let Some(user_key) = user_key else {
            return;
        };
        let prefix = self.user_prefix(&user_key);
        match self.inner.store.keys_with_prefix(&prefix).await {
            Ok(keys) => {
                for key in keys {
                    self.remove_key(&key).await;
                }
            }
            Err(err) => warn!(error = %err, "could not list cache entries to clear"),
        }
    }
}

/// Clears the per-key revalidation flag when the task ends, however it ends.
struct RevalidatingFlag {
    inner: Arc<Inner>,
    key: String,
}

impl Drop for RevalidatingFlag {
    fn drop(&mut self) {
        lock(&self.inner.revalidating).remove(&self.key);
    }
}

/// Handle returned by [`ProgressCache::on_update`].
///
/// Dropping it leaves the listener registered; call
/// [`Subscription::unsubscribe`] to remove it.
#[derive(Debug)]
pub struct Subscription {
    inner: Weak<Inner>,
    cache_type: String,
    id: u64,
}

impl Subscription {
    /// Remove exactly the listener this handle was returned for.
    pub fn unsubscribe(self) {
        let Some(inner) = self.inner.upgrade() else {
            return;
        };
        let mut listeners = lock(&inner.listeners);
        if let Some(list) = listeners.get_mut(&self.cache_type) {
            list.retain(|(id, _)| *id != self.id);
            if list.is_empty() {
                listeners.remove(&self.cache_type);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::SharedIdentity;
    use chrono::Duration;
    use progress_core::model::CACHE_TTL_MILLIS;
    use progress_core::time::manual_clock;
    use std::sync::atomic::AtomicUsize;
    use storage::InMemoryStore;

    struct Harness {
        cache: ProgressCache,
        store: InMemoryStore,
        identity: SharedIdentity,
        clock: Clock,
    }

    fn harness_with_store(store: InMemoryStore) -> Harness {
        let identity = SharedIdentity::signed_in(UserId::new("alice").unwrap());
        let clock = manual_clock();
        let cache = ProgressCache::new(
            Arc::new(store.clone()),
            Arc::new(identity.clone()),
            clock.clone(),
        );
        Harness {
            cache,
            store,
            identity,
            clock,
        }
    }

    fn harness() -> Harness {
        harness_with_store(InMemoryStore::new())
    }

    fn level1() -> CacheType {
        CacheType::new(CacheType::LEVEL1_PROGRESS)
    }

    fn counter() -> (Arc<AtomicUsize>, impl Fn(&Value) + Send + Sync + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&count);
        (count, move |_: &Value| {
            seen.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let h = harness();
        h.cache.set(&level1(), &vec![10_u8, 20]).await;
        assert_eq!(h.cache.get::<Vec<u8>>(&level1()).await, Some(vec![10, 20]));
    }

    #[tokio::test]
    async fn key_is_namespaced_by_prefix_user_and_type() {
        let h = harness();
        h.cache.set(&level1(), &1).await;
        let user_key = UserKey::derive(&UserId::new("alice").unwrap());
        let expected = format!("progress_cache_{user_key}_level1_progress");
        assert!(h.store.get(&expected).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn entries_expire_strictly_after_ttl() {
        let mut h = harness();
        h.cache.set(&level1(), &42).await;

        h.clock.advance(Duration::milliseconds(CACHE_TTL_MILLIS - 1));
        assert_eq!(h.cache.get::<i32>(&level1()).await, Some(42));

        h.clock.advance(Duration::milliseconds(2));
        assert_eq!(h.cache.get::<i32>(&level1()).await, None);
        assert!(h.store.keys_with_prefix("progress_cache_").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn no_user_means_no_reads_or_writes() {
        let h = harness();
        h.identity.sign_out();
        h.cache.set(&level1(), &1).await;
        assert!(h.store.keys_with_prefix("").await.unwrap().is_empty());

        h.identity.sign_in(UserId::new("alice").unwrap());
        h.cache.set(&level1(), &1).await;
        h.identity.sign_out();
        assert_eq!(h.cache.get::<i32>(&level1()).await, None);
    }

    #[tokio::test]
    async fn users_are_isolated() {
        let h = harness();
        h.cache.set(&level1(), &"alice data").await;

        h.identity.sign_in(UserId::new("bob").unwrap());
        assert_eq!(h.cache.get::<String>(&level1()).await, None);

        h.identity.sign_in(UserId::new("alice").unwrap());
        assert_eq!(h.cache.get::<String>(&level1()).await.as_deref(), Some("alice data"));
    }

    #[tokio::test]
    async fn miss_recomputes_and_stores() {
        let h = harness();
        let fetched = h
            .cache
            .fetch_with_cache(&level1(), || async { Ok::<_, String>(30_u8) })
            .await
            .unwrap();
        assert_eq!(fetched.value, 30);
        assert!(!fetched.from_cache);
        assert!(fetched.revalidation.is_none());
        assert_eq!(h.cache.get::<u8>(&level1()).await, Some(30));
    }

    #[tokio::test]
    async fn miss_error_propagates_and_leaves_cache_unset() {
        let h = harness();
        let err = h
            .cache
            .fetch_with_cache(&level1(), || async { Err::<u8, _>("offline".to_string()) })
            .await
            .unwrap_err();
        assert_eq!(err, "offline");
        assert_eq!(h.cache.get::<u8>(&level1()).await, None);
    }

    #[tokio::test]
    async fn hit_returns_cached_and_revalidates_in_background() {
        let h = harness();
        h.cache.set(&level1(), &30_u8).await;

        let fetched = h
            .cache
            .fetch_with_cache(&level1(), || async { Ok::<_, String>(45_u8) })
            .await
            .unwrap();
        assert_eq!(fetched.value, 30);
        assert!(fetched.from_cache);

        fetched.revalidation.unwrap().await.unwrap();
        assert_eq!(h.cache.get::<u8>(&level1()).await, Some(45));
    }

    #[tokio::test]
    async fn subscribers_hear_changes_only() {
        let h = harness();
        let (count, callback) = counter();
        let _sub = h.cache.on_update(&level1(), callback);

        h.cache.set(&level1(), &30_u8).await;
        let same = h
            .cache
            .fetch_with_cache(&level1(), || async { Ok::<_, String>(30_u8) })
            .await
            .unwrap();
        same.revalidation.unwrap().await.unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 0);

        let changed = h
            .cache
            .fetch_with_cache(&level1(), || async { Ok::<_, String>(31_u8) })
            .await
            .unwrap();
        changed.revalidation.unwrap().await.unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn subscribers_receive_the_fresh_value() {
        let h = harness();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _sub = h.cache.on_update(&level1(), move |value| {
            lock(&sink).push(value.clone());
        });

        h.cache.set(&level1(), &serde_json::json!({"percent": 10})).await;
        let fetched = h
            .cache
            .fetch_with_cache(&level1(), || async {
                Ok::<_, String>(serde_json::json!({"percent": 20}))
            })
            .await
            .unwrap();
        fetched.revalidation.unwrap().await.unwrap();

        assert_eq!(*lock(&seen), vec![serde_json::json!({"percent": 20})]);
    }

    #[tokio::test]
    async fn unsubscribe_removes_only_that_listener() {
        let h = harness();
        let (first_count, first) = counter();
        let (second_count, second) = counter();
        let first_sub = h.cache.on_update(&level1(), first);
        let _second_sub = h.cache.on_update(&level1(), second);
        first_sub.unsubscribe();

        h.cache.set(&level1(), &1).await;
        let fetched = h
            .cache
            .fetch_with_cache(&level1(), || async { Ok::<_, String>(2) })
            .await
            .unwrap();
        fetched.revalidation.unwrap().await.unwrap();

        assert_eq!(first_count.load(Ordering::SeqCst), 0);
        assert_eq!(second_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn one_revalidation_per_type_at_a_time() {
        let h = harness();
        h.cache.set(&level1(), &1).await;
        let gate = Arc::new(tokio::sync::Notify::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let recompute = |gate: Arc<tokio::sync::Notify>, calls: Arc<AtomicUsize>| {
            move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                gate.notified().await;
                Ok::<_, String>(2)
            }
        };

        let first = h
            .cache
            .fetch_with_cache(&level1(), recompute(Arc::clone(&gate), Arc::clone(&calls)))
            .await
            .unwrap();
        assert!(first.revalidation.is_some());
        assert!(h.cache.is_revalidating(&level1()));

        let second = h
            .cache
            .fetch_with_cache(&level1(), recompute(Arc::clone(&gate), Arc::clone(&calls)))
            .await
            .unwrap();
        assert!(second.from_cache);
        assert!(second.revalidation.is_none());

        gate.notify_one();
        first.revalidation.unwrap().await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!h.cache.is_revalidating(&level1()));
    }

    #[tokio::test]
    async fn background_failure_keeps_stale_value() {
        let h = harness();
        h.cache.set(&level1(), &7).await;
        let fetched = h
            .cache
            .fetch_with_cache(&level1(), || async { Err::<i32, _>("503".to_string()) })
            .await
            .unwrap();
        fetched.revalidation.unwrap().await.unwrap();
        assert_eq!(h.cache.get::<i32>(&level1()).await, Some(7));
        assert!(!h.cache.is_revalidating(&level1()));
    }

    #[tokio::test]
    async fn revalidation_result_is_discarded_after_user_switch() {
        let h = harness();
        h.cache.set(&level1(), &1).await;
        let identity = h.identity.clone();
        let fetched = h
            .cache
            .fetch_with_cache(&level1(), move || async move {
                identity.sign_in(UserId::new("bob").unwrap());
                Ok::<_, String>(99)
            })
            .await
            .unwrap();
        fetched.revalidation.unwrap().await.unwrap();

        assert_eq!(h.cache.get::<i32>(&level1()).await, None);
        h.identity.sign_in(UserId::new("alice").unwrap());
        assert_eq!(h.cache.get::<i32>(&level1()).await, Some(1));
    }

    #[tokio::test]
    async fn invalidate_forces_recompute() {
        let h = harness();
        h.cache.set(&level1(), &1).await;
        h.cache.set(&CacheType::level_stars(), &2).await;

        h.cache.invalidate(&[level1()]).await;

        assert_eq!(h.cache.get::<i32>(&level1()).await, None);
        assert_eq!(h.cache.get::<i32>(&CacheType::level_stars()).await, Some(2));
    }

    #[tokio::test]
    async fn clear_all_after_sign_out_clears_last_user() {
        let h = harness();
        h.cache.set(&level1(), &1).await;
        h.identity.sign_in(UserId::new("bob").unwrap());
        h.cache.set(&level1(), &2).await;

        h.identity.sign_out();
        h.cache.clear_all().await;

        h.identity.sign_in(UserId::new("bob").unwrap());
        assert_eq!(h.cache.get::<i32>(&level1()).await, None);
        h.identity.sign_in(UserId::new("alice").unwrap());
        assert_eq!(h.cache.get::<i32>(&level1()).await, Some(1));
    }

    #[tokio::test]
    async fn quota_pressure_evicts_expired_entries_then_retries() {
        let store = InMemoryStore::with_quota(200);
        let mut h = harness_with_store(store);
        h.cache.set(&CacheType::phonics(), &"x".repeat(60)).await;
        h.clock.advance(Duration::milliseconds(CACHE_TTL_MILLIS + 1));

        h.cache.set(&level1(), &"y".repeat(60)).await;

        assert_eq!(h.cache.get::<String>(&level1()).await, Some("y".repeat(60)));
        assert_eq!(h.store.keys_with_prefix("progress_cache_").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn quota_failure_still_returns_the_value() {
        let store = InMemoryStore::with_quota(16);
        let h = harness_with_store(store);
        let fetched = h
            .cache
            .fetch_with_cache(&level1(), || async { Ok::<_, String>("z".repeat(64)) })
            .await
            .unwrap();
        assert_eq!(fetched.value.len(), 64);
        assert_eq!(h.cache.get::<String>(&level1()).await, None);
    }

    #[tokio::test]
    async fn no_user_fetch_recomputes_without_caching() {
        let h = harness();
        h.identity.sign_out();
        let fetched = h
            .cache
            .fetch_with_cache(&level1(), || async { Ok::<_, String>(5) })
            .await
            .unwrap();
        assert_eq!(fetched.value, 5);
        assert!(!fetched.from_cache);
        assert!(h.store.keys_with_prefix("").await.unwrap().is_empty());
    }
}
