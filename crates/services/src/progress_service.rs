use std::sync::Arc;

use tracing::{debug, info};

use progress_core::model::{CacheType, ListDescriptor, ModeGroup};
use progress_core::{ListProgress, StarCounts, compute_percentages, compute_star_count};

use crate::coalescer::SessionFetchCoalescer;
use crate::error::FetchError;
use crate::progress_cache::{Fetched, ProgressCache};

/// What the progress screens talk to: cached aggregates over the coalesced
/// session history.
#[derive(Clone)]
pub struct ProgressService {
    cache: ProgressCache,
    sessions: Arc<SessionFetchCoalescer>,
}

impl ProgressService {
    #[must_use]
    pub fn new(cache: ProgressCache, sessions: Arc<SessionFetchCoalescer>) -> Self {
        Self { cache, sessions }
    }

    #[must_use]
    pub fn cache(&self) -> &ProgressCache {
        &self.cache
    }

    /// Per-list completion for `lists`, cached under `cache_type`.
    ///
    /// # Errors
    ///
    /// Returns `FetchError` when nothing is cached and the history fetch
    /// fails.
    pub async fn list_progress(
        &self,
        cache_type: &CacheType,
        lists: &[ListDescriptor],
        group: &ModeGroup,
    ) -> Result<Fetched<Vec<ListProgress>>, FetchError> {
        let sessions = Arc::clone(&self.sessions);
        let lists = lists.to_vec();
        let group = group.clone();
        self.cache
            .fetch_with_cache(cache_type, move || async move {
                let history = sessions.fetch_all_sessions().await?;
                Ok(compute_percentages(&lists, &history, &group))
            })
            .await
    }

    /// Star totals per level bucket.
    ///
    /// # Errors
    ///
    /// Returns `FetchError` when nothing is cached and the history fetch
    /// fails.
    pub async fn level_stars(&self) -> Result<Fetched<StarCounts>, FetchError> {
        let sessions = Arc::clone(&self.sessions);
        self.cache
            .fetch_with_cache(&CacheType::level_stars(), move || async move {
                let history = sessions.fetch_all_sessions().await?;
                Ok(compute_star_count(&history))
            })
            .await
    }

    /// A session just finished: forget the affected aggregates and the
    /// coalesced history so the next read recomputes from fresh data.
    pub async fn session_completed(&self, affected: &[CacheType]) {
        let mut types = affected.to_vec();
        if !types.contains(&CacheType::level_stars()) {
            types.push(CacheType::level_stars());
        }
        debug!(count = types.len(), "invalidating after completed session");
        self.cache.invalidate(&types).await;
        self.sessions.invalidate();
    }

    /// Drop everything cached for the user who is signing out.
    pub async fn sign_out(&self) {
        self.cache.clear_all().await;
        self.sessions.reset();
        info!("cleared progress cache on sign-out");
    }
}
