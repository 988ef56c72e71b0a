use std::sync::Arc;

use storage::repository::Storage;

use crate::Clock;
use crate::coalescer::SessionFetchCoalescer;
use crate::config::EngineConfig;
use crate::error::AppServicesError;
use crate::identity::{CurrentUserIdentity, SharedIdentity};
use crate::progress_cache::ProgressCache;
use crate::progress_service::ProgressService;
use crate::source::{HttpSessionSource, RawSessionSource};

/// Assembles the progress engine once at startup.
#[derive(Clone)]
pub struct AppServices {
    identity: SharedIdentity,
    progress: Arc<ProgressService>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage and the HTTP session source
    /// from `config`.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization fails or no
    /// session API is configured.
    pub async fn new_sqlite(config: &EngineConfig, clock: Clock) -> Result<Self, AppServicesError> {
        let api = config.api.clone().ok_or(AppServicesError::MissingSessionSource)?;
        let storage = Storage::sqlite(&config.db_url, config.store_quota_bytes).await?;
        Ok(Self::with_parts(
            &storage,
            Arc::new(HttpSessionSource::new(api)),
            SharedIdentity::new(),
            config,
            clock,
        ))
    }

    /// Build services over an explicit store, source and identity slot.
    #[must_use]
    pub fn with_parts(
        storage: &Storage,
        source: Arc<dyn RawSessionSource>,
        identity: SharedIdentity,
        config: &EngineConfig,
        clock: Clock,
    ) -> Self {
        let shared: Arc<dyn CurrentUserIdentity> = Arc::new(identity.clone());
        let cache = ProgressCache::with_prefix(
            Arc::clone(&storage.cache),
            Arc::clone(&shared),
            clock.clone(),
            config.cache_prefix.clone(),
        );
        let sessions = Arc::new(SessionFetchCoalescer::new(
            source,
            shared,
            clock,
            config.coalesce_window,
        ));
        let progress = Arc::new(ProgressService::new(cache, sessions));

        Self { identity, progress }
    }

    /// Slot the auth layer writes the signed-in user into.
    #[must_use]
    pub fn identity(&self) -> &SharedIdentity {
        &self.identity
    }

    #[must_use]
    pub fn progress(&self) -> Arc<ProgressService> {
        Arc::clone(&self.progress)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::JsonFileSessionSource;

    #[tokio::test]
    async fn sqlite_without_api_is_rejected() {
        let config = EngineConfig {
            db_url: "sqlite::memory:".into(),
            ..EngineConfig::default()
        };
        let err = AppServices::new_sqlite(&config, Clock::default_clock())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, AppServicesError::MissingSessionSource));
    }

    #[tokio::test]
    async fn with_parts_shares_the_identity_slot() {
        let services = AppServices::with_parts(
            &Storage::in_memory(),
            Arc::new(JsonFileSessionSource::new("/nowhere.json")),
            SharedIdentity::new(),
            &EngineConfig::default(),
            Clock::default_clock(),
        );
        assert_eq!(services.identity().current_user(), None);
        services
            .identity()
            .sign_in(progress_core::model::UserId::new("alice").unwrap());
        assert!(services.progress().level_stars().await.is_err());
    }
}
