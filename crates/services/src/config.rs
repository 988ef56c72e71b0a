use std::env;
use std::time::Duration;

use crate::error::ConfigError;

pub const DEFAULT_DB_URL: &str = "sqlite://progress.sqlite3";
pub const DEFAULT_CACHE_PREFIX: &str = "progress_cache";
pub const DEFAULT_COALESCE_WINDOW: Duration = Duration::from_secs(30);

/// Where the remote session history lives.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionApiConfig {
    pub base_url: String,
    pub token: Option<String>,
}

/// Engine settings resolved from the environment, with defaults.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineConfig {
    /// `None` disables the HTTP session source.
    pub api: Option<SessionApiConfig>,
    pub db_url: String,
    pub cache_prefix: String,
    pub coalesce_window: Duration,
    pub store_quota_bytes: Option<usize>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            api: None,
            db_url: DEFAULT_DB_URL.into(),
            cache_prefix: DEFAULT_CACHE_PREFIX.into(),
            coalesce_window: DEFAULT_COALESCE_WINDOW,
            store_quota_bytes: None,
        }
    }
}

impl EngineConfig {
    /// Read `PROGRESS_*` variables from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when a numeric variable does not parse or the
    /// cache prefix is blank.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Same as [`EngineConfig::from_env`] over an arbitrary lookup.
    ///
    /// # Errors
    ///
    /// See [`EngineConfig::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let present = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let api = present("PROGRESS_API_BASE_URL").map(|base_url| SessionApiConfig {
            base_url: base_url.trim().to_owned(),
            token: present("PROGRESS_API_TOKEN"),
        });

        let db_url = present("PROGRESS_DB_URL").unwrap_or_else(|| DEFAULT_DB_URL.into());

        let cache_prefix = match lookup("PROGRESS_CACHE_PREFIX") {
            Some(raw) if raw.trim().is_empty() => {
                return Err(ConfigError::Empty {
                    var: "PROGRESS_CACHE_PREFIX",
                });
            }
            Some(raw) => raw.trim().to_owned(),
            None => DEFAULT_CACHE_PREFIX.into(),
        };

        let coalesce_window = parse_number(&present, "PROGRESS_COALESCE_SECS")?
            .map_or(DEFAULT_COALESCE_WINDOW, Duration::from_secs);
        let store_quota_bytes = parse_number(&present, "PROGRESS_STORE_QUOTA_BYTES")?
            .map(|v| usize::try_from(v).unwrap_or(usize::MAX));

        Ok(Self {
            api,
            db_url,
            cache_prefix,
            coalesce_window,
            store_quota_bytes,
        })
    }
}

fn parse_number(
    present: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<u64>, ConfigError> {
    present(var)
        .map(|raw| {
            raw.trim()
                .parse::<u64>()
                .map_err(|_| ConfigError::InvalidNumber { var, raw })
        })
        .transpose()
}
