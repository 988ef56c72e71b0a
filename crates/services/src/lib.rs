#![forbid(unsafe_code)]

pub mod app_services;
pub mod coalescer;
pub mod config;
pub mod error;
pub mod identity;
pub mod progress_cache;
pub mod progress_service;
pub mod source;

pub use progress_core::Clock;

pub use app_services::AppServices;
pub use coalescer::{SessionFetchCoalescer, SessionSnapshot};
pub use config::{EngineConfig, SessionApiConfig};
pub use error::{AppServicesError, ConfigError, FetchError};
pub use identity::{CurrentUserIdentity, SharedIdentity};
pub use progress_cache::{Fetched, ProgressCache, Subscription};
pub use progress_service::ProgressService;
pub use source::{HttpSessionSource, JsonFileSessionSource, RawSessionSource, parse_session_history};
