use std::path::PathBuf;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use progress_core::model::{SessionRecord, UserId};

use crate::config::SessionApiConfig;
use crate::error::FetchError;

/// Supplies the full, unordered session history of one user.
#[async_trait]
pub trait RawSessionSource: Send + Sync {
    /// Fetch every session record for `user`.
    ///
    /// # Errors
    ///
    /// Returns `FetchError` on transport failure, a non-success status, or a
    /// body that is not a session list.
    async fn fetch_sessions(&self, user: &UserId) -> Result<Vec<SessionRecord>, FetchError>;
}

/// Decode a history body: either a JSON array or `{ "sessions": [...] }`.
/// Entries that are not objects are skipped.
///
/// # Errors
///
/// Returns `FetchError::Decode` when the body has neither shape.
pub fn parse_session_history(body: &Value) -> Result<Vec<SessionRecord>, FetchError> {
    let items = match body {
        Value::Array(items) => items,
        Value::Object(obj) => obj
            .get("sessions")
            .and_then(Value::as_array)
            .ok_or_else(|| FetchError::Decode("expected a `sessions` array".into()))?,
        _ => return Err(FetchError::Decode("expected an array of sessions".into())),
    };

    let mut records = Vec::with_capacity(items.len());
    for (idx, item) in items.iter().enumerate() {
        match SessionRecord::from_json(item) {
            Ok(record) => records.push(record),
            Err(err) => debug!(index = idx, error = %err, "skipping malformed session record"),
        }
    }
    Ok(records)
}

/// Session history served over HTTP.
#[derive(Clone)]
pub struct HttpSessionSource {
    client: Client,
    config: SessionApiConfig,
}

impl HttpSessionSource {
    #[must_use]
    pub fn new(config: SessionApiConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }
}

#[async_trait]
impl RawSessionSource for HttpSessionSource {
    async fn fetch_sessions(&self, user: &UserId) -> Result<Vec<SessionRecord>, FetchError> {
        let url = format!("{}/sessions", self.config.base_url.trim_end_matches('/'));

        let mut request = self.client.get(url).query(&[("user", user.as_str())]);
        if let Some(token) = &self.config.token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await?;

        if !response.status().is_success() {
            return Err(FetchError::HttpStatus(response.status().as_u16()));
        }

        let body: Value = response.json().await?;
        parse_session_history(&body)
    }
}

/// Session history exported to a local JSON file.
#[derive(Clone, Debug)]
pub struct JsonFileSessionSource {
    path: PathBuf,
}

impl JsonFileSessionSource {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl RawSessionSource for JsonFileSessionSource {
    async fn fetch_sessions(&self, _user: &UserId) -> Result<Vec<SessionRecord>, FetchError> {
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|err| FetchError::Io(format!("{}: {err}", self.path.display())))?;
        let body: Value =
            serde_json::from_str(&raw).map_err(|err| FetchError::Decode(err.to_string()))?;
        parse_session_history(&body)
    }
}
