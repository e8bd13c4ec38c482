use std::collections::HashMap;
use std::env;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use progress_core::model::{ScopeKey, UnitId};

use crate::store::{ProgressReadStore, ProgressWriteStore, RemoteError, WritePayload};

/// Connection settings for the progress service.
#[derive(Clone, Debug)]
pub struct HttpStoreConfig {
    pub base_url: String,
    pub api_token: Option<String>,
}

impl HttpStoreConfig {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_token: None,
        }
    }

    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.api_token = Some(token.into());
        self
    }

    /// Read the base URL and optional bearer token from the environment.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let base_url = env::var("PROGRESS_API_BASE_URL").ok()?;
        if base_url.trim().is_empty() {
            return None;
        }
        let api_token = env::var("PROGRESS_API_TOKEN")
            .ok()
            .filter(|t| !t.trim().is_empty());
        Some(Self {
            base_url,
            api_token,
        })
    }
}

/// Remote progress store over HTTP.
///
/// Reads are GETs keyed by scope with the unit set in the query string;
/// writes are PATCHes carrying a partial JSON payload, matching the store's
/// accept-partial / idempotent-per-unit contract.
#[derive(Clone)]
pub struct HttpProgressStore {
    client: Client,
    config: HttpStoreConfig,
}

impl HttpProgressStore {
    #[must_use]
    pub fn new(config: HttpStoreConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    fn scope_url(&self, scope: &ScopeKey) -> String {
        format!(
            "{}/progress/{}/{}",
            self.config.base_url.trim_end_matches('/'),
            scope.scope_type,
            scope.scope_id
        )
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.api_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

#[async_trait]
impl ProgressReadStore for HttpProgressStore {
    async fn read_progress(
        &self,
        scope: &ScopeKey,
        units: &[UnitId],
    ) -> Result<HashMap<UnitId, bool>, RemoteError> {
        let unit_list = units
            .iter()
            .map(UnitId::as_str)
            .collect::<Vec<_>>()
            .join(",");

        let response = self
            .authorize(self.client.get(self.scope_url(scope)))
            .query(&[("units", unit_list.as_str())])
            .send()
            .await
            .map_err(|e| RemoteError::Connection(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(RemoteError::NotFound);
        }
        if !status.is_success() {
            return Err(RemoteError::Rejected(status.as_u16()));
        }

        let body: ProgressResponse = response
            .json()
            .await
            .map_err(|e| RemoteError::Serialization(e.to_string()))?;
        Ok(body
            .units
            .into_iter()
            .map(|(id, flag)| (UnitId::new(id), flag))
            .collect())
    }
}

#[async_trait]
impl ProgressWriteStore for HttpProgressStore {
    async fn write_progress(
        &self,
        scope: &ScopeKey,
        payload: &WritePayload,
    ) -> Result<(), RemoteError> {
        let response = self
            .authorize(self.client.patch(self.scope_url(scope)))
            .json(payload)
            .send()
            .await
            .map_err(|e| RemoteError::Connection(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RemoteError::Rejected(status.as_u16()));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct ProgressResponse {
    #[serde(default)]
    units: HashMap<String, bool>,
}
