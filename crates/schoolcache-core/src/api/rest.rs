//! HTTP backend for the PostgREST-style school store.
//!
//! Tables live under `<base>/rest/v1/<table>`. Selects are GETs whose query
//! string carries the projection, filters, ordering and limit; mutations ask
//! for the affected row back with `Prefer: return=representation`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client};
use tracing::debug;

use super::{ApiError, Backend, SelectRequest};
use crate::models::Row;
use crate::schema::{EntityKind, ID_FIELD};

// ============================================================================
// Constants
// ============================================================================

/// Path prefix for table endpoints.
const REST_PATH: &str = "rest/v1";

/// Default HTTP request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct RestBackend {
    client: Client,
    base_url: String,
    api_key: Option<Arc<String>>,
    token: Option<Arc<String>>,
}

impl RestBackend {
    pub fn new(base_url: &str, api_key: Option<String>, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.map(Arc::new),
            token: None,
        })
    }

    /// Create a backend that authenticates as a signed-in user, sharing the
    /// connection pool.
    pub fn with_token(&self, token: impl Into<Arc<String>>) -> Self {
        Self {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            api_key: self.api_key.clone(),
            token: Some(token.into()),
        }
    }

    fn table_url(&self, entity: EntityKind) -> String {
        format!("{}/{}/{}", self.base_url, REST_PATH, entity.table())
    }

    fn auth_headers(&self) -> Result<header::HeaderMap, ApiError> {
        let mut headers = header::HeaderMap::new();
        headers.insert(header::ACCEPT, header::HeaderValue::from_static("application/json"));
        if let Some(ref key) = self.api_key {
            headers.insert("apikey", header_value(key)?);
        }
        // The user token wins; anonymous requests authenticate with the API key
        if let Some(bearer) = self.token.as_ref().or(self.api_key.as_ref()) {
            headers.insert(header::AUTHORIZATION, header_value(&format!("Bearer {}", bearer))?);
        }
        Ok(headers)
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    async fn read_rows(response: reqwest::Response) -> Result<Vec<Row>, ApiError> {
        let response = Self::check_response(response).await?;
        let text = response.text().await?;
        serde_json::from_str(&text)
            .map_err(|e| ApiError::InvalidResponse(format!("expected an array of rows: {}", e)))
    }

    fn single(rows: Vec<Row>, entity: EntityKind, id: Option<&str>) -> Result<Row, ApiError> {
        rows.into_iter().next().ok_or_else(|| match id {
            Some(id) => ApiError::NotFound(format!("{} {}", entity, id)),
            None => ApiError::InvalidResponse(format!("{} mutation returned no row", entity)),
        })
    }
}

fn header_value(value: &str) -> Result<header::HeaderValue, ApiError> {
    header::HeaderValue::from_str(value)
        .map_err(|e| ApiError::InvalidResponse(format!("invalid header value: {}", e)))
}

fn id_filter(id: &str) -> [(&'static str, String); 1] {
    [(ID_FIELD, format!("eq.{}", id))]
}

#[async_trait]
impl Backend for RestBackend {
    async fn select(&self, request: &SelectRequest) -> Result<Vec<Row>, ApiError> {
        let url = self.table_url(request.entity);
        let pairs = request.to_query_pairs();
        debug!(url = %url, query = ?pairs, "GET");

        let response = self
            .client
            .get(&url)
            .headers(self.auth_headers()?)
            .query(&pairs)
            .send()
            .await?;

        let rows = Self::read_rows(response).await?;
        debug!(entity = %request.entity, count = rows.len(), "Select returned");
        Ok(rows)
    }

    async fn insert(&self, entity: EntityKind, payload: Row) -> Result<Row, ApiError> {
        let url = self.table_url(entity);
        debug!(url = %url, "POST");

        let response = self
            .client
            .post(&url)
            .headers(self.auth_headers()?)
            .header("Prefer", "return=representation")
            .json(&payload)
            .send()
            .await?;

        Self::single(Self::read_rows(response).await?, entity, None)
    }

    async fn update(&self, entity: EntityKind, id: &str, patch: Row) -> Result<Row, ApiError> {
        let url = self.table_url(entity);
        debug!(url = %url, id = id, "PATCH");

        let response = self
            .client
            .patch(&url)
            .headers(self.auth_headers()?)
            .header("Prefer", "return=representation")
            .query(&id_filter(id))
            .json(&patch)
            .send()
            .await?;

        Self::single(Self::read_rows(response).await?, entity, Some(id))
    }

    async fn delete(&self, entity: EntityKind, id: &str) -> Result<(), ApiError> {
        let url = self.table_url(entity);
        debug!(url = %url, id = id, "DELETE");

        let response = self
            .client
            .delete(&url)
            .headers(self.auth_headers()?)
            .query(&id_filter(id))
            .send()
            .await?;

        Self::check_response(response).await?;
        Ok(())
    }
}
