//! HTTP evidence adapter.
//!
//! Talks to any evidence gateway exposing
//! `GET {base_url}/{source}/{key}?from=&to=&lat=&lon=` and answering with a
//! JSON array of items of that source.

use async_trait::async_trait;
use reqwest::{header, Client, Url};

use super::traits::*;
use crate::types::{EvidenceItem, EvidenceKind};

/// HTTP-backed adapter for one evidence source.
pub struct HttpEvidenceAdapter {
    client: Client,
    base_url: Url,
    api_key: Option<String>,
    kind: EvidenceKind,
}

impl HttpEvidenceAdapter {
    /// Create an adapter for `kind` against the gateway at `base_url`.
    pub fn new(kind: EvidenceKind, base_url: impl Into<String>) -> Result<Self, AdapterError> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/json"),
        );

        let client = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| AdapterError::Unavailable(format!("HTTP client: {}", e)))?;

        let base_url: String = base_url.into();
        let base_url = Url::parse(&base_url)
            .map_err(|e| AdapterError::Unavailable(format!("base URL {base_url:?}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(AdapterError::Unavailable(format!(
                "base URL {base_url} cannot take path segments"
            )));
        }

        Ok(Self {
            client,
            base_url,
            api_key: None,
            kind,
        })
    }

    /// Send a bearer token with every request.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Build the request URL for a key.
    ///
    /// The key is one percent-encoded path segment, so `/`, `?` or `#` in a
    /// case id cannot change which resource is requested.
    fn source_url(&self, key: &str) -> Result<Url, AdapterError> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                AdapterError::Unavailable(format!(
                    "base URL {} cannot take path segments",
                    self.base_url
                ))
            })?;
            segments.pop_if_empty().push(self.kind.as_str()).push(key);
        }
        Ok(url)
    }

    fn query_params(query: &SourceQuery) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        if let Some(range) = query.date_range {
            params.push(("from", range.from.to_rfc3339()));
            params.push(("to", range.to.to_rfc3339()));
        }
        if let Some(coordinates) = query.coordinates {
            params.push(("lat", coordinates.lat.to_string()));
            params.push(("lon", coordinates.lon.to_string()));
        }
        params
    }
}

#[async_trait]
impl EvidenceAdapter for HttpEvidenceAdapter {
    fn kind(&self) -> EvidenceKind {
        self.kind
    }

    async fn fetch(&self, query: &SourceQuery) -> Result<Vec<EvidenceItem>, AdapterError> {
        let mut request = self
            .client
            .get(self.source_url(&query.key)?)
            .query(&Self::query_params(query));

        if let Some(key) = &self.api_key {
            request = request.header(header::AUTHORIZATION, format!("Bearer {}", key));
        }

        let response = request
            .send()
            .await
            .map_err(|e| AdapterError::Network(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            // Unknown parcel or case: no data, not a failure
            return Ok(Vec::new());
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AdapterError::RequestFailed(format!("HTTP {}: {}", status, body)));
        }

        let payload: Vec<serde_json::Value> = response
            .json()
            .await
            .map_err(|e| AdapterError::Parse(e.to_string()))?;

        payload
            .into_iter()
            .map(|value| {
                EvidenceItem::from_value(self.kind, value)
                    .map_err(|e| AdapterError::Parse(e.to_string()))
            })
            .collect()
    }
}
