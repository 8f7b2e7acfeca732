//! REST client for the observation backend.
//!
//! Wraps `reqwest` with status mapping into [`StoreError`]: `401` is
//! [`StoreError::AuthExpired`], `403` is [`StoreError::PermissionDenied`],
//! `429`/`5xx` are retriable [`StoreError::FetchFailed`], and `404` on a
//! listing is a defined absence (empty result). Retries are not applied
//! here; [`crate::Fetcher`] owns the retry policy.
//!
//! ## Endpoints
//!
//! ```text
//! GET  {base}/entities/{id}/observations?page=N&page_size=M
//! GET  {base}/entities/{id}/observations/extended?page=N&page_size=M
//! GET  {base}/entities/{id}/aggregates
//! GET  {base}/entities/{id}/tags
//! GET  {base}/entities/{id}/rankings/competitors
//! GET  {base}/entities/{id}/rankings/citations
//! POST {base}/relevance            {"domains": [...]}
//! ```

use std::time::Duration;

use async_trait::async_trait;
use perception_core::{
    AggregateRow, CitationSourceRow, CompetitorSourceRow, EntityId, Observation, RelevanceEntry,
    SentimentTag,
};
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;

use crate::error::StoreError;
use crate::store::DataStore;

const USER_AGENT: &str = "perception-engine/0.1 (metrics-aggregation)";

/// HTTP [`DataStore`] implementation.
///
/// Use [`HttpStore::new`] with the backend base URL; tests point it at a
/// `wiremock` server.
pub struct HttpStore {
    client: Client,
    base_url: Url,
    token: Option<String>,
}

impl HttpStore {
    /// Creates a new store client.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed, or [`StoreError::InvalidBaseUrl`] if
    /// `base_url` is not a valid URL.
    pub fn new(
        base_url: &str,
        token: Option<&str>,
        timeout_secs: u64,
    ) -> Result<Self, StoreError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(USER_AGENT)
            .build()?;

        // Normalise: ensure the base URL ends with exactly one slash so that
        // `Url::join` appends to the path instead of replacing its last segment.
        let normalised = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalised).map_err(|e| StoreError::InvalidBaseUrl {
            base_url: base_url.to_owned(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            client,
            base_url,
            token: token.map(str::to_owned),
        })
    }

    /// Builds an endpoint URL relative to the base, with query parameters.
    fn build_url(&self, path: &str, query: &[(&str, String)]) -> Result<Url, StoreError> {
        let mut url = self
            .base_url
            .join(path)
            .map_err(|e| StoreError::InvalidBaseUrl {
                base_url: self.base_url.to_string(),
                reason: format!("cannot join '{path}': {e}"),
            })?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (k, v) in query {
                pairs.append_pair(k, v);
            }
        }
        Ok(url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Sends the request, maps the status, and decodes a JSON array body.
    ///
    /// `resource` names what is being read, for permission errors.
    async fn send_list<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        url: &Url,
        resource: &str,
    ) -> Result<Vec<T>, StoreError> {
        let response = self.authorize(request).send().await?;
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED {
            return Err(StoreError::AuthExpired);
        }

        if status == StatusCode::FORBIDDEN {
            return Err(StoreError::PermissionDenied {
                resource: resource.to_owned(),
            });
        }

        if status == StatusCode::NOT_FOUND {
            tracing::debug!(url = %url, "listing not found, treating as empty");
            return Ok(Vec::new());
        }

        if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            return Err(StoreError::FetchFailed {
                context: url.path().to_owned(),
                reason: format!("status {}", status.as_u16()),
            });
        }

        if !status.is_success() {
            return Err(StoreError::UnexpectedStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| StoreError::Deserialize {
            context: url.path().to_owned(),
            source: e,
        })
    }

    async fn get_list<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
        resource: &str,
    ) -> Result<Vec<T>, StoreError> {
        let url = self.build_url(path, query)?;
        let request = self.client.get(url.clone());
        self.send_list(request, &url, resource).await
    }
}

fn entity_resource(entity_id: EntityId) -> String {
    format!("entity {entity_id}")
}

fn page_query(page: u32, page_size: u32) -> [(&'static str, String); 2] {
    [
        ("page", page.to_string()),
        ("page_size", page_size.to_string()),
    ]
}

#[async_trait]
impl DataStore for HttpStore {
    async fn list_observations(
        &self,
        entity_id: EntityId,
        page: u32,
        page_size: u32,
    ) -> Result<Vec<Observation>, StoreError> {
        self.get_list(
            &format!("entities/{entity_id}/observations"),
            &page_query(page, page_size),
            &entity_resource(entity_id),
        )
        .await
    }

    async fn list_extended_observations(
        &self,
        entity_id: EntityId,
        page: u32,
        page_size: u32,
    ) -> Result<Vec<Observation>, StoreError> {
        self.get_list(
            &format!("entities/{entity_id}/observations/extended"),
            &page_query(page, page_size),
            &entity_resource(entity_id),
        )
        .await
    }

    async fn list_aggregate_rows(
        &self,
        entity_id: EntityId,
    ) -> Result<Vec<AggregateRow>, StoreError> {
        self.get_list(
            &format!("entities/{entity_id}/aggregates"),
            &[],
            &entity_resource(entity_id),
        )
        .await
    }

    async fn list_tags(&self, entity_id: EntityId) -> Result<Vec<SentimentTag>, StoreError> {
        self.get_list(
            &format!("entities/{entity_id}/tags"),
            &[],
            &entity_resource(entity_id),
        )
        .await
    }

    async fn list_relevance_entries(
        &self,
        domains: &[String],
    ) -> Result<Vec<RelevanceEntry>, StoreError> {
        if domains.is_empty() {
            return Ok(Vec::new());
        }
        let url = self.build_url("relevance", &[])?;
        let request = self
            .client
            .post(url.clone())
            .json(&serde_json::json!({ "domains": domains }));
        self.send_list(request, &url, "relevance cache").await
    }

    async fn list_competitor_ranking_source(
        &self,
        entity_id: EntityId,
    ) -> Result<Vec<CompetitorSourceRow>, StoreError> {
        self.get_list(
            &format!("entities/{entity_id}/rankings/competitors"),
            &[],
            &entity_resource(entity_id),
        )
        .await
    }

    async fn list_citation_ranking_source(
        &self,
        entity_id: EntityId,
    ) -> Result<Vec<CitationSourceRow>, StoreError> {
        self.get_list(
            &format!("entities/{entity_id}/rankings/citations"),
            &[],
            &entity_resource(entity_id),
        )
        .await
    }

    fn name(&self) -> &'static str {
        "http"
    }
}
