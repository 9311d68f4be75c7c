//! Remote Source Gateways
//! HTTP clients for the registry's GraphQL API and the gist-hosting API.
//! A missing source is a domain condition (`NotFound`), kept distinct from
//! transport failures so the lifecycle machine can clean up the URL.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;

use crate::record::{RegistrySource, SourceId, Timestamp};


pub const DEFAULT_GIST_API_BASE: &str = "https://api.github.com";

#[derive(Error, Debug, Clone)]
pub enum GatewayError {
    /// The requested source or gist does not exist
    #[error("source not found")]
    NotFound,
    /// Network, HTTP-status, or payload failure
    #[error("transport failure: {0}")]
    Transport(String),
}

impl From<reqwest::Error> for GatewayError {
    fn from(e: reqwest::Error) -> Self {
        GatewayError::Transport(e.to_string())
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;

/// Registry operations. Mutations require the bearer token supplied by the
/// auth collaborator; reads may be anonymous.
#[async_trait(?Send)]
pub trait SourceGateway {
    async fn get_source(&self, id: &SourceId, token: Option<&str>)
        -> GatewayResult<RegistrySource>;

    async fn create_source(
        &self,
        text: &str,
        name: &str,
        token: &str,
    ) -> GatewayResult<RegistrySource>;

    async fn fork_source(
        &self,
        text: &str,
        name: &str,
        from: &SourceId,
        token: &str,
    ) -> GatewayResult<RegistrySource>;

    async fn update_source(
        &self,
        id: &SourceId,
        text: &str,
        token: &str,
    ) -> GatewayResult<RegistrySource>;
}

/// Gist metadata: where the raw machine text actually lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GistMeta {
    pub raw_file_url: String,
}

#[async_trait(?Send)]
pub trait GistGateway {
    /// Fetch gist metadata by id. A 404 is the domain `NotFound` condition,
    /// not a generic transport error.
    async fn get_gist_meta(&self, id: &SourceId) -> GatewayResult<GistMeta>;

    async fn get_raw_file(&self, url: &str) -> GatewayResult<String>;
}

// ============================================================================
// GRAPHQL WIRE TYPES
// ============================================================================

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: Option<T>,
    errors: Option<Vec<WireError>>,
}

#[derive(Debug, Deserialize)]
struct WireError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct WireSource {
    id: String,
    name: String,
    owner: WireOwner,
    #[serde(rename = "updatedAt")]
    updated_at: Timestamp,
    text: String,
}

#[derive(Debug, Deserialize)]
struct WireOwner {
    id: String,
}

impl From<WireSource> for RegistrySource {
    fn from(wire: WireSource) -> Self {
        RegistrySource {
            id: SourceId::new(wire.id),
            name: wire.name,
            owner_id: wire.owner.id,
            updated_at: wire.updated_at,
            text: wire.text,
        }
    }
}

#[derive(Debug, Deserialize)]
struct GetSourceData {
    #[serde(rename = "getSourceFile")]
    source: Option<WireSource>,
}

#[derive(Debug, Deserialize)]
struct CreateSourceData {
    #[serde(rename = "createSourceFile")]
    source: WireSource,
}

#[derive(Debug, Deserialize)]
struct ForkSourceData {
    #[serde(rename = "forkSourceFile")]
    source: WireSource,
}

#[derive(Debug, Deserialize)]
struct UpdateSourceData {
    #[serde(rename = "updateSourceFile")]
    source: WireSource,
}

const SOURCE_FIELDS: &str = "id name owner { id } updatedAt text";

fn get_source_query() -> String {
    format!("query GetSourceFile($id: ID!) {{ getSourceFile(id: $id) {{ {SOURCE_FIELDS} }} }}")
}

fn create_source_mutation() -> String {
    format!(
        "mutation CreateSourceFile($text: String!, $name: String!) \
         {{ createSourceFile(text: $text, name: $name) {{ {SOURCE_FIELDS} }} }}"
    )
}

fn fork_source_mutation() -> String {
    format!(
        "mutation ForkSourceFile($text: String!, $name: String!, $forkFromId: ID!) \
         {{ forkSourceFile(text: $text, name: $name, forkFromId: $forkFromId) {{ {SOURCE_FIELDS} }} }}"
    )
}

fn update_source_mutation() -> String {
    format!(
        "mutation UpdateSourceFile($id: ID!, $text: String!) \
         {{ updateSourceFile(id: $id, text: $text) {{ {SOURCE_FIELDS} }} }}"
    )
}

// ============================================================================
// HTTP REGISTRY GATEWAY
// ============================================================================

/// GraphQL-over-HTTP client for the source registry.
#[derive(Debug, Clone)]
pub struct HttpSourceGateway {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpSourceGateway {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }

    async fn post<T: DeserializeOwned>(
        &self,
        query: String,
        variables: serde_json::Value,
        token: Option<&str>,
    ) -> GatewayResult<T> {
        let body = serde_json::json!({ "query": query, "variables": variables });
        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::Transport(format!(
                "registry returned {status}"
            )));
        }

        let envelope: Envelope<T> = response.json().await?;
        if let Some(errors) = envelope.errors {
            if !errors.is_empty() {
                let messages: Vec<_> = errors.into_iter().map(|e| e.message).collect();
                return Err(GatewayError::Transport(messages.join("; ")));
            }
        }
        envelope
            .data
            .ok_or_else(|| GatewayError::Transport("registry response had no data".to_string()))
    }
}

#[async_trait(?Send)]
impl SourceGateway for HttpSourceGateway {
    async fn get_source(
        &self,
        id: &SourceId,
        token: Option<&str>,
    ) -> GatewayResult<RegistrySource> {
        let data: GetSourceData = self
            .post(
                get_source_query(),
                serde_json::json!({ "id": id.as_str() }),
                token,
            )
            .await?;
        // A null record means no matching entry, the domain not-found case.
        data.source
            .map(RegistrySource::from)
            .ok_or(GatewayError::NotFound)
    }

    async fn create_source(
        &self,
        text: &str,
        name: &str,
        token: &str,
    ) -> GatewayResult<RegistrySource> {
        let data: CreateSourceData = self
            .post(
                create_source_mutation(),
                serde_json::json!({ "text": text, "name": name }),
                Some(token),
            )
            .await?;
        Ok(data.source.into())
    }

    async fn fork_source(
        &self,
        text: &str,
        name: &str,
        from: &SourceId,
        token: &str,
    ) -> GatewayResult<RegistrySource> {
        let data: ForkSourceData = self
            .post(
                fork_source_mutation(),
                serde_json::json!({ "text": text, "name": name, "forkFromId": from.as_str() }),
                Some(token),
            )
            .await?;
        Ok(data.source.into())
    }

    async fn update_source(
        &self,
        id: &SourceId,
        text: &str,
        token: &str,
    ) -> GatewayResult<RegistrySource> {
        let data: UpdateSourceData = self
            .post(
                update_source_mutation(),
                serde_json::json!({ "id": id.as_str(), "text": text }),
                Some(token),
            )
            .await?;
        Ok(data.source.into())
    }
}

// ============================================================================
// HTTP GIST GATEWAY
// ============================================================================

#[derive(Debug, Deserialize)]
struct WireGist {
    // BTreeMap keeps file iteration deterministic.
    files: BTreeMap<String, WireGistFile>,
}

#[derive(Debug, Deserialize)]
struct WireGistFile {
    raw_url: String,
}

/// Client for the gist-hosting API.
#[derive(Debug, Clone)]
pub struct HttpGistGateway {
    client: reqwest::Client,
    api_base: String,
}

impl HttpGistGateway {
    pub fn new() -> Self {
        Self::with_base(DEFAULT_GIST_API_BASE)
    }

    pub fn with_base(api_base: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: api_base.into(),
        }
    }
}

impl Default for HttpGistGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait(?Send)]
impl GistGateway for HttpGistGateway {
    async fn get_gist_meta(&self, id: &SourceId) -> GatewayResult<GistMeta> {
        let url = format!("{}/gists/{}", self.api_base, id);
        let response = self
            .client
            .get(&url)
            .header("Accept", "application/vnd.github+json")
            .header("User-Agent", "oxiviz")
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(GatewayError::NotFound);
        }
        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::Transport(format!(
                "gist api returned {status}"
            )));
        }

        let gist: WireGist = response.json().await?;
        let file = gist
            .files
            .into_values()
            .next()
            .ok_or_else(|| GatewayError::Transport("gist has no files".to_string()))?;
        Ok(GistMeta {
            raw_file_url: file.raw_url,
        })
    }

    async fn get_raw_file(&self, url: &str) -> GatewayResult<String> {
        let response = self
            .client
            .get(url)
            .header("User-Agent", "oxiviz")
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::Transport(format!(
                "raw file fetch returned {status}"
            )));
        }
        Ok(response.text().await?)
    }
}
