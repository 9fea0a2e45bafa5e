//! Async HTTP client for the remote document store's query endpoint.

use std::time::Duration;

use harvest_core::{document::Document, query::Query, store::DocumentStore};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RemoteError {
  #[error("http error: {0}")]
  Http(#[from] reqwest::Error),

  #[error("invalid query: {0}")]
  Query(#[from] harvest_core::Error),

  #[error("POST /v1/query → {status}: {body}")]
  Status { status: StatusCode, body: String },
}

/// Connection settings for the remote store.
#[derive(Debug, Clone)]
pub struct RemoteConfig {
  pub base_url: String,
  pub token:    Option<String>,
  pub timeout:  Duration,
}

#[derive(Deserialize)]
struct QueryResponse {
  documents: Vec<Document>,
}

/// [`DocumentStore`] over `POST {base_url}/v1/query`.
///
/// Cheap to clone — the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct HttpStore {
  client: Client,
  config: RemoteConfig,
}

impl HttpStore {
  pub fn new(config: RemoteConfig) -> Result<Self, RemoteError> {
    let client = Client::builder().timeout(config.timeout).build()?;
    Ok(Self { client, config })
  }

  fn url(&self) -> String {
    format!("{}/v1/query", self.config.base_url.trim_end_matches('/'))
  }

  fn auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
    match &self.config.token {
      Some(token) => req.bearer_auth(token),
      None => req,
    }
  }
}

impl DocumentStore for HttpStore {
  type Error = RemoteError;

  async fn get_docs(&self, query: &Query) -> Result<Vec<Document>, RemoteError> {
    // Fail locally rather than spend a round trip on a query the server
    // rejects anyway.
    query.validate()?;

    let resp = self
      .auth(self.client.post(self.url()))
      .json(query)
      .send()
      .await?;

    let status = resp.status();
    if !status.is_success() {
      let body = resp.text().await.unwrap_or_default();
      return Err(RemoteError::Status { status, body });
    }
    let body: QueryResponse = resp.json().await?;
    Ok(body.documents)
  }
}
