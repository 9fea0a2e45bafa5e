//! [`CachingStore`] — a remote store whose reads land in the local cache.

use harvest_core::{document::Document, query::Query, store::DocumentStore};
use thiserror::Error;

use crate::{Error, SqliteCache};

#[derive(Debug, Error)]
pub enum CachingError<E: std::error::Error + 'static> {
  #[error("remote store error: {0}")]
  Remote(#[source] E),

  #[error("cache write failed: {0}")]
  Cache(#[source] Error),
}

/// Wraps a remote [`DocumentStore`]. Every successful read is written through
/// to `cache` before it is returned, so a priming run leaves the cache able to
/// answer the same queries offline.
pub struct CachingStore<R> {
  remote: R,
  cache:  SqliteCache,
}

impl<R> CachingStore<R> {
  pub fn new(remote: R, cache: SqliteCache) -> Self { Self { remote, cache } }

  pub fn cache(&self) -> &SqliteCache { &self.cache }
}

impl<R: DocumentStore> DocumentStore for CachingStore<R> {
  type Error = CachingError<R::Error>;

  async fn get_docs(&self, query: &Query) -> Result<Vec<Document>, Self::Error> {
    let docs = self
      .remote
      .get_docs(query)
      .await
      .map_err(CachingError::Remote)?;
    self.cache.upsert(&docs).await.map_err(CachingError::Cache)?;
    Ok(docs)
  }
}
