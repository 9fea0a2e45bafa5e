//! The `DocumentStore` and `SyncStateStore` traits.
//!
//! `DocumentStore` is implemented by the remote client, the SQLite cache
//! (offline reads) and the in-memory fixture store. `SyncStateStore` persists
//! the priming watermark between runs.

use std::future::Future;

use chrono::{DateTime, Utc};

use crate::{document::Document, query::Query};

/// Persisted key of the sync watermark. Stored per organization, see
/// [`last_sync_key`].
pub const LAST_SYNC_KEY: &str = "lastSync";

/// The key-value key under which `organization_id`'s watermark lives.
pub fn last_sync_key(organization_id: &str) -> String {
  format!("{LAST_SYNC_KEY}:{organization_id}")
}

/// Read access to a document store.
///
/// Reads are independent; no transactional guarantee is assumed. Any
/// caching the implementation performs is a side effect invisible to callers.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes.
pub trait DocumentStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Run `query` and return every matching document.
  fn get_docs<'a>(
    &'a self,
    query: &'a Query,
  ) -> impl Future<Output = Result<Vec<Document>, Self::Error>> + Send + 'a;
}

/// Durable storage for the incremental-sync watermark.
pub trait SyncStateStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// The watermark of the last successful priming run, if any.
  fn last_sync<'a>(
    &'a self,
    organization_id: &'a str,
  ) -> impl Future<Output = Result<Option<DateTime<Utc>>, Self::Error>> + Send + 'a;

  fn set_last_sync<'a>(
    &'a self,
    organization_id: &'a str,
    at: DateTime<Utc>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;
}
