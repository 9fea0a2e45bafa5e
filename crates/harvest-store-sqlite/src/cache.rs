//! [`SqliteCache`] — the durable local copy of primed documents.

use std::{collections::BTreeMap, path::Path};

use chrono::{DateTime, Utc};
use harvest_core::{
  document::Document,
  domain::field,
  query::Query,
  store::{DocumentStore, SyncStateStore, last_sync_key},
};
use rusqlite::OptionalExtension as _;

use crate::{
  Result,
  encode::{
    EncodedDocument, RawDocument, collection_pattern, decode_dt, encode_document, encode_dt,
  },
  schema::SCHEMA,
};

// ─── Cache ───────────────────────────────────────────────────────────────────

/// Primed documents and the sync watermark, in one SQLite file. Clones share
/// the same background connection.
#[derive(Clone)]
pub struct SqliteCache {
  conn: tokio_rusqlite::Connection,
}

impl SqliteCache {
  /// Open the cache at `path`, creating the file and tables if missing.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let cache = Self { conn };
    cache.init_schema().await?;
    Ok(cache)
  }

  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let cache = Self { conn };
    cache.init_schema().await?;
    Ok(cache)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Insert or replace `docs` in one transaction. Returns the number of rows
  /// written.
  pub async fn upsert(&self, docs: &[Document]) -> Result<usize> {
    if docs.is_empty() {
      return Ok(0);
    }
    let rows: Vec<EncodedDocument> = docs.iter().map(encode_document).collect::<Result<_>>()?;
    let cached_at = encode_dt(Utc::now());

    let written = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        {
          let mut stmt = tx.prepare(
            "INSERT INTO documents (
               collection, id, organization_id, data_json, updated_at, cached_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT (collection, id) DO UPDATE SET
               organization_id = excluded.organization_id,
               data_json       = excluded.data_json,
               updated_at      = excluded.updated_at,
               cached_at       = excluded.cached_at",
          )?;
          for row in &rows {
            stmt.execute(rusqlite::params![
              row.collection,
              row.id,
              row.organization_id,
              row.data_json,
              row.updated_at,
              cached_at,
            ])?;
          }
        }
        tx.commit()?;
        Ok(rows.len())
      })
      .await?;

    tracing::trace!(documents = written, "cached documents");
    Ok(written)
  }

  /// Cached document counts, grouped by collection with subcollection parent
  /// ids collapsed (`sessions/*/registers`).
  pub async fn count_by_collection(&self) -> Result<BTreeMap<String, usize>> {
    let rows: Vec<(String, i64)> = self
      .conn
      .call(|conn| {
        let mut stmt =
          conn.prepare("SELECT collection, COUNT(*) FROM documents GROUP BY collection")?;
        let rows = stmt
          .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    let mut counts = BTreeMap::new();
    for (collection, n) in rows {
      *counts.entry(collection_pattern(&collection)).or_insert(0) +=
        usize::try_from(n).unwrap_or_default();
    }
    Ok(counts)
  }
}

// ─── DocumentStore impl ──────────────────────────────────────────────────────

/// Offline reads: the query is evaluated over the cached copy.
impl DocumentStore for SqliteCache {
  type Error = crate::Error;

  async fn get_docs(&self, query: &Query) -> Result<Vec<Document>> {
    query.validate()?;
    let collection = query.collection.to_string();
    let organization_id = query
      .eq_value(field::ORGANIZATION_ID)
      .and_then(|v| v.as_str())
      .map(str::to_owned);

    let raws: Vec<RawDocument> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT collection, id, data_json FROM documents
           WHERE collection = ?1
             AND (?2 IS NULL OR organization_id = ?2)",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![collection, organization_id], |row| {
            Ok(RawDocument {
              collection: row.get(0)?,
              id:         row.get(1)?,
              data_json:  row.get(2)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    let docs = raws
      .into_iter()
      .map(RawDocument::into_document)
      .collect::<Result<Vec<_>>>()?;
    Ok(query.apply(docs))
  }
}

// ─── SyncStateStore impl ─────────────────────────────────────────────────────

impl SyncStateStore for SqliteCache {
  type Error = crate::Error;

  async fn last_sync(&self, organization_id: &str) -> Result<Option<DateTime<Utc>>> {
    let key = last_sync_key(organization_id);
    let raw: Option<String> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT value FROM sync_state WHERE key = ?1",
            rusqlite::params![key],
            |row| row.get(0),
          )
          .optional()?)
      })
      .await?;

    raw.as_deref().map(decode_dt).transpose()
  }

  async fn set_last_sync(&self, organization_id: &str, at: DateTime<Utc>) -> Result<()> {
    let key = last_sync_key(organization_id);
    let value = encode_dt(at);
    let now = encode_dt(Utc::now());

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO sync_state (key, value, updated_at) VALUES (?1, ?2, ?3)
           ON CONFLICT (key) DO UPDATE SET
             value      = excluded.value,
             updated_at = excluded.updated_at",
          rusqlite::params![key, value, now],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}
