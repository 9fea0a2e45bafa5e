//! [`MemoryStore`] — an in-process document store.
//!
//! Evaluates queries with [`Query::apply`] and enforces the same `in` limit
//! as the remote store. Used as the seed-file remote by the CLI and as the
//! fixture store in tests.

use std::{
  collections::{BTreeMap, HashMap},
  sync::RwLock,
};

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::{
  Result,
  document::Document,
  query::{CollectionPath, Query},
  store::{DocumentStore, SyncStateStore, last_sync_key},
};

type Collections = BTreeMap<CollectionPath, BTreeMap<String, Document>>;

#[derive(Debug, Default)]
pub struct MemoryStore {
  docs:  RwLock<Collections>,
  state: RwLock<HashMap<String, DateTime<Utc>>>,
}

impl MemoryStore {
  pub fn new() -> Self { Self::default() }

  /// Build a store from a seed document of the shape
  /// `{ "<collection path>": { "<id>": { ...data } } }`.
  pub fn from_seed(seed: &str) -> Result<Self> {
    let raw: BTreeMap<String, Map<String, Value>> = serde_json::from_str(seed)?;
    let store = Self::new();
    for (path, docs) in raw {
      let collection: CollectionPath = path.parse()?;
      for (id, data) in docs {
        store.insert(Document::new(collection.clone(), id, data)?);
      }
    }
    Ok(store)
  }

  /// Insert or replace a document.
  pub fn insert(&self, doc: Document) {
    let mut docs = self.docs.write().unwrap_or_else(|e| e.into_inner());
    docs
      .entry(doc.collection.clone())
      .or_default()
      .insert(doc.id.clone(), doc);
  }

  pub fn len(&self) -> usize {
    let docs = self.docs.read().unwrap_or_else(|e| e.into_inner());
    docs.values().map(BTreeMap::len).sum()
  }

  pub fn is_empty(&self) -> bool { self.len() == 0 }
}

impl DocumentStore for MemoryStore {
  type Error = crate::Error;

  async fn get_docs(&self, query: &Query) -> Result<Vec<Document>> {
    query.validate()?;
    let docs = self.docs.read().unwrap_or_else(|e| e.into_inner());
    let candidates = docs
      .get(&query.collection)
      .map(|c| c.values().cloned().collect::<Vec<_>>())
      .unwrap_or_default();
    Ok(query.apply(candidates))
  }
}

impl SyncStateStore for MemoryStore {
  type Error = crate::Error;

  async fn last_sync(&self, organization_id: &str) -> Result<Option<DateTime<Utc>>> {
    let state = self.state.read().unwrap_or_else(|e| e.into_inner());
    Ok(state.get(&last_sync_key(organization_id)).copied())
  }

  async fn set_last_sync(&self, organization_id: &str, at: DateTime<Utc>) -> Result<()> {
    let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
    state.insert(last_sync_key(organization_id), at);
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{domain::field, Error};

  const SEED: &str = r#"{
    "campaigns": {
      "c1": { "organization_id": "org-1", "active": true },
      "c2": { "organization_id": "org-1", "active": false }
    },
    "sessions/s1/registers": {
      "r1": { "organization_id": "org-1", "date": "2026-04-01T08:00:00Z" }
    }
  }"#;

  #[tokio::test]
  async fn seed_loads_root_and_subcollections() {
    let store = MemoryStore::from_seed(SEED).unwrap();
    assert_eq!(store.len(), 3);

    let active = Query::new(CollectionPath::root("campaigns"))
      .where_eq(field::ORGANIZATION_ID, "org-1")
      .where_eq(field::ACTIVE, true)
      .limit(1);
    let docs = store.get_docs(&active).await.unwrap();
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].id, "c1");

    let registers = Query::new("sessions/s1/registers".parse().unwrap());
    assert_eq!(store.get_docs(&registers).await.unwrap().len(), 1);
  }

  #[tokio::test]
  async fn oversized_in_filters_are_rejected_like_the_remote() {
    let store = MemoryStore::new();
    let mut q = Query::new(CollectionPath::root("plots"));
    q.filters.push(crate::query::Filter {
      field: field::FIELD_ID.into(),
      op:    crate::query::Op::In,
      value: Value::Array((0..40).map(Value::from).collect()),
    });
    assert!(matches!(
      store.get_docs(&q).await,
      Err(Error::InFilterTooLarge { len: 40, .. })
    ));
  }

  #[tokio::test]
  async fn watermarks_are_kept_per_organization() {
    let store = MemoryStore::new();
    let at = Utc::now();
    store.set_last_sync("org-1", at).await.unwrap();
    assert_eq!(store.last_sync("org-1").await.unwrap(), Some(at));
    assert_eq!(store.last_sync("org-2").await.unwrap(), None);
  }
}
