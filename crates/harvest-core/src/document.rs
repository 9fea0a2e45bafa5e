//! Document — a single record read from the remote store.
//!
//! Documents are schemaless JSON objects addressed by a collection path and
//! an id. The priming service only ever looks at a handful of well-known
//! fields (see [`crate::domain::field`]); everything else is carried through
//! to the cache untouched.

use std::borrow::Cow;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
  Error, Result,
  domain::field,
  query::{CollectionPath, DOCUMENT_ID},
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
  pub id:         String,
  pub collection: CollectionPath,
  pub data:       Map<String, Value>,
}

impl Document {
  /// Build a document from a JSON value, which must be an object.
  pub fn new(
    collection: CollectionPath,
    id: impl Into<String>,
    data: Value,
  ) -> Result<Self> {
    let id = id.into();
    match data {
      Value::Object(data) => Ok(Self { id, collection, data }),
      _ => Err(Error::NotAnObject(format!("{collection}/{id}"))),
    }
  }

  /// Full slash-separated path, e.g. `sessions/s1/registers/r9`.
  pub fn path(&self) -> String { format!("{}/{}", self.collection, self.id) }

  /// Look up a dotted field path (`field.id`) inside the document data.
  pub fn lookup(&self, path: &str) -> Option<&Value> {
    let mut parts = path.split('.');
    let mut current = self.data.get(parts.next()?)?;
    for part in parts {
      current = current.as_object()?.get(part)?;
    }
    Some(current)
  }

  /// Resolve a field path as a query predicate sees it; `__name__` yields
  /// the document id.
  pub fn field(&self, path: &str) -> Option<Cow<'_, Value>> {
    if path == DOCUMENT_ID {
      return Some(Cow::Owned(Value::String(self.id.clone())));
    }
    self.lookup(path).map(Cow::Borrowed)
  }

  pub fn get_str(&self, path: &str) -> Option<&str> {
    self.lookup(path).and_then(Value::as_str)
  }

  /// The `updated_at` timestamp, if present and parseable as RFC 3339.
  pub fn updated_at(&self) -> Option<DateTime<Utc>> {
    self.get_str(field::UPDATED_AT).and_then(parse_timestamp)
  }
}

/// Parse an RFC 3339 timestamp into UTC.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .ok()
    .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  fn plot() -> Document {
    Document::new(
      CollectionPath::root("plots"),
      "p1",
      json!({
        "field": { "id": "f1", "name": "North" },
        "updated_at": "2026-03-01T10:00:00Z",
      }),
    )
    .unwrap()
  }

  #[test]
  fn dotted_lookup_walks_nested_objects() {
    let doc = plot();
    assert_eq!(doc.get_str("field.id"), Some("f1"));
    assert!(doc.lookup("field.missing").is_none());
    assert!(doc.lookup("updated_at.nested").is_none());
  }

  #[test]
  fn document_id_is_addressable_as_a_field() {
    let doc = plot();
    assert_eq!(doc.field(DOCUMENT_ID).unwrap().as_str(), Some("p1"));
    assert_eq!(doc.path(), "plots/p1");
  }

  #[test]
  fn non_object_data_is_rejected() {
    let err = Document::new(CollectionPath::root("plots"), "p2", json!([1, 2]));
    assert!(matches!(err, Err(Error::NotAnObject(p)) if p == "plots/p2"));
  }

  #[test]
  fn updated_at_parses_rfc3339() {
    let ts = plot().updated_at().unwrap();
    assert_eq!(ts.to_rfc3339(), "2026-03-01T10:00:00+00:00");
  }
}
