//! Encoding and decoding helpers between documents and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings. Document data is stored as
//! compact JSON; collection paths as their slash-separated form.

use chrono::{DateTime, Utc};
use harvest_core::{
  document::Document,
  domain::field,
  query::CollectionPath,
};

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Documents ───────────────────────────────────────────────────────────────

/// Column values for one `documents` row.
pub struct EncodedDocument {
  pub collection:      String,
  pub id:              String,
  pub organization_id: Option<String>,
  pub data_json:       String,
  pub updated_at:      Option<String>,
}

pub fn encode_document(doc: &Document) -> Result<EncodedDocument> {
  Ok(EncodedDocument {
    collection:      doc.collection.to_string(),
    id:              doc.id.clone(),
    organization_id: doc.get_str(field::ORGANIZATION_ID).map(str::to_owned),
    data_json:       serde_json::to_string(&doc.data)?,
    updated_at:      doc.updated_at().map(encode_dt),
  })
}

/// Raw row read back from `documents`.
pub struct RawDocument {
  pub collection: String,
  pub id:         String,
  pub data_json:  String,
}

impl RawDocument {
  pub fn into_document(self) -> Result<Document> {
    let collection: CollectionPath = self.collection.parse()?;
    let data = serde_json::from_str(&self.data_json)?;
    Ok(Document::new(collection, self.id, data)?)
  }
}

/// Collapse document ids out of a collection path so subcollections group
/// together: `sessions/s1/registers` → `sessions/*/registers`.
pub fn collection_pattern(path: &str) -> String {
  path
    .split('/')
    .enumerate()
    .map(|(i, seg)| if i % 2 == 1 { "*" } else { seg })
    .collect::<Vec<_>>()
    .join("/")
}
