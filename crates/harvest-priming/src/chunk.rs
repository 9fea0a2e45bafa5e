//! Chunking of id lists for `in` predicates, and id-keyed merging of
//! results gathered from several queries.
//!
//! Any query with an "id in list" predicate over a caller-controlled id set
//! goes through [`chunks`] first; the store rejects `in` predicates larger
//! than [`MAX_IN_VALUES`].

use std::collections::BTreeMap;

use harvest_core::{document::Document, query::MAX_IN_VALUES};

/// Split `ids` into groups of at most `size` (clamped to
/// `1..=MAX_IN_VALUES`). An empty slice yields no chunks.
pub fn chunks<T>(ids: &[T], size: usize) -> std::slice::Chunks<'_, T> {
  ids.chunks(size.clamp(1, MAX_IN_VALUES))
}

/// Merge documents from several result sets into one, keyed by full document
/// path. When the same document arrives twice, the later copy wins; nothing
/// from either set is dropped.
pub fn merge_by_id(docs: impl IntoIterator<Item = Document>) -> Vec<Document> {
  let mut merged: BTreeMap<String, Document> = BTreeMap::new();
  for doc in docs {
    merged.insert(doc.path(), doc);
  }
  merged.into_values().collect()
}

#[cfg(test)]
mod tests {
  use harvest_core::query::CollectionPath;
  use serde_json::json;

  use super::*;

  #[test]
  fn chunk_counts_follow_ceiling_division() {
    for n in [0usize, 1, 29, 30, 31, 59, 60, 65, 91] {
      let ids: Vec<usize> = (0..n).collect();
      let sizes: Vec<usize> = chunks(&ids, 30).map(<[usize]>::len).collect();
      assert_eq!(sizes.len(), n.div_ceil(30), "n = {n}");
      assert_eq!(sizes.iter().sum::<usize>(), n);
      assert!(sizes.iter().all(|s| (1..=30).contains(s)));
    }
  }

  #[test]
  fn sixty_five_ids_split_thirty_thirty_five() {
    let ids: Vec<u32> = (0..65).collect();
    let sizes: Vec<usize> = chunks(&ids, 30).map(<[u32]>::len).collect();
    assert_eq!(sizes, [30, 30, 5]);
  }

  #[test]
  fn chunk_size_is_clamped_to_store_limit() {
    let ids: Vec<u32> = (0..45).collect();
    assert_eq!(chunks(&ids, 500).count(), 2);
    assert_eq!(chunks(&ids, 0).count(), 45);
  }

  #[test]
  fn merge_deduplicates_by_path() {
    let doc = |collection: &str, id: &str, v: u32| {
      Document::new(CollectionPath::root(collection), id, json!({ "v": v })).unwrap()
    };
    let merged = merge_by_id([
      doc("campaign_fields", "a", 1),
      doc("campaign_fields", "b", 1),
      doc("campaign_fields", "a", 2),
      doc("plots", "a", 1),
    ]);
    assert_eq!(merged.len(), 3);
    let a = merged
      .iter()
      .find(|d| d.collection.name() == "campaign_fields" && d.id == "a")
      .unwrap();
    assert_eq!(a.data["v"], 2);
  }
}
