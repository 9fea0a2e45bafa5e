//! Tunables for a priming run.

use harvest_core::query::MAX_IN_VALUES;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Bounds applied to the reads issued while priming.
///
/// Deserialised from the `[priming]` table of the CLI config; every field
/// falls back to its default when absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrimingConfig {
  /// Ids per `in` predicate. Values above [`MAX_IN_VALUES`] are clamped.
  pub chunk_size:                   usize,
  pub silo_bag_limit:               usize,
  pub logistics_limit:              usize,
  /// Registers primed per harvest session, newest first.
  pub register_limit:               usize,
  /// Movements primed per silo bag, newest first.
  pub movement_limit:               usize,
  /// How far back finished sessions stay in the cache for reporting.
  pub finished_session_window_days: i64,
}

impl Default for PrimingConfig {
  fn default() -> Self {
    Self {
      chunk_size:                   MAX_IN_VALUES,
      silo_bag_limit:               50,
      logistics_limit:              50,
      register_limit:               50,
      movement_limit:               20,
      finished_session_window_days: 30,
    }
  }
}

impl PrimingConfig {
  pub fn validate(&self) -> Result<()> {
    if self.chunk_size == 0 {
      return Err(Error::ZeroChunkSize);
    }
    let limits = [
      ("silo_bag_limit", self.silo_bag_limit),
      ("logistics_limit", self.logistics_limit),
      ("register_limit", self.register_limit),
      ("movement_limit", self.movement_limit),
    ];
    if let Some((name, _)) = limits.into_iter().find(|(_, v)| *v == 0) {
      return Err(Error::ZeroLimit(name));
    }
    if self.finished_session_window_days < 0 {
      return Err(Error::NegativeWindow(self.finished_session_window_days));
    }
    Ok(())
  }

  /// The chunk size actually used for `in` predicates.
  pub fn effective_chunk_size(&self) -> usize { self.chunk_size.clamp(1, MAX_IN_VALUES) }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn defaults_match_store_limits() {
    let cfg = PrimingConfig::default();
    assert!(cfg.validate().is_ok());
    assert_eq!(cfg.effective_chunk_size(), 30);
  }

  #[test]
  fn oversized_chunks_are_clamped_and_zero_rejected() {
    let cfg = PrimingConfig { chunk_size: 100, ..Default::default() };
    assert_eq!(cfg.effective_chunk_size(), MAX_IN_VALUES);

    let cfg = PrimingConfig { chunk_size: 0, ..Default::default() };
    assert!(matches!(cfg.validate(), Err(Error::ZeroChunkSize)));

    let cfg = PrimingConfig { movement_limit: 0, ..Default::default() };
    assert!(matches!(cfg.validate(), Err(Error::ZeroLimit("movement_limit"))));
  }

  #[test]
  fn partial_tables_fill_in_defaults() {
    let cfg: PrimingConfig = serde_json::from_str(r#"{ "chunk_size": 10 }"#).unwrap();
    assert_eq!(cfg.chunk_size, 10);
    assert_eq!(cfg.register_limit, 50);
  }
}
