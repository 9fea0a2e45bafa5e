//! Error types for `harvest-priming`.

use std::sync::Arc;

use thiserror::Error;

use crate::metrics::PrimingMetrics;

/// Configuration errors, raised before any query is issued.
#[derive(Debug, Error)]
pub enum Error {
  #[error("chunk_size must be at least 1")]
  ZeroChunkSize,

  #[error("{0} must be at least 1")]
  ZeroLimit(&'static str),

  #[error("finished_session_window_days must not be negative (got {0})")]
  NegativeWindow(i64),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Boxed store error, shareable between callers joined on one run.
pub type StoreError = Arc<dyn std::error::Error + Send + Sync>;

/// Why a run aborted.
#[derive(Debug, Clone, Error)]
pub enum Cause {
  #[error("query {label} failed: {source}")]
  Query {
    label:  String,
    #[source]
    source: StoreError,
  },

  #[error("could not build query {label}: {source}")]
  Build {
    label:  String,
    #[source]
    source: Arc<harvest_core::Error>,
  },
}

/// A priming run that aborted in stages 1–3.
///
/// Carries the metrics gathered up to the failure so callers can still report
/// partial progress.
#[derive(Debug, Clone, Error)]
#[error("priming failed: {cause}")]
pub struct PrimingError {
  #[source]
  pub cause:   Cause,
  pub metrics: PrimingMetrics,
}
