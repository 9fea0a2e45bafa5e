//! Error types for `harvest-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("`in` filter on {field} has {len} values; the store accepts at most {max}")]
  InFilterTooLarge {
    field: String,
    len:   usize,
    max:   usize,
  },

  #[error("`in` filter on {0} has no values")]
  EmptyInFilter(String),

  #[error("invalid collection path: {0:?}")]
  InvalidPath(String),

  #[error("document {0} is not a JSON object")]
  NotAnObject(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
