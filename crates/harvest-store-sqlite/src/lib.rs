//! SQLite-backed local cache for harvest documents.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. [`SqliteCache`] answers queries
//! offline; [`CachingStore`] fills it as a side effect of remote reads.

mod cache;
mod caching;
mod encode;
mod schema;

pub mod error;

pub use cache::SqliteCache;
pub use caching::{CachingError, CachingStore};
pub use error::{Error, Result};
