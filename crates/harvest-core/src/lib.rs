//! Core types and trait definitions for the harvest offline cache.
//!
//! This crate is deliberately free of HTTP and database dependencies. It
//! describes the remote document store as a capability (`DocumentStore`) and
//! the query vocabulary every reader speaks; backends and the priming service
//! depend on it.

pub mod document;
pub mod domain;
pub mod error;
pub mod memory;
pub mod query;
pub mod scope;
pub mod store;
pub mod tenant;

pub use error::{Error, Result};
