//! Offline cache priming.
//!
//! [`Primer::prime`] walks the campaign → fields → plots/sessions →
//! subcollections dependency graph with a staged batch of reads against a
//! [`harvest_core::store::DocumentStore`]. Populating the local cache is the
//! store's side effect; this crate only decides *what* to read, in which
//! order, and records how it went.
//!
//! Stages run sequentially because each one derives its predicates from the
//! previous stage's results. Queries inside a stage are dispatched together
//! and joined before the next stage starts.

pub mod chunk;
pub mod config;
pub mod error;
pub mod metrics;
pub mod primer;
pub mod sync;
pub mod visibility;

pub use config::PrimingConfig;
pub use error::{Error, PrimingError, Result};
pub use metrics::{PrimingMetrics, PrimingStage, QueryFailure};
pub use primer::{Primer, PrimingReport};
pub use sync::{SyncError, prime_and_record};
