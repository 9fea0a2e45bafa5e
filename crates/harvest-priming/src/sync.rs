//! Watermark bookkeeping around a priming run.

use harvest_core::{
  store::{DocumentStore, SyncStateStore},
  tenant::TenantContext,
};
use thiserror::Error;

use crate::{PrimingError, Primer, PrimingReport};

#[derive(Debug, Error)]
pub enum SyncError<E: std::error::Error + 'static> {
  #[error(transparent)]
  Priming(#[from] PrimingError),

  #[error("sync state store error: {0}")]
  State(#[source] E),
}

/// Prime with the persisted watermark and persist the new one.
///
/// The watermark is written only when the run succeeds, so a failed run is
/// retried from the same point.
pub async fn prime_and_record<S, St>(
  primer: &Primer<S>,
  state: &St,
  tenant: &TenantContext,
) -> Result<PrimingReport, SyncError<St::Error>>
where
  S: DocumentStore + 'static,
  St: SyncStateStore,
{
  let org = tenant.organization_id.as_str();
  let last_sync = state.last_sync(org).await.map_err(SyncError::State)?;

  let report = primer.prime(tenant, last_sync).await?;

  if let Some(watermark) = report.watermark
    && Some(watermark) != last_sync
  {
    state
      .set_last_sync(org, watermark)
      .await
      .map_err(SyncError::State)?;
    tracing::debug!(%watermark, "sync watermark advanced");
  }
  Ok(report)
}
