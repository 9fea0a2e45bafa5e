//! [`Primer`] — the staged priming run.
//!
//! 1. Base catalogs, active silo bags and logistics, and the active campaign.
//! 2. Campaign fields visible to the caller's role.
//! 3. Fields, plots and sessions, chunked by field id.
//! 4. Best-effort subcollections: session registers and silo-bag movements.
//!
//! Stages 1–3 are load-bearing; any failure there aborts the run. A failed
//! stage-4 read counts as zero documents for its parent.

use std::sync::{
  Arc, Mutex, PoisonError,
  atomic::{AtomicU64, Ordering},
};

use chrono::{DateTime, TimeDelta, Utc};
use futures::{
  FutureExt as _,
  future::{BoxFuture, Shared, WeakShared, join_all, try_join_all},
};
use harvest_core::{
  document::Document,
  domain::{
    LogisticsStatus, SessionStatus, SiloBagStatus, collection, field, status_values,
  },
  query::{DOCUMENT_ID, Direction, MAX_IN_VALUES, Query},
  scope::Scope,
  store::DocumentStore,
  tenant::TenantContext,
};
use serde::{Deserialize, Serialize};
use tracing::Instrument as _;
use uuid::Uuid;

use crate::{
  Result,
  chunk::{chunks, merge_by_id},
  config::PrimingConfig,
  error::{Cause, PrimingError},
  metrics::{PrimingMetrics, PrimingStage, Recorder},
  visibility::{FieldVisibility, field_ids},
};

pub const STAGE_BASE: &str = "stage1_base";
pub const STAGE_CAMPAIGN_FIELDS: &str = "stage2_campaign_fields";
pub const STAGE_PLOTS_SESSIONS: &str = "stage3_plots_sessions";
pub const STAGE_SUBCOLLECTIONS: &str = "stage4_subcollections";

/// Outcome of a successful run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrimingReport {
  pub metrics:     PrimingMetrics,
  /// The active campaign, or `None` when the run short-circuited.
  pub campaign_id: Option<String>,
  /// Watermark for the next incremental run. Persisting it is the caller's
  /// job.
  pub watermark:   Option<DateTime<Utc>>,
}

type Outcome = std::result::Result<PrimingReport, PrimingError>;
type SharedRun = Shared<BoxFuture<'static, Outcome>>;

#[derive(Debug, Clone, PartialEq, Eq)]
struct RunKey {
  tenant:    TenantContext,
  last_sync: Option<DateTime<Utc>>,
}

/// The run occupying the guard slot. Held weakly: once every caller awaiting
/// it has been dropped, the run is freed and the slot counts as vacant.
struct InFlight {
  id:  u64,
  key: RunKey,
  run: WeakShared<BoxFuture<'static, Outcome>>,
}

// ─── Primer ──────────────────────────────────────────────────────────────────

/// Primes the local cache by reading through `store`.
///
/// A second [`Primer::prime`] for the same tenant and watermark while a run
/// is in flight joins that run instead of issuing the reads again.
pub struct Primer<S> {
  store:     Arc<S>,
  config:    PrimingConfig,
  in_flight: Mutex<Option<InFlight>>,
  next_id:   AtomicU64,
}

impl<S> Primer<S>
where
  S: DocumentStore + 'static,
{
  pub fn new(store: Arc<S>, config: PrimingConfig) -> Result<Self> {
    config.validate()?;
    if config.chunk_size > MAX_IN_VALUES {
      tracing::warn!(
        chunk_size = config.chunk_size,
        max = MAX_IN_VALUES,
        "chunk_size exceeds the store's `in` limit; clamping"
      );
    }
    Ok(Self {
      store,
      config,
      in_flight: Mutex::new(None),
      next_id: AtomicU64::new(0),
    })
  }

  /// Run (or join) a priming pass for `tenant`.
  ///
  /// `last_sync` is the previous run's watermark; `None` means a full sync.
  /// The returned report carries the watermark to persist for next time.
  pub async fn prime(
    &self,
    tenant: &TenantContext,
    last_sync: Option<DateTime<Utc>>,
  ) -> Outcome {
    let (id, run) = self.join_or_start(RunKey { tenant: tenant.clone(), last_sync });
    let outcome = run.await;

    let mut slot = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
    if slot.as_ref().is_some_and(|f| f.id == id) {
      *slot = None;
    }
    outcome
  }

  fn join_or_start(&self, key: RunKey) -> (u64, SharedRun) {
    let mut slot = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);

    let live = slot
      .as_ref()
      .and_then(|flight| flight.run.upgrade().map(|run| (flight.id, &flight.key, run)));
    let occupied = match live {
      Some((id, running, run)) if *running == key => {
        tracing::info!(organization = %key.tenant.organization_id, "joining in-flight priming run");
        return (id, run);
      }
      Some(_) => true,
      None => false,
    };

    let id = self.next_id.fetch_add(1, Ordering::Relaxed);
    let run = Run::new(
      Arc::clone(&self.store),
      self.config.clone(),
      &key.tenant,
      key.last_sync,
    )
    .execute()
    .boxed()
    .shared();

    if !occupied {
      *slot = run.downgrade().map(|run| InFlight { id, key, run });
    }
    (id, run)
  }
}

// ─── Run ─────────────────────────────────────────────────────────────────────

struct Base {
  campaign:  Option<Document>,
  silo_bags: Vec<Document>,
}

/// State of one priming pass.
struct Run<S> {
  store:      Arc<S>,
  config:     PrimingConfig,
  scope:      Scope,
  last_sync:  Option<DateTime<Utc>>,
  started_at: DateTime<Utc>,
  recorder:   Recorder,
}

impl<S: DocumentStore> Run<S> {
  fn new(
    store: Arc<S>,
    config: PrimingConfig,
    tenant: &TenantContext,
    last_sync: Option<DateTime<Utc>>,
  ) -> Self {
    Self {
      store,
      config,
      scope: Scope::new(tenant),
      last_sync,
      started_at: Utc::now(),
      recorder: Recorder::start(),
    }
  }

  async fn execute(self) -> Outcome {
    let span = tracing::info_span!(
      "prime",
      run_id = %Uuid::new_v4(),
      organization = %self.scope.organization_id(),
      role = %self.scope.tenant().role,
      incremental = self.last_sync.is_some(),
    );

    async move {
      tracing::info!(last_sync = ?self.last_sync, "priming started");
      match self.stages().await {
        Ok(campaign_id) => {
          let metrics = self.recorder.finish(PrimingStage::Completed);
          // Without an active campaign nothing below stage 1 was read, so the
          // old watermark must stay in force.
          let watermark = match campaign_id {
            Some(_) => Some(self.started_at),
            None => self.last_sync,
          };
          tracing::info!(
            queries = metrics.total_queries,
            documents = metrics.total_documents,
            duration_ms = metrics.duration,
            non_fatal_errors = metrics.errors.len(),
            "priming completed"
          );
          Ok(PrimingReport { metrics, campaign_id, watermark })
        }
        Err(cause) => {
          let metrics = self.recorder.finish(PrimingStage::Error);
          tracing::error!(error = %cause, queries = metrics.total_queries, "priming aborted");
          Err(PrimingError { cause, metrics })
        }
      }
    }
    .instrument(span)
    .await
  }

  async fn stages(&self) -> Result<Option<String>, Cause> {
    let base = self.recorder.stage(STAGE_BASE, self.base()).await?;
    let Some(campaign) = base.campaign else {
      tracing::info!("no active campaign; nothing further to prime");
      return Ok(None);
    };
    tracing::info!(campaign = %campaign.id, "active campaign found");

    let fields = self
      .recorder
      .stage(STAGE_CAMPAIGN_FIELDS, self.campaign_fields(&campaign.id))
      .await?;

    let sessions = self
      .recorder
      .stage(STAGE_PLOTS_SESSIONS, self.plots_and_sessions(&campaign.id, &fields))
      .await?;

    self
      .recorder
      .stage(STAGE_SUBCOLLECTIONS, self.subcollections(&sessions, &base.silo_bags))
      .await;

    Ok(Some(campaign.id))
  }

  // ── Stage 1 ─────────────────────────────────────────────────────────────

  async fn base(&self) -> Result<Base, Cause> {
    let scope = &self.scope;

    // Never incremental: an active campaign untouched since the last run must
    // still be found.
    let campaign = scope
      .collection(collection::CAMPAIGNS)
      .where_eq(field::ACTIVE, true)
      .limit(1);

    let catalogs: Vec<_> = [
      collection::CROPS,
      collection::HARVESTERS,
      collection::DESTINATIONS,
      collection::USERS,
    ]
    .into_iter()
    .map(|name| self.query(name, self.incremental(scope.collection(name))))
    .collect();

    let silo_bags = scope
      .collection(collection::SILO_BAGS)
      .where_eq(field::STATUS, SiloBagStatus::Active.as_ref())
      .order_by(field::UPDATED_AT, Direction::Desc)
      .limit(self.config.silo_bag_limit);

    let logistics = self
      .build(
        "logistics.active",
        scope
          .collection(collection::LOGISTICS)
          .where_in(field::STATUS, status_values(&LogisticsStatus::ACTIVE)),
      )?
      .limit(self.config.logistics_limit);

    let (campaigns, _, silo_bags, _) = tokio::try_join!(
      self.query("campaigns.active", campaign),
      try_join_all(catalogs),
      self.query("silo_bags.active", silo_bags),
      self.query("logistics.active", logistics),
    )?;

    Ok(Base { campaign: campaigns.into_iter().next(), silo_bags })
  }

  // ── Stage 2 ─────────────────────────────────────────────────────────────

  /// Field ids visible to the caller in `campaign_id`. Always a full read:
  /// later stages need the complete set, not just what changed.
  async fn campaign_fields(&self, campaign_id: &str) -> Result<Vec<String>, Cause> {
    let visibility = FieldVisibility::for_tenant(self.scope.tenant());
    let queries: Vec<_> = visibility
      .queries(&self.scope, campaign_id)
      .into_iter()
      .map(|(label, query)| self.query(label, query))
      .collect();

    let results = try_join_all(queries).await?;
    let merged = merge_by_id(results.into_iter().flatten());
    let ids = field_ids(&merged);
    tracing::info!(campaign_fields = merged.len(), fields = ids.len(), "campaign fields resolved");
    Ok(ids)
  }

  // ── Stage 3 ─────────────────────────────────────────────────────────────

  /// Prime fields, plots and sessions for `field_ids`. Returns the sessions
  /// whose registers stage 4 should prime.
  async fn plots_and_sessions(
    &self,
    campaign_id: &str,
    field_ids: &[String],
  ) -> Result<Vec<Document>, Cause> {
    let scope = &self.scope;

    let fields = self.chunked("fields", field_ids, |chunk| {
      self
        .incremental(scope.collection(collection::FIELDS))
        .where_in(DOCUMENT_ID, chunk)
    });
    let plots = self.chunked("plots", field_ids, |chunk| {
      self
        .incremental(scope.collection(collection::PLOTS))
        .where_in(field::FIELD_ID, chunk)
    });
    let sessions = self.chunked("sessions.active", field_ids, |chunk| {
      self.active_sessions(campaign_id, chunk, true)
    });
    // With a watermark the query above only returns deltas; registers must be
    // primed for every open session, so fetch the complete list as well.
    let full_sessions = async {
      if self.last_sync.is_none() {
        return Ok(None);
      }
      self
        .chunked("sessions.active.full", field_ids, |chunk| {
          self.active_sessions(campaign_id, chunk, false)
        })
        .await
        .map(Some)
    };
    let finished = self.chunked("sessions.finished", field_ids, |chunk| {
      self.finished_sessions(campaign_id, chunk)
    });

    let (fields, plots, sessions, full_sessions, finished) =
      tokio::try_join!(fields, plots, sessions, full_sessions, finished)?;

    tracing::info!(
      fields = fields.len(),
      plots = plots.len(),
      sessions = sessions.len(),
      finished_sessions = finished.len(),
      "fields, plots and sessions primed"
    );

    let mut relevant = full_sessions.unwrap_or(sessions);
    relevant.extend(finished);
    Ok(relevant)
  }

  fn active_sessions(
    &self,
    campaign_id: &str,
    chunk: Vec<String>,
    incremental: bool,
  ) -> harvest_core::Result<Query> {
    let query = self
      .scope
      .collection(collection::SESSIONS)
      .where_eq(field::CAMPAIGN_ID, campaign_id);
    let query = if incremental { self.incremental(query) } else { query };
    query
      .where_in(field::STATUS, status_values(&SessionStatus::ACTIVE))?
      .where_in(field::FIELD_ID, chunk)
  }

  /// Sessions finished within the reporting window. Registers of a finished
  /// session no longer change, so this read stays incremental.
  fn finished_sessions(
    &self,
    campaign_id: &str,
    chunk: Vec<String>,
  ) -> harvest_core::Result<Query> {
    let window = TimeDelta::try_days(self.config.finished_session_window_days)
      .unwrap_or(TimeDelta::MAX);
    let cutoff = self
      .started_at
      .checked_sub_signed(window)
      .unwrap_or(DateTime::<Utc>::MIN_UTC);

    let query = self
      .scope
      .collection(collection::SESSIONS)
      .where_eq(field::CAMPAIGN_ID, campaign_id)
      .where_eq(field::STATUS, SessionStatus::Finished.as_ref())
      .where_gte(field::UPDATED_AT, cutoff.to_rfc3339());
    self.incremental(query).where_in(field::FIELD_ID, chunk)
  }

  // ── Stage 4 ─────────────────────────────────────────────────────────────

  async fn subcollections(&self, sessions: &[Document], silo_bags: &[Document]) {
    let registers: Vec<_> = sessions
      .iter()
      .map(|session| {
        let query = self
          .scope
          .subcollection(session, collection::REGISTERS)
          .order_by(field::DATE, Direction::Desc)
          .limit(self.config.register_limit);
        self
          .recorder
          .best_effort(&*self.store, format!("registers[{}]", session.id), query)
      })
      .collect();

    let movements: Vec<_> = silo_bags
      .iter()
      .map(|bag| {
        let query = self
          .scope
          .subcollection(bag, collection::MOVEMENTS)
          .order_by(field::DATE, Direction::Desc)
          .limit(self.config.movement_limit);
        self
          .recorder
          .best_effort(&*self.store, format!("movements[{}]", bag.id), query)
      })
      .collect();

    let (registers, movements) = tokio::join!(join_all(registers), join_all(movements));
    tracing::info!(
      registers = registers.iter().map(Vec::len).sum::<usize>(),
      movements = movements.iter().map(Vec::len).sum::<usize>(),
      "subcollections primed"
    );
  }

  // ── Helpers ─────────────────────────────────────────────────────────────

  async fn query(&self, label: impl Into<String>, query: Query) -> Result<Vec<Document>, Cause> {
    self.recorder.query(&*self.store, label.into(), query).await
  }

  fn build(&self, label: &str, query: harvest_core::Result<Query>) -> Result<Query, Cause> {
    query.map_err(|e| self.recorder.build_failed(label.to_owned(), e))
  }

  /// Restrict `query` to documents changed since the watermark, if any.
  fn incremental(&self, query: Query) -> Query {
    match self.last_sync {
      Some(since) => query.where_gt(field::UPDATED_AT, since.to_rfc3339()),
      None => query,
    }
  }

  /// Issue one query per chunk of `ids`, concurrently, and merge the results.
  /// No ids means no queries.
  async fn chunked<F>(
    &self,
    label: &str,
    ids: &[String],
    build: F,
  ) -> Result<Vec<Document>, Cause>
  where
    F: Fn(Vec<String>) -> harvest_core::Result<Query>,
  {
    let queries = chunks(ids, self.config.effective_chunk_size())
      .enumerate()
      .map(|(i, chunk)| -> Result<_, Cause> {
        let label = format!("{label}[{i}]");
        let query = self.build(&label, build(chunk.to_vec()))?;
        Ok(self.query(label, query))
      })
      .collect::<Result<Vec<_>, Cause>>()?;

    let results = try_join_all(queries).await?;
    Ok(merge_by_id(results.into_iter().flatten()))
  }
}
