//! Run metrics and the instrumentation wrapper every query passes through.

use std::{
  collections::BTreeMap,
  fmt,
  future::Future,
  sync::{Arc, Mutex, PoisonError},
  time::{Duration, Instant},
};

use harvest_core::{document::Document, query::Query, store::DocumentStore};
use serde::{Deserialize, Serialize};

use crate::error::Cause;

// ─── Report types ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrimingStage {
  #[default]
  Idle,
  Starting,
  Completed,
  Error,
}

/// One failed query. Non-fatal failures come from best-effort subcollection
/// reads and did not abort the run.
///
/// Serialised as its display string, e.g. `[non-fatal] registers[s1]: denied`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct QueryFailure {
  pub query:   String,
  pub message: String,
  pub fatal:   bool,
}

impl fmt::Display for QueryFailure {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if !self.fatal {
      f.write_str(NON_FATAL)?;
    }
    write!(f, "{}: {}", self.query, self.message)
  }
}

const NON_FATAL: &str = "[non-fatal] ";

impl From<QueryFailure> for String {
  fn from(failure: QueryFailure) -> Self { failure.to_string() }
}

impl TryFrom<String> for QueryFailure {
  type Error = String;

  fn try_from(s: String) -> Result<Self, Self::Error> {
    let (fatal, rest) = match s.strip_prefix(NON_FATAL) {
      Some(rest) => (false, rest),
      None => (true, s.as_str()),
    };
    let (query, message) = rest
      .split_once(": ")
      .ok_or_else(|| format!("not a query failure: {s:?}"))?;
    Ok(Self { query: query.to_owned(), message: message.to_owned(), fatal })
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrimingMetrics {
  pub total_queries:   usize,
  pub total_documents: usize,
  /// Wall-clock duration of the run in milliseconds.
  pub duration:        u64,
  pub stage:           PrimingStage,
  pub errors:          Vec<QueryFailure>,
  /// Per-stage wall-clock durations in milliseconds.
  pub timings:         BTreeMap<String, u64>,
}

impl PrimingMetrics {
  pub fn fatal_errors(&self) -> impl Iterator<Item = &QueryFailure> {
    self.errors.iter().filter(|e| e.fatal)
  }
}

// ─── Recorder ────────────────────────────────────────────────────────────────

/// Shared, concurrently updated metrics for one run.
#[derive(Debug)]
pub(crate) struct Recorder {
  started: Instant,
  metrics: Mutex<PrimingMetrics>,
}

impl Recorder {
  pub fn start() -> Self {
    Self {
      started: Instant::now(),
      metrics: Mutex::new(PrimingMetrics {
        stage: PrimingStage::Starting,
        ..Default::default()
      }),
    }
  }

  fn with<T>(&self, f: impl FnOnce(&mut PrimingMetrics) -> T) -> T {
    let mut metrics = self.metrics.lock().unwrap_or_else(PoisonError::into_inner);
    f(&mut metrics)
  }

  /// Run one labelled query, counting it and the documents it returns. A
  /// failure is recorded as fatal and returned.
  pub async fn query<S: DocumentStore>(
    &self,
    store: &S,
    label: String,
    query: Query,
  ) -> Result<Vec<Document>, Cause> {
    self.run(store, label, query, true).await
  }

  /// Like [`Recorder::query`], but a failure is recorded as non-fatal and
  /// degrades to an empty result.
  pub async fn best_effort<S: DocumentStore>(
    &self,
    store: &S,
    label: String,
    query: Query,
  ) -> Vec<Document> {
    self.run(store, label, query, false).await.unwrap_or_default()
  }

  async fn run<S: DocumentStore>(
    &self,
    store: &S,
    label: String,
    query: Query,
    fatal: bool,
  ) -> Result<Vec<Document>, Cause> {
    self.with(|m| m.total_queries += 1);
    tracing::debug!(query = %label, %query, "issuing query");

    match store.get_docs(&query).await {
      Ok(docs) => {
        self.with(|m| m.total_documents += docs.len());
        tracing::debug!(query = %label, documents = docs.len(), "query settled");
        Ok(docs)
      }
      Err(e) => {
        let message = e.to_string();
        if fatal {
          tracing::error!(query = %label, error = %message, "query failed");
        } else {
          tracing::warn!(query = %label, error = %message, "best-effort query failed");
        }
        self.with(|m| {
          m.errors.push(QueryFailure { query: label.clone(), message, fatal })
        });
        Err(Cause::Query { label, source: Arc::new(e) })
      }
    }
  }

  /// Record a query that could not even be built.
  pub fn build_failed(&self, label: String, error: harvest_core::Error) -> Cause {
    self.with(|m| {
      m.errors.push(QueryFailure {
        query:   label.clone(),
        message: error.to_string(),
        fatal:   true,
      })
    });
    Cause::Build { label, source: Arc::new(error) }
  }

  /// Await `stage`, recording its wall-clock duration under `name` whether
  /// or not it succeeds.
  pub async fn stage<T>(&self, name: &str, stage: impl Future<Output = T>) -> T {
    let started = Instant::now();
    let out = stage.await;
    let elapsed = millis(started.elapsed());
    tracing::debug!(stage = name, elapsed_ms = elapsed, "stage finished");
    self.with(|m| m.timings.insert(name.to_owned(), elapsed));
    out
  }

  /// Snapshot the metrics with the final `stage` and total duration.
  pub fn finish(&self, stage: PrimingStage) -> PrimingMetrics {
    let duration = millis(self.started.elapsed());
    self.with(|m| {
      m.stage = stage;
      m.duration = duration;
      m.clone()
    })
  }
}

fn millis(d: Duration) -> u64 { u64::try_from(d.as_millis()).unwrap_or(u64::MAX) }

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn non_fatal_failures_are_marked() {
    let failure = QueryFailure {
      query:   "registers[s1]".into(),
      message: "permission denied".into(),
      fatal:   false,
    };
    assert_eq!(failure.to_string(), "[non-fatal] registers[s1]: permission denied");
  }

  #[test]
  fn metrics_serialise_in_camel_case() {
    let metrics = Recorder::start().finish(PrimingStage::Completed);
    let v = serde_json::to_value(&metrics).unwrap();
    assert_eq!(v["stage"], "completed");
    assert_eq!(v["totalQueries"], 0);
    assert!(v["timings"].as_object().unwrap().is_empty());
  }

  #[test]
  fn errors_serialise_as_strings() {
    let metrics = PrimingMetrics {
      errors: vec![
        QueryFailure {
          query:   "plots[0]".into(),
          message: "unavailable: try again".into(),
          fatal:   true,
        },
        QueryFailure {
          query:   "movements[sb1]".into(),
          message: "denied".into(),
          fatal:   false,
        },
      ],
      ..Default::default()
    };
    let v = serde_json::to_value(&metrics).unwrap();
    assert_eq!(
      v["errors"],
      serde_json::json!(["plots[0]: unavailable: try again", "[non-fatal] movements[sb1]: denied"])
    );
    let back: PrimingMetrics = serde_json::from_value(v).unwrap();
    assert_eq!(back, metrics);
  }
}
