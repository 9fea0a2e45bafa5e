//! Domain vocabulary: collection names, well-known field paths and the
//! status enums the priming service filters on.
//!
//! The application's full schema (crops, yields, weigh-ins…) is opaque to
//! this crate; only what is needed to walk the campaign → field → session
//! dependency graph lives here.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// Root and subcollection names.
pub mod collection {
  pub const CAMPAIGNS: &str = "campaigns";
  pub const CAMPAIGN_FIELDS: &str = "campaign_fields";
  pub const CROPS: &str = "crops";
  pub const DESTINATIONS: &str = "destinations";
  pub const FIELDS: &str = "fields";
  pub const HARVESTERS: &str = "harvesters";
  pub const LOGISTICS: &str = "logistics";
  pub const PLOTS: &str = "plots";
  pub const SESSIONS: &str = "sessions";
  pub const SILO_BAGS: &str = "silo_bags";
  pub const USERS: &str = "users";

  /// Weigh-in/weigh-out records under `sessions/{id}`.
  pub const REGISTERS: &str = "registers";
  /// Inventory movements under `silo_bags/{id}`.
  pub const MOVEMENTS: &str = "movements";
}

/// Field paths used in predicates.
pub mod field {
  pub const ORGANIZATION_ID: &str = "organization_id";
  pub const UPDATED_AT: &str = "updated_at";
  pub const ACTIVE: &str = "active";
  pub const STATUS: &str = "status";
  pub const CAMPAIGN_ID: &str = "campaign.id";
  pub const FIELD_ID: &str = "field.id";
  pub const RESPONSIBLE_UIDS: &str = "responsible_uids";
  pub const DATE: &str = "date";
}

// ─── Statuses ────────────────────────────────────────────────────────────────

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum SessionStatus {
  Pending,
  InProgress,
  Finished,
}

impl SessionStatus {
  /// Sessions still open for weigh-ins.
  pub const ACTIVE: [Self; 2] = [Self::Pending, Self::InProgress];
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum SiloBagStatus {
  Active,
  Closed,
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum LogisticsStatus {
  Pending,
  InTransit,
  Delivered,
  Cancelled,
}

impl LogisticsStatus {
  /// Orders a driver or dispatcher may still act on.
  pub const ACTIVE: [Self; 2] = [Self::Pending, Self::InTransit];
}

/// Render statuses as the string values stored in documents.
pub fn status_values<S: AsRef<str>>(statuses: &[S]) -> Vec<String> {
  statuses.iter().map(|s| s.as_ref().to_owned()).collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn statuses_use_stored_spelling() {
    assert_eq!(SessionStatus::InProgress.to_string(), "in-progress");
    assert_eq!(LogisticsStatus::InTransit.as_ref(), "in-transit");
    assert_eq!(
      status_values(&SessionStatus::ACTIVE),
      ["pending", "in-progress"]
    );
    assert_eq!(
      serde_json::to_value(SiloBagStatus::Active).unwrap(),
      serde_json::json!("active")
    );
  }
}
