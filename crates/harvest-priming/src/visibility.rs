//! Role-based visibility of campaign fields.
//!
//! The store cannot OR two predicates on different fields in one query, so a
//! manager's view (assigned to them, or assigned to nobody) is two queries
//! whose results are merged by document id. Admins and owners need a single
//! query. Either way the rest of the pipeline only sees a merged document set.

use std::collections::BTreeSet;

use harvest_core::{
  document::Document,
  domain::{collection, field},
  query::Query,
  scope::Scope,
  tenant::TenantContext,
};
use serde_json::json;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldVisibility {
  /// Every campaign field in the organization.
  All,
  /// Fields listing `user_id` as responsible, plus unassigned fields.
  AssignedOrUnassigned { user_id: String },
}

impl FieldVisibility {
  pub fn for_tenant(tenant: &TenantContext) -> Self {
    if tenant.role.sees_all_fields() {
      Self::All
    } else {
      Self::AssignedOrUnassigned { user_id: tenant.user_id.clone() }
    }
  }

  /// The labelled queries whose merged results form the visible set.
  pub fn queries(&self, scope: &Scope, campaign_id: &str) -> Vec<(String, Query)> {
    let base = scope
      .collection(collection::CAMPAIGN_FIELDS)
      .where_eq(field::CAMPAIGN_ID, campaign_id);

    match self {
      Self::All => vec![("campaign_fields.all".into(), base)],
      Self::AssignedOrUnassigned { user_id } => vec![
        (
          "campaign_fields.assigned".into(),
          base.clone().array_contains(field::RESPONSIBLE_UIDS, user_id.as_str()),
        ),
        (
          "campaign_fields.unassigned".into(),
          base.where_eq(field::RESPONSIBLE_UIDS, json!([])),
        ),
      ],
    }
  }
}

/// Distinct field ids referenced by a set of campaign-field documents, in
/// sorted order.
pub fn field_ids(campaign_fields: &[Document]) -> Vec<String> {
  campaign_fields
    .iter()
    .filter_map(|cf| cf.get_str(field::FIELD_ID))
    .map(str::to_owned)
    .collect::<BTreeSet<_>>()
    .into_iter()
    .collect()
}

#[cfg(test)]
mod tests {
  use harvest_core::{query::Op, tenant::Role};

  use super::*;

  #[test]
  fn admins_and_owners_use_one_query() {
    for role in [Role::Admin, Role::Owner] {
      let tenant = TenantContext::new("org-1", "u1", role);
      let vis = FieldVisibility::for_tenant(&tenant);
      assert_eq!(vis, FieldVisibility::All);
      let queries = vis.queries(&Scope::new(&tenant), "c1");
      assert_eq!(queries.len(), 1);
      assert!(!queries[0].1.has_filter(field::RESPONSIBLE_UIDS));
    }
  }

  #[test]
  fn managers_fan_out_into_assigned_and_unassigned() {
    let tenant = TenantContext::new("org-1", "mgr", Role::Manager);
    let scope = Scope::new(&tenant);
    let queries = FieldVisibility::for_tenant(&tenant).queries(&scope, "c1");
    assert_eq!(queries.len(), 2);

    let assigned = &queries[0].1;
    let f = assigned
      .filters
      .iter()
      .find(|f| f.field == field::RESPONSIBLE_UIDS)
      .unwrap();
    assert_eq!(f.op, Op::ArrayContains);
    assert_eq!(f.value, json!("mgr"));

    let unassigned = &queries[1].1;
    assert_eq!(unassigned.eq_value(field::RESPONSIBLE_UIDS), Some(&json!([])));
    assert!(queries.iter().all(|(_, q)| scope.is_scoped(q)));
  }
}
