//! [`Scope`] — the security-scoped query builder.
//!
//! Every collection in the remote store is shared by all tenants, so every
//! read must carry `organization_id == X`. Readers obtain their queries from a
//! `Scope` instead of building [`Query`] values by hand, which makes an
//! unscoped read impossible to express by accident.

use crate::{
  document::Document,
  domain::field,
  query::{CollectionPath, Query},
  tenant::TenantContext,
};

#[derive(Debug, Clone)]
pub struct Scope {
  tenant: TenantContext,
}

impl Scope {
  pub fn new(tenant: &TenantContext) -> Self { Self { tenant: tenant.clone() } }

  pub fn tenant(&self) -> &TenantContext { &self.tenant }

  pub fn organization_id(&self) -> &str { &self.tenant.organization_id }

  /// A query over the root collection `name`, restricted to the tenant.
  pub fn collection(&self, name: &str) -> Query {
    self.scoped(CollectionPath::root(name))
  }

  /// A query over subcollection `name` owned by `parent`.
  pub fn subcollection(&self, parent: &Document, name: &str) -> Query {
    self.scoped(parent.collection.child(parent.id.clone(), name))
  }

  /// Whether `query` carries this tenant's organization predicate.
  pub fn is_scoped(&self, query: &Query) -> bool {
    query
      .eq_value(field::ORGANIZATION_ID)
      .and_then(|v| v.as_str())
      == Some(self.organization_id())
  }

  fn scoped(&self, path: CollectionPath) -> Query {
    Query::new(path).where_eq(field::ORGANIZATION_ID, self.organization_id())
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;
  use crate::tenant::Role;

  #[test]
  fn root_and_subcollection_queries_are_scoped() {
    let scope = Scope::new(&TenantContext::new("org-1", "u1", Role::Manager));
    let sessions = scope.collection("sessions");
    assert!(scope.is_scoped(&sessions));

    let parent = Document::new(CollectionPath::root("sessions"), "s1", json!({})).unwrap();
    let registers = scope.subcollection(&parent, "registers");
    assert_eq!(registers.collection.to_string(), "sessions/s1/registers");
    assert!(scope.is_scoped(&registers));

    let other = Scope::new(&TenantContext::new("org-2", "u1", Role::Admin));
    assert!(!other.is_scoped(&registers));
  }
}
