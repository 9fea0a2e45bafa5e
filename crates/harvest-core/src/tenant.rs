//! Tenant context — who is priming, for which organization.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// The caller's role within the organization. Roles decide which campaign
/// fields are visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Role {
  Admin,
  Owner,
  Manager,
}

impl Role {
  /// Admins and owners see every campaign field in the organization.
  pub fn sees_all_fields(self) -> bool { matches!(self, Self::Admin | Self::Owner) }
}

/// Identity of the user on whose behalf the cache is primed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TenantContext {
  pub organization_id: String,
  pub user_id:         String,
  pub role:            Role,
}

impl TenantContext {
  pub fn new(
    organization_id: impl Into<String>,
    user_id: impl Into<String>,
    role: Role,
  ) -> Self {
    Self {
      organization_id: organization_id.into(),
      user_id: user_id.into(),
      role,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn roles_parse_case_insensitively() {
    assert_eq!("Manager".parse::<Role>().unwrap(), Role::Manager);
    assert_eq!("OWNER".parse::<Role>().unwrap(), Role::Owner);
    assert!("driver".parse::<Role>().is_err());
    assert!(Role::Admin.sees_all_fields());
    assert!(!Role::Manager.sees_all_fields());
  }
}
