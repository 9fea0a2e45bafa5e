//! Runtime settings: a TOML file layered with `HARVEST_` environment
//! variables.
//!
//! Nested keys use `__` in the environment, e.g. `HARVEST_REMOTE__URL` or
//! `HARVEST_PRIMING__CHUNK_SIZE`.

use std::{
  path::{Path, PathBuf},
  time::Duration,
};

use config::{Config, ConfigError, Environment, File, Source};
use harvest_core::tenant::{Role, TenantContext};
use harvest_priming::PrimingConfig;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
  pub organization_id: String,
  pub user_id:         String,
  pub role:            Role,
  /// SQLite cache file. A leading `~` is expanded.
  #[serde(default = "default_cache_path")]
  pub cache_path:      PathBuf,
  #[serde(default)]
  pub remote:          RemoteSettings,
  #[serde(default)]
  pub priming:         PrimingConfig,
}

/// Where remote reads go: an HTTP endpoint, or a JSON seed file standing in
/// for one.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RemoteSettings {
  pub url:          Option<String>,
  pub token:        Option<String>,
  pub seed:         Option<PathBuf>,
  pub timeout_secs: u64,
}

impl Default for RemoteSettings {
  fn default() -> Self {
    Self { url: None, token: None, seed: None, timeout_secs: 30 }
  }
}

impl RemoteSettings {
  pub fn timeout(&self) -> Duration { Duration::from_secs(self.timeout_secs) }
}

fn default_cache_path() -> PathBuf { PathBuf::from("~/.local/share/harvest/cache.db") }

impl Settings {
  /// Read `path` (optional) and the `HARVEST_` environment.
  pub fn load(path: &Path) -> Result<Self, ConfigError> {
    Self::from_file(File::from(path).required(false))
  }

  fn from_file(file: impl Source + Send + Sync + 'static) -> Result<Self, ConfigError> {
    Config::builder()
      .add_source(file)
      .add_source(
        Environment::with_prefix("HARVEST")
          .prefix_separator("_")
          .separator("__")
          .try_parsing(true),
      )
      .build()?
      .try_deserialize()
  }

  pub fn tenant(&self) -> TenantContext {
    TenantContext::new(&self.organization_id, &self.user_id, self.role)
  }

  pub fn cache_path(&self) -> PathBuf { expand_tilde(&self.cache_path) }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

#[cfg(test)]
mod tests {
  use config::FileFormat;

  use super::*;

  fn parse(raw: &str) -> Result<Settings, ConfigError> {
    Settings::from_file(File::from_str(raw, FileFormat::Toml))
  }

  #[test]
  fn minimal_file_fills_defaults() {
    let s = parse(
      r#"
        organization_id = "org-1"
        user_id = "u1"
        role = "manager"
      "#,
    )
    .unwrap();
    assert_eq!(s.role, Role::Manager);
    assert_eq!(s.priming, PrimingConfig::default());
    assert_eq!(s.remote.timeout(), Duration::from_secs(30));
    assert!(s.remote.url.is_none());
    assert_eq!(s.tenant(), TenantContext::new("org-1", "u1", Role::Manager));
  }

  #[test]
  fn nested_sections_override_defaults() {
    let s = parse(
      r#"
        organization_id = "org-1"
        user_id = "u1"
        role = "owner"
        cache_path = "/tmp/harvest.db"

        [remote]
        url = "https://farm.test"
        token = "secret"

        [priming]
        chunk_size = 10
      "#,
    )
    .unwrap();
    assert_eq!(s.cache_path(), PathBuf::from("/tmp/harvest.db"));
    assert_eq!(s.remote.url.as_deref(), Some("https://farm.test"));
    assert_eq!(s.priming.chunk_size, 10);
    assert_eq!(s.priming.register_limit, PrimingConfig::default().register_limit);
  }

  #[test]
  fn unknown_role_is_rejected() {
    let err = parse(
      r#"
        organization_id = "org-1"
        user_id = "u1"
        role = "harvester"
      "#,
    );
    assert!(err.is_err());
  }

  #[test]
  fn tilde_expands_to_home() {
    let Ok(home) = std::env::var("HOME") else { return };
    assert_eq!(
      expand_tilde(Path::new("~/cache.db")),
      PathBuf::from(home).join("cache.db")
    );
    assert_eq!(expand_tilde(Path::new("/abs/cache.db")), PathBuf::from("/abs/cache.db"));
  }
}
