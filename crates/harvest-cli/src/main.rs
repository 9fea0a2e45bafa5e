//! `harvest` — primes the local offline cache from the remote store.
//!
//! # Usage
//!
//! ```
//! harvest prime
//! harvest prime --retries 2 --json
//! harvest status
//! harvest --config ~/.config/harvest/harvest.toml status
//! ```

mod remote;
mod settings;

use std::{path::PathBuf, process::ExitCode, sync::Arc};

use anyhow::Context as _;
use chrono::{DateTime, Local, Utc};
use clap::{Parser, Subcommand};
use harvest_core::{
  memory::MemoryStore,
  store::{DocumentStore, SyncStateStore},
};
use harvest_priming::{Primer, PrimingReport, SyncError, prime_and_record};
use harvest_store_sqlite::{CachingStore, SqliteCache};
use remote::{HttpStore, RemoteConfig};
use settings::Settings;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(author, version, about = "Offline cache priming for harvest data")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "harvest.toml", env = "HARVEST_CONFIG")]
  config: PathBuf,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Read everything needed offline into the local cache.
  Prime {
    /// Re-run a failed priming up to this many times.
    #[arg(long, default_value_t = 0)]
    retries: u32,

    /// Print the report as JSON instead of a summary.
    #[arg(long)]
    json: bool,
  },

  /// Show the last sync time and cached document counts.
  Status,
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .with_writer(std::io::stderr)
    .init();

  let cli = Cli::parse();

  let settings = Settings::load(&cli.config)
    .with_context(|| format!("failed to read settings from {}", cli.config.display()))?;

  let cache_path = settings.cache_path();
  if let Some(parent) = cache_path.parent()
    && !parent.as_os_str().is_empty()
  {
    std::fs::create_dir_all(parent)
      .with_context(|| format!("failed to create {}", parent.display()))?;
  }
  let cache = SqliteCache::open(&cache_path)
    .await
    .with_context(|| format!("failed to open cache at {cache_path:?}"))?;

  match cli.command {
    Command::Status => status(&settings, &cache).await,
    Command::Prime { retries, json } => {
      let opts = PrimeOptions { retries, json };
      match (&settings.remote.url, &settings.remote.seed) {
        (Some(url), _) => {
          let remote = HttpStore::new(RemoteConfig {
            base_url: url.clone(),
            token:    settings.remote.token.clone(),
            timeout:  settings.remote.timeout(),
          })
          .context("failed to build HTTP client")?;
          prime(remote, cache, &settings, opts).await
        }
        (None, Some(seed)) => {
          let raw = std::fs::read_to_string(seed)
            .with_context(|| format!("reading seed file {}", seed.display()))?;
          let remote = MemoryStore::from_seed(&raw).context("parsing seed file")?;
          prime(remote, cache, &settings, opts).await
        }
        (None, None) => anyhow::bail!("no remote configured: set remote.url or remote.seed"),
      }
    }
  }
}

// ─── Commands ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
struct PrimeOptions {
  retries: u32,
  json:    bool,
}

async fn prime<R>(
  remote: R,
  cache: SqliteCache,
  settings: &Settings,
  opts: PrimeOptions,
) -> anyhow::Result<ExitCode>
where
  R: DocumentStore + 'static,
{
  let store = Arc::new(CachingStore::new(remote, cache.clone()));
  let primer =
    Primer::new(store, settings.priming.clone()).context("invalid priming settings")?;
  let tenant = settings.tenant();

  let mut attempt = 0;
  loop {
    eprintln!("syncing…");
    match prime_and_record(&primer, &cache, &tenant).await {
      Ok(report) => {
        if opts.json {
          println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
          print_report(&report);
        }
        return Ok(ExitCode::SUCCESS);
      }
      Err(e) => {
        eprintln!("sync failed: {e}");
        if let SyncError::Priming(err) = &e {
          for failure in &err.metrics.errors {
            eprintln!("  {failure}");
          }
        }
        if attempt >= opts.retries {
          return Ok(ExitCode::FAILURE);
        }
        attempt += 1;
        tracing::info!(attempt, of = opts.retries, "retrying priming");
      }
    }
  }
}

async fn status(settings: &Settings, cache: &SqliteCache) -> anyhow::Result<ExitCode> {
  let last_sync = cache
    .last_sync(&settings.organization_id)
    .await
    .context("reading sync state")?;
  match last_sync {
    Some(at) => println!("last sync: {}", local(at)),
    None => println!("last sync: never"),
  }

  let counts = cache.count_by_collection().await.context("counting cache")?;
  if counts.is_empty() {
    println!("cache is empty");
  }
  let width = counts.keys().map(String::len).max().unwrap_or(0);
  for (collection, n) in &counts {
    println!("  {collection:<width$}  {n}");
  }
  Ok(ExitCode::SUCCESS)
}

// ─── Output ───────────────────────────────────────────────────────────────────

fn local(at: DateTime<Utc>) -> String {
  at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string()
}

fn print_report(report: &PrimingReport) {
  let at = report.watermark.unwrap_or_else(Utc::now);
  let m = &report.metrics;
  match &report.campaign_id {
    Some(campaign) => println!(
      "synced at {} (campaign {campaign}: {} documents in {} queries, {} ms)",
      local(at),
      m.total_documents,
      m.total_queries,
      m.duration,
    ),
    None => println!("synced at {} (no active campaign)", local(at)),
  }
  for (stage, ms) in &m.timings {
    println!("  {stage:<24} {ms} ms");
  }
  for failure in &m.errors {
    println!("  {failure}");
  }
}
