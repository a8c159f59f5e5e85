//! `anchor`: operator CLI for claims and identity records.
//!
//! # Usage
//!
//! ```
//! anchor claim add 4ff7ed97-b78f-4ae6-9011-5af714ee241c dns example.com
//! anchor claim verify 4ff7ed97-b78f-4ae6-9011-5af714ee241c dns:example.com
//! anchor profile edit 4ff7ed97-b78f-4ae6-9011-5af714ee241c edit.json
//! anchor --config /etc/anchor/anchor.toml profile show 4ff7ed97-...
//! ```
//!
//! Every command prints pretty JSON on stdout.

mod settings;

use std::path::PathBuf;

use anchor_core::profile::{CanonicalizeOptions, ProfileEdit};
use anchor_store_sqlite::SqliteStore;
use anchor_verify::{
  CachedResolver, ClaimService, DohClient, HttpFetcher, Verifier,
};
use anyhow::Context as _;
use clap::{Parser, Subcommand};
use serde::Serialize;
use settings::AppConfig;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

type Service =
  ClaimService<SqliteStore, CachedResolver<DohClient, SqliteStore>, HttpFetcher>;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(author, version, about = "Anchor claims verification engine")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "anchor.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Manage a subject's claims.
  #[command(subcommand)]
  Claim(ClaimCommand),

  /// Render or edit a subject's identity record.
  #[command(subcommand)]
  Profile(ProfileCommand),
}

#[derive(Subcommand)]
enum ClaimCommand {
  /// Create (or re-submit) a claim.
  Add {
    subject:    String,
    /// One of `website`, `dns`, `code_host`, `public_profile`.
    claim_type: String,
    target:     String,
  },

  /// List a subject's claims.
  List { subject: String },

  /// Check a claim now and store the outcome.
  Verify {
    subject:      String,
    claim_id:     String,
    /// Ignore cached DNS answers.
    #[arg(long)]
    bypass_cache: bool,
  },

  /// Delete a claim.
  Remove { subject: String, claim_id: String },
}

#[derive(Subcommand)]
enum ProfileCommand {
  /// Print the public identity record with the effective `sameAs` set.
  Show { subject: String },

  /// Apply a JSON edit to the stored identity record.
  Edit {
    subject:    String,
    edit:       PathBuf,
    /// Advance `dateModified` even if nothing changed.
    #[arg(long)]
    force_bump: bool,
  },
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_writer(std::io::stderr)
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();
  let cfg = AppConfig::load(&cli.config)?;
  let service = build_service(&cfg).await?;

  match cli.command {
    Command::Claim(cmd) => run_claim(&service, cmd).await,
    Command::Profile(cmd) => run_profile(&service, cmd).await,
  }
}

async fn build_service(cfg: &AppConfig) -> anyhow::Result<Service> {
  let store_path = cfg.store_path();
  if let Some(parent) = store_path.parent()
    && !parent.as_os_str().is_empty()
  {
    std::fs::create_dir_all(parent)
      .with_context(|| format!("failed to create {parent:?}"))?;
  }

  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  let doh = DohClient::new(&cfg.doh()).context("failed to build DoH client")?;
  let fetcher =
    HttpFetcher::new(&cfg.fetch()).context("failed to build HTTP client")?;
  let resolver = CachedResolver::new(doh, store.clone());
  let verifier = Verifier::new(resolver, fetcher, cfg.engine());

  Ok(ClaimService::new(store, verifier))
}

// ─── Commands ─────────────────────────────────────────────────────────────────

async fn run_claim(service: &Service, cmd: ClaimCommand) -> anyhow::Result<()> {
  match cmd {
    ClaimCommand::Add {
      subject,
      claim_type,
      target,
    } => print_json(&service.create_claim(&subject, &claim_type, &target).await?),
    ClaimCommand::List { subject } => {
      print_json(&service.list_claims(&subject).await?)
    }
    ClaimCommand::Verify {
      subject,
      claim_id,
      bypass_cache,
    } => print_json(
      &service
        .verify_claim(&subject, &claim_id, bypass_cache)
        .await?,
    ),
    ClaimCommand::Remove { subject, claim_id } => {
      let removed = service.delete_claim(&subject, &claim_id).await?;
      print_json(&serde_json::json!({ "removed": removed }))
    }
  }
}

async fn run_profile(
  service: &Service,
  cmd: ProfileCommand,
) -> anyhow::Result<()> {
  match cmd {
    ProfileCommand::Show { subject } => {
      let built = service
        .render_profile(&subject, None, CanonicalizeOptions::default())
        .await?;
      print_json(&built.public_record())
    }
    ProfileCommand::Edit {
      subject,
      edit,
      force_bump,
    } => {
      let raw = std::fs::read_to_string(&edit)
        .with_context(|| format!("reading edit file {}", edit.display()))?;
      let edit: ProfileEdit =
        serde_json::from_str(&raw).context("parsing edit file")?;
      let options = CanonicalizeOptions {
        force_bump,
        ..CanonicalizeOptions::default()
      };
      print_json(&service.render_profile(&subject, Some(&edit), options).await?)
    }
  }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
  let out = serde_json::to_string_pretty(value)?;
  println!("{out}");
  Ok(())
}
