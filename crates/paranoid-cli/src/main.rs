//! `paranoid` — inspect, soft-delete and restore records in a paranoid store.
//!
//! Reads `paranoid.toml` (or the path given with `--config`) for the store
//! location and the model schema, then runs one subcommand.
//!
//! # Usage
//!
//! ```
//! paranoid count person --deleted-only
//! paranoid list phone --where owner=6f1c… --with-deleted
//! paranoid delete person --id 6f1c…
//! paranoid restore person --where name=Ada
//! paranoid restore-deleted phone
//! ```

use std::path::PathBuf;

use anyhow::{Context as _, Result, bail};
use clap::{Args, Parser, Subcommand};
use paranoid_core::{Filter, Manager, QuerySet, Schema, schema::ModelDef};
use paranoid_store_sqlite::{SqliteStore, StoreConfig};
use serde::Deserialize;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(author, version, about = "Inspect and restore soft-deleted records")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "paranoid.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Count matching rows.
  Count {
    #[command(flatten)]
    target: Target,
    #[command(flatten)]
    mode:   Mode,
  },
  /// Print matching rows as JSON.
  List {
    #[command(flatten)]
    target: Target,
    #[command(flatten)]
    mode:   Mode,
  },
  /// Print the single non-deleted row matching the predicates.
  Get {
    #[command(flatten)]
    target: Target,
  },
  /// Soft-delete the single matching row and cascade.
  Delete {
    #[command(flatten)]
    target: Target,
  },
  /// Return the single matching row, restoring it (and its cascade) if it is
  /// soft-deleted.
  Restore {
    #[command(flatten)]
    target: Target,
  },
  /// Restore every soft-deleted row matching the predicates.
  RestoreDeleted {
    #[command(flatten)]
    target: Target,
  },
}

#[derive(Args)]
struct Target {
  /// Model name as declared in the config.
  model: String,

  /// Primary key of the row.
  #[arg(long)]
  id: Option<Uuid>,

  /// Equality predicate, repeatable.
  #[arg(long = "where", value_name = "FIELD=VALUE")]
  predicates: Vec<String>,
}

#[derive(Args)]
struct Mode {
  /// Include soft-deleted rows.
  #[arg(long, conflicts_with = "deleted_only")]
  with_deleted: bool,

  /// Only soft-deleted rows.
  #[arg(long)]
  deleted_only: bool,
}

// ─── Config file ──────────────────────────────────────────────────────────────

/// Shape of the TOML config file.
#[derive(Deserialize)]
struct AppConfig {
  store:  StoreConfig,
  #[serde(default)]
  models: Vec<ModelDef>,
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .with_writer(std::io::stderr)
    .init();

  let cli = Cli::parse();

  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config.clone()).required(false))
    .add_source(
      config::Environment::with_prefix("PARANOID")
        .prefix_separator("_")
        .separator("__"),
    )
    .build()
    .context("failed to read config file")?;

  let app_cfg: AppConfig = settings
    .try_deserialize()
    .context("failed to deserialise config")?;

  let schema = Schema::new(app_cfg.models).context("invalid model schema")?;

  let store = SqliteStore::open_with(&app_cfg.store)
    .await
    .with_context(|| format!("failed to open store at {:?}", app_cfg.store.path))?;
  tracing::debug!(path = ?app_cfg.store.path, models = schema.models().count(), "store opened");

  let manager = Manager::new(store, schema);
  run(&manager, cli.command).await
}

async fn run(manager: &Manager<SqliteStore>, command: Command) -> Result<()> {
  match command {
    Command::Count { target, mode } => {
      let rows = scoped(manager, &target, &mode)?;
      println!("{}", rows.count().await?);
    }
    Command::List { target, mode } => {
      let rows = scoped(manager, &target, &mode)?.fetch().await?;
      println!("{}", serde_json::to_string_pretty(&rows)?);
    }
    Command::Get { target } => {
      let record = manager.objects(&target.model).get(predicates(manager, &target)?).await?;
      println!("{}", serde_json::to_string_pretty(&record)?);
    }
    Command::Delete { target } => {
      let mut record = manager
        .objects(&target.model)
        .get(predicates(manager, &target)?)
        .await?;
      let rows = manager.delete(&mut record).await?;
      println!("deleted {} ({rows} rows)", record.key());
    }
    Command::Restore { target } => {
      let record = manager
        .objects(&target.model)
        .get_or_restore(predicates(manager, &target)?)
        .await?;
      println!("{}", serde_json::to_string_pretty(&record)?);
    }
    Command::RestoreDeleted { target } => {
      let rows = manager
        .objects(&target.model)
        .filter(predicates(manager, &target)?, None)
        .deleted_only()
        .restore()
        .await?;
      println!("restored {rows} rows");
    }
  }
  Ok(())
}

/// The queryset for `target` with the visibility requested by `mode`.
fn scoped(
  manager: &Manager<SqliteStore>,
  target:  &Target,
  mode:    &Mode,
) -> Result<QuerySet<SqliteStore>> {
  let rows = manager
    .objects(&target.model)
    .filter(predicates(manager, target)?, None);
  Ok(if mode.deleted_only {
    rows.deleted_only()
  } else {
    rows.all(mode.with_deleted)
  })
}

/// Turn `--id` and `--where field=value` arguments into a typed filter, parsing
/// each value according to the field's declared kind.
fn predicates(manager: &Manager<SqliteStore>, target: &Target) -> Result<Filter> {
  let model = manager.schema().model(&target.model)?;

  let mut filter = Filter::new();
  if let Some(id) = target.id {
    filter = filter.pk(id);
  }

  for predicate in &target.predicates {
    let Some((field, raw)) = predicate.split_once('=') else {
      bail!("expected FIELD=VALUE, got {predicate:?}");
    };
    let Some(def) = model.field_def(field) else {
      bail!("unknown field {field:?} on model {:?}", model.name);
    };
    let value = def
      .kind
      .parse(raw)
      .with_context(|| format!("invalid value for {field}"))?;
    filter = filter.eq(field, value);
  }
  Ok(filter)
}
