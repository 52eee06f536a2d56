//! trivia-bot server binary.
//!
//! Reads `config.toml` (or the path given with `--config`) layered with
//! `TRIVIA_*` environment variables, opens the trivia store, reconciles
//! reviews left open by the previous run, and serves the HTTP ingress while
//! a background loop expires stale reviews and closes overdue rounds.

use std::{
  collections::HashSet,
  path::{Path, PathBuf},
  sync::Arc,
  time::Duration,
};

use anyhow::Context as _;
use clap::Parser;
use tokio::{net::TcpListener, sync::watch};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use trivia_bot::{
  AppState, BotConfig, Engine, generator::HttpDraftGenerator, transport::WebhookTransport,
};
use trivia_engine::{ReviewerDirectory, SystemClock, TriviaEngine};
use trivia_store_sqlite::{SqliteStatsService, SqliteStore};

#[derive(Parser)]
#[command(author, version, about = "Trivia bot server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(
      config::Environment::with_prefix("TRIVIA")
        .separator("__")
        .list_separator(",")
        .with_list_parse_key("moderators")
        .try_parsing(true),
    )
    .build()
    .context("failed to read config file")?;

  let bot_cfg: BotConfig = settings
    .try_deserialize()
    .context("failed to deserialise BotConfig")?;
  bot_cfg.validate().context("invalid configuration")?;

  let store_path = expand_tilde(&bot_cfg.store_path);
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  let stats = match &bot_cfg.stats_path {
    Some(path) => {
      let path = expand_tilde(path);
      SqliteStatsService::open_read_only(&path)
        .await
        .with_context(|| format!("failed to open stats database at {path:?}"))?
    }
    None => {
      tracing::warn!("no stats_path configured; dynamic questions will stay unresolved");
      SqliteStatsService::open_in_memory()
        .await
        .context("failed to open empty stats database")?
    }
  };

  let http_timeout = Duration::from_secs(bot_cfg.http_timeout_secs);
  let transport = WebhookTransport::new(bot_cfg.bridge_url.clone(), http_timeout)
    .context("failed to build chat bridge client")?;
  let generator = HttpDraftGenerator::new(bot_cfg.generator_url.clone(), http_timeout)
    .context("failed to build draft generator client")?;

  let engine: Arc<Engine<WebhookTransport, HttpDraftGenerator>> = Arc::new(TriviaEngine::new(
    Arc::new(store),
    Arc::new(transport),
    Arc::new(stats),
    Arc::new(generator),
    Arc::new(ReviewerDirectory::new(bot_cfg.reviewers.clone())),
    bot_cfg.engine.clone(),
    Arc::new(SystemClock),
  ));

  engine
    .resume_on_restart()
    .await
    .context("failed to resume approval workflow")?;

  // Background maintenance until shutdown.
  let (stop_tx, mut stop_rx) = watch::channel(false);
  let maintenance = {
    let engine = engine.clone();
    let period = bot_cfg.engine.sweep_interval();
    tokio::spawn(async move {
      let mut tick = tokio::time::interval(period);
      tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
      loop {
        tokio::select! {
          _ = tick.tick() => {
            let report = engine.run_maintenance().await;
            tracing::debug!(?report, "maintenance pass");
          }
          _ = stop_rx.changed() => break,
        }
      }
    })
  };

  let state = AppState {
    engine,
    moderators: Arc::new(bot_cfg.moderators.iter().cloned().collect::<HashSet<_>>()),
  };
  let app = trivia_bot::router(state);
  let address = format!("{}:{}", bot_cfg.host, bot_cfg.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app)
    .with_graceful_shutdown(async move {
      if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
      }
      tracing::info!("shutting down");
      stop_tx.send(true).ok();
    })
    .await
    .context("server error")?;

  maintenance.await.context("maintenance task panicked")?;
  Ok(())
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
