use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use memverse_core::config::MemverseConfig;
use memverse_core::types::NewVerse;
use memverse_core::SystemClock;
use memverse_scheduler::LogNotifier;
use memverse_store::SqliteStore;
use tracing::info;

mod app;
mod http;

#[derive(Debug, Parser)]
#[command(name = "memverse-gateway", version, about = "Memory-verse delivery service")]
struct Cli {
    /// Path to memverse.toml (overrides MEMVERSE_CONFIG).
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP server and the delivery sweep (default).
    Serve,
    /// Load verses from a JSON array of {reference, verse, translation}.
    ImportVerses { file: PathBuf },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "memverse_gateway=info,memverse_scheduler=info,tower_http=debug".into()
            }),
        )
        .init();

    let cli = Cli::parse();

    // load config: --config > MEMVERSE_CONFIG env > ~/.memverse/memverse.toml
    let config_path = cli.config.or_else(|| std::env::var("MEMVERSE_CONFIG").ok());
    let config = MemverseConfig::load(config_path.as_deref()).unwrap_or_else(|e| {
        tracing::warn!("Config load failed ({}), using defaults", e);
        MemverseConfig::default()
    });

    let store = open_store(&config.database.path)?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config, store).await,
        Command::ImportVerses { file } => import_verses(&store, &file).await,
    }
}

fn open_store(db_path: &str) -> anyhow::Result<SqliteStore> {
    ensure_parent_dir(db_path);
    info!(path = %db_path, "opening SQLite database");

    let db = rusqlite::Connection::open(db_path)
        .with_context(|| format!("opening database at {db_path}"))?;
    db.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;

    // runs the schema migrations (idempotent)
    let store = SqliteStore::new(db)?;
    info!("database migrations complete");
    Ok(store)
}

async fn serve(config: MemverseConfig, store: SqliteStore) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.server.bind, config.server.port)
        .parse()
        .context("invalid server.bind / server.port")?;

    let notifier = Arc::new(
        LogNotifier::new(&config.mail.dashboard_url, &config.mail.unsubscribe_url)
            .with_from_name(&config.mail.from_name),
    );
    let services = app::Services::build(config, store, Arc::new(SystemClock), notifier);

    let dispatcher = tokio::spawn(services.dispatcher.run());
    let sweep = Arc::clone(&services.sweep).spawn();
    let router = app::build_router(Arc::clone(&services.state));

    info!(%addr, "memverse gateway listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Stop the sweep first; it waits for a tick already in flight.
    sweep.stop().await;
    // Drop the last queue producers so the dispatcher drains and exits.
    drop(services.sweep);
    drop(services.state);
    let stats = dispatcher.await.context("notification dispatcher panicked")?;
    info!(
        enqueued = stats.enqueued,
        sent = stats.sent,
        failed = stats.failed,
        dropped = stats.dropped,
        "shutdown complete"
    );
    Ok(())
}

async fn import_verses(store: &SqliteStore, file: &PathBuf) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(file)
        .with_context(|| format!("reading {}", file.display()))?;
    let verses: Vec<NewVerse> =
        serde_json::from_str(&raw).with_context(|| format!("parsing {}", file.display()))?;
    let total = verses.len();
    let written = store.import_verses(verses).await?;
    info!(file = %file.display(), total, written, "verses imported");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for Ctrl-C: {e}");
        // Without a signal handler, run until killed.
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}

/// Ensure the parent directory for a file path exists.
fn ensure_parent_dir(path: &str) {
    if let Some(parent) = std::path::Path::new(path).parent() {
        let _ = std::fs::create_dir_all(parent);
    }
}
