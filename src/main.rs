//! Frontdesk CLI entry point.

use anyhow::Context as _;
use clap::Parser;
use frontdesk::agent::{AgentPipeline, Orchestrator};
use frontdesk::config::Config;
use frontdesk::gateway::{self, AppState};
use frontdesk::inbox::InboxManager;
use frontdesk::llm::GeminiBackend;
use frontdesk::shield::Shield;
use frontdesk::store::SqliteStore;
use frontdesk::tools;
use frontdesk::transport::{AdminNotifier, EvolutionTransport, Transport};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

#[derive(Parser)]
#[command(name = "frontdesk")]
#[command(about = "Agentic WhatsApp concierge with per-sender coalescing")]
struct Cli {
    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = Config::load().context("failed to load configuration from environment")?;
    std::fs::create_dir_all(&config.data_dir)
        .with_context(|| format!("failed to create data directory: {}", config.data_dir.display()))?;

    let file_appender = tracing_appender::rolling::daily(config.data_dir.join("logs"), "frontdesk.log");
    let (file_writer, _log_guard) = tracing_appender::non_blocking(file_appender);

    let filter = if cli.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(file_writer))
        .init();

    tracing::info!("starting frontdesk");

    let db_url = format!("sqlite://{}", config.data_dir.join("frontdesk.db").display());
    let store = Arc::new(
        SqliteStore::connect(&db_url)
            .await
            .context("failed to connect to database")?,
    );
    tracing::info!("database connected");

    let backend = Arc::new(GeminiBackend::new(&config.llm).context("failed to build model backend")?);
    let transport: Arc<dyn Transport> =
        Arc::new(EvolutionTransport::new(&config.transport).context("failed to build transport")?);

    let registry = Arc::new(tools::default_registry(store.clone()));

    let orchestrator = Orchestrator::new(
        backend,
        registry,
        store,
        transport.clone(),
        config.identities.clone(),
        config.agent.clone(),
    );

    let notifier = AdminNotifier::new(transport.clone(), config.identities.admin.clone());
    let shield = Shield::new(notifier, config.identities.admin.clone());

    let pipeline = Arc::new(AgentPipeline::new(
        orchestrator,
        transport.clone(),
        shield,
        config.identities.clone(),
    ));

    let inbox = InboxManager::new(config.inbox, pipeline, transport);
    let state = AppState { inbox };

    tracing::info!(bind = %config.bind, "frontdesk ready");

    gateway::serve(config.bind, state, async {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("shutdown signal received");
    })
    .await?;

    tracing::info!("frontdesk stopped");
    Ok(())
}
