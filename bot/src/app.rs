//! Process wiring.
//!
//! [`assemble`] connects the engine, dispatcher and router over whatever
//! collaborators it is given; [`serve`] supplies the production ones and runs
//! the interactions endpoint until a shutdown signal arrives.

use crate::config::{Config, DatabaseConfig, DirectoryKind};
use crate::directory::{DirectoryActor, MemoryBackend, RconBackend};
use crate::dispatcher::{Dispatcher, embeds};
use crate::lifecycle::{LifecycleEngine, LifecycleEnvironment};
use crate::router::{InteractionRouter, command_definitions};
use anyhow::Context as _;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{info, warn};
use whitelist_core::directory::AccessDirectory;
use whitelist_core::environment::{Clock, SystemClock};
use whitelist_core::messaging::Messenger;
use whitelist_core::record_store::RecordStore;
use whitelist_discord::{DiscordClient, SignatureVerifier, interactions_router};
use whitelist_sqlite::SqliteRecordStore;

/// The connected services of one bot process.
pub struct Services {
    /// Request lifecycle
    pub engine: LifecycleEngine,
    /// Outbound notifications
    pub dispatcher: Arc<Dispatcher>,
    /// Inbound interactions
    pub router: Arc<InteractionRouter>,
}

/// Connect the lifecycle, dispatcher and router over the given collaborators.
#[must_use]
pub fn assemble(
    config: &Config,
    records: Arc<dyn RecordStore>,
    directory: Arc<dyn AccessDirectory>,
    messenger: Arc<dyn Messenger>,
    clock: Arc<dyn Clock>,
) -> Services {
    let dispatcher = Arc::new(Dispatcher::new(messenger, Arc::clone(&clock), config.discord.layout()));

    let environment = LifecycleEnvironment::new(records, directory, dispatcher.clone(), Arc::clone(&clock))
        .with_draft_ttl(Duration::from_secs(config.lifecycle.draft_ttl));
    let engine =
        LifecycleEngine::new(environment).with_timeout(Duration::from_secs(config.lifecycle.engine_timeout));

    let router = Arc::new(
        InteractionRouter::new(engine.clone(), Arc::clone(&dispatcher), clock)
            .with_ticket_close_delay(Duration::from_secs(config.lifecycle.ticket_close_delay)),
    );

    Services { engine, dispatcher, router }
}

/// Open the record store and bring its schema up to date.
///
/// # Errors
///
/// Returns an error if the database cannot be opened or migrated.
pub async fn open_records(config: &DatabaseConfig) -> anyhow::Result<SqliteRecordStore> {
    let records = SqliteRecordStore::connect(&config.url, config.max_connections)
        .await
        .with_context(|| format!("opening {}", config.url))?;
    records.migrate().await.context("running migrations")?;
    Ok(records)
}

/// Start the directory actor on the configured backend.
///
/// # Errors
///
/// Returns an error if the worker thread cannot be spawned.
pub fn start_directory(config: &Config) -> anyhow::Result<DirectoryActor> {
    let actor = match config.directory.kind {
        DirectoryKind::Rcon => {
            info!(address = %config.directory.rcon_address, "Using RCON whitelist");
            DirectoryActor::spawn(RconBackend::new(config.directory.rcon()))
        },
        DirectoryKind::Memory => {
            warn!("Using in-memory whitelist; the game server is not updated");
            DirectoryActor::spawn(MemoryBackend::new())
        },
    };
    actor.context("starting directory worker")
}

/// Run the bot until ctrl-c or SIGTERM.
///
/// # Errors
///
/// Returns an error if startup fails (database, directory worker, interaction
/// key, command registration or bind address) or the server stops abnormally.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    let records = Arc::new(open_records(&config.database).await?);
    info!("Record store ready");

    let directory = Arc::new(start_directory(&config)?);

    let client = Arc::new(DiscordClient::with_base(config.discord.token.clone(), config.discord.api_base.clone()));
    let verifier = SignatureVerifier::from_hex(&config.discord.public_key).context("DISCORD_PUBLIC_KEY")?;

    let services = assemble(&config, records.clone(), directory, client.clone(), Arc::new(SystemClock));

    client
        .register_commands(
            &config.discord.application_id,
            &config.discord.layout().guild,
            &command_definitions(),
        )
        .await
        .context("registering slash commands")?;

    if let Err(error) = services.dispatcher.ensure_request_panel().await {
        warn!(%error, "Could not check the request panel");
    }

    let app = interactions_router(services.router.clone(), verifier);
    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr).await.with_context(|| format!("binding {addr}"))?;
    info!(address = %addr, "Interactions endpoint listening");

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

    info!("Server stopped, draining lifecycle");
    if let Err(error) = services.engine.shutdown(Duration::from_secs(config.server.shutdown_timeout)).await {
        warn!(%error, "Lifecycle did not drain in time");
    }
    records.close().await;
    info!("Shutdown complete");
    Ok(())
}

/// Formatted record for `username`, or `None` when nobody asked for it.
///
/// # Errors
///
/// Returns an error if the database cannot be read.
pub async fn lookup(config: &DatabaseConfig, username: &str) -> anyhow::Result<Option<String>> {
    let records = open_records(config).await?;
    let record = records.get_by_game_account(username.trim().to_string(), true).await?;
    records.close().await;
    Ok(record.as_ref().map(embeds::lookup_snapshot))
}

/// Apply pending migrations and exit.
///
/// # Errors
///
/// Returns an error if the database cannot be opened or migrated.
pub async fn migrate(config: &DatabaseConfig) -> anyhow::Result<()> {
    let records = open_records(config).await?;
    records.close().await;
    info!("Migrations applied");
    Ok(())
}

/// Graceful shutdown signal handler.
///
/// Waits for:
/// - Ctrl+C (SIGINT)
/// - SIGTERM (in production environments)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = signal::ctrl_c().await {
            warn!(%error, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            },
            Err(error) => {
                warn!(%error, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C signal, shutting down gracefully...");
        },
        () = terminate => {
            info!("Received SIGTERM signal, shutting down gracefully...");
        },
    }
}
