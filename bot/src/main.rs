//! Whitelist bot binary.
//!
//! ```text
//! whitelist-bot [serve]            run the interactions endpoint
//! whitelist-bot lookup <username>  print the record for an account
//! whitelist-bot migrate            apply database migrations and exit
//! ```

use anyhow::{Context as _, bail};
use std::net::SocketAddr;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use whitelist_bot::app;
use whitelist_bot::config::{Config, DatabaseConfig};
use whitelist_runtime::metrics::MetricsServer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,whitelist_bot=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();

    match args.first().map(String::as_str) {
        None | Some("serve") => {
            let config = Config::from_env()?;
            if let Some(addr) = &config.server.metrics_addr {
                let addr: SocketAddr = addr.parse().with_context(|| format!("METRICS_ADDR {addr}"))?;
                MetricsServer::new(addr).start()?;
                info!(address = %addr, "Metrics exporter listening");
            }
            info!(application = %config.discord.application_id, "Starting whitelist bot");
            app::serve(config).await
        },
        Some("lookup") => {
            let Some(username) = args.get(1) else {
                bail!("usage: whitelist-bot lookup <username>");
            };
            match app::lookup(&DatabaseConfig::from_env(), username).await? {
                Some(snapshot) => println!("{snapshot}"),
                None => println!("No whitelist request found for {username}."),
            }
            Ok(())
        },
        Some("migrate") => app::migrate(&DatabaseConfig::from_env()).await,
        Some(other) => bail!("unknown command `{other}`; expected serve, lookup or migrate"),
    }
}
