mod bot;
mod config;
mod platform;
mod subscription;
mod webhook;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::bot::NotificationHandler;
use crate::config::Config;
use crate::platform::client::{Credentials, PlatformClient};
use crate::subscription::{SubscriptionManager, SubscriptionState};
use crate::webhook::WebhookServer;

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,boatswain=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = run().await {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    info!("Loading configuration from: {}", config_path.display());
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;
    let listen = config.listen_endpoint()?;

    info!("Configuration loaded successfully");
    info!("  API: {}://{}", config.api.scheme, config.api.host);
    info!("  Webhook URL: {}", config.bot.webhook_url);
    info!("  Trigger phrase: {}", config.bot.phrase);

    let client = Arc::new(
        PlatformClient::new(
            Credentials::from_config(&config.api),
            Duration::from_secs(config.api.request_timeout_secs),
        )
        .context("Failed to create platform client")?,
    );

    subscribe_or_close(
        &client,
        &SubscriptionManager::from_config(&config.api),
        &config.bot.webhook_url,
        &config.bot.phrase,
    )
    .await?;

    info!("Creating endpoint...");
    let handler = Arc::new(NotificationHandler::from_config(
        client.clone(),
        &config.api,
        &config.bot,
    ));
    let server = WebhookServer::new(listen, handler);

    match server.start().await {
        Ok(addr) => info!("Server created on {}. Waiting for incoming connections...", addr),
        // Not fatal: keep running without a listener until terminated
        Err(e) => error!("Failed to initialize webhook server: {:#}", anyhow::Error::new(e)),
    }

    shutdown_signal().await;

    info!("Shutting down...");
    server.stop().await;
    client.close();

    Ok(())
}

/// Ensure the subscription exists; on failure the client is released before
/// the error is returned.
async fn subscribe_or_close(
    client: &PlatformClient,
    manager: &SubscriptionManager,
    webhook_url: &str,
    phrase: &str,
) -> Result<SubscriptionState> {
    match manager.ensure_subscribed(client, webhook_url, phrase).await {
        Ok(state) => Ok(state),
        Err(e) => {
            client.close();
            Err(anyhow::Error::new(e).context("Failed to subscribe bot to messages"))
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
