mod bootstrap;
mod chat;
mod health;

use anyhow::Result;
use pricebot_core::config::{AppConfig, LoadOptions};

fn init_logging(config: &AppConfig) {
    use pricebot_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    // Load config and initialize logging before any other operations
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config)?;

    let chat_state = chat::ChatState {
        driver: app.driver.clone(),
        turn_timeout_secs: app.config.agent.turn_timeout_secs,
    };
    let routes = chat::router(chat_state).merge(health::router(app.config.clone()));

    let address = format!("{}:{}", app.config.server.bind_address, app.config.server.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;
    tracing::info!(
        event_name = "system.server.started",
        bind_address = %address,
        "pricebot-server listening"
    );

    axum::serve(listener, routes)
        .with_graceful_shutdown(wait_for_shutdown(app.config.server.graceful_shutdown_secs))
        .await?;

    tracing::info!(event_name = "system.server.stopped", "pricebot-server stopped");
    Ok(())
}

async fn wait_for_shutdown(graceful_secs: u64) {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!(
            event_name = "system.server.signal_error",
            error = %error,
            "failed to listen for shutdown signal"
        );
        return;
    }
    tracing::info!(
        event_name = "system.server.stopping",
        graceful_secs,
        "shutdown signal received, draining connections"
    );
}
