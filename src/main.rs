//! relaybot - pluggable IRC client engine.

use relaybot::Engine;
use relaybot::config::{Config, validate};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "relaybot.toml".to_string());

    let config = Config::load(&config_path).map_err(|e| {
        error!(path = %config_path, error = %e, "Failed to load config");
        e
    })?;

    if let Err(errors) = validate(&config) {
        for e in &errors {
            error!(error = %e, "Invalid configuration");
        }
        anyhow::bail!("{} configuration error(s) in {}", errors.len(), config_path);
    }

    info!(
        nick = %config.identity.nick,
        servers = ?config.servers,
        autoload = ?config.modules.autoload,
        "Starting relaybot"
    );

    relaybot::metrics::init();

    let engine = Engine::new(config.clone());
    let control = engine.control();

    if let Some(port) = config.metrics_port.filter(|p| *p != 0) {
        tokio::spawn(relaybot::http::run_http_server(port, control.clone()));
    }

    {
        let control = control.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("Received shutdown signal");
                    control.kill("Shutting down", true);
                }
                Err(e) => warn!(error = %e, "Failed to listen for shutdown signal"),
            }
        });
    }

    engine.run().await
}
