//! Startup helpers for the Lumina chat server.

use std::process::ExitCode;

use crate::chat::core::config::AppConfig;
use crate::server::{self, AppState};

/// Run the server (used by the `lumina-server` binary).
///
/// # Returns
/// `ExitCode::SUCCESS` on graceful shutdown, `1` on failure.
#[must_use]
pub fn run() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    tracing::info!("Starting Lumina chat v{}", env!("CARGO_PKG_VERSION"));

    let config = AppConfig::from_env();
    if let Err(e) = config.validate() {
        tracing::error!("Invalid configuration: {e}");
        return ExitCode::from(1);
    }
    tracing::info!(
        "Generation endpoint: {} (default model {})",
        config.gemini.base_url,
        config.default_model.display_name()
    );

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!("Failed to create runtime: {e}");
            return ExitCode::from(1);
        }
    };

    rt.block_on(async {
        let state = match AppState::new(&config).await {
            Ok(s) => s,
            Err(e) => {
                tracing::error!("Failed to create state: {e}");
                return ExitCode::from(1);
            }
        };

        if let Err(e) =
            server::run_server_with_shutdown(state, config.server.port, shutdown_signal()).await
        {
            tracing::error!("Server error: {e}");
            return ExitCode::from(1);
        }

        ExitCode::SUCCESS
    })
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}
