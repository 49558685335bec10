//! HTTP server command handler

use crate::commands::build_service;
use crate::config::Config;
use crate::error::{ChatstreamError, Result};
use crate::server::{router, AppState};
use crate::session::SessionRegistry;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Serve the HTTP API until Ctrl-C
///
/// On shutdown every live stream session is cancelled so that open SSE
/// responses finish with an `interrupted` error item.
pub async fn run_serve(config: Config) -> Result<()> {
    let service = Arc::new(build_service(&config)?);
    let registry = service.registry().clone();
    let app = router(AppState::new(service));

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&bind_addr).await.map_err(|e| {
        ChatstreamError::Config(format!("Failed to bind {}: {}", bind_addr, e))
    })?;

    tracing::info!(
        "Serving chatstream on http://{} (provider: {})",
        bind_addr,
        config.provider.provider_type
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(registry))
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal(registry: SessionRegistry) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        return;
    }

    let cancelled = registry.cancel_all();
    tracing::info!(
        "Shutdown requested, cancelled {} active stream sessions",
        cancelled
    );
}
