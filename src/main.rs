use std::net::SocketAddr;
use std::process::ExitCode;

use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use api_gateway::{AppState, Config, GatewayConfig, build_router, metrics, utils};

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .with_thread_ids(true)
        .init();

    info!("Starting API Gateway v{}", env!("CARGO_PKG_VERSION"));

    match run().await {
        Ok(()) => ExitCode::from(exitcode::OK as u8),
        Err(exit_code) => ExitCode::from(exit_code as u8),
    }
}

/// Run the application, returning an exit code on error.
async fn run() -> Result<(), exitcode::ExitCode> {
    // Load configuration
    let config = Config::from_env().map_err(|e| {
        error!("Configuration error: {e}");
        exitcode::CONFIG
    })?;
    let gateway = GatewayConfig::load(&config).map_err(|e| {
        error!("Gateway configuration error: {e}");
        exitcode::CONFIG
    })?;
    info!(
        host = %config.host,
        port = %config.port,
        routes = gateway.routes.len(),
        rate_limiting = gateway.rate_limiting.enabled,
        "Configuration loaded"
    );

    // Prometheus exporter on its own port
    if let Some(metrics_addr) = config.metrics_addr() {
        metrics::try_init_metrics(metrics_addr);
    }

    // Build application state and router
    let debug_endpoints = config.debug_endpoints;
    let addr: SocketAddr = config.server_addr().parse().map_err(|e| {
        error!("Invalid server address: {e}");
        exitcode::CONFIG
    })?;
    let state = AppState::new(config, gateway).map_err(|e| {
        error!("Failed to initialize gateway: {e}");
        exitcode::SOFTWARE
    })?;
    let app = build_router(state);

    // Start server
    let listener = TcpListener::bind(addr).await.map_err(|e| {
        error!("Failed to bind to {addr}: {e}");
        exitcode::UNAVAILABLE
    })?;

    info!("Server listening on http://{addr}");
    info!("API endpoints:");
    info!("  GET    /                             - Banner");
    info!("  GET    /health                       - Health check");
    info!("  GET    /status                       - Service status");
    if debug_endpoints {
        info!("  GET    /debug/routes                 - Configured routes");
        info!("  GET    /debug/services               - Registered services");
        info!("  POST   /debug/services               - Register an instance");
        info!("  DELETE /debug/services/{{id}}          - Deregister an instance");
        info!("  PUT    /debug/services/{{id}}/health   - Set instance health");
        info!("  GET    /debug/ratelimit              - Rate limit summary");
        info!("  GET    /debug/ratelimit/{{client}}     - Bucket status");
        info!("  DELETE /debug/ratelimit/{{client}}     - Reset a bucket");
    }
    info!("  *      /**                           - Routed to backend services");

    // Client socket addresses feed rate-limit identification
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(utils::shutdown_signal())
    .await
    .map_err(|e| {
        error!("Server error: {e}");
        exitcode::SOFTWARE
    })?;

    info!("Server shutdown complete");
    Ok(())
}
