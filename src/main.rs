use std::net::SocketAddr;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use shoutbox::{
    api::{create_router, AppState},
    config::Config,
    db,
    error::AppError,
};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,shoutbox=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("🚀 Starting shoutbox v{}...", env!("CARGO_PKG_VERSION"));

    // Refuses to start without a real rate limit salt
    let config = Config::from_env()?;
    tracing::info!("✅ Configuration loaded");

    let pool = db::init_pool(&config).await?;
    tracing::info!("✅ Database connected: {}", config.database_url);

    db::migrate(&pool).await?;
    tracing::info!("✅ Database migrations completed");

    if config.allows_any_origin() {
        tracing::info!("✅ CORS: any origin");
    } else {
        tracing::info!("✅ CORS allow-list: {}", config.cors_allowed_origins.join(", "));
    }

    let addr = config.server_address();
    let app = create_router(AppState::new(pool.clone(), config));

    tracing::info!("🌐 Server listening on http://{}", addr);
    tracing::info!("  GET  /api/messages - Latest messages");
    tracing::info!("  POST /api/messages - Post a message");
    tracing::info!("  GET  /api/health   - Health check");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to bind to {}: {}", addr, e)))?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .map_err(|e| AppError::Internal(format!("Server error: {}", e)))?;

    pool.close().await;
    tracing::info!("👋 Shoutbox stopped");

    Ok(())
}

/// Wait for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("❌ Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("❌ Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
