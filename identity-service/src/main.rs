use identity_service::{
    build_router,
    config::IdentityConfig,
    db,
    services::{CredentialStore, InMemoryStore, TokenStore},
    AppState,
};
use service_core::observability::init_tracing;
use std::sync::Arc;
use tokio::signal;

#[tokio::main]
async fn main() -> Result<(), service_core::error::AppError> {
    // Load configuration - fail fast if invalid
    let config = IdentityConfig::from_env()?;

    init_tracing(
        &config.service_name,
        &config.log_level,
        config.otlp_endpoint.as_deref(),
    )?;

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
        "Starting identity service"
    );

    let (credentials, tokens): (Arc<dyn CredentialStore>, Arc<dyn TokenStore>) =
        match &config.database {
            Some(database) => {
                let store = Arc::new(db::connect(database).await?);
                (store.clone(), store)
            }
            None => {
                // from_env requires DATABASE_URL in prod, so this is dev only.
                tracing::warn!("DATABASE_URL not set, using in-memory store; data is not persisted");
                let store = Arc::new(InMemoryStore::new());
                (store.clone(), store)
            }
        };

    let addr = config.common.socket_addr();
    let state = AppState::new(config, credentials, tokens);
    let app = build_router(state)?;

    tracing::info!(address = %addr, "Listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Service shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
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
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}
