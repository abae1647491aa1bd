mod config;

use std::sync::Arc;

use tracing::{info, warn};

use pairchat_api::{AppState, AppStateInner};
use pairchat_auth::Authenticator;
use pairchat_gateway::{Dispatcher, Hub};
use pairchat_store::MessageStore;

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let dotenv = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pairchat=debug,tower_http=debug".into()),
        )
        .init();

    if let Some(e) = config::dotenv_problem(&dotenv) {
        warn!("Ignoring unreadable .env file: {}", e);
    }

    let config = Config::from_env()?;

    // Seed the pair
    let store = Arc::new(MessageStore::new(config.seed_users()?)?);
    let auth = Authenticator::new(store.clone(), &config.jwt_secret, config.token_ttl);
    let hub = Hub::new(store, Dispatcher::new());

    let state: AppState = Arc::new(AppStateInner { hub, auth });
    let app = pairchat_api::router(state);

    let addr = config.addr()?;
    info!("Pairchat server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm =
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(sigterm) => sigterm,
                Err(e) => {
                    warn!("Failed to install SIGTERM handler: {}", e);
                    ctrl_c.await.ok();
                    info!("Received Ctrl+C, shutting down...");
                    return;
                }
            };
        tokio::select! {
            _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
