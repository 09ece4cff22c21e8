mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use vault_api::auth::{AppState, AppStateInner};
use vault_api::identity::IdentityMode;
use vault_db::{Database, MemoryStore, ScriptRepository, ScriptStore, UserStore};

use crate::config::{Config, StoreBackend};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "scriptvault=debug,vault_api=debug,vault_db=info,tower_http=debug".into()
            }),
        )
        .init();

    let config = Config::from_env()?;

    let (scripts, users): (Arc<dyn ScriptStore>, Arc<dyn UserStore>) = match &config.store {
        StoreBackend::Sqlite { path } => {
            let db = Arc::new(Database::open(path)?);
            (db.clone() as Arc<dyn ScriptStore>, db as Arc<dyn UserStore>)
        }
        StoreBackend::Memory => {
            warn!("Using the in-memory store: data is lost on restart and not shared between processes");
            let store = Arc::new(MemoryStore::new());
            (store.clone() as Arc<dyn ScriptStore>, store as Arc<dyn UserStore>)
        }
    };

    if config.identity_mode == IdentityMode::Asserted {
        warn!("Identity mode is 'asserted': request-supplied owner ids are trusted without verification");
    }

    let state: AppState = Arc::new(AppStateInner {
        scripts: ScriptRepository::new(scripts),
        users,
        jwt_secret: config.jwt_secret.clone(),
        token_ttl_days: config.token_ttl_days,
        identity_mode: config.identity_mode,
        ping_message: config.ping_message.clone(),
    });

    let app = vault_api::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr = SocketAddr::new(config.host, config.port);
    info!(identity_mode = %config.identity_mode, "scriptvault listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                ctrl_c.await.ok();
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
