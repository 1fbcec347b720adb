use anyhow::Result;
use axum::Router;
use config::{AppConfig, Backend, Mode};
use services::{
    azure_blob_store::AzureBlobStore, blob_store::BlobStore, local_blob_store::LocalBlobStore,
};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::{fs, io::ErrorKind, path::Path, str::FromStr, sync::Arc};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

mod client;
mod config;
mod errors;
mod handlers;
mod models;
mod routes;
mod services;
mod state;

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // --- Parse config + mode ---
    let (cfg, mode) = AppConfig::from_env_and_args()?;

    match mode {
        Mode::Serve => serve(cfg).await,
        Mode::Migrate => {
            open_local_store(&cfg).await?;
            tracing::info!("Database migration complete.");
            Ok(())
        }
        Mode::Watch(client_cfg) => client::commands::watch(client_cfg).await,
        Mode::Upload(client_cfg, files) => client::commands::upload(client_cfg, files).await,
        Mode::CreateKnowledgeBase(client_cfg, name) => {
            client::commands::create_knowledge_base(client_cfg, &name).await
        }
    }
}

async fn serve(cfg: AppConfig) -> Result<()> {
    tracing::info!("Starting kb-uploader with config: {:?}", cfg);

    // --- Initialize blob store ---
    let store: Option<Arc<dyn BlobStore>> = match cfg.backend {
        Backend::Azure => match &cfg.credentials {
            Some(credentials) => Some(Arc::new(AzureBlobStore::new(
                credentials,
                cfg.blob_endpoint.as_deref(),
            )?)),
            None => {
                tracing::warn!(
                    "AZURE_STORAGE_ACCOUNT / AZURE_STORAGE_ACCESS_KEY not set; storage routes will fail"
                );
                None
            }
        },
        Backend::Local => Some(Arc::new(open_local_store(&cfg).await?)),
    };

    // --- Build router ---
    let app: Router = routes::routes::routes(cfg.max_upload_bytes)
        .with_state(state::AppState::new(store, cfg.upload_container.clone()));

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

/// Open (creating if needed) the SQLite database and payload directory of the
/// local backend, and apply its schema.
async fn open_local_store(cfg: &AppConfig) -> Result<LocalBlobStore> {
    if !Path::new(&cfg.storage_dir).exists() {
        fs::create_dir_all(&cfg.storage_dir)?;
        tracing::info!("Created storage directory at {}", cfg.storage_dir);
    }

    let db_url = &cfg.database_url;
    tracing::debug!("Connecting using raw URL => {}", db_url);

    // Extract the local file path SQLx will use
    let db_path = db_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .trim_start_matches("file:");
    if let Some(parent) = Path::new(db_path).parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
            tracing::info!("Created missing directory {:?}", parent);
        }
    }

    let options = SqliteConnectOptions::from_str(db_url)?.create_if_missing(true);
    let db = Arc::new(
        SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?,
    );

    let store = LocalBlobStore::new(db, cfg.storage_dir.clone());
    store.migrate().await?;
    Ok(store)
}

/// Resolves on Ctrl-C, or SIGTERM on Unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for Ctrl-C: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(err) => {
                tracing::error!("failed to listen for SIGTERM: {}", err);
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
    tracing::info!("Shutdown signal received");
}
