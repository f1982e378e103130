use anyhow::{Context, Result};
use axum::Router;
use std::{fs, io::ErrorKind, path::Path, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

mod config;
mod db;
mod errors;
mod handlers;
mod models;
mod routes;
mod services;
mod state;

use services::{
    file_sweeper::FileSweeper, nonce_service::NonceService, vimeo_client::HttpConnector,
};

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // --- Parse config + migrate flag ---
    let (cfg, migrate) = config::AppConfig::from_env_and_args()?;

    tracing::info!(
        "Starting vimeo-uploader on {} (uploads: {}, incoming: {}, db: {}, api: {})",
        cfg.addr(),
        cfg.upload_dir,
        cfg.incoming_dir,
        cfg.database_url,
        cfg.vimeo_api_url
    );

    // --- Ensure staging directories exist ---
    for dir in [&cfg.upload_dir, &cfg.incoming_dir] {
        if !Path::new(dir).exists() {
            fs::create_dir_all(dir).with_context(|| format!("creating directory {}", dir))?;
            tracing::info!("Created directory at {}", dir);
        }
    }

    // --- Initialize SQLite connection ---
    let db = Arc::new(db::connect(&cfg.database_url).await?);

    // --- Apply schema (idempotent); `--migrate` stops here ---
    db::run_migrations(&db).await?;
    if migrate {
        tracing::info!("Database migration complete.");
        return Ok(()); // exit after migration
    }

    // --- Initialize services ---
    let nonce_secret = match cfg.nonce_secret.clone() {
        Some(secret) => secret,
        None => {
            tracing::warn!(
                "VIMEO_UPLOADER_NONCE_SECRET is not set; issued nonces will not survive a restart"
            );
            Uuid::new_v4().to_string()
        }
    };
    let nonces = NonceService::new(nonce_secret, cfg.nonce_action.clone());
    let connector = HttpConnector::new(cfg.vimeo_api_url.clone(), cfg.chunk_size)
        .context("building Vimeo HTTP client")?;
    let state = state::AppState::new(
        db,
        nonces,
        Arc::new(connector),
        cfg.upload_dir.clone(),
        cfg.incoming_dir.clone(),
    );

    // --- Stale file sweeper (first pass runs right away) ---
    if cfg.sweep_interval_secs > 0 {
        let sweeper = FileSweeper::new(
            cfg.incoming_dir.clone(),
            cfg.upload_dir.clone(),
            Duration::from_secs(cfg.stale_after_secs),
        );
        tokio::spawn(sweeper.run(Duration::from_secs(cfg.sweep_interval_secs)));
    } else {
        tracing::info!("Stale file sweeper disabled");
    }

    // --- Build router ---
    let app: Router = routes::routes::routes(cfg.max_upload_bytes).with_state(state);

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
    axum::serve(listener, app).await?;

    Ok(())
}
