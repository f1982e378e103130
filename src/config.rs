use anyhow::{Context, Result};
use clap::Parser;
use std::{env, str::FromStr};

use crate::services::vimeo_client::{DEFAULT_API_URL, DEFAULT_CHUNK_SIZE};

const DEFAULT_MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024 * 1024;
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60 * 60;
const DEFAULT_STALE_AFTER_SECS: u64 = 24 * 60 * 60;

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub upload_dir: String,
    pub incoming_dir: String,
    pub database_url: String,
    pub vimeo_api_url: String,
    pub chunk_size: u64,
    pub max_upload_bytes: usize,
    pub nonce_secret: Option<String>,
    pub nonce_action: String,
    /// Seconds between stale file sweeps; 0 disables the sweeper.
    pub sweep_interval_secs: u64,
    /// Age in seconds after which leftover local files are removed.
    pub stale_after_secs: u64,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Vimeo upload service")]
pub struct Args {
    /// Host to bind to (overrides VIMEO_UPLOADER_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides VIMEO_UPLOADER_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Directory uploads are staged in before going to Vimeo (overrides VIMEO_UPLOADER_UPLOAD_DIR)
    #[arg(long)]
    pub upload_dir: Option<String>,

    /// Directory request bodies are spooled to (overrides VIMEO_UPLOADER_INCOMING_DIR)
    #[arg(long)]
    pub incoming_dir: Option<String>,

    /// Database URL (overrides VIMEO_UPLOADER_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Vimeo API base URL (overrides VIMEO_UPLOADER_API_URL)
    #[arg(long)]
    pub vimeo_api_url: Option<String>,

    /// Upload chunk size in bytes (overrides VIMEO_UPLOADER_CHUNK_SIZE)
    #[arg(long)]
    pub chunk_size: Option<u64>,

    /// Largest accepted upload request in bytes (overrides VIMEO_UPLOADER_MAX_UPLOAD_BYTES)
    #[arg(long)]
    pub max_upload_bytes: Option<usize>,

    /// Seconds between stale file sweeps, 0 disables (overrides VIMEO_UPLOADER_SWEEP_INTERVAL_SECS)
    #[arg(long)]
    pub sweep_interval_secs: Option<u64>,

    /// Age after which leftover local files are removed (overrides VIMEO_UPLOADER_STALE_AFTER_SECS)
    #[arg(long)]
    pub stale_after_secs: Option<u64>,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and migrate flag.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        // Parse CLI once
        let args = Args::parse();

        // --- Environment fallback ---
        let env_host = env::var("VIMEO_UPLOADER_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let env_port = parse_env("VIMEO_UPLOADER_PORT", 3000u16)?;
        let env_upload_dir =
            env::var("VIMEO_UPLOADER_UPLOAD_DIR").unwrap_or_else(|_| "./data/uploads".into());
        let env_incoming_dir =
            env::var("VIMEO_UPLOADER_INCOMING_DIR").unwrap_or_else(|_| "./data/incoming".into());
        let env_db = env::var("VIMEO_UPLOADER_DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://./data/meta/uploads.db".into());
        let env_api =
            env::var("VIMEO_UPLOADER_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.into());
        let env_chunk = parse_env("VIMEO_UPLOADER_CHUNK_SIZE", DEFAULT_CHUNK_SIZE)?;
        let env_max_upload =
            parse_env("VIMEO_UPLOADER_MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?;
        let env_sweep =
            parse_env("VIMEO_UPLOADER_SWEEP_INTERVAL_SECS", DEFAULT_SWEEP_INTERVAL_SECS)?;
        let env_stale = parse_env("VIMEO_UPLOADER_STALE_AFTER_SECS", DEFAULT_STALE_AFTER_SECS)?;

        // --- Merge ---
        let cfg = Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            upload_dir: args.upload_dir.unwrap_or(env_upload_dir),
            incoming_dir: args.incoming_dir.unwrap_or(env_incoming_dir),
            database_url: args.database_url.unwrap_or(env_db),
            vimeo_api_url: args.vimeo_api_url.unwrap_or(env_api),
            chunk_size: args.chunk_size.unwrap_or(env_chunk),
            max_upload_bytes: args.max_upload_bytes.unwrap_or(env_max_upload),
            nonce_secret: env::var("VIMEO_UPLOADER_NONCE_SECRET")
                .ok()
                .filter(|s| !s.is_empty()),
            nonce_action: env::var("VIMEO_UPLOADER_NONCE_ACTION")
                .unwrap_or_else(|_| "dgvsecurity".into()),
            sweep_interval_secs: args.sweep_interval_secs.unwrap_or(env_sweep),
            stale_after_secs: args.stale_after_secs.unwrap_or(env_stale),
        };

        Ok((cfg, args.migrate))
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_env<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(value) => value
            .parse::<T>()
            .with_context(|| format!("parsing {} value `{}`", name, value)),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(err) => Err(err).with_context(|| format!("reading {}", name)),
    }
}
