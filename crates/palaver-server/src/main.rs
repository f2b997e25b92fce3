//! # palaver-server
//!
//! HTTP backend for the palaver messaging system.
//!
//! This binary provides:
//! - **Chat API**: connect, conversations, group membership, messages with
//!   cursor pagination, read markers, calls
//! - **Offline push fan-out** via a background dispatcher (log-only sender
//!   by default)
//! - **Attachment uploads** stored on local disk
//! - **Management portal**: account auth, user/post CRUD and the tenant app
//!   registry
//! - **REST API** (axum) with bearer-claim authentication

mod api;
mod config;
mod error;
mod portal;
mod uploads;

use std::sync::{Arc, Mutex};

use tracing::info;
use tracing_subscriber::EnvFilter;

use palaver_core::{ChatEngine, LogOnlyPush, NotificationDispatcher};
use palaver_shared::claim::TokenSigner;
use palaver_store::Database;

use crate::api::AppState;
use crate::config::ServerConfig;
use crate::uploads::UploadStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,palaver_server=debug")),
        )
        .init();

    info!("Starting palaver server v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env();
    info!(?config, "Loaded configuration");

    // -----------------------------------------------------------------------
    // 3. Initialize subsystems
    // -----------------------------------------------------------------------

    // SQLite store (runs migrations on open)
    let db = Arc::new(Mutex::new(Database::open_at(&config.db_path)?));

    // Claim signer: configured seed, or an ephemeral dev key
    let signer = match config.claim_seed {
        Some(seed) => Arc::new(TokenSigner::from_seed(&seed)),
        None => {
            tracing::warn!(
                "CLAIM_SIGNING_SEED not set; using an ephemeral key, all tokens \
                 become invalid on restart"
            );
            Arc::new(TokenSigner::generate())
        }
    };

    // Notification dispatcher with the log-only push sender
    let dispatcher = NotificationDispatcher::spawn(Arc::new(LogOnlyPush));

    // The chat engine
    let engine = Arc::new(ChatEngine::new(db.clone(), dispatcher));

    // Attachment store (creates directory if missing)
    let uploads = Arc::new(
        UploadStore::new(config.upload_dir.clone(), config.max_upload_size)
            .await
            .map_err(|e| anyhow::anyhow!("upload store init failed: {e}"))?,
    );

    let http_addr = config.http_addr;
    let state = AppState {
        engine,
        db,
        signer,
        uploads,
        config: Arc::new(config),
    };

    // -----------------------------------------------------------------------
    // 4. Run the HTTP API server (blocks until shutdown)
    // -----------------------------------------------------------------------
    tokio::select! {
        result = api::serve(state, http_addr) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server failed");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
