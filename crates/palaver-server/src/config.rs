//! Server configuration loaded from environment variables.
//!
//! All settings have sensible defaults so the server can start with zero
//! configuration for local development.

use std::net::SocketAddr;
use std::path::PathBuf;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Socket address for the HTTP (axum) API server.
    /// Env: `HTTP_ADDR`
    /// Default: `0.0.0.0:8080`
    pub http_addr: SocketAddr,

    /// Filesystem path of the SQLite database.
    /// Env: `DB_PATH`
    /// Default: `./palaver.db`
    pub db_path: PathBuf,

    /// Filesystem path where uploaded attachments are stored.
    /// Env: `UPLOAD_DIR`
    /// Default: `./uploads`
    pub upload_dir: PathBuf,

    /// Maximum attachment size in bytes (5 MiB).
    pub max_upload_size: usize,

    /// Ed25519 seed for the claim signer (hex-encoded, 64 chars).
    /// Env: `CLAIM_SIGNING_SEED`
    /// Default: none — an ephemeral key is generated and all tokens become
    /// invalid on restart (development only).
    pub claim_seed: Option<[u8; 32]>,

    /// Human-readable name for this server instance.
    /// Env: `INSTANCE_NAME`
    /// Default: `"Palaver"`
    pub instance_name: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: ([0, 0, 0, 0], 8080).into(),
            db_path: PathBuf::from("./palaver.db"),
            upload_dir: PathBuf::from("./uploads"),
            max_upload_size: 5 * 1024 * 1024, // 5 MiB
            claim_seed: None,
            instance_name: "Palaver".to_string(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to
    /// defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("HTTP_ADDR") {
            if let Ok(parsed) = addr.parse::<SocketAddr>() {
                config.http_addr = parsed;
            } else {
                tracing::warn!(
                    value = %addr,
                    "Invalid HTTP_ADDR, using default"
                );
            }
        }

        if let Ok(path) = std::env::var("DB_PATH") {
            config.db_path = PathBuf::from(path);
        }

        if let Ok(path) = std::env::var("UPLOAD_DIR") {
            config.upload_dir = PathBuf::from(path);
        }

        if let Ok(hex_seed) = std::env::var("CLAIM_SIGNING_SEED") {
            match parse_hex_seed(&hex_seed) {
                Ok(seed) => config.claim_seed = Some(seed),
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        "Invalid CLAIM_SIGNING_SEED, falling back to an ephemeral key"
                    );
                }
            }
        }

        if let Ok(name) = std::env::var("INSTANCE_NAME") {
            config.instance_name = name;
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter,
        // so we do not store it here.

        config
    }
}

/// Parse a 64-character hex string into a 32-byte seed.
fn parse_hex_seed(raw: &str) -> Result<[u8; 32], String> {
    let raw = raw.trim();
    let bytes = hex::decode(raw).map_err(|e| e.to_string())?;
    if bytes.len() != 32 {
        return Err(format!("expected 32 bytes, got {}", bytes.len()));
    }

    let mut seed = [0u8; 32];
    seed.copy_from_slice(&bytes);
    Ok(seed)
}
