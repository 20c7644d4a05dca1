//! Cap table daemon
//!
//! ## Usage
//!
//! ```bash
//! # Start with defaults
//! captable-server
//!
//! # Start with custom config
//! captable-server --config /path/to/config.toml
//!
//! # Custom port and storage directory
//! captable-server --http-port 9000 --storage-dir /data/captable
//!
//! # Regenerate missing signed PDFs before serving
//! captable-server --repair-on-start
//! ```

use clap::Parser;
use captable_server::services::spawn_logging_listener;
use captable_server::{CapTableDb, Config, FsDocumentStore, HttpServer, Services, UrlSigner};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Actor recorded in audit entries written by the startup repair sweep.
const SYSTEM_ACTOR: &str = "system";

#[derive(Parser, Debug)]
#[command(name = "captable-server")]
#[command(about = "Cap table and board e-signature daemon")]
struct Args {
    /// Path to config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Storage directory for the database and documents
    #[arg(long)]
    storage_dir: Option<PathBuf>,

    /// HTTP API port
    #[arg(long)]
    http_port: Option<u16>,

    /// Secret for signed download URLs
    #[arg(long, env = "CAPTABLE_SIGNING_SECRET", hide_env_values = true)]
    signing_secret: Option<String>,

    /// Base URL placed in signed download links
    #[arg(long, env = "CAPTABLE_PUBLIC_BASE_URL")]
    public_base_url: Option<String>,

    /// Regenerate missing signed PDFs before serving
    #[arg(long)]
    repair_on_start: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("captable_server=info".parse()?))
        .init();

    let args = Args::parse();

    let mut config = if let Some(config_path) = &args.config {
        Config::load(config_path)?
    } else {
        Config::default()
    };

    // CLI overrides
    if let Some(dir) = args.storage_dir {
        config.storage_dir = dir;
    }
    if let Some(port) = args.http_port {
        config.http_port = port;
    }
    if let Some(url) = args.public_base_url {
        config.public_base_url = url;
    }
    if args.repair_on_start {
        config.repair_on_start = true;
    }

    tokio::fs::create_dir_all(&config.storage_dir).await?;

    let config_path = args.config.clone().unwrap_or_else(|| config.config_path());
    let secret_from_cli = args.signing_secret.is_some();
    if let Some(secret) = args.signing_secret {
        config.signing_secret = Some(secret);
    }
    if config.signing_secret.is_none() {
        config.signing_secret = Some(format!(
            "{}{}",
            uuid::Uuid::new_v4().simple(),
            uuid::Uuid::new_v4().simple()
        ));
        warn!("No signing secret configured, generated one");
    }
    config.validate()?;

    if !config_path.exists() {
        let mut persisted = config.clone();
        if secret_from_cli {
            persisted.signing_secret = None;
        }
        persisted.save(&config_path)?;
        info!(path = %config_path.display(), "Created default config");
    }

    info!(
        storage_dir = %config.storage_dir.display(),
        http_port = config.http_port,
        "Starting captable-server"
    );

    let secret = config.signing_secret.clone().unwrap_or_default();
    let signer = UrlSigner::new(secret, config.public_base_url.clone());

    let db = Arc::new(CapTableDb::open(&config.storage_dir)?);
    let store = Arc::new(FsDocumentStore::new(config.documents_dir(), signer.clone()).await?);
    let services = Arc::new(Services::new(db.clone(), store, config.service_settings()));

    let _listener = spawn_logging_listener(services.events.clone());

    if config.repair_on_start {
        let report = services.artifacts.repair_all(SYSTEM_ACTOR).await?;
        info!(
            success = report.success_count,
            skipped = report.skipped_count,
            errors = report.error_count,
            "Startup repair complete"
        );
    }

    let bind_addr: SocketAddr = format!("{}:{}", config.bind_address, config.http_port).parse()?;
    let max_body_bytes = config.max_upload_bytes / 3 * 4 + 64 * 1024;
    let http_server = Arc::new(
        HttpServer::new(services.clone(), bind_addr)
            .with_file_signer(signer)
            .with_max_body_bytes(max_body_bytes),
    );

    info!("Press Ctrl+C to stop.");

    let shutdown = async {
        tokio::signal::ctrl_c().await.ok();
        info!("Shutting down...");
    };

    tokio::select! {
        result = http_server.run() => {
            if let Err(e) = result {
                error!(error = %e, "HTTP server error");
            }
        }
        _ = shutdown => {}
    }

    if let Ok(stats) = db.stats() {
        info!(
            documents = stats.document_count,
            pending_signatures = stats.pending_signature_count,
            "Final database stats"
        );
    }

    Ok(())
}
