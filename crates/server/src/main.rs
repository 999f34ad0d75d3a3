use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use releasekeeper_core::{
    discovery::HttpLocatorResolver, load_config, validate_config, AcquisitionJob, ArrIndexer,
    DiscoveryJob, FfprobeProber, FsObjectStore, QBittorrentClient, SqliteTitleStore, Supervisor,
};
use releasekeeper_server::api::create_router;
use releasekeeper_server::state::AppState;

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Timeout for fetching `.torrent` locators.
const LOCATOR_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    let json = std::env::var("RELEASEKEEPER_LOG_JSON").is_ok_and(|v| v == "1");

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn run() -> Result<()> {
    init_logging();

    let config_path = std::env::var("RELEASEKEEPER_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;
    validate_config(&config).context("Configuration validation failed")?;

    let config_json = serde_json::to_string(&config).unwrap_or_default();
    let config_hash = format!("{:x}", Sha256::digest(config_json.as_bytes()));
    info!(
        version = VERSION,
        config_hash = &config_hash[..16],
        database = ?config.database.path,
        "Configuration loaded"
    );

    let store = Arc::new(
        SqliteTitleStore::new(&config.database.path).context("Failed to open title store")?,
    );
    let indexer =
        Arc::new(ArrIndexer::new(config.indexer.clone()).context("Failed to create indexer")?);
    let locator = Arc::new(
        HttpLocatorResolver::new(LOCATOR_TIMEOUT).context("Failed to create locator resolver")?,
    );
    let objects = Arc::new(FsObjectStore::new(&config.object_store));
    info!("Object store rooted at {:?}", config.object_store.root);

    let torrents = Arc::new(
        QBittorrentClient::new(config.torrent_client.qbittorrent.clone())
            .context("Failed to create qBittorrent client")?,
    );
    info!(
        "Using qBittorrent at {}",
        config.torrent_client.qbittorrent.url
    );
    let prober = Arc::new(FfprobeProber::new(config.prober.clone()));

    let discovery = Arc::new(DiscoveryJob::new(
        indexer,
        locator,
        objects.clone(),
        store.clone(),
        config.discovery.clone(),
    ));
    let acquisition = Arc::new(AcquisitionJob::new(
        torrents,
        prober,
        objects,
        store.clone(),
        config.acquisition.clone(),
    ));
    let supervisor = Supervisor::new(
        store,
        Arc::clone(&discovery),
        Arc::clone(&acquisition),
        config.job.clone(),
    );

    let addr = SocketAddr::new(config.server.host, config.server.port);
    let state = Arc::new(AppState::new(config, discovery, acquisition, supervisor));
    let app = create_router(state);

    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server stopped");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
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
}
