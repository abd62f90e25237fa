//! MBTiles Streamer - a tile server for MBTiles archives.
//!
//! This binary loads the archive directory, starts the HTTP server and closes
//! every dataset on shutdown.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mbtiles_streamer::{
    config::Config,
    server::{create_router, API_PREFIX},
    DatasetStore, MbtilesOpener,
};

#[tokio::main]
async fn main() -> ExitCode {
    let config = Config::parse();

    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    print_banner();

    info!("Configuration:");
    info!("  Upload directory: {}", config.upload_dir.display());
    info!("  Max upload size: {} MiB", config.max_file_size);
    info!("  Cache max-age: {}s", config.cache_max_age);
    match config.cors_origins {
        Some(ref origins) => info!("  CORS origins: {}", origins.join(", ")),
        None => info!("  CORS origins: any"),
    }

    // Load archives left by previous runs
    let store = Arc::new(DatasetStore::new(MbtilesOpener::new()));
    let scan_store = Arc::clone(&store);
    let scan_dir = config.upload_dir.clone();
    let loaded = match tokio::task::spawn_blocking(move || scan_store.scan(&scan_dir)).await {
        Ok(count) => count,
        Err(e) => {
            error!("Startup scan failed: {}", e);
            return ExitCode::FAILURE;
        }
    };

    info!("");
    info!("Loaded {} dataset(s)", loaded);
    for id in store.list() {
        info!("  {}", id);
    }

    let router = create_router(Arc::clone(&store), config.router_config());
    let addr = config.bind_address();

    info!("");
    info!("────────────────────────────────────────────────────────────────");
    info!("  Server listening on: http://{}", addr);
    info!("");
    info!("  Try these endpoints:");
    info!("    curl http://{}/health", addr);
    info!("    curl http://{}{}", addr, API_PREFIX);
    info!(
        "    curl -F mapName=<name> -F file=@<file>.mbtiles http://{}{}/upload",
        addr, API_PREFIX
    );
    if let Some(id) = store.list().first() {
        info!("");
        info!("  Fetch a tile directly:");
        info!(
            "    curl http://{}{}/{}/0/0/0",
            addr,
            API_PREFIX,
            urlencoding::encode(id)
        );
    }
    info!("────────────────────────────────────────────────────────────────");
    info!("");

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            return ExitCode::FAILURE;
        }
    };

    let served = axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    let closed = store.evict_all();
    info!("Closed {} dataset(s)", closed);

    if let Err(e) = served {
        error!("Server error: {}", e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

/// Print the startup banner.
fn print_banner() {
    let version = env!("CARGO_PKG_VERSION");
    info!("");
    info!("███╗   ███╗██████╗ ████████╗██╗██╗     ███████╗███████╗");
    info!("████╗ ████║██╔══██╗╚══██╔══╝██║██║     ██╔════╝██╔════╝");
    info!("██╔████╔██║██████╔╝   ██║   ██║██║     █████╗  ███████╗");
    info!("██║╚██╔╝██║██╔══██╗   ██║   ██║██║     ██╔══╝  ╚════██║");
    info!("██║ ╚═╝ ██║██████╔╝   ██║   ██║███████╗███████╗███████║");
    info!("╚═╝     ╚═╝╚═════╝    ╚═╝   ╚═╝╚══════╝╚══════╝╚══════╝");
    info!("");
    info!("                 streamer v{}", version);
}

/// Resolve when Ctrl-C is received.
async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => {
            warn!("Cannot listen for Ctrl-C, graceful shutdown disabled: {}", e);
            std::future::pending::<()>().await;
        }
    }
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "mbtiles_streamer=debug,tower_http=debug"
    } else {
        "mbtiles_streamer=info,tower_http=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
