//! Config server binary: serves the live-edit document of one project.

mod config;

use gridnest_collab::SyncServer;
use tokio::net::TcpListener;
use tokio::signal;

use crate::config::Config;

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            log::error!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    log::info!("Starting gridnest-server v{}", env!("CARGO_PKG_VERSION"));
    log::info!("Config document: {}", config.config_path.display());
    log::info!("CORS origins: {:?}", config.cors_origins);

    let listener = match TcpListener::bind(&config.bind_addr).await {
        Ok(l) => l,
        Err(e) => {
            log::error!("Failed to bind to {}: {e}", config.bind_addr);
            std::process::exit(1);
        }
    };

    let server = SyncServer::new(config.server_config());
    if let Err(e) = server.serve(listener, shutdown_signal()).await {
        log::error!("Server error: {e}");
        std::process::exit(1);
    }

    log::info!("Server shut down gracefully");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            log::error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                log::error!("Failed to install signal handler: {e}");
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

    log::info!("Shutdown signal received");
}
