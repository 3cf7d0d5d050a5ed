use std::path::PathBuf;

use recvault::{paths, Config, Server};
use tokio::net::TcpListener;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "recvault=info,tower_http=warn".into()),
        )
        .init();

    let config = Config::from_env();

    let candidates = paths::list_candidate_paths(&config.app_dirs, &config.app_subpath);
    for (i, path) in candidates.iter().enumerate() {
        info!("storage candidate {}: {}", i, path.display());
    }
    let recording_dir = config
        .recording_dir
        .clone()
        .or_else(|| paths::preferred_candidate(&candidates).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("./recordings"));

    let server = Server::new(&config);
    if !server.activate(&recording_dir) {
        anyhow::bail!(
            "could not create or access recording directory {}",
            recording_dir.display()
        );
    }
    if !config.assets_dir.is_dir() {
        warn!(
            "assets directory {} is missing; page routes will return 404",
            config.assets_dir.display()
        );
    }

    let listener = TcpListener::bind((config.bind.as_str(), config.port)).await?;
    info!(
        "recvault starting: addr={} recording_dir={} assets_dir={} read_timeout_ms={}",
        listener.local_addr()?,
        recording_dir.display(),
        config.assets_dir.display(),
        config.read_timeout.as_millis()
    );

    server.run(listener, shutdown_signal()).await?;
    info!("recvault stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for ctrl-c: {e}");
        std::future::pending::<()>().await;
    }
}
