//! peercached — a single cache node for demos and smoke testing.
//!
//! Serves a `scores` group backed by a tiny in-memory table standing in for
//! the slow authoritative data source. Point several nodes at each other
//! via `PEERS` and they form a fleet that routes keys by consistent hash:
//!
//! ```text
//! LISTEN_ADDR=127.0.0.1:8001 PEERS=http://127.0.0.1:8001,http://127.0.0.1:8002 peercached &
//! LISTEN_ADDR=127.0.0.1:8002 PEERS=http://127.0.0.1:8001,http://127.0.0.1:8002 peercached &
//! curl http://127.0.0.1:8001/_peercache/scores/Tom
//! ```

use peercache::config::Config;
use peercache::error::BoxError;
use peercache::group::new_group;
use peercache::http::{router, HttpPool};
use tokio::signal;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// The demo's "slow DB".
static DB: &[(&str, &str)] = &[("Tom", "630"), ("Jack", "589"), ("Sam", "567")];

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "peercache=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    info!(
        listen = %config.listen_addr,
        self_url = %config.self_url,
        peers = config.peers.len(),
        cache_bytes = config.cache_bytes,
        "starting peercached"
    );

    let group = new_group(
        "scores",
        config.cache_bytes,
        |key: &str| -> Result<Vec<u8>, BoxError> {
            info!(key, "slow-db lookup");
            DB.iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.as_bytes().to_vec())
                .ok_or_else(|| format!("{key} not exist").into())
        },
    );

    if !config.peers.is_empty() {
        let pool = HttpPool::with_replicas(config.self_url.clone(), config.ring_replicas);
        pool.set_peers(&config.peers);
        group.register_peer_picker(pool);
    }

    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    info!("serving on http://{}", listener.local_addr()?);

    axum::serve(listener, router())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl+C, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
