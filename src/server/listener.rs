use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tracing::info;

use crate::config::ServerConfig;
use crate::http::connection::Connection;

/// Binds the listen socket and runs the accept loop.
///
/// Concurrency is bounded by a semaphore sized at `available cores ×
/// pool_multiplier`; the permit is taken *before* accepting, so once all
/// workers are busy further connections queue in the OS listen backlog,
/// not inside the application. Each spawned task owns its connection for
/// the whole keep-alive session and returns its permit on exit.
///
/// A bind failure propagates to the caller and is fatal; accept failures
/// are logged and the loop continues.
pub async fn run(cfg: &ServerConfig) -> anyhow::Result<()> {
    let listener = TcpListener::bind(("0.0.0.0", cfg.port)).await?;
    info!("Listening on port {}", cfg.port);

    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    let workers = cores * cfg.tuning.pool_multiplier.max(1);
    let pool = Arc::new(Semaphore::new(workers));
    info!(workers, "worker pool ready");

    loop {
        let permit = pool.clone().acquire_owned().await?;

        let (socket, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(err) => {
                tracing::error!(%err, "accept error");
                continue;
            }
        };
        info!("Accepted connection from {}", peer);

        let root = cfg.root.clone();
        let tuning = cfg.tuning.clone();
        tokio::spawn(async move {
            let mut conn = Connection::new(socket, peer, root, tuning);
            if let Err(e) = conn.run().await {
                tracing::warn!(%peer, error = %e, "connection ended with error");
            }
            drop(permit);
        });
    }
}
