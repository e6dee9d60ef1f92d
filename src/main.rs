use courier::config::{FileConfig, ServerConfig};
use courier::server;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .init();

    let file_cfg = FileConfig::load();
    let args: Vec<String> = std::env::args().skip(1).collect();

    let cfg = match ServerConfig::from_args(&args, file_cfg.tuning) {
        Ok(cfg) => cfg,
        Err(err) => {
            tracing::error!(%err, "invalid server arguments");
            tracing::info!("usage: courier <port> <root-directory>");
            std::process::exit(2);
        }
    };

    tracing::info!(root = %cfg.root.display(), "Server Start");

    tokio::select! {
        res = server::listener::run(&cfg) => {
            res?;
        }

        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    Ok(())
}
