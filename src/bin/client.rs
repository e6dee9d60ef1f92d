use tokio::io::AsyncWriteExt;

use courier::client::Client;
use courier::config::FileConfig;

/// Command-line front end for the client engine.
///
/// `courier-client get <url>` writes the fetched body to stdout;
/// `courier-client put <url>` uploads the file named by the url path from
/// the configured local root. The url port overrides the configured one.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let (command, target) = match args.as_slice() {
        [command, target] => (command.as_str(), target.as_str()),
        _ => {
            tracing::error!("usage: courier-client <get|put> <url>");
            std::process::exit(2);
        }
    };

    let url = match url::Url::parse(target) {
        Ok(url) => url,
        Err(err) => {
            tracing::error!(%err, "invalid url");
            std::process::exit(2);
        }
    };
    let host = match url.host_str() {
        Some(host) => host.to_string(),
        None => {
            tracing::error!("url has no host");
            std::process::exit(2);
        }
    };

    let mut config = FileConfig::load().client;
    if let Some(port) = url.port() {
        config.port = port;
    }

    let mut client = Client::new(config);
    client.connect(&host).await?;

    match command {
        "get" => {
            client.send_get(url.path(), false).await?;
            tracing::info!(status = client.status(), "response received");
            tokio::io::stdout().write_all(client.response()).await?;
        }
        "put" => {
            let line = format!("PUT {} HTTP/1.1", url.path());
            client.send_put(&line).await?;
            tracing::info!(status = client.status(), "upload acknowledged");
        }
        other => {
            tracing::error!(command = other, "unknown command; expected get or put");
            std::process::exit(2);
        }
    }

    client.close().await;
    Ok(())
}
