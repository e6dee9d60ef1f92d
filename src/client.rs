//! Client engine: the initiating side of the file-transfer protocol.
//!
//! Mirrors the server's reader/parser/transfer logic. GET fetches a remote
//! file into the response buffer; PUT streams a local file to the server's
//! saving directory. Local failures (bad request line, missing source file)
//! release the connection without sending anything further.

use anyhow::Context;
use bytes::{Buf, BytesMut};
use std::fmt::Write as _;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::config::ClientConfig;
use crate::http::mime;
use crate::http::parser::{HeaderBlock, ParseError, parse_request_line, parse_status_line};
use crate::http::request::Method;

const BUFFER_SIZE: usize = 8192;
const USER_AGENT: &str = concat!("courier-client/", env!("CARGO_PKG_VERSION"));

pub struct Client {
    config: ClientConfig,
    host: Option<String>,
    stream: Option<TcpStream>,
    buffer: BytesMut,
    header: String,
    response: Vec<u8>,
    status: Option<u16>,
}

impl Client {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            host: None,
            stream: None,
            buffer: BytesMut::with_capacity(4096),
            header: String::new(),
            response: Vec::new(),
            status: None,
        }
    }

    /// Opens the byte channel to `host` on the configured port.
    pub async fn connect(&mut self, host: &str) -> anyhow::Result<()> {
        let stream = timeout(
            self.config.connect_timeout(),
            TcpStream::connect((host, self.config.port)),
        )
        .await
        .map_err(|_| anyhow::anyhow!("connect timeout"))?
        .with_context(|| format!("cannot connect to {host}:{}", self.config.port))?;

        self.host = Some(host.to_string());
        self.stream = Some(stream);
        self.buffer.clear();
        Ok(())
    }

    /// Sends a GET for `path` and reads the full response.
    pub async fn send_get(&mut self, path: &str, keep_alive: bool) -> anyhow::Result<()> {
        self.begin_exchange();
        let host = self.host.clone().context("client is not connected")?;
        let connection = if keep_alive { "keep-alive" } else { "close" };

        let message = format!(
            "GET {path} HTTP/1.1\r\n\
             Host: {host}\r\n\
             User-Agent: {USER_AGENT}\r\n\
             Accept-Encoding: identity\r\n\
             Connection: {connection}\r\n\r\n"
        );

        let stream = self.stream.as_mut().context("client is not connected")?;
        stream.write_all(message.as_bytes()).await?;
        stream.flush().await?;

        self.receive_response(Method::GET).await
    }

    /// Validates a full PUT request line, resolves the named file under the
    /// local root, and uploads it. Invalid lines and missing files release
    /// the connection locally; there is no peer to report status to.
    pub async fn send_put(&mut self, request_line: &str) -> anyhow::Result<()> {
        self.begin_exchange();

        let line = match parse_request_line(request_line) {
            Ok(line) if line.method == Method::PUT => line,
            Ok(line) => {
                self.release();
                anyhow::bail!("expected a PUT request line, got {}", line.method.as_str());
            }
            Err(err) => {
                self.release();
                return Err(err).context("invalid request line");
            }
        };

        let local = self
            .config
            .local_root
            .join(line.target.trim_start_matches('/'));
        let meta = match tokio::fs::metadata(&local).await {
            Ok(meta) if meta.is_file() => meta,
            _ => {
                self.release();
                anyhow::bail!("local file {} does not exist", local.display());
            }
        };

        let content_type = mime::content_type_for(&local);
        let header = format!(
            "{} {} {}\r\n\
             User-Agent: {USER_AGENT}\r\n\
             Accept-Encoding: identity\r\n\
             Content-Type: {content_type}\r\n\
             Content-Length: {}\r\n\
             Connection: close\r\n\r\n",
            line.method.as_str(),
            line.target,
            line.version,
            meta.len(),
        );

        let content = tokio::fs::read(&local)
            .await
            .with_context(|| format!("cannot read {}", local.display()))?;

        let stream = self.stream.as_mut().context("client is not connected")?;
        stream.write_all(header.as_bytes()).await?;
        stream.write_all(&content).await?;
        stream.flush().await?;

        self.receive_response(Method::PUT).await
    }

    /// Reads the response head; for GET, also reads exactly Content-Length
    /// body bytes into the response buffer, accumulating across partial
    /// reads and never past the declared length.
    pub async fn receive_response(&mut self, kind: Method) -> anyhow::Result<()> {
        let read_timeout = self.config.read_timeout();
        let stream = self.stream.as_mut().context("client is not connected")?;

        let block = loop {
            match HeaderBlock::parse(&self.buffer) {
                Ok((block, consumed)) => {
                    self.buffer.advance(consumed);
                    break block;
                }
                Err(ParseError::Incomplete) => {}
                Err(e) => return Err(e.into()),
            }

            let n = timeout(read_timeout, stream.read_buf(&mut self.buffer))
                .await
                .map_err(|_| anyhow::anyhow!("read timed out waiting for response"))??;
            if n == 0 {
                return Err(ParseError::IncompleteHeader.into());
            }
        };

        let status = parse_status_line(&block.start_line)?;
        self.status = Some(status.code);
        self.header = render_header(&block);

        if kind == Method::GET {
            let declared = block.fields.content_length()? as usize;

            let take = declared.min(self.buffer.len());
            self.response.extend_from_slice(&self.buffer[..take]);
            self.buffer.advance(take);

            let mut chunk = [0u8; BUFFER_SIZE];
            while self.response.len() < declared {
                let want = (declared - self.response.len()).min(BUFFER_SIZE);
                let n = timeout(read_timeout, stream.read(&mut chunk[..want]))
                    .await
                    .map_err(|_| anyhow::anyhow!("read timed out during body transfer"))??;

                if n == 0 {
                    anyhow::bail!(
                        "response body truncated after {} of {} bytes",
                        self.response.len(),
                        declared
                    );
                }
                self.response.extend_from_slice(&chunk[..n]);
            }
        }

        Ok(())
    }

    /// Header text of the last response.
    pub fn header(&self) -> &str {
        &self.header
    }

    /// Body of the last GET response.
    pub fn response(&self) -> &[u8] {
        &self.response
    }

    /// Status code of the last response.
    pub fn status(&self) -> Option<u16> {
        self.status
    }

    /// Clears the retained header, body, and status.
    pub fn clear_response(&mut self) {
        self.begin_exchange();
    }

    /// Shuts the connection down cleanly.
    pub async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            let _ = stream.shutdown().await;
        }
        self.host = None;
    }

    fn begin_exchange(&mut self) {
        self.header.clear();
        self.response.clear();
        self.status = None;
    }

    /// Drops the connection after a local failure.
    fn release(&mut self) {
        self.stream = None;
        self.host = None;
    }
}

fn render_header(block: &HeaderBlock) -> String {
    let mut text = String::new();
    let _ = writeln!(text, "{}", block.start_line);
    for (name, value) in block.fields.iter() {
        let _ = writeln!(text, "{name}: {value}");
    }
    text
}
