use bytes::{Buf, BytesMut};
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::config::Tuning;
use crate::http::mime;
use crate::http::parser::{HeaderBlock, ParseError};
use crate::http::request::{Method, Request};
use crate::http::response::{Body, Response, ResponseHead, StatusCode};
use crate::http::writer::ResponseWriter;

const BUFFER_SIZE: usize = 8192;

/// Per-connection handler.
///
/// Owns the stream for the connection's whole keep-alive lifetime; dropping
/// the handler releases the socket on every exit path. One request is fully
/// responded to before the next is read.
pub struct Connection {
    stream: TcpStream,
    peer: SocketAddr,
    buffer: BytesMut,
    root: PathBuf,
    tuning: Tuning,
    keep_alive: bool,
    state: ConnectionState,
}

/// The keep-alive state machine. After each response the connection either
/// loops back to `Receiving` on the same stream or moves to `Closed`.
pub enum ConnectionState {
    Receiving,
    Responding(HeaderBlock),
    Closed,
}

impl Connection {
    pub fn new(stream: TcpStream, peer: SocketAddr, root: PathBuf, tuning: Tuning) -> Self {
        Self {
            stream,
            peer,
            buffer: BytesMut::with_capacity(4096),
            root,
            tuning,
            keep_alive: false,
            state: ConnectionState::Receiving,
        }
    }

    pub async fn run(&mut self) -> anyhow::Result<()> {
        loop {
            match std::mem::replace(&mut self.state, ConnectionState::Closed) {
                ConnectionState::Receiving => match self.receive_request().await? {
                    Some(block) => {
                        self.state = ConnectionState::Responding(block);
                    }
                    None => {
                        self.state = ConnectionState::Closed;
                    }
                },

                ConnectionState::Responding(block) => {
                    self.respond(block).await?;

                    if self.keep_alive {
                        self.state = ConnectionState::Receiving; // next request, same stream
                    } else {
                        self.state = ConnectionState::Closed;
                    }
                }

                ConnectionState::Closed => {
                    break;
                }
            }
        }

        Ok(())
    }

    /// Accumulates stream bytes until a full header block is framed.
    ///
    /// Returns `None` on a clean close between requests. A close in the
    /// middle of a header block is an error, as is exceeding the header
    /// size cap or the read deadline.
    pub async fn receive_request(&mut self) -> anyhow::Result<Option<HeaderBlock>> {
        loop {
            // Try framing whatever we already have
            match HeaderBlock::parse(&self.buffer) {
                Ok((block, consumed)) => {
                    self.buffer.advance(consumed);
                    return Ok(Some(block));
                }

                Err(ParseError::Incomplete) => {
                    // Need more data → fall through to read
                }

                Err(e) => {
                    return Err(e.into());
                }
            }

            if self.buffer.len() > self.tuning.max_header_bytes {
                anyhow::bail!(
                    "request header exceeds {} bytes",
                    self.tuning.max_header_bytes
                );
            }

            let n = timeout(
                self.tuning.read_timeout(),
                self.stream.read_buf(&mut self.buffer),
            )
            .await
            .map_err(|_| anyhow::anyhow!("read timed out waiting for request"))??;

            if n == 0 {
                if self.buffer.is_empty() {
                    // Client closed between requests
                    return Ok(None);
                }
                return Err(ParseError::IncompleteHeader.into());
            }
        }
    }

    /// Parses the framed block and dispatches on the method token. A bad
    /// request line gets a 400 response and the connection closes: after a
    /// framing error the stream position is untrustworthy.
    async fn respond(&mut self, block: HeaderBlock) -> anyhow::Result<()> {
        match Request::from_block(block) {
            Ok(req) => {
                tracing::info!(
                    peer = %self.peer,
                    method = req.method.as_str(),
                    target = %req.target,
                    "request"
                );
                match req.method {
                    Method::GET => self.respond_get(&req).await,
                    Method::PUT => self.respond_put(&req).await,
                }
            }
            Err(err) => {
                tracing::warn!(peer = %self.peer, %err, "rejected request");
                self.keep_alive = false;
                self.send_page(StatusCode::BadRequest).await
            }
        }
    }

    /// GET: map the target under the server root and send the file, or the
    /// 404 page when it does not exist. A target ending in "/" serves its
    /// index.html.
    async fn respond_get(&mut self, req: &Request) -> anyhow::Result<()> {
        self.keep_alive = req.keep_alive();

        let mut target = req.target.clone();
        if target.ends_with('/') {
            target.push_str("index.html");
        }
        let path = self.root.join(target.trim_start_matches('/'));

        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => {
                let head = ResponseHead::new(
                    StatusCode::Ok,
                    mime::content_type_for(&path),
                    meta.len(),
                    self.keep_alive,
                );
                self.send(Response::new(head, Body::File(path))).await
            }
            _ => {
                tracing::info!(peer = %self.peer, target = %req.target, "file not found");
                self.send_page(StatusCode::NotFound).await
            }
        }
    }

    /// PUT: drain exactly Content-Length body bytes, store them under the
    /// saving directory, and only then acknowledge with 200. A transfer cut
    /// short by the peer fails the request with 400 and writes nothing.
    async fn respond_put(&mut self, req: &Request) -> anyhow::Result<()> {
        self.keep_alive = req.keep_alive();

        let declared = match req.content_length() {
            Ok(n) => n as usize,
            Err(err) => {
                tracing::warn!(peer = %self.peer, %err, "rejected upload");
                self.keep_alive = false;
                return self.send_page(StatusCode::BadRequest).await;
            }
        };

        let body = match self.read_body(declared).await? {
            Some(body) => body,
            None => {
                tracing::warn!(peer = %self.peer, declared, "upload body truncated");
                self.keep_alive = false;
                return self.send_page(StatusCode::BadRequest).await;
            }
        };

        let dest = self
            .root
            .join("saving")
            .join(req.target.trim_start_matches('/'));
        if let Err(err) = tokio::fs::write(&dest, &body).await {
            tracing::warn!(peer = %self.peer, dest = %dest.display(), %err, "cannot store upload");
            return self.send_page(StatusCode::NotFound).await;
        }

        tracing::info!(
            peer = %self.peer,
            dest = %dest.display(),
            bytes = body.len(),
            "upload stored"
        );

        let content_type = req
            .header("Content-Type")
            .unwrap_or("application/octet-stream")
            .to_string();
        let head = ResponseHead::new(StatusCode::Ok, content_type, 0, self.keep_alive);
        self.send(Response::new(head, Body::Empty)).await
    }

    /// Reads exactly `declared` body bytes: whatever the accumulation
    /// buffer already holds first, then bounded stream reads — never past
    /// the declared length. Returns `None` if the peer closes early.
    async fn read_body(&mut self, declared: usize) -> anyhow::Result<Option<Vec<u8>>> {
        let mut body = Vec::with_capacity(declared.min(BUFFER_SIZE));

        let take = declared.min(self.buffer.len());
        body.extend_from_slice(&self.buffer[..take]);
        self.buffer.advance(take);

        let mut chunk = [0u8; BUFFER_SIZE];
        while body.len() < declared {
            let want = (declared - body.len()).min(BUFFER_SIZE);
            let n = timeout(
                self.tuning.read_timeout(),
                self.stream.read(&mut chunk[..want]),
            )
            .await
            .map_err(|_| anyhow::anyhow!("read timed out during body transfer"))??;

            if n == 0 {
                return Ok(None);
            }
            body.extend_from_slice(&chunk[..n]);
        }

        Ok(Some(body))
    }

    /// Sends the configured error page for `status`, or an empty body if
    /// the page file is itself missing.
    async fn send_page(&mut self, status: StatusCode) -> anyhow::Result<()> {
        let page = self
            .root
            .join("response")
            .join(format!("{}.html", status.as_u16()));

        let response = match tokio::fs::metadata(&page).await {
            Ok(meta) if meta.is_file() => {
                let head = ResponseHead::new(
                    status,
                    mime::content_type_for(&page),
                    meta.len(),
                    self.keep_alive,
                );
                Response::new(head, Body::File(page))
            }
            _ => {
                tracing::warn!(peer = %self.peer, page = %page.display(), "error page missing");
                let head = ResponseHead::new(status, "text/html", 0, self.keep_alive);
                Response::new(head, Body::Empty)
            }
        };

        self.send(response).await
    }

    async fn send(&mut self, response: Response) -> anyhow::Result<()> {
        let mut writer = ResponseWriter::new(&response);
        writer
            .write_to_stream(&mut self.stream, &response.body)
            .await
    }
}
