use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

use crate::http::response::{Body, Response};

/// Serializes and writes one response to the client.
///
/// The head is written first, then the body: whole-file bytes for a file
/// source, the buffered bytes otherwise. The byte count on the wire must
/// match the head's declared Content-Length; responders guarantee that by
/// taking the length from the same file metadata or buffer they hand over
/// here.
pub struct ResponseWriter {
    head: Vec<u8>,
    written: usize,
}

impl ResponseWriter {
    pub fn new(response: &Response) -> Self {
        Self {
            head: response.head.serialize(),
            written: 0,
        }
    }

    pub async fn write_to_stream(
        &mut self,
        stream: &mut TcpStream,
        body: &Body,
    ) -> anyhow::Result<()> {
        while self.written < self.head.len() {
            let n = stream.write(&self.head[self.written..]).await?;

            if n == 0 {
                return Err(anyhow::anyhow!("connection closed while writing"));
            }

            self.written += n;
        }

        match body {
            Body::File(path) => {
                let content = tokio::fs::read(path).await?;
                stream.write_all(&content).await?;
            }
            Body::Bytes(bytes) => {
                stream.write_all(bytes).await?;
            }
            Body::Empty => {}
        }

        stream.flush().await?;
        Ok(())
    }
}
