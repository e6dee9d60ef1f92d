//! End-to-end transfer tests: a real listener on an ephemeral port, driven
//! by the client engine and by raw socket writes.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use courier::client::Client;
use courier::config::{ClientConfig, Tuning};
use courier::http::connection::Connection;
use courier::http::parser::HeaderBlock;

const INDEX_BODY: &[u8] = b"hello,world!!";
const PAGE_404: &[u8] = b"<html>404 Not Found</html>";
const PAGE_400: &[u8] = b"<html>400 Bad Request</html>";

/// Builds a server root with the expected layout: index.html, error pages,
/// and an empty saving directory.
fn make_root() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("index.html"), INDEX_BODY).unwrap();
    std::fs::create_dir(dir.path().join("response")).unwrap();
    std::fs::write(dir.path().join("response/404.html"), PAGE_404).unwrap();
    std::fs::write(dir.path().join("response/400.html"), PAGE_400).unwrap();
    std::fs::create_dir(dir.path().join("saving")).unwrap();
    dir
}

/// Accept loop on an ephemeral port, one spawned handler per connection.
async fn spawn_server(root: PathBuf, tuning: Tuning) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            let Ok((socket, peer)) = listener.accept().await else {
                break;
            };
            let root = root.clone();
            let tuning = tuning.clone();
            tokio::spawn(async move {
                let mut conn = Connection::new(socket, peer, root, tuning);
                let _ = conn.run().await;
            });
        }
    });

    addr
}

fn client_for(addr: SocketAddr, local_root: &Path) -> Client {
    Client::new(ClientConfig {
        port: addr.port(),
        local_root: local_root.to_path_buf(),
        ..ClientConfig::default()
    })
}

/// Writes one raw request, half-closes, and drains the full response.
async fn raw_exchange(addr: SocketAddr, request: &[u8]) -> Vec<u8> {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(request).await.unwrap();
    stream.shutdown().await.unwrap();

    let mut out = Vec::new();
    stream.read_to_end(&mut out).await.unwrap();
    out
}

/// Reads exactly one response (head plus declared body) off the stream.
async fn read_one_response(stream: &mut TcpStream) -> (HeaderBlock, Vec<u8>) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        if let Ok((block, consumed)) = HeaderBlock::parse(&buf) {
            let declared = block.fields.content_length().unwrap() as usize;
            while buf.len() < consumed + declared {
                let n = stream.read(&mut chunk).await.unwrap();
                assert!(n > 0, "connection closed during response body");
                buf.extend_from_slice(&chunk[..n]);
            }
            let body = buf[consumed..consumed + declared].to_vec();
            return (block, body);
        }

        let n = stream.read(&mut chunk).await.unwrap();
        assert!(n > 0, "connection closed before response head");
        buf.extend_from_slice(&chunk[..n]);
    }
}

fn split_response(raw: &[u8]) -> (HeaderBlock, Vec<u8>) {
    let (block, consumed) = HeaderBlock::parse(raw).expect("response head should frame");
    (block, raw[consumed..].to_vec())
}

#[tokio::test]
async fn test_get_root_serves_index() {
    let root = make_root();
    let addr = spawn_server(root.path().to_path_buf(), Tuning::default()).await;

    let raw = raw_exchange(addr, b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n").await;
    let (head, body) = split_response(&raw);

    assert_eq!(head.start_line, "HTTP/1.1 200 OK");
    assert_eq!(head.fields.get("Content-Length"), Some("13"));
    assert_eq!(head.fields.get("Content-Type"), Some("text/html"));
    assert_eq!(body, INDEX_BODY);
}

#[tokio::test]
async fn test_get_file_in_subdirectory() {
    let root = make_root();
    std::fs::create_dir(root.path().join("docs")).unwrap();
    std::fs::write(root.path().join("docs/notes.txt"), b"some notes").unwrap();
    let addr = spawn_server(root.path().to_path_buf(), Tuning::default()).await;

    let raw = raw_exchange(addr, b"GET /docs/notes.txt HTTP/1.1\r\n\r\n").await;
    let (head, body) = split_response(&raw);

    assert_eq!(head.start_line, "HTTP/1.1 200 OK");
    assert_eq!(head.fields.get("Content-Type"), Some("text/plain"));
    assert_eq!(body, b"some notes");
}

#[tokio::test]
async fn test_get_missing_file_sends_404_page() {
    let root = make_root();
    let addr = spawn_server(root.path().to_path_buf(), Tuning::default()).await;

    let raw = raw_exchange(addr, b"GET /nope.html HTTP/1.1\r\n\r\n").await;
    let (head, body) = split_response(&raw);

    assert_eq!(head.start_line, "HTTP/1.1 404 Not Found");
    assert_eq!(body, PAGE_404);
}

#[tokio::test]
async fn test_get_missing_error_page_sends_empty_404() {
    let root = tempfile::tempdir().unwrap();
    let addr = spawn_server(root.path().to_path_buf(), Tuning::default()).await;

    let raw = raw_exchange(addr, b"GET /nope.html HTTP/1.1\r\n\r\n").await;
    let (head, body) = split_response(&raw);

    assert_eq!(head.start_line, "HTTP/1.1 404 Not Found");
    assert_eq!(head.fields.get("Content-Length"), Some("0"));
    assert!(body.is_empty());
}

#[tokio::test]
async fn test_malformed_request_line_sends_400() {
    let root = make_root();
    let addr = spawn_server(root.path().to_path_buf(), Tuning::default()).await;

    let raw = raw_exchange(addr, b"GET /index.html\r\n\r\n").await;
    let (head, body) = split_response(&raw);

    assert_eq!(head.start_line, "HTTP/1.1 400 Bad Request");
    assert_eq!(body, PAGE_400);
}

#[tokio::test]
async fn test_unsupported_version_sends_400() {
    let root = make_root();
    let addr = spawn_server(root.path().to_path_buf(), Tuning::default()).await;

    let raw = raw_exchange(addr, b"GET / HTTP/2.0\r\n\r\n").await;
    let (head, _) = split_response(&raw);

    assert_eq!(head.start_line, "HTTP/1.1 400 Bad Request");
}

#[tokio::test]
async fn test_unknown_method_sends_400() {
    let root = make_root();
    let addr = spawn_server(root.path().to_path_buf(), Tuning::default()).await;

    let raw = raw_exchange(addr, b"POST /api HTTP/1.1\r\n\r\n").await;
    let (head, _) = split_response(&raw);

    assert_eq!(head.start_line, "HTTP/1.1 400 Bad Request");
}

#[tokio::test]
async fn test_keep_alive_serves_two_requests_on_one_connection() {
    let root = make_root();
    let addr = spawn_server(root.path().to_path_buf(), Tuning::default()).await;

    let mut stream = TcpStream::connect(addr).await.unwrap();

    stream
        .write_all(b"GET / HTTP/1.1\r\nConnection: keep-alive\r\n\r\n")
        .await
        .unwrap();
    let (first_head, first_body) = read_one_response(&mut stream).await;
    assert_eq!(first_head.start_line, "HTTP/1.1 200 OK");
    assert_eq!(first_head.fields.get("Connection"), Some("keep-alive"));
    assert_eq!(first_body, INDEX_BODY);

    stream
        .write_all(b"GET / HTTP/1.1\r\nConnection: close\r\n\r\n")
        .await
        .unwrap();
    let (second_head, second_body) = read_one_response(&mut stream).await;
    assert_eq!(second_head.start_line, "HTTP/1.1 200 OK");
    assert_eq!(second_head.fields.get("Connection"), Some("close"));
    assert_eq!(second_body, INDEX_BODY);

    // connection closes after the close response
    let mut rest = Vec::new();
    stream.read_to_end(&mut rest).await.unwrap();
    assert!(rest.is_empty());
}

#[tokio::test]
async fn test_connection_without_keep_alive_closes_after_one_response() {
    let root = make_root();
    let addr = spawn_server(root.path().to_path_buf(), Tuning::default()).await;

    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n")
        .await
        .unwrap();
    let (head, _) = read_one_response(&mut stream).await;
    assert_eq!(head.fields.get("Connection"), Some("close"));

    let mut rest = Vec::new();
    stream.read_to_end(&mut rest).await.unwrap();
    assert!(rest.is_empty());
}

#[tokio::test]
async fn test_raw_put_stores_exact_bytes() {
    let root = make_root();
    let addr = spawn_server(root.path().to_path_buf(), Tuning::default()).await;

    let raw = raw_exchange(
        addr,
        b"PUT /upload.bin HTTP/1.1\r\nContent-Length: 4\r\n\r\n\x01\x02\x03\x04",
    )
    .await;
    let (head, body) = split_response(&raw);

    assert_eq!(head.start_line, "HTTP/1.1 200 OK");
    assert_eq!(head.fields.get("Content-Length"), Some("0"));
    assert!(body.is_empty());

    let stored = std::fs::read(root.path().join("saving/upload.bin")).unwrap();
    assert_eq!(stored, vec![0x01, 0x02, 0x03, 0x04]);
}

#[tokio::test]
async fn test_put_body_split_across_writes() {
    let root = make_root();
    let addr = spawn_server(root.path().to_path_buf(), Tuning::default()).await;

    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(b"PUT /split.bin HTTP/1.1\r\nContent-Length: 6\r\n\r\nabc")
        .await
        .unwrap();
    stream.flush().await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    stream.write_all(b"def").await.unwrap();

    let (head, _) = read_one_response(&mut stream).await;
    assert_eq!(head.start_line, "HTTP/1.1 200 OK");

    let stored = std::fs::read(root.path().join("saving/split.bin")).unwrap();
    assert_eq!(stored, b"abcdef");
}

#[tokio::test]
async fn test_truncated_put_rejected_and_nothing_stored() {
    let root = make_root();
    let addr = spawn_server(root.path().to_path_buf(), Tuning::default()).await;

    // declares 10 bytes, delivers 4, then closes
    let raw = raw_exchange(
        addr,
        b"PUT /short.bin HTTP/1.1\r\nContent-Length: 10\r\n\r\nabcd",
    )
    .await;
    let (head, _) = split_response(&raw);

    assert_eq!(head.start_line, "HTTP/1.1 400 Bad Request");
    assert!(!root.path().join("saving/short.bin").exists());
}

#[tokio::test]
async fn test_put_with_bad_content_length_rejected() {
    let root = make_root();
    let addr = spawn_server(root.path().to_path_buf(), Tuning::default()).await;

    let raw = raw_exchange(addr, b"PUT /f.bin HTTP/1.1\r\nContent-Length: many\r\n\r\n").await;
    let (head, _) = split_response(&raw);

    assert_eq!(head.start_line, "HTTP/1.1 400 Bad Request");
}

#[tokio::test]
async fn test_client_get_hello_world() {
    let root = make_root();
    let addr = spawn_server(root.path().to_path_buf(), Tuning::default()).await;
    let local = tempfile::tempdir().unwrap();

    let mut client = client_for(addr, local.path());
    client.connect("127.0.0.1").await.unwrap();
    client.send_get("/", false).await.unwrap();

    assert_eq!(client.status(), Some(200));
    assert_eq!(client.response(), INDEX_BODY);
    assert!(client.header().starts_with("HTTP/1.1 200 OK"));
    client.close().await;
}

#[tokio::test]
async fn test_client_get_missing_file_reads_404_body() {
    let root = make_root();
    let addr = spawn_server(root.path().to_path_buf(), Tuning::default()).await;
    let local = tempfile::tempdir().unwrap();

    let mut client = client_for(addr, local.path());
    client.connect("127.0.0.1").await.unwrap();
    client.send_get("/missing.txt", false).await.unwrap();

    assert_eq!(client.status(), Some(404));
    assert_eq!(client.response(), PAGE_404);
}

#[tokio::test]
async fn test_client_keep_alive_get_twice() {
    let root = make_root();
    let addr = spawn_server(root.path().to_path_buf(), Tuning::default()).await;
    let local = tempfile::tempdir().unwrap();

    let mut client = client_for(addr, local.path());
    client.connect("127.0.0.1").await.unwrap();

    client.send_get("/", true).await.unwrap();
    assert_eq!(client.status(), Some(200));
    assert_eq!(client.response(), INDEX_BODY);

    // same connection, no reconnect
    client.send_get("/", false).await.unwrap();
    assert_eq!(client.status(), Some(200));
    assert_eq!(client.response(), INDEX_BODY);
    client.close().await;
}

#[tokio::test]
async fn test_client_put_uploads_file() {
    let root = make_root();
    let addr = spawn_server(root.path().to_path_buf(), Tuning::default()).await;

    let local = tempfile::tempdir().unwrap();
    std::fs::write(local.path().join("upload.bin"), [0x01, 0x02, 0x03, 0x04]).unwrap();

    let mut client = client_for(addr, local.path());
    client.connect("127.0.0.1").await.unwrap();
    client.send_put("PUT /upload.bin HTTP/1.1").await.unwrap();

    assert_eq!(client.status(), Some(200));
    let stored = std::fs::read(root.path().join("saving/upload.bin")).unwrap();
    assert_eq!(stored, vec![0x01, 0x02, 0x03, 0x04]);
}

#[tokio::test]
async fn test_put_then_get_round_trip() {
    let root = make_root();
    let addr = spawn_server(root.path().to_path_buf(), Tuning::default()).await;

    let payload = b"round trip payload \x00\xff\x7f bytes".to_vec();
    let local = tempfile::tempdir().unwrap();
    std::fs::write(local.path().join("data.bin"), &payload).unwrap();

    let mut uploader = client_for(addr, local.path());
    uploader.connect("127.0.0.1").await.unwrap();
    uploader.send_put("PUT /data.bin HTTP/1.1").await.unwrap();
    assert_eq!(uploader.status(), Some(200));

    let mut reader = client_for(addr, local.path());
    reader.connect("127.0.0.1").await.unwrap();
    reader.send_get("/saving/data.bin", false).await.unwrap();

    assert_eq!(reader.status(), Some(200));
    assert_eq!(reader.response(), payload);
}

#[tokio::test]
async fn test_client_put_missing_local_file_is_local_failure() {
    let root = make_root();
    let addr = spawn_server(root.path().to_path_buf(), Tuning::default()).await;
    let local = tempfile::tempdir().unwrap();

    let mut client = client_for(addr, local.path());
    client.connect("127.0.0.1").await.unwrap();

    let err = client.send_put("PUT /ghost.bin HTTP/1.1").await.unwrap_err();
    assert!(err.to_string().contains("does not exist"));
    assert!(!root.path().join("saving/ghost.bin").exists());
}

#[tokio::test]
async fn test_client_put_rejects_bad_request_line() {
    let root = make_root();
    let addr = spawn_server(root.path().to_path_buf(), Tuning::default()).await;
    let local = tempfile::tempdir().unwrap();

    let mut client = client_for(addr, local.path());
    client.connect("127.0.0.1").await.unwrap();

    assert!(client.send_put("PUT /only-two-tokens").await.is_err());
    assert!(client.send_put("PUT /f.bin HTTP/3.0").await.is_err());
    assert!(client.send_put("GET /f.bin HTTP/1.1").await.is_err());
}

#[tokio::test]
async fn test_idle_connection_closed_after_read_deadline() {
    let root = make_root();
    let tuning = Tuning {
        read_timeout_secs: 1,
        ..Tuning::default()
    };
    let addr = spawn_server(root.path().to_path_buf(), tuning).await;

    let mut stream = TcpStream::connect(addr).await.unwrap();
    let mut buf = [0u8; 16];
    let read = tokio::time::timeout(std::time::Duration::from_secs(5), stream.read(&mut buf))
        .await
        .expect("server should drop the idle connection");
    assert_eq!(read.unwrap(), 0);
}

#[tokio::test]
async fn test_oversized_header_drops_connection() {
    let root = make_root();
    let tuning = Tuning {
        max_header_bytes: 256,
        ..Tuning::default()
    };
    let addr = spawn_server(root.path().to_path_buf(), tuning).await;

    let mut stream = TcpStream::connect(addr).await.unwrap();
    let junk = vec![b'a'; 4096];
    let _ = stream.write_all(&junk).await;

    let mut out = Vec::new();
    let result = stream.read_to_end(&mut out).await;
    // dropped without a response; reset is acceptable
    assert!(result.is_err() || out.is_empty());
}

#[tokio::test]
async fn test_parallel_connections_are_independent() {
    let root = make_root();
    let addr = spawn_server(root.path().to_path_buf(), Tuning::default()).await;

    let bad = tokio::spawn(raw_exchange(addr, b"GET broken\r\n\r\n".as_slice()));
    let good = tokio::spawn(raw_exchange(
        addr,
        b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n".as_slice(),
    ));

    let (bad_head, _) = split_response(&bad.await.unwrap());
    let (good_head, good_body) = split_response(&good.await.unwrap());

    assert_eq!(bad_head.start_line, "HTTP/1.1 400 Bad Request");
    assert_eq!(good_head.start_line, "HTTP/1.1 200 OK");
    assert_eq!(good_body, INDEX_BODY);
}
