//! End-to-end tests against a real listener.

use std::fs::File;
use std::net::SocketAddr;
use std::path::Path;
use std::time::{Duration, SystemTime};

use hotview_server::{ServerConfig, bind, serve};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

const PAGE: &str = "<!DOCTYPE html>\n<html><body>\n<h1>graph</h1>\n</body></html>\n";

struct TestServer {
    addr: SocketAddr,
    stop: oneshot::Sender<()>,
    handle: JoinHandle<Result<(), hotview_server::StartError>>,
}

async fn start(root: &Path) -> TestServer {
    let listener = bind("127.0.0.1", 0).await.unwrap();
    let addr = listener.local_addr().unwrap();

    let config = ServerConfig {
        port: addr.port(),
        root: root.to_path_buf(),
        watch_paths: vec![root.join("index.html"), root.join("graph-data.json")],
        poll_interval: Duration::from_millis(100),
        debounce: Duration::from_millis(10),
        ..ServerConfig::default()
    };

    let (stop, stopped) = oneshot::channel::<()>();
    let handle = tokio::spawn(serve(listener, config, async move {
        let _ = stopped.await;
    }));

    TestServer { addr, stop, handle }
}

fn bump_mtime(path: &Path) {
    File::options()
        .write(true)
        .open(path)
        .unwrap()
        .set_modified(SystemTime::now() + Duration::from_secs(30))
        .unwrap();
}

/// Read from `stream` into `buf` until it contains `needle`.
async fn read_until(stream: &mut TcpStream, buf: &mut String, needle: &str, timeout: Duration) {
    tokio::time::timeout(timeout, async {
        let mut chunk = [0_u8; 1024];
        while !buf.contains(needle) {
            let n = stream.read(&mut chunk).await.unwrap();
            assert!(n > 0, "connection closed before {needle:?}; got {buf:?}");
            buf.push_str(&String::from_utf8_lossy(&chunk[..n]));
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for {needle:?}; got {buf:?}"));
}

async fn get(addr: SocketAddr, path: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(format!("GET {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n").as_bytes())
        .await
        .unwrap();
    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();
    response
}

#[tokio::test]
async fn test_touching_watched_file_pushes_reload() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("index.html"), PAGE).unwrap();
    std::fs::write(dir.path().join("graph-data.json"), "{}").unwrap();
    let server = start(dir.path()).await;

    let mut sse = TcpStream::connect(server.addr).await.unwrap();
    sse.write_all(b"GET /sse HTTP/1.1\r\nHost: localhost\r\n\r\n")
        .await
        .unwrap();

    let mut received = String::new();
    read_until(&mut sse, &mut received, "data: connected\nid: ", Duration::from_secs(2)).await;
    assert!(received.starts_with("HTTP/1.1 200 OK"));
    assert!(received.to_ascii_lowercase().contains("content-type: text/event-stream"));
    assert!(!received.contains("data: reload"));

    bump_mtime(&dir.path().join("graph-data.json"));

    read_until(&mut sse, &mut received, "data: reload\nid: ", Duration::from_millis(1100)).await;

    let _ = server.stop.send(());
    tokio::time::timeout(Duration::from_secs(5), server.handle)
        .await
        .expect("server shuts down with an open event stream")
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn test_nonexistent_file_is_404() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("index.html"), PAGE).unwrap();
    let server = start(dir.path()).await;

    let response = get(server.addr, "/nonexistent.file").await;

    assert!(response.starts_with("HTTP/1.1 404"), "got {response:?}");
    assert!(response.contains("File not found: nonexistent.file"));

    let _ = server.stop.send(());
    server.handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_root_serves_document_with_client() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("index.html"), PAGE).unwrap();
    let server = start(dir.path()).await;

    let response = get(server.addr, "/").await;

    assert!(response.starts_with("HTTP/1.1 200"), "got {response:?}");
    assert!(response.contains("<h1>graph</h1>"));
    assert!(response.contains("new EventSource('/sse')"));
    let script = response.find("<script>").unwrap();
    let body_close = response.find("</body>").unwrap();
    assert!(script < body_close);

    let _ = server.stop.send(());
    server.handle.await.unwrap().unwrap();
}
