//! End-to-end tests: a real server on an ephemeral port, driven over TCP.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use crudhttp::api::{self, AppState};
use crudhttp::{Server, ServerConfig};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

struct TestServer {
    addr: SocketAddr,
    stop: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
    dir: tempfile::TempDir,
}

impl TestServer {
    async fn start() -> Self {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("client.html"), "<html>client</html>").unwrap();
        Self::start_in(dir).await
    }

    async fn start_in(dir: tempfile::TempDir) -> Self {
        Self::start_with(dir, |config| config).await
    }

    async fn start_with(
        dir: tempfile::TempDir,
        configure: impl FnOnce(ServerConfig) -> ServerConfig,
    ) -> Self {
        let config = configure(
            ServerConfig::default()
                .with_addr("127.0.0.1:0")
                .with_upload_dir(dir.path().join("uploads"))
                .with_client_page(dir.path().join("client.html"))
                .with_read_timeout(Duration::from_secs(5)),
        );
        let router = api::router(Arc::new(AppState::new(&config)));
        let server = Server::bind(config).await.unwrap();
        let addr = server.local_addr();

        let (stop, stopped) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            server
                .run_until(router, async {
                    let _ = stopped.await;
                })
                .await
                .unwrap();
        });

        Self {
            addr,
            stop: Some(stop),
            task,
            dir,
        }
    }

    fn upload_dir(&self) -> std::path::PathBuf {
        self.dir.path().join("uploads")
    }

    async fn send(&self, raw: &[u8]) -> Reply {
        let mut stream = TcpStream::connect(self.addr).await.unwrap();
        stream.write_all(raw).await.unwrap();
        let mut out = Vec::new();
        stream.read_to_end(&mut out).await.unwrap();
        Reply::parse(out)
    }

    async fn request(&self, method: &str, path: &str, content_type: &str, body: &[u8]) -> Reply {
        let mut raw = format!(
            "{method} {path} HTTP/1.1\r\nHost: localhost\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\n\r\n",
            body.len()
        )
        .into_bytes();
        raw.extend_from_slice(body);
        self.send(&raw).await
    }

    async fn get(&self, path: &str) -> Reply {
        self.send(format!("GET {path} HTTP/1.1\r\nHost: localhost\r\n\r\n").as_bytes())
            .await
    }

    async fn stop(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        self.task.await.unwrap();
    }
}

struct Reply {
    status: u16,
    head: String,
    body: Vec<u8>,
}

impl Reply {
    fn parse(raw: Vec<u8>) -> Self {
        let split = raw
            .windows(4)
            .position(|w| w == b"\r\n\r\n")
            .expect("response has a head");
        let head = String::from_utf8(raw[..split].to_vec()).unwrap();
        let status = head.split(' ').nth(1).unwrap().parse().unwrap();
        Self {
            status,
            head,
            body: raw[split + 4..].to_vec(),
        }
    }

    fn text(&self) -> &str {
        std::str::from_utf8(&self.body).unwrap()
    }

    fn header(&self, name: &str) -> Option<&str> {
        self.head.lines().skip(1).find_map(|line| {
            let (n, v) = line.split_once(':')?;
            n.eq_ignore_ascii_case(name).then(|| v.trim())
        })
    }
}

const JSON: &str = "application/json";

fn multipart(boundary: &str, parts: &[(&str, Option<&str>, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, filename, data) in parts {
        body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        match filename {
            Some(filename) => body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
                )
                .as_bytes(),
            ),
            None => body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
            ),
        }
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
    body
}

#[tokio::test]
async fn create_then_list() {
    let server = TestServer::start().await;

    let res = server
        .request(
            "POST",
            "/api/data/users",
            JSON,
            br#"{"name":"John","email":"john@example.com"}"#,
        )
        .await;
    assert_eq!(res.status, 201);
    assert_eq!(res.text(), r#"{"id":"1","status":"created"}"#);
    assert_eq!(res.header("access-control-allow-origin"), Some("*"));
    assert_eq!(res.header("content-type"), Some("application/json"));
    assert_eq!(res.header("connection"), Some("close"));

    let res = server.get("/api/data/users").await;
    assert_eq!(res.status, 200);
    assert_eq!(
        res.text(),
        r#"[{"id":"1","name":"John","email":"john@example.com"}]"#
    );

    server.stop().await;
}

#[tokio::test]
async fn missing_item_is_404() {
    let server = TestServer::start().await;

    let res = server.get("/api/data/users/999").await;
    assert_eq!(res.status, 404);
    assert_eq!(res.text(), r#"{"error":"Item not found"}"#);
    assert_eq!(res.header("access-control-allow-origin"), Some("*"));

    server.stop().await;
}

#[tokio::test]
async fn unknown_route_is_404() {
    let server = TestServer::start().await;

    let res = server.get("/nowhere").await;
    assert_eq!(res.status, 404);
    assert_eq!(res.text(), r#"{"error":"Not Found"}"#);

    let res = server.get("/api/data/users/").await;
    assert_eq!(res.status, 404);

    server.stop().await;
}

#[tokio::test]
async fn update_and_delete_round_trip() {
    let server = TestServer::start().await;

    server
        .request("POST", "/api/data/notes", JSON, br#"{"text":"draft"}"#)
        .await;

    let res = server
        .request("PUT", "/api/data/notes/1", JSON, br#"{"text":"final","id":"5"}"#)
        .await;
    assert_eq!(res.status, 200);
    assert_eq!(res.text(), r#"{"id":"1","status":"updated"}"#);

    let res = server.get("/api/data/notes/1").await;
    assert_eq!(res.text(), r#"{"id":"1","text":"final"}"#);

    let res = server
        .request("PUT", "/api/data/notes/2", JSON, br#"{"text":"x"}"#)
        .await;
    assert_eq!(res.status, 404);

    let res = server.request("DELETE", "/api/data/notes/1", JSON, b"").await;
    assert_eq!(res.status, 200);
    assert_eq!(res.text(), r#"{"id":"1","status":"deleted"}"#);

    let res = server.get("/api/data/notes/1").await;
    assert_eq!(res.status, 404);
    let res = server.get("/api/data/notes").await;
    assert_eq!(res.text(), "[]");

    server.stop().await;
}

#[tokio::test]
async fn ids_are_shared_across_collections_and_never_reused() {
    let server = TestServer::start().await;

    let a = server.request("POST", "/api/data/a", JSON, b"{}").await;
    let b = server.request("POST", "/api/data/b", JSON, b"{}").await;
    assert_eq!(a.text(), r#"{"id":"1","status":"created"}"#);
    assert_eq!(b.text(), r#"{"id":"2","status":"created"}"#);

    server.request("DELETE", "/api/data/b/2", JSON, b"").await;
    let c = server.request("POST", "/api/data/b", JSON, b"{}").await;
    assert_eq!(c.text(), r#"{"id":"3","status":"created"}"#);

    let res = server.get("/api/data/a").await;
    assert_eq!(res.text(), r#"[{"id":"1"}]"#);

    server.stop().await;
}

#[tokio::test]
async fn form_encoded_create() {
    let server = TestServer::start().await;

    let res = server
        .request(
            "POST",
            "/api/data/people",
            "application/x-www-form-urlencoded",
            b"name=Ada+Lovelace&born=1815",
        )
        .await;
    assert_eq!(res.status, 201);

    let res = server.get("/api/data/people/1").await;
    assert_eq!(res.text(), r#"{"id":"1","name":"Ada Lovelace","born":"1815"}"#);

    server.stop().await;
}

#[tokio::test]
async fn invalid_json_is_400() {
    let server = TestServer::start().await;

    let res = server
        .request("POST", "/api/data/users", JSON, b"[not an object]")
        .await;
    assert_eq!(res.status, 400);
    assert_eq!(res.text(), r#"{"error":"Invalid JSON body"}"#);

    server.stop().await;
}

#[tokio::test]
async fn upload_download_and_list() {
    let server = TestServer::start().await;
    let payload: Vec<u8> = (0u8..=255).cycle().take(20_000).collect();

    let body = multipart(
        "XyZ",
        &[
            ("note", None, &b"hello"[..]),
            ("file", Some("data.bin"), payload.as_slice()),
        ],
    );
    let res = server
        .request(
            "POST",
            "/api/files/upload",
            "multipart/form-data; boundary=XyZ",
            &body,
        )
        .await;
    assert_eq!(res.status, 201);
    assert_eq!(
        res.text(),
        r#"{"uploaded_files":[{"filename":"data.bin","status":"uploaded"}]}"#
    );
    assert_eq!(std::fs::read(server.upload_dir().join("data.bin")).unwrap(), payload);

    let res = server.get("/api/files/download/data.bin").await;
    assert_eq!(res.status, 200);
    assert_eq!(res.header("content-type"), Some("application/octet-stream"));
    assert_eq!(
        res.header("content-disposition"),
        Some("attachment; filename=\"data.bin\"")
    );
    assert_eq!(res.body, payload);

    let res = server.get("/api/files").await;
    assert_eq!(res.text(), r#"{"files":["data.bin"]}"#);

    server.stop().await;
}

#[tokio::test]
async fn upload_path_traversal_is_flattened() {
    let server = TestServer::start().await;

    let body = multipart("b", &[("file", Some("../../escape.txt"), &b"x"[..])]);
    let res = server
        .request("POST", "/api/files/upload", "multipart/form-data; boundary=b", &body)
        .await;
    assert_eq!(
        res.text(),
        r#"{"uploaded_files":[{"filename":"escape.txt","status":"uploaded"}]}"#
    );
    assert!(server.upload_dir().join("escape.txt").is_file());

    let res = server.get("/api/files/download/..").await;
    assert_eq!(res.status, 400);
    assert_eq!(res.text(), r#"{"error":"Invalid filename"}"#);

    let res = server.get("/api/files/download/a%0D%0AX-Evil:%201").await;
    assert_eq!(res.status, 400);
    assert_eq!(res.header("x-evil"), None);

    server.stop().await;
}

#[tokio::test]
async fn upload_errors() {
    let server = TestServer::start().await;

    let res = server.request("POST", "/api/files/upload", "text/plain", b"abc").await;
    assert_eq!(res.status, 400);
    assert_eq!(
        res.text(),
        r#"{"error":"No files or form data found. Content-Type: text/plain, Body size: 3"}"#
    );

    let body = multipart("b", &[("note", None, &b"only text"[..])]);
    let res = server
        .request("POST", "/api/files/upload", "multipart/form-data; boundary=b", &body)
        .await;
    assert_eq!(res.status, 400);
    assert_eq!(res.text(), r#"{"error":"No files uploaded"}"#);

    server.stop().await;
}

#[tokio::test]
async fn missing_download_is_404_and_empty_listing_creates_dir() {
    let server = TestServer::start().await;

    let res = server.get("/api/files/download/ghost.txt").await;
    assert_eq!(res.status, 404);
    assert_eq!(res.text(), r#"{"error":"File not found"}"#);

    assert!(!server.upload_dir().exists());
    let res = server.get("/api/files").await;
    assert_eq!(res.status, 200);
    assert_eq!(res.text(), r#"{"files":[]}"#);
    assert!(server.upload_dir().is_dir());

    server.stop().await;
}

#[tokio::test]
async fn client_page_is_served_as_html() {
    let server = TestServer::start().await;

    let res = server.get("/").await;
    assert_eq!(res.status, 200);
    assert_eq!(res.header("content-type"), Some("text/html"));
    assert_eq!(res.text(), "<html>client</html>");

    server.stop().await;
}

#[tokio::test]
async fn missing_client_page_is_404() {
    let server = TestServer::start_in(tempfile::tempdir().unwrap()).await;

    let res = server.get("/").await;
    assert_eq!(res.status, 404);

    server.stop().await;
}

#[tokio::test]
async fn concurrent_creates_get_distinct_ids() {
    const N: usize = 32;
    let server = Arc::new(TestServer::start().await);

    let mut tasks = Vec::with_capacity(N);
    for i in 0..N {
        let server = Arc::clone(&server);
        tasks.push(tokio::spawn(async move {
            let body = format!(r#"{{"n":"{i}"}}"#);
            server
                .request("POST", "/api/data/load", JSON, body.as_bytes())
                .await
                .status
        }));
    }
    for task in tasks {
        assert_eq!(task.await.unwrap(), 201);
    }

    let res = server.get("/api/data/load").await;
    let items: Vec<serde_json::Value> = serde_json::from_slice(&res.body).unwrap();
    assert_eq!(items.len(), N);
    let ids: Vec<u64> = items
        .iter()
        .map(|item| item["id"].as_str().unwrap().parse().unwrap())
        .collect();
    assert_eq!(ids, (1..=N as u64).collect::<Vec<_>>());

    if let Ok(server) = Arc::try_unwrap(server) {
        server.stop().await;
    }
}

#[tokio::test]
async fn shutdown_waits_for_in_flight_requests() {
    let server = TestServer::start().await;

    // Head sent, body still outstanding when shutdown is requested.
    let mut stream = TcpStream::connect(server.addr).await.unwrap();
    stream
        .write_all(b"POST /api/data/slow HTTP/1.1\r\nContent-Type: application/json\r\nContent-Length: 2\r\n\r\n")
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let TestServer { stop, task, addr, dir: _dir } = server;
    drop(stop);

    stream.write_all(b"{}").await.unwrap();
    let mut out = Vec::new();
    stream.read_to_end(&mut out).await.unwrap();
    assert_eq!(Reply::parse(out).status, 201);

    task.await.unwrap();
    assert!(TcpStream::connect(addr).await.is_err());
}

#[tokio::test]
async fn connection_cap_holds_back_further_clients() {
    let server = TestServer::start_with(tempfile::tempdir().unwrap(), |config| {
        config
            .with_max_connections(Some(1))
            .with_read_timeout(Duration::from_millis(800))
    })
    .await;

    // Occupies the only slot: the head never completes.
    let mut stalled = TcpStream::connect(server.addr).await.unwrap();
    stalled.write_all(b"GET /api/files HTTP/1.1\r\nHost: loc").await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let server = Arc::new(server);
    let waiting = tokio::spawn({
        let server = Arc::clone(&server);
        async move { server.get("/api/files").await }
    });

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(!waiting.is_finished(), "second client served while the slot was taken");

    let mut out = Vec::new();
    stalled.read_to_end(&mut out).await.unwrap();
    assert_eq!(Reply::parse(out).status, 408);

    let res = tokio::time::timeout(Duration::from_secs(5), waiting)
        .await
        .expect("second client served once the slot was freed")
        .unwrap();
    assert_eq!(res.status, 200);
    assert_eq!(res.text(), r#"{"files":[]}"#);

    if let Ok(server) = Arc::try_unwrap(server) {
        server.stop().await;
    }
}
