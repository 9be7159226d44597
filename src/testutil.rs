// src/testutil.rs
// =============================================================================
// A canned-response HTTP stub on a loopback listener, so fetcher and
// orchestrator tests run hermetically — no live network involved.
// =============================================================================

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

pub(crate) struct StubRoute {
    pub status: u16,
    pub content_type: &'static str,
    pub body: Vec<u8>,
}

impl StubRoute {
    pub fn new(status: u16, content_type: &'static str, body: Vec<u8>) -> Self {
        Self {
            status,
            content_type,
            body,
        }
    }
}

/// Binds an ephemeral loopback port serving `routes` (keyed by request
/// target, query included) and returns the base URL. Unknown targets get a
/// plain 404. The accept loop lives until the runtime is torn down.
pub(crate) async fn spawn_stub(routes: HashMap<String, StubRoute>) -> String {
    spawn_stub_with_log(routes).await.0
}

/// Like `spawn_stub`, but also returns a log of every request target the
/// stub served, in arrival order.
pub(crate) async fn spawn_stub_with_log(
    routes: HashMap<String, StubRoute>,
) -> (String, Arc<Mutex<Vec<String>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let routes = Arc::new(routes);
    let log = Arc::new(Mutex::new(Vec::new()));
    let task_log = Arc::clone(&log);
    tokio::spawn(async move {
        loop {
            let Ok((socket, _)) = listener.accept().await else {
                break;
            };
            tokio::spawn(handle(socket, Arc::clone(&routes), Arc::clone(&task_log)));
        }
    });
    (format!("http://{addr}"), log)
}

async fn handle(
    mut socket: TcpStream,
    routes: Arc<HashMap<String, StubRoute>>,
    log: Arc<Mutex<Vec<String>>>,
) {
    let mut request = Vec::new();
    let mut buf = [0u8; 1024];
    // Read until the end of the request headers (the stub only serves GET,
    // so there is no body to consume).
    loop {
        let Ok(n) = socket.read(&mut buf).await else {
            return;
        };
        if n == 0 {
            break;
        }
        request.extend_from_slice(&buf[..n]);
        if request.windows(4).any(|w| w == b"\r\n\r\n") {
            break;
        }
    }

    let request = String::from_utf8_lossy(&request);
    let target = request
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .unwrap_or("/")
        .to_string();
    log.lock().unwrap().push(target.clone());

    let (status, content_type, body) = match routes.get(&target) {
        Some(route) => (route.status, route.content_type, route.body.clone()),
        None => (404, "text/plain", b"not found".to_vec()),
    };

    let reason = if status == 200 { "OK" } else { "STATUS" };
    let header = format!(
        "HTTP/1.1 {status} {reason}\r\ncontent-type: {content_type}\r\ncontent-length: {}\r\nconnection: close\r\n\r\n",
        body.len()
    );
    let _ = socket.write_all(header.as_bytes()).await;
    let _ = socket.write_all(&body).await;
    let _ = socket.shutdown().await;
}
