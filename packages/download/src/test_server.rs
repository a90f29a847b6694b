//! Minimal in-process HTTP/1.1 stub used by the downloader tests.
//!
//! Each route is keyed by the exact request target (path plus query string)
//! and answered once per connection with `Connection: close`.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncReadExt as _, AsyncWriteExt as _};
use tokio::net::{TcpListener, TcpStream};

/// Canned response for a route.
#[derive(Debug, Clone)]
pub enum Reply {
    /// 200 with a CSV body.
    Ok(String),
    /// Empty body with the given status code.
    Status(u16),
    /// 308 to another target on the same server.
    Redirect(String),
    /// Announces a longer body than it sends, then hangs up.
    Truncated(String),
}

pub struct StubServer {
    base_url: String,
    hits: Arc<Mutex<Vec<String>>>,
}

impl StubServer {
    pub async fn start(routes: BTreeMap<String, Reply>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let routes = Arc::new(routes);
        let hits = Arc::new(Mutex::new(Vec::new()));
        let server_hits = Arc::clone(&hits);

        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let routes = Arc::clone(&routes);
                let hits = Arc::clone(&server_hits);
                tokio::spawn(async move {
                    let Some(target) = read_request_target(&mut socket).await else {
                        return;
                    };
                    hits.lock().unwrap().push(target.clone());
                    let reply = routes.get(&target).cloned().unwrap_or(Reply::Status(404));
                    socket.write_all(render(&reply).as_bytes()).await.ok();
                    socket.shutdown().await.ok();
                });
            }
        });

        Self {
            base_url: format!("http://{addr}"),
            hits,
        }
    }

    pub fn url(&self, target: &str) -> String {
        format!("{}{target}", self.base_url)
    }

    pub fn hits(&self) -> Vec<String> {
        self.hits.lock().unwrap().clone()
    }
}

async fn read_request_target(socket: &mut TcpStream) -> Option<String> {
    let mut head = Vec::new();
    let mut chunk = [0u8; 1024];

    while !head.windows(4).any(|w| w == b"\r\n\r\n") {
        let read = socket.read(&mut chunk).await.ok()?;
        if read == 0 {
            return None;
        }
        head.extend_from_slice(&chunk[..read]);
    }

    let head = String::from_utf8_lossy(&head);
    head.lines()
        .next()?
        .split_whitespace()
        .nth(1)
        .map(str::to_owned)
}

fn render(reply: &Reply) -> String {
    match reply {
        Reply::Ok(body) => format!(
            "HTTP/1.1 200 OK\r\nContent-Type: text/csv; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        ),
        Reply::Status(status) => format!(
            "HTTP/1.1 {status} Stub\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
        ),
        Reply::Redirect(location) => format!(
            "HTTP/1.1 308 Permanent Redirect\r\nLocation: {location}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
        ),
        Reply::Truncated(body) => format!(
            "HTTP/1.1 200 OK\r\nContent-Type: text/csv\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len() + 4096
        ),
    }
}
