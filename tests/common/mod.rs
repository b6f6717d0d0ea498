//! Shared utilities for integration tests.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use search_transport::config::TransportConfig;
use search_transport::connection::HttpConnectionFactory;
use search_transport::Transport;

/// What the mock node does with one request.
#[allow(dead_code)]
pub enum MockReply {
    Respond(u16, String),
    /// Keep the socket open without answering.
    Hang,
}

/// Start a programmable mock node on an ephemeral port.
///
/// `f` receives the request line (`"GET /path?query HTTP/1.1"`).
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = MockReply> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        let Some(request_line) = read_request(&mut socket).await else {
                            return;
                        };
                        match f(request_line).await {
                            MockReply::Respond(status, body) => {
                                let response_str = format!(
                                    "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                                    status_text(status),
                                    body.len(),
                                    body
                                );
                                let _ = socket.write_all(response_str.as_bytes()).await;
                                let _ = socket.shutdown().await;
                            }
                            MockReply::Hang => {
                                tokio::time::sleep(Duration::from_secs(30)).await;
                            }
                        }
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

/// Start a mock node that always gives the same answer.
#[allow(dead_code)]
pub async fn start_mock_backend(status: u16, body: &'static str) -> SocketAddr {
    start_programmable_backend(move |_| async move { MockReply::Respond(status, body.to_string()) })
        .await
}

/// An address nothing listens on.
#[allow(dead_code)]
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

/// Cluster-info body advertising `addrs` as data nodes.
#[allow(dead_code)]
pub fn nodes_body(addrs: &[SocketAddr]) -> String {
    let nodes: serde_json::Map<String, serde_json::Value> = addrs
        .iter()
        .enumerate()
        .map(|(i, addr)| {
            (
                format!("node-{}", i),
                serde_json::json!({
                    "name": format!("node-{}", i),
                    "roles": ["data", "ingest"],
                    "http": { "publish_address": addr.to_string() },
                }),
            )
        })
        .collect();
    serde_json::json!({ "cluster_name": "test", "nodes": nodes }).to_string()
}

/// Config pointing at `addrs` in order, with a short request timeout.
#[allow(dead_code)]
pub fn config_for(addrs: &[SocketAddr]) -> TransportConfig {
    TransportConfig {
        hosts: addrs.iter().map(|a| format!("http://{}", a)).collect(),
        randomize_hosts: false,
        request_timeout_ms: 2_000,
        ..TransportConfig::default()
    }
}

/// Transport over real HTTP that ignores proxy environment variables.
#[allow(dead_code)]
pub async fn transport(config: TransportConfig) -> Transport {
    let client = reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap();
    Transport::with_factory(config, Arc::new(HttpConnectionFactory::with_client(client)))
        .await
        .unwrap()
}

fn status_text(status: u16) -> String {
    let reason = match status {
        200 => "OK",
        201 => "Created",
        400 => "Bad Request",
        404 => "Not Found",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        _ => "Unknown",
    };
    format!("{} {}", status, reason)
}

/// Read the request head and body; returns the request line.
async fn read_request(socket: &mut TcpStream) -> Option<String> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    let head_end = loop {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).into_owned();
    let content_length = head
        .lines()
        .filter_map(|l| l.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .unwrap_or(0);
    while buf.len() < head_end + content_length {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    head.lines().next().map(str::to_string)
}
