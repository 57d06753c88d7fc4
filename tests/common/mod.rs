//! Shared utilities for integration tests.
//!
//! Every server binds `127.0.0.1:0`, so tests can run in parallel.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use ws_auth_proxy::relay::SessionRegistry;
use ws_auth_proxy::{ProxyConfig, ProxyServer, Shutdown};

pub type ClientSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Echo every data frame back until the peer closes.
async fn echo<S>(mut ws: WebSocketStream<S>)
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    while let Some(Ok(msg)) = ws.next().await {
        if msg.is_close() {
            break;
        }
        if (msg.is_text() || msg.is_binary()) && ws.send(msg).await.is_err() {
            break;
        }
    }
}

/// Start a WebSocket upstream that echoes text and binary frames.
pub async fn start_echo_upstream() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                if let Ok(ws) = tokio_tungstenite::accept_async(stream).await {
                    echo(ws).await;
                }
            });
        }
    });
    addr
}

/// Start an echo upstream that reports the handshake headers of every
/// connection it accepts.
pub async fn start_recording_upstream() -> (SocketAddr, mpsc::UnboundedReceiver<HeaderMap>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let tx = tx.clone();
            tokio::spawn(async move {
                let callback = move |req: &Request, response: Response| -> Result<Response, ErrorResponse> {
                    let _ = tx.send(req.headers().clone());
                    Ok(response)
                };
                if let Ok(ws) = tokio_tungstenite::accept_hdr_async(stream, callback).await {
                    echo(ws).await;
                }
            });
        }
    });
    (addr, rx)
}

/// Start an upstream that sends `farewell` and then closes the connection.
pub async fn start_closing_upstream(farewell: &'static str) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                if let Ok(mut ws) = tokio_tungstenite::accept_async(stream).await {
                    let _ = ws.send(Message::text(farewell.to_string())).await;
                    let _ = ws.close(None).await;
                    while let Some(Ok(_)) = ws.next().await {}
                }
            });
        }
    });
    addr
}

/// Address nothing is listening on.
pub async fn unused_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

/// Defaults pointed at `upstream`, with the startup probe off.
pub fn proxy_config(upstream: SocketAddr) -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.listener.bind_address = "127.0.0.1".into();
    config.listener.port = 0;
    config.upstream.url = format!("ws://{upstream}");
    config.lifecycle.probe_upstream = false;
    config.lifecycle.drain_secs = 2;
    config
}

/// A proxy running in the background.
pub struct TestProxy {
    pub addr: SocketAddr,
    pub server: ProxyServer,
    pub shutdown: Shutdown,
    pub sessions: Arc<SessionRegistry>,
    pub handle: JoinHandle<std::io::Result<()>>,
}

impl TestProxy {
    pub fn url(&self, path: &str) -> String {
        format!("ws://{}{}", self.addr, path)
    }

    /// Wait until the registry holds exactly `count` sessions.
    pub async fn wait_for_sessions(&self, count: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.sessions.len() != count {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("expected {count} sessions, found {}", self.sessions.len()));
    }
}

pub async fn start_proxy(config: ProxyConfig) -> TestProxy {
    let server = ProxyServer::new(&config).await.unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let sessions = server.sessions();

    let shutdown = Shutdown::new();
    let handle = tokio::spawn(server.clone().run(listener, shutdown.subscribe()));

    TestProxy {
        addr,
        server,
        shutdown,
        sessions,
        handle,
    }
}

/// Write `keys` as a JSON array into a temp file.
pub fn write_key_file(keys: &[&str]) -> tempfile::NamedTempFile {
    let file = tempfile::NamedTempFile::new().unwrap();
    std::fs::write(file.path(), serde_json::to_vec(keys).unwrap()).unwrap();
    file
}

/// Open a client connection with extra handshake headers.
pub async fn connect(url: &str, headers: &[(&str, &str)]) -> Result<ClientSocket, WsError> {
    let mut request = url.into_client_request()?;
    for (name, value) in headers {
        request.headers_mut().append(
            HeaderName::from_bytes(name.as_bytes()).unwrap(),
            HeaderValue::from_str(value).unwrap(),
        );
    }
    let (socket, _) = tokio_tungstenite::connect_async(request).await?;
    Ok(socket)
}

/// Status of a handshake the proxy refused.
pub fn rejection_status(result: Result<ClientSocket, WsError>) -> StatusCode {
    match result {
        Err(WsError::Http(response)) => response.status(),
        Err(other) => panic!("expected an HTTP rejection, got {other}"),
        Ok(_) => panic!("expected an HTTP rejection, connection was accepted"),
    }
}

/// Next data frame, skipping control frames.
pub async fn next_data(ws: &mut ClientSocket) -> Message {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("stream ended")
            .expect("read failed");
        if msg.is_text() || msg.is_binary() {
            return msg;
        }
    }
}
