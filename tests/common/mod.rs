//! Shared utilities for integration testing.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use api_relay::config::RelayConfig;
use api_relay::http::ServerError;
use api_relay::lifecycle::Shutdown;
use api_relay::HttpServer;

/// A minimal upstream listing body the relay decodes successfully.
pub const LISTING: &str = r#"[
    {
        "id": 1,
        "name": "apiserver",
        "full_name": "tcuthbert/apiserver",
        "html_url": "https://github.com/tcuthbert/apiserver",
        "description": "toy API server",
        "fork": false,
        "language": "Go",
        "stargazers_count": 3,
        "forks_count": 1
    }
]"#;

/// Start a mock upstream that returns a fixed 200 response.
pub async fn start_mock_upstream(addr: SocketAddr, body: &'static str) {
    start_programmable_upstream(addr, move || async move { (200, body.to_string()) }).await;
}

/// Start a programmable mock upstream with async support.
pub async fn start_programmable_upstream<F, Fut>(addr: SocketAddr, f: F)
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind(addr).await.unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        let (status, body) = f().await;
                        let status_text = match status {
                            200 => "200 OK",
                            404 => "404 Not Found",
                            500 => "500 Internal Server Error",
                            503 => "503 Service Unavailable",
                            _ => "200 OK",
                        };

                        let response_str = format!(
                            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_text,
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response_str.as_bytes()).await;
                        let _ = socket.shutdown().await;
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    });
                }
                Err(_) => break,
            }
        }
    });
}

/// Build a test config pointed at a local mock upstream.
pub fn test_config(relay_addr: SocketAddr, upstream_addr: SocketAddr) -> RelayConfig {
    let mut config = RelayConfig::default();
    config.listener.bind_address = relay_addr.to_string();
    config.upstream.url = format!("http://{}/", upstream_addr);
    config.upstream.deadline_secs = 5;
    config.admission.backoff_min_secs = 1;
    config.admission.backoff_max_secs = 1;
    config.shutdown.grace_secs = 5;
    config
}

/// Start the relay server and return its shutdown handle and run task.
pub async fn spawn_relay(
    config: RelayConfig,
    relay_addr: SocketAddr,
) -> (Shutdown, JoinHandle<Result<(), ServerError>>) {
    let shutdown = Shutdown::new();
    let server = HttpServer::new(config).unwrap();
    let listener = TcpListener::bind(relay_addr).await.unwrap();

    let server_shutdown = shutdown.clone();
    let handle = tokio::spawn(async move { server.run(listener, server_shutdown).await });

    // Wait for the server to start accepting.
    tokio::time::sleep(Duration::from_millis(200)).await;

    (shutdown, handle)
}
