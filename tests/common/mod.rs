//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use connhub::{Handler, Network, Server, ServerConfig, ServerError};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;

/// Config for an ephemeral TCP port on loopback.
#[allow(dead_code)]
pub fn tcp_config() -> ServerConfig {
    ServerConfig::builder()
        .network(Network::Tcp)
        .address("127.0.0.1:0")
        .build()
        .unwrap()
}

/// A running server, its accept-loop task and its bound address.
#[allow(dead_code)]
pub struct Running<H> {
    pub server: Arc<Server<H>>,
    pub task: JoinHandle<Result<(), ServerError>>,
    pub addr: SocketAddr,
}

/// Start `handler` behind `config` and wait until it is listening on TCP.
#[allow(dead_code)]
pub async fn start_tcp<H: Handler>(config: ServerConfig, handler: H) -> Running<H> {
    let server = Arc::new(Server::new(config, handler));
    let task = server.spawn();
    let addr = server
        .listening()
        .await
        .and_then(|addr| addr.as_tcp())
        .expect("server did not bind");
    Running { server, task, addr }
}

/// Connect a client and wait until the server has registered it.
#[allow(dead_code)]
pub async fn connect_registered<H: Handler>(running: &Running<H>, expected_live: usize) -> TcpStream {
    let client = TcpStream::connect(running.addr).await.unwrap();
    let registry = running.server.registry().clone();
    assert!(
        wait_until(Duration::from_secs(2), || registry.len() == expected_live).await,
        "registry never reached {expected_live} connections"
    );
    client
}

/// Poll `condition` until it holds or `timeout` elapses.
pub async fn wait_until<F>(timeout: Duration, condition: F) -> bool
where
    F: Fn() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
