//! Per-connection handler contract.

use std::future::Future;
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

use crate::net::Connection;

/// Error a handler may return. Logged by the dispatcher, never propagated.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Application logic for one connection.
///
/// Invoked exactly once per accepted connection, on its own task. The handler
/// owns all I/O on `conn` until it returns. It should watch `cx` and wind down
/// promptly once it is cancelled; nothing interrupts it forcibly.
///
/// Cleanup is not the handler's job: after `handle` returns, errors or panics,
/// the dispatcher deregisters and closes the connection.
pub trait Handler: Send + Sync + 'static {
    fn handle(
        &self,
        cx: CancellationToken,
        conn: &mut Connection,
    ) -> impl Future<Output = Result<(), HandlerError>> + Send;
}

impl<H: Handler> Handler for Arc<H> {
    fn handle(
        &self,
        cx: CancellationToken,
        conn: &mut Connection,
    ) -> impl Future<Output = Result<(), HandlerError>> + Send {
        (**self).handle(cx, conn)
    }
}

/// Writes every byte it reads back to the peer until EOF or cancellation.
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoHandler;

impl Handler for EchoHandler {
    async fn handle(&self, cx: CancellationToken, conn: &mut Connection) -> Result<(), HandlerError> {
        let mut buf = vec![0u8; 4096];
        loop {
            let n = tokio::select! {
                _ = cx.cancelled() => return Ok(()),
                read = conn.read(&mut buf) => read?,
            };
            if n == 0 {
                return Ok(());
            }
            conn.write_all(&buf[..n]).await?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::{ConnectionId, ConnectionInfo, PeerAddr, Registry};
    use std::time::Duration;
    use tokio::io::duplex;

    fn connection(registry: &Registry, token: CancellationToken) -> (Connection, tokio::io::DuplexStream) {
        let (server_side, client_side) = duplex(256);
        let info = ConnectionInfo::new(ConnectionId::from_raw(1), PeerAddr::Unknown, token);
        (Connection::register(info, server_side, registry), client_side)
    }

    #[tokio::test]
    async fn echo_returns_bytes_and_stops_at_eof() {
        let registry = Registry::new();
        let token = CancellationToken::new();
        let (mut conn, mut client) = connection(&registry, token.clone());

        let task = tokio::spawn(async move {
            let result = EchoHandler.handle(token, &mut conn).await;
            (result.is_ok(), conn)
        });

        client.write_all(b"hello").await.unwrap();
        let mut buf = [0u8; 5];
        client.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"hello");

        drop(client);
        let (ok, _conn) = tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();
        assert!(ok);
    }

    #[tokio::test]
    async fn echo_stops_on_cancellation() {
        let registry = Registry::new();
        let token = CancellationToken::new();
        let (mut conn, _client) = connection(&registry, token.clone());

        let handler = Arc::new(EchoHandler);
        let cx = token.clone();
        let task = tokio::spawn(async move { handler.handle(cx, &mut conn).await.is_ok() });

        token.cancel();
        let ok = tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();
        assert!(ok);
    }
}
