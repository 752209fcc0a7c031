//! Connection state and lifecycle tracking.
//!
//! # Responsibilities
//! - Own exactly one accepted transport
//! - Carry the connection's id and its cancellation scope
//! - Forward reads and writes to the transport
//! - Deregister and close exactly once (Active → Draining → Closed)

use std::fmt;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, ReadBuf};
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

use crate::net::registry::Registry;
use crate::net::stream::{PeerAddr, Transport};
use crate::observability::metrics;

/// Unique identifier for a connection within one server's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub const fn from_raw(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw ID value.
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Connection state for lifecycle tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Connection is open and its scope is live.
    Active,
    /// Scope cancelled; the handler is expected to wind down.
    Draining,
    /// Transport closed and deregistered.
    Closed,
}

/// Shareable view of a live connection, as stored in the [`Registry`].
#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    id: ConnectionId,
    peer: PeerAddr,
    connected_at: Instant,
    token: CancellationToken,
}

impl ConnectionInfo {
    pub fn new(id: ConnectionId, peer: PeerAddr, token: CancellationToken) -> Self {
        Self {
            id,
            peer,
            connected_at: Instant::now(),
            token,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn peer_addr(&self) -> &PeerAddr {
        &self.peer
    }

    pub fn connected_at(&self) -> Instant {
        self.connected_at
    }

    /// Cancel this connection's scope only. Siblings are unaffected.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// One accepted connection.
///
/// Reads and writes are forwarded to the owned transport. Dropping an open
/// connection closes it.
pub struct Connection {
    info: ConnectionInfo,
    io: Option<Box<dyn Transport>>,
    registry: Registry,
}

impl Connection {
    /// Wrap a transport whose `info` is already registered in `registry`.
    pub fn new(info: ConnectionInfo, io: impl Transport, registry: Registry) -> Self {
        Self {
            info,
            io: Some(Box::new(io)),
            registry,
        }
    }

    /// Register `info` and wrap the transport in one step.
    pub fn register(info: ConnectionInfo, io: impl Transport, registry: &Registry) -> Self {
        registry.insert(info.clone());
        Self::new(info, io, registry.clone())
    }

    pub fn id(&self) -> ConnectionId {
        self.info.id
    }

    pub fn peer_addr(&self) -> &PeerAddr {
        &self.info.peer
    }

    pub fn connected_at(&self) -> Instant {
        self.info.connected_at
    }

    /// This connection's cancellation scope, a child of the server's root.
    pub fn token(&self) -> &CancellationToken {
        &self.info.token
    }

    /// Resolves once the scope is cancelled.
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.info.token.cancelled()
    }

    pub fn is_cancelled(&self) -> bool {
        self.info.token.is_cancelled()
    }

    /// Cancel this connection's scope without touching its siblings.
    pub fn cancel(&self) {
        self.info.token.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.io.is_none()
    }

    pub fn state(&self) -> ConnectionState {
        if self.is_closed() {
            ConnectionState::Closed
        } else if self.is_cancelled() {
            ConnectionState::Draining
        } else {
            ConnectionState::Active
        }
    }

    pub fn info(&self) -> &ConnectionInfo {
        &self.info
    }

    /// Deregister, cancel the scope and close the transport.
    ///
    /// Idempotent: only the first call has any effect.
    pub fn close(&mut self) {
        let Some(io) = self.io.take() else {
            return;
        };
        // Deregister before the transport goes away so no observer can find
        // a registered connection whose transport is closed.
        self.registry.remove(self.info.id);
        self.info.token.cancel();
        drop(io);

        metrics::record_connection_closed(self.info.connected_at);
        tracing::debug!(
            connection_id = %self.info.id,
            peer = %self.info.peer,
            duration_ms = self.info.connected_at.elapsed().as_millis() as u64,
            "Connection closed"
        );
    }

    /// Flush and shut down the write half, then [`close`](Self::close).
    pub async fn close_graceful(&mut self) -> io::Result<()> {
        let result = match self.io.as_mut() {
            Some(io) => io.shutdown().await,
            None => Ok(()),
        };
        self.close();
        result
    }

    fn io_mut(&mut self) -> io::Result<&mut Box<dyn Transport>> {
        self.io
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "connection closed"))
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.info.id)
            .field("peer", &self.info.peer)
            .field("state", &self.state())
            .finish()
    }
}

impl AsyncRead for Connection {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut().io_mut() {
            Ok(io) => Pin::new(io).poll_read(cx, buf),
            Err(e) => Poll::Ready(Err(e)),
        }
    }
}

impl AsyncWrite for Connection {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut().io_mut() {
            Ok(io) => Pin::new(io).poll_write(cx, buf),
            Err(e) => Poll::Ready(Err(e)),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut().io_mut() {
            Ok(io) => Pin::new(io).poll_flush(cx),
            Err(e) => Poll::Ready(Err(e)),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut().io_mut() {
            Ok(io) => Pin::new(io).poll_shutdown(cx),
            Err(e) => Poll::Ready(Err(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt};

    fn open(id: u64, registry: &Registry, parent: &CancellationToken) -> (Connection, tokio::io::DuplexStream) {
        let (server_side, client_side) = duplex(64);
        let info = ConnectionInfo::new(ConnectionId::from_raw(id), PeerAddr::Unknown, parent.child_token());
        (Connection::register(info, server_side, registry), client_side)
    }

    #[test]
    fn connection_id_display() {
        assert_eq!(ConnectionId::from_raw(7).to_string(), "conn-7");
        assert!(ConnectionId::from_raw(1) < ConnectionId::from_raw(2));
    }

    #[tokio::test]
    async fn forwards_reads_and_writes() {
        let registry = Registry::new();
        let root = CancellationToken::new();
        let (mut conn, mut client) = open(1, &registry, &root);

        client.write_all(b"ping").await.unwrap();
        let mut buf = [0u8; 4];
        conn.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ping");

        conn.write_all(b"pong").await.unwrap();
        client.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"pong");
    }

    #[tokio::test]
    async fn close_is_idempotent_and_deregisters_once() {
        let registry = Registry::new();
        let root = CancellationToken::new();
        let (mut conn, mut client) = open(1, &registry, &root);
        assert!(registry.contains(conn.id()));
        assert_eq!(conn.state(), ConnectionState::Active);

        conn.close();
        assert!(conn.is_closed());
        assert!(!registry.contains(conn.id()));
        assert_eq!(conn.state(), ConnectionState::Closed);

        conn.close();
        drop(conn);
        assert!(registry.is_empty());

        let mut buf = [0u8; 1];
        assert_eq!(client.read(&mut buf).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn io_after_close_is_not_connected() {
        let registry = Registry::new();
        let root = CancellationToken::new();
        let (mut conn, _client) = open(1, &registry, &root);

        conn.close();
        let err = conn.write_all(b"late").await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotConnected);
    }

    #[tokio::test]
    async fn drop_closes_connection() {
        let registry = Registry::new();
        let root = CancellationToken::new();
        let (conn, _client) = open(3, &registry, &root);
        let token = conn.token().clone();

        drop(conn);
        assert!(registry.is_empty());
        assert!(token.is_cancelled());
        assert!(!root.is_cancelled());
    }

    #[tokio::test]
    async fn cancel_does_not_reach_siblings() {
        let registry = Registry::new();
        let root = CancellationToken::new();
        let (first, _c1) = open(1, &registry, &root);
        let (second, _c2) = open(2, &registry, &root);

        first.cancel();
        assert_eq!(first.state(), ConnectionState::Draining);
        assert!(!second.is_cancelled());

        root.cancel();
        second.cancelled().await;
        assert!(second.is_cancelled());
    }

    #[tokio::test]
    async fn close_graceful_sends_eof() {
        let registry = Registry::new();
        let root = CancellationToken::new();
        let (mut conn, mut client) = open(1, &registry, &root);

        conn.write_all(b"bye").await.unwrap();
        conn.close_graceful().await.unwrap();
        assert!(registry.is_empty());

        let mut received = Vec::new();
        client.read_to_end(&mut received).await.unwrap();
        assert_eq!(received, b"bye");
    }
}
