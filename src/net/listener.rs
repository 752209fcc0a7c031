//! Stream listener over TCP or Unix-domain sockets.
//!
//! # Responsibilities
//! - Bind to the configured network kind and address
//! - Accept incoming streams
//! - Report the bound address (ephemeral ports resolved)
//! - Remove the Unix socket file when the listener is dropped
//! - Define the [`Acceptor`] seam the accept loop runs over

use std::fmt;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;

use tokio::net::TcpListener;
#[cfg(unix)]
use tokio::net::UnixListener;

use crate::config::Network;
use crate::net::stream::{PeerAddr, Stream};

/// Error type for listener operations.
#[derive(Debug)]
pub enum ListenerError {
    /// Failed to bind to address.
    Bind(io::Error),
    /// Failed to accept connection.
    Accept(io::Error),
    /// Network kind not available on this platform.
    Unsupported(Network),
}

impl fmt::Display for ListenerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListenerError::Bind(e) => write!(f, "Failed to bind: {}", e),
            ListenerError::Accept(e) => write!(f, "Failed to accept: {}", e),
            ListenerError::Unsupported(n) => write!(f, "Unsupported network: {}", n),
        }
    }
}

impl std::error::Error for ListenerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ListenerError::Bind(e) | ListenerError::Accept(e) => Some(e),
            ListenerError::Unsupported(_) => None,
        }
    }
}

/// Address a listener is bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenAddr {
    Tcp(SocketAddr),
    Unix(PathBuf),
}

impl ListenAddr {
    /// The TCP socket address, if this is a TCP listener.
    pub fn as_tcp(&self) -> Option<SocketAddr> {
        match self {
            ListenAddr::Tcp(addr) => Some(*addr),
            ListenAddr::Unix(_) => None,
        }
    }
}

impl fmt::Display for ListenAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListenAddr::Tcp(addr) => write!(f, "tcp://{addr}"),
            ListenAddr::Unix(path) => write!(f, "unix://{}", path.display()),
        }
    }
}

/// A source of incoming streams for the accept loop.
///
/// [`Listener`] is the socket-backed implementation. Other implementations
/// can wrap it, e.g. to inject accept failures.
pub trait Acceptor: Send + Sync {
    /// Wait for the next incoming stream.
    fn accept(&self) -> impl Future<Output = Result<(Stream, PeerAddr), ListenerError>> + Send;

    /// The address streams are accepted on.
    fn local_addr(&self) -> &ListenAddr;
}

enum Inner {
    Tcp(TcpListener),
    #[cfg(unix)]
    Unix(UnixListener),
}

/// A bound listener. Owned by the accept loop; dropping it closes the socket.
pub struct Listener {
    inner: Inner,
    local_addr: ListenAddr,
}

impl Listener {
    /// Bind to `address` using the given network kind.
    pub async fn bind(network: Network, address: &str) -> Result<Self, ListenerError> {
        match network {
            Network::Tcp => {
                let listener = TcpListener::bind(address)
                    .await
                    .map_err(ListenerError::Bind)?;
                let local_addr = listener.local_addr().map_err(ListenerError::Bind)?;
                tracing::info!(address = %local_addr, "TCP listener bound");
                Ok(Self {
                    inner: Inner::Tcp(listener),
                    local_addr: ListenAddr::Tcp(local_addr),
                })
            }
            #[cfg(unix)]
            Network::Unix => {
                let listener = UnixListener::bind(address).map_err(ListenerError::Bind)?;
                tracing::info!(path = %address, "Unix listener bound");
                Ok(Self {
                    inner: Inner::Unix(listener),
                    local_addr: ListenAddr::Unix(PathBuf::from(address)),
                })
            }
            #[cfg(not(unix))]
            Network::Unix => Err(ListenerError::Unsupported(network)),
        }
    }

    /// Wait for the next incoming stream.
    pub async fn accept(&self) -> Result<(Stream, PeerAddr), ListenerError> {
        match &self.inner {
            Inner::Tcp(listener) => {
                let (stream, addr) = listener.accept().await.map_err(ListenerError::Accept)?;
                Ok((Stream::Tcp(stream), PeerAddr::Tcp(addr)))
            }
            #[cfg(unix)]
            Inner::Unix(listener) => {
                let (stream, addr) = listener.accept().await.map_err(ListenerError::Accept)?;
                let peer = PeerAddr::Unix(addr.as_pathname().map(PathBuf::from));
                Ok((Stream::Unix(stream), peer))
            }
        }
    }

    /// The address this listener is bound to.
    pub fn local_addr(&self) -> &ListenAddr {
        &self.local_addr
    }
}

impl Acceptor for Listener {
    fn accept(&self) -> impl Future<Output = Result<(Stream, PeerAddr), ListenerError>> + Send {
        Listener::accept(self)
    }

    fn local_addr(&self) -> &ListenAddr {
        Listener::local_addr(self)
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        #[cfg(unix)]
        if let (Inner::Unix(_), ListenAddr::Unix(path)) = (&self.inner, &self.local_addr) {
            if let Err(e) = std::fs::remove_file(path) {
                tracing::debug!(path = %path.display(), error = %e, "Failed to remove socket file");
            }
        }
        tracing::debug!(address = %self.local_addr, "Listener closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn binds_ephemeral_tcp_port() {
        let listener = Listener::bind(Network::Tcp, "127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().as_tcp().unwrap();
        assert_ne!(addr.port(), 0);

        let client = tokio::net::TcpStream::connect(addr).await.unwrap();
        let (_stream, peer) = listener.accept().await.unwrap();
        assert_eq!(peer, PeerAddr::Tcp(client.local_addr().unwrap()));
    }

    #[tokio::test]
    async fn bind_fails_when_address_in_use() {
        let first = Listener::bind(Network::Tcp, "127.0.0.1:0").await.unwrap();
        let taken = first.local_addr().as_tcp().unwrap().to_string();

        let err = Listener::bind(Network::Tcp, &taken).await.err().unwrap();
        assert!(matches!(err, ListenerError::Bind(_)));
        assert!(err.to_string().starts_with("Failed to bind"));
    }

    async fn accept_via<A: Acceptor>(acceptor: &A) -> PeerAddr {
        acceptor.accept().await.unwrap().1
    }

    #[tokio::test]
    async fn listener_accepts_through_acceptor_trait() {
        let listener = Listener::bind(Network::Tcp, "127.0.0.1:0").await.unwrap();
        let addr = Acceptor::local_addr(&listener).as_tcp().unwrap();

        let client = tokio::net::TcpStream::connect(addr).await.unwrap();
        assert_eq!(accept_via(&listener).await, PeerAddr::Tcp(client.local_addr().unwrap()));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn unix_socket_file_removed_on_drop() {
        let path = std::env::temp_dir().join(format!("connhub-listener-{}.sock", std::process::id()));
        let _ = std::fs::remove_file(&path);

        let listener = Listener::bind(Network::Unix, path.to_str().unwrap()).await.unwrap();
        assert!(path.exists());
        assert_eq!(listener.local_addr(), &ListenAddr::Unix(path.clone()));

        drop(listener);
        assert!(!path.exists());
    }
}
