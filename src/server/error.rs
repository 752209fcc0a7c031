//! Server error taxonomy.

use std::io;
use std::sync::Arc;

use thiserror::Error;

use crate::config::Network;

/// Terminal error of [`Server::start`](crate::server::Server::start).
///
/// Cloneable so a stopped server can report its original outcome on every
/// later `start` call. A stop-triggered shutdown is not an error.
#[derive(Debug, Clone, Error)]
pub enum ServerError {
    #[error("failed to bind {network} listener on {address}: {source}")]
    Bind {
        network: Network,
        address: String,
        #[source]
        source: Arc<io::Error>,
    },

    #[error("accept failed: {0}")]
    Accept(#[source] Arc<io::Error>),

    #[error("server is already running")]
    AlreadyRunning,

    #[error("{0} listeners are not supported on this platform")]
    UnsupportedNetwork(Network),

    /// The accept loop unwound or was dropped before it returned.
    #[error("accept loop aborted before completing")]
    Aborted,
}

impl ServerError {
    /// The underlying I/O error, for bind and accept failures.
    pub fn io_error(&self) -> Option<&io::Error> {
        match self {
            ServerError::Bind { source, .. } => Some(&**source),
            ServerError::Accept(source) => Some(&**source),
            _ => None,
        }
    }
}
