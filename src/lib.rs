//! connhub: supervised stream server library

pub mod config;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod resilience;
pub mod server;

pub use config::{ConfigError, Network, ServerConfig};
pub use lifecycle::Shutdown;
pub use net::{Connection, ConnectionId, Registry};
pub use server::{EchoHandler, Handler, HandlerError, Server, ServerError};
pub use tokio_util::sync::CancellationToken;
