//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP / Unix stream
//!     → listener.rs (bind, accept)
//!     → stream.rs (raw stream + peer address)
//!     → connection.rs (id, cancellation scope, owned transport)
//!     → registry.rs (live connection index)
//!     → Hand off to the server's handler
//!
//! Connection States:
//!     Active → Draining (scope cancelled) → Closed
//! ```
//!
//! # Design Decisions
//! - A connection owns its transport; the registry only holds a shareable view
//! - Deregistration happens before the transport is closed
//! - Transport is a trait object so in-memory streams can stand in for sockets

pub mod connection;
pub mod listener;
pub mod registry;
pub mod stream;

pub use connection::{Connection, ConnectionId, ConnectionInfo, ConnectionState};
pub use listener::{Acceptor, ListenAddr, Listener, ListenerError};
pub use registry::Registry;
pub use stream::{PeerAddr, Stream, Transport};
