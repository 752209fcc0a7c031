//! Server subsystem.
//!
//! # Data Flow
//! ```text
//! Server::start
//!     → net::Listener::bind (once per Server)
//!     → accept loop:
//!         next id → ConnectionInfo (child scope) → Registry::insert
//!         → on_connect hook (synchronous)
//!         → tokio::spawn(dispatch)
//!     dispatch:
//!         Handler::handle(cx, &mut conn) under catch_unwind
//!         → Connection::close (deregister, close transport)
//!
//! Server::stop
//!     → root scope cancelled → accept loop exits, listener dropped
//!     → every connection scope cancelled → handlers wind down
//! ```
//!
//! # Design Decisions
//! - Run-once state machine: NotStarted → Running → Stopped
//! - Ids come from a per-server counter starting at 1, never reused
//! - Handler failures are isolated per connection; accept failures end the server

pub mod error;
pub mod handler;
pub mod supervisor;

pub use error::ServerError;
pub use handler::{EchoHandler, Handler, HandlerError};
pub use supervisor::{Server, ServerState};
