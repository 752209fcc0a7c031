//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Shutdown (shutdown.rs):
//!     Server owns the root scope → each connection gets a child scope
//!     Stop → root cancelled → every live connection observes cancellation
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → caller invokes Server::stop
//! ```
//!
//! # Design Decisions
//! - Cancellation is a strict parent → child tree, never back-referenced
//! - Ordered shutdown: stop accept, cancel connections, drain
//! - Drain has timeout: the binary exits after the deadline regardless

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
pub use signals::{wait_for_shutdown, ShutdownSignal};
