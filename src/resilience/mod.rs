//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Accept error in the accept loop:
//!     → retries.rs (transient? budget left?)
//!     → backoff.rs (exponential delay with jitter)
//!     → retry accept, or end the server with the error
//! ```
//!
//! # Design Decisions
//! - Baseline policy is fail-fast; retrying is opt-in via config
//! - Jittered backoff avoids hot-looping on descriptor exhaustion

pub mod backoff;
pub mod retries;

pub use retries::{is_transient, AcceptRetry};
