//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → AppConfig (validated)
//!     → server.rs (ServerConfig, immutable, handed to the Server)
//! ```
//!
//! # Design Decisions
//! - Config is immutable once built; a Server never observes changes
//! - Listener network and address have no defaults and must be supplied
//! - Validation separates syntactic (serde) from semantic checks
//! - Missing or malformed fields fail at construction, not at bind time

pub mod loader;
pub mod schema;
pub mod server;
pub mod validation;

pub use loader::{load_config, load_with_overrides, ConfigError, ListenerOverrides};
pub use schema::{AcceptConfig, AppConfig, ListenerConfig, LogFormat, Network, ObservabilityConfig};
pub use server::{OnConnect, ServerConfig, ServerConfigBuilder};
pub use validation::ValidationError;
