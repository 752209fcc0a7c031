//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Require the listener network and address
//! - Check address shape against the network kind
//! - Validate value ranges (backoff bounds, log filter, metrics address)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AppConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;
use tracing_subscriber::EnvFilter;

use crate::config::schema::{AcceptConfig, AppConfig, Network};

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("listener.network is required")]
    MissingNetwork,

    #[error("listener.address is required")]
    MissingAddress,

    #[error("invalid tcp address {0:?}: expected host:port")]
    InvalidTcpAddress(String),

    #[error("unix socket path must not be empty")]
    EmptyUnixPath,

    #[error("accept backoff: base_delay_ms ({base}) exceeds max_delay_ms ({max})")]
    InvalidBackoff { base: u64, max: u64 },

    #[error("invalid log level {0:?}")]
    InvalidLogLevel(String),

    #[error("invalid metrics address {0:?}")]
    InvalidMetricsAddress(String),
}

/// Validate a whole file configuration.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    collect_listener_errors(
        config.listener.network,
        config.listener.address.as_deref(),
        &mut errors,
    );
    collect_accept_errors(&config.accept, &mut errors);

    if EnvFilter::try_new(&config.observability.log_level).is_err() {
        errors.push(ValidationError::InvalidLogLevel(
            config.observability.log_level.clone(),
        ));
    }

    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::InvalidMetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validate the listener pair and accept policy on their own.
pub fn validate_listener(
    network: Option<Network>,
    address: Option<&str>,
    accept: &AcceptConfig,
) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    collect_listener_errors(network, address, &mut errors);
    collect_accept_errors(accept, &mut errors);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validate the accept policy alone.
pub fn validate_accept(accept: &AcceptConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    collect_accept_errors(accept, &mut errors);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn collect_listener_errors(
    network: Option<Network>,
    address: Option<&str>,
    errors: &mut Vec<ValidationError>,
) {
    if network.is_none() {
        errors.push(ValidationError::MissingNetwork);
    }

    let Some(address) = address else {
        errors.push(ValidationError::MissingAddress);
        return;
    };

    match network {
        Some(Network::Tcp) if !is_host_port(address) => {
            errors.push(ValidationError::InvalidTcpAddress(address.to_string()));
        }
        Some(Network::Unix) if address.trim().is_empty() => {
            errors.push(ValidationError::EmptyUnixPath);
        }
        None if address.trim().is_empty() => {
            errors.push(ValidationError::MissingAddress);
        }
        _ => {}
    }
}

fn collect_accept_errors(accept: &AcceptConfig, errors: &mut Vec<ValidationError>) {
    if accept.base_delay_ms > accept.max_delay_ms {
        errors.push(ValidationError::InvalidBackoff {
            base: accept.base_delay_ms,
            max: accept.max_delay_ms,
        });
    }
}

/// Accepts "host:port" and "[v6]:port". Host names are resolved at bind time.
fn is_host_port(address: &str) -> bool {
    if address.parse::<SocketAddr>().is_ok() {
        return true;
    }
    match address.rsplit_once(':') {
        Some((host, port)) => {
            !host.is_empty() && !host.contains(':') && port.parse::<u16>().is_ok()
        }
        None => false,
    }
}
