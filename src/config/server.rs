//! Validated runtime configuration for a [`Server`](crate::server::Server).

use std::fmt;
use std::sync::Arc;

use crate::config::loader::ConfigError;
use crate::config::schema::{AcceptConfig, AppConfig, Network};
use crate::config::validation::{validate_accept, validate_listener, ValidationError};
use crate::net::stream::Stream;

/// Hook invoked on the accept loop with each freshly registered stream.
///
/// Runs synchronously; a slow hook delays subsequent accepts.
pub type OnConnect = Arc<dyn Fn(&Stream) + Send + Sync>;

/// Immutable server configuration. Construct with [`ServerConfig::builder`].
#[derive(Clone)]
pub struct ServerConfig {
    network: Network,
    address: String,
    accept: AcceptConfig,
    on_connect: Option<OnConnect>,
}

impl ServerConfig {
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder::default()
    }

    /// Build from a loaded file configuration.
    pub fn from_app_config(config: &AppConfig) -> Result<Self, ConfigError> {
        let mut builder = Self::builder().accept(config.accept.clone());
        if let Some(network) = config.listener.network {
            builder = builder.network(network);
        }
        if let Some(address) = &config.listener.address {
            builder = builder.address(address.clone());
        }
        builder.build()
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn accept(&self) -> &AcceptConfig {
        &self.accept
    }

    pub fn on_connect(&self) -> Option<&OnConnect> {
        self.on_connect.as_ref()
    }
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("network", &self.network)
            .field("address", &self.address)
            .field("accept", &self.accept)
            .field("on_connect", &self.on_connect.is_some())
            .finish()
    }
}

/// Builder for [`ServerConfig`]. `network` and `address` are required.
#[derive(Default)]
pub struct ServerConfigBuilder {
    network: Option<Network>,
    address: Option<String>,
    accept: AcceptConfig,
    on_connect: Option<OnConnect>,
}

impl ServerConfigBuilder {
    pub fn network(mut self, network: Network) -> Self {
        self.network = Some(network);
        self
    }

    pub fn address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    pub fn accept(mut self, accept: AcceptConfig) -> Self {
        self.accept = accept;
        self
    }

    pub fn on_connect<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Stream) + Send + Sync + 'static,
    {
        self.on_connect = Some(Arc::new(hook));
        self
    }

    /// Validate and freeze the configuration.
    pub fn build(self) -> Result<ServerConfig, ConfigError> {
        let (network, address) = match (self.network, self.address) {
            (Some(network), Some(address)) => (network, address),
            (network, address) => {
                let mut errors = Vec::new();
                if network.is_none() {
                    errors.push(ValidationError::MissingNetwork);
                }
                if address.is_none() {
                    errors.push(ValidationError::MissingAddress);
                }
                if let Err(accept_errors) = validate_accept(&self.accept) {
                    errors.extend(accept_errors);
                }
                return Err(ConfigError::Validation(errors));
            }
        };

        validate_listener(Some(network), Some(&address), &self.accept)
            .map_err(ConfigError::Validation)?;

        Ok(ServerConfig {
            network,
            address,
            accept: self.accept,
            on_connect: self.on_connect,
        })
    }
}
